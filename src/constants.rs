//! Calibrated policy constants and rate-table lookups.
//!
//! Every value here was re-derived from historical outcome data, not taken from
//! a published policy. The lookups map trip length to the discovered tables:
//!
//! | Days  | Per-diem | Receipt cap/day | Receipt tail rate |
//! |-------|----------|-----------------|-------------------|
//! | 1     | 120      | (banded)        | (banded)          |
//! | 2-3   | 100      | 150             | 40%               |
//! | 4-6   | 110      | 120             | 10%               |
//! | 7     | 75       | 100             | 20%               |
//! | 8     | 60       | 100             | 20%               |
//! | 9-10  | 55       | 100             | 20%               |
//! | 11-12 | 60       | 100             | 20%               |
//! | 13    | 55       | 100             | 20%               |
//! | 14    | 50       | 100             | 20%               |
//! | 15+   | 45       | 100             | 20%               |

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ── Input domain ────────────────────────────────────────────────────────

/// Largest accepted miles or receipts value. Keeps every fixed-point
/// intermediate far inside `Decimal`'s 96-bit range.
pub const MAX_INPUT_AMOUNT: Decimal = dec!(1000000000000000);

/// Largest accepted trip length in days.
pub const MAX_TRIP_DAYS: i64 = 1_000_000;

/// Fractional digits of the final amount.
pub const AMOUNT_SCALE: u32 = 2;

// ── Mileage layer ───────────────────────────────────────────────────────

pub const MILEAGE_TIER_BREAKPOINT: Decimal = dec!(100);
/// Rate for miles up to the breakpoint.
pub const MILEAGE_RATE_LOW: Decimal = dec!(0.58);
/// Rate for miles beyond the breakpoint.
pub const MILEAGE_RATE_HIGH: Decimal = dec!(0.15);

/// Miles above this earn the high-mileage bonus.
pub const HIGH_MILEAGE_BONUS_THRESHOLD: Decimal = dec!(500);
/// Bonus rate before day scaling: `rate * (1 + 1/days)`.
pub const HIGH_MILEAGE_BONUS_BASE_RATE: Decimal = dec!(0.30);

pub const LONG_TRIP_BONUS_MIN_DAYS: i64 = 7;
pub const LONG_TRIP_BONUS_THRESHOLD_MILES: Decimal = dec!(700);
pub const LONG_TRIP_BONUS_MIN_MILES_PER_DAY: Decimal = dec!(120);
pub const LONG_TRIP_BONUS_RATE: Decimal = dec!(0.25);

// ── Receipt layer ───────────────────────────────────────────────────────

/// Share of receipts reimbursed inside the multi-day cap.
pub const RECEIPT_BASE_RATE: Decimal = dec!(0.60);

/// Single-day bands: (band width, rate). The last band is open-ended.
pub const SINGLE_DAY_RECEIPT_BANDS: [(Option<Decimal>, Decimal); 3] = [
    (Some(dec!(500)), dec!(0.60)),
    (Some(dec!(1000)), dec!(0.40)),
    (None, dec!(0.20)),
];

/// Fractional cents that earn the legacy receipt bonus.
pub const RECEIPT_BONUS_CENTS: [Decimal; 2] = [dec!(49), dec!(99)];
pub const RECEIPT_CENTS_BONUS: Decimal = dec!(5.00);

// ── Efficiency layer ────────────────────────────────────────────────────

/// Sweet-spot band, both edges inclusive.
pub const EFFICIENCY_SWEET_SPOT_MIN: Decimal = dec!(180);
pub const EFFICIENCY_SWEET_SPOT_MAX: Decimal = dec!(220);
pub const EFFICIENCY_BONUS_RATE: Decimal = dec!(0.15);

/// Strictly below this miles-per-day the mileage total is penalized.
pub const LOW_EFFICIENCY_THRESHOLD: Decimal = dec!(50);
pub const LOW_EFFICIENCY_PENALTY_RATE: Decimal = dec!(0.05);

// ── Special-case layer ──────────────────────────────────────────────────

pub const FIVE_DAY_BONUS: Decimal = dec!(15.00);

pub const HIGH_VALUE_TRIP_THRESHOLD: Decimal = dec!(1500);
pub const HIGH_VALUE_TRIP_BONUS: Decimal = dec!(25.00);

pub const SINGLE_DAY_ACTIVITY_MILES: Decimal = dec!(500);
pub const SINGLE_DAY_ACTIVITY_RECEIPTS: Decimal = dec!(1000);
pub const SINGLE_DAY_ACTIVITY_BONUS: Decimal = dec!(50.00);

// ── Correction bounder ──────────────────────────────────────────────────

/// Residuals with magnitude above this get the stronger shrink.
pub const LARGE_CORRECTION_THRESHOLD: Decimal = dec!(100);
pub const LARGE_CORRECTION_SHRINK: Decimal = dec!(0.85);
pub const SMALL_CORRECTION_SHRINK: Decimal = dec!(0.95);

pub const BASE_CORRECTION_CAP: Decimal = dec!(400);
/// Cap increments as (minimum days, extra cap); the largest matching step wins.
pub const CAP_STEPS_BY_DAYS: [(i64, Decimal); 2] = [(4, dec!(75)), (8, dec!(150))];
/// Cap increments as (minimum miles, extra cap); the largest matching step wins.
pub const CAP_STEPS_BY_MILES: [(Decimal, Decimal); 2] = [(dec!(300), dec!(75)), (dec!(800), dec!(150))];

// ── Model artifact ──────────────────────────────────────────────────────

/// Default artifact location, relative to the working directory.
pub const DEFAULT_MODEL_PATH: &str = "data/residual_model.json";

/// Daily per-diem rate for a trip of `days` days.
pub fn per_diem_rate(days: i64) -> Decimal {
    match days {
        1 => dec!(120.00),
        2 | 3 => dec!(100.00),
        4..=6 => dec!(110.00),
        7 => dec!(75.00),
        8 | 11 | 12 => dec!(60.00),
        9 | 10 | 13 => dec!(55.00),
        14 => dec!(50.00),
        _ => dec!(45.00),
    }
}

/// Per-day receipt cap for multi-day trips.
pub fn daily_receipt_cap(days: i64) -> Decimal {
    match days {
        1 => dec!(200.00),
        2 | 3 => dec!(150.00),
        4..=6 => dec!(120.00),
        _ => dec!(100.00),
    }
}

/// Rate paid on receipts above the multi-day cap.
pub fn receipt_excess_rate(days: i64) -> Decimal {
    match days {
        1 => dec!(0.00),
        2 | 3 => dec!(0.40),
        4..=6 => dec!(0.10),
        _ => dec!(0.20),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_diem_drops_for_long_trips() {
        assert!(per_diem_rate(1) > per_diem_rate(7));
        assert!(per_diem_rate(7) > per_diem_rate(14));
        assert_eq!(per_diem_rate(15), dec!(45));
        assert_eq!(per_diem_rate(90), dec!(45));
    }

    #[test]
    fn receipt_tables_cover_every_length() {
        for days in 1..=40 {
            assert!(daily_receipt_cap(days) > Decimal::ZERO);
            assert!(receipt_excess_rate(days) < RECEIPT_BASE_RATE);
        }
    }

    #[test]
    fn cap_steps_top_out_at_seven_hundred() {
        let max = BASE_CORRECTION_CAP
            + CAP_STEPS_BY_DAYS.iter().map(|s| s.1).max().unwrap_or_default()
            + CAP_STEPS_BY_MILES.iter().map(|s| s.1).max().unwrap_or_default();
        assert_eq!(max, dec!(700));
    }
}
