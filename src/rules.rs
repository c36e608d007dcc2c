//! Layered rule engine.
//!
//! The base estimate is the sum of independent policy layers, kept as an
//! explicit ordered table ([`POLICY_LAYERS`]) rather than nested branches. Each
//! entry is a pure function of the feature vector and of the breakdown built so
//! far, and writes exactly one [`Contribution`] slot.
//!
//! | Layer       | Slots                                                    |
//! |-------------|----------------------------------------------------------|
//! | per-diem    | `per_diem`                                               |
//! | mileage     | `mileage`, `high_mileage_bonus`, `long_trip_bonus`       |
//! | receipts    | `receipts`, `receipt_cents_bonus`                        |
//! | efficiency  | `efficiency` (reads the mileage slots)                   |
//! | special     | `five_day_bonus`, `high_value_bonus`, `single_day_activity_bonus` |
//!
//! Layers are additive, so order only matters for the efficiency layer, which
//! scales what the mileage layer already paid.

use rust_decimal::Decimal;

use crate::constants::*;
use crate::features::FeatureVector;
use crate::types::{Contribution, RuleBreakdown};

/// The five policy families, for grouping diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    PerDiem,
    Mileage,
    Receipts,
    Efficiency,
    Special,
}

/// One named entry of the policy table.
pub struct PolicyLayer {
    pub layer: Layer,
    pub slot: Contribution,
    pub apply: fn(&FeatureVector, &RuleBreakdown) -> Decimal,
}

/// Policy table, evaluated top to bottom.
pub const POLICY_LAYERS: [PolicyLayer; 10] = [
    PolicyLayer {
        layer: Layer::PerDiem,
        slot: Contribution::PerDiem,
        apply: per_diem,
    },
    PolicyLayer {
        layer: Layer::Mileage,
        slot: Contribution::Mileage,
        apply: tiered_mileage,
    },
    PolicyLayer {
        layer: Layer::Mileage,
        slot: Contribution::HighMileageBonus,
        apply: high_mileage_bonus,
    },
    PolicyLayer {
        layer: Layer::Mileage,
        slot: Contribution::LongTripBonus,
        apply: long_trip_bonus,
    },
    PolicyLayer {
        layer: Layer::Receipts,
        slot: Contribution::Receipts,
        apply: receipts,
    },
    PolicyLayer {
        layer: Layer::Receipts,
        slot: Contribution::ReceiptCentsBonus,
        apply: receipt_cents_bonus,
    },
    PolicyLayer {
        layer: Layer::Efficiency,
        slot: Contribution::Efficiency,
        apply: efficiency,
    },
    PolicyLayer {
        layer: Layer::Special,
        slot: Contribution::FiveDayBonus,
        apply: five_day_bonus,
    },
    PolicyLayer {
        layer: Layer::Special,
        slot: Contribution::HighValueBonus,
        apply: high_value_bonus,
    },
    PolicyLayer {
        layer: Layer::Special,
        slot: Contribution::SingleDayActivityBonus,
        apply: single_day_activity_bonus,
    },
];

/// Run every policy layer. The breakdown's total is the base estimate.
pub fn apply_rules(features: &FeatureVector) -> RuleBreakdown {
    let mut breakdown = RuleBreakdown::default();
    for layer in &POLICY_LAYERS {
        let amount = (layer.apply)(features, &breakdown);
        breakdown.set(layer.slot, amount);
    }
    breakdown
}

/// Sum of the slots belonging to one policy family.
pub fn layer_total(breakdown: &RuleBreakdown, layer: Layer) -> Decimal {
    POLICY_LAYERS
        .iter()
        .filter(|p| p.layer == layer)
        .map(|p| breakdown.get(p.slot))
        .sum()
}

// ── Per-diem ────────────────────────────────────────────────────────────

fn per_diem(f: &FeatureVector, _: &RuleBreakdown) -> Decimal {
    per_diem_rate(f.days) * Decimal::from(f.days)
}

// ── Mileage ─────────────────────────────────────────────────────────────

/// Hard cut at the breakpoint: no blending between the two rates.
fn tiered_mileage(f: &FeatureVector, _: &RuleBreakdown) -> Decimal {
    if f.miles <= MILEAGE_TIER_BREAKPOINT {
        f.miles * MILEAGE_RATE_LOW
    } else {
        MILEAGE_TIER_BREAKPOINT * MILEAGE_RATE_LOW
            + (f.miles - MILEAGE_TIER_BREAKPOINT) * MILEAGE_RATE_HIGH
    }
}

/// Miles above the threshold earn `base_rate * (1 + 1/days)`; a one-day
/// marathon gets double the base rate, a two-week trip barely more than it.
fn high_mileage_bonus(f: &FeatureVector, _: &RuleBreakdown) -> Decimal {
    if f.miles <= HIGH_MILEAGE_BONUS_THRESHOLD {
        return Decimal::ZERO;
    }
    let day_scale = Decimal::ONE + Decimal::ONE / Decimal::from(f.days);
    (f.miles - HIGH_MILEAGE_BONUS_THRESHOLD) * HIGH_MILEAGE_BONUS_BASE_RATE * day_scale
}

fn long_trip_bonus(f: &FeatureVector, _: &RuleBreakdown) -> Decimal {
    if f.days >= LONG_TRIP_BONUS_MIN_DAYS
        && f.miles > LONG_TRIP_BONUS_THRESHOLD_MILES
        && f.miles_per_day > LONG_TRIP_BONUS_MIN_MILES_PER_DAY
    {
        (f.miles - LONG_TRIP_BONUS_THRESHOLD_MILES) * LONG_TRIP_BONUS_RATE
    } else {
        Decimal::ZERO
    }
}

// ── Receipts ────────────────────────────────────────────────────────────

fn receipts(f: &FeatureVector, _: &RuleBreakdown) -> Decimal {
    if f.days == 1 {
        single_day_receipts(f.receipts)
    } else {
        capped_receipts(f.days, f.receipts)
    }
}

/// Diminishing bands for same-day trips.
fn single_day_receipts(receipts: Decimal) -> Decimal {
    let mut remaining = receipts;
    let mut paid = Decimal::ZERO;
    for (width, rate) in SINGLE_DAY_RECEIPT_BANDS {
        if remaining <= Decimal::ZERO {
            break;
        }
        let portion = match width {
            Some(w) => remaining.min(w),
            None => remaining,
        };
        paid += portion * rate;
        remaining -= portion;
    }
    paid
}

fn capped_receipts(days: i64, receipts: Decimal) -> Decimal {
    let total_cap = daily_receipt_cap(days) * Decimal::from(days);
    if receipts <= total_cap {
        receipts * RECEIPT_BASE_RATE
    } else {
        total_cap * RECEIPT_BASE_RATE + (receipts - total_cap) * receipt_excess_rate(days)
    }
}

/// Legacy quirk keyed on the literal cents of the submitted total.
fn receipt_cents_bonus(f: &FeatureVector, _: &RuleBreakdown) -> Decimal {
    if RECEIPT_BONUS_CENTS.contains(&receipt_cents(f.receipts)) {
        RECEIPT_CENTS_BONUS
    } else {
        Decimal::ZERO
    }
}

/// First two fractional digits, truncated: `12.49` → 49, `12.495` → 49.
pub fn receipt_cents(receipts: Decimal) -> Decimal {
    (receipts.fract() * Decimal::ONE_HUNDRED).trunc()
}

// ── Efficiency ──────────────────────────────────────────────────────────

fn efficiency(f: &FeatureVector, breakdown: &RuleBreakdown) -> Decimal {
    let mpd = f.miles_per_day;
    if (EFFICIENCY_SWEET_SPOT_MIN..=EFFICIENCY_SWEET_SPOT_MAX).contains(&mpd) {
        breakdown.mileage_total() * EFFICIENCY_BONUS_RATE
    } else if mpd < LOW_EFFICIENCY_THRESHOLD {
        -(breakdown.mileage_total() * LOW_EFFICIENCY_PENALTY_RATE)
    } else {
        Decimal::ZERO
    }
}

// ── Special cases ───────────────────────────────────────────────────────

fn five_day_bonus(f: &FeatureVector, _: &RuleBreakdown) -> Decimal {
    if f.days == 5 {
        FIVE_DAY_BONUS
    } else {
        Decimal::ZERO
    }
}

fn high_value_bonus(f: &FeatureVector, _: &RuleBreakdown) -> Decimal {
    if f.miles + f.receipts > HIGH_VALUE_TRIP_THRESHOLD {
        HIGH_VALUE_TRIP_BONUS
    } else {
        Decimal::ZERO
    }
}

fn single_day_activity_bonus(f: &FeatureVector, _: &RuleBreakdown) -> Decimal {
    if f.days == 1
        && (f.miles > SINGLE_DAY_ACTIVITY_MILES || f.receipts > SINGLE_DAY_ACTIVITY_RECEIPTS)
    {
        SINGLE_DAY_ACTIVITY_BONUS
    } else {
        Decimal::ZERO
    }
}
