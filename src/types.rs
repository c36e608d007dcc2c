//! Core data structures: the raw trip, the rule breakdown, and the final amount.
//!
//! A [`Trip`] is the untouched caller input. It becomes a
//! [`crate::features::FeatureVector`] only after validation, and every later
//! stage works on that vector. [`RuleBreakdown`] records what each policy
//! layer contributed; [`FinalResult`] is the only value that leaves the
//! pipeline.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::constants::AMOUNT_SCALE;
use crate::error::TripError;

/// Raw trip input. Never mutated; validated by [`crate::features::derive_features`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trip {
    pub days: i64,
    pub miles: Decimal,
    pub receipts: Decimal,
}

impl Trip {
    pub fn new(days: i64, miles: Decimal, receipts: Decimal) -> Self {
        Self {
            days,
            miles,
            receipts,
        }
    }

    /// Parse the three textual command-line values.
    ///
    /// `days` must be an integer; `miles` and `receipts` plain decimals. Sign
    /// checks are left to feature derivation so every rejection reason is
    /// reported the same way.
    pub fn parse(days: &str, miles: &str, receipts: &str) -> Result<Self, TripError> {
        let days = days.parse::<i64>().map_err(|_| TripError::Unparseable {
            field: "days",
            expected: "integer",
            value: days.to_string(),
        })?;
        Ok(Self {
            days,
            miles: parse_decimal("miles", miles)?,
            receipts: parse_decimal("receipts", receipts)?,
        })
    }
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal, TripError> {
    Decimal::from_str(raw).map_err(|_| TripError::Unparseable {
        field,
        expected: "decimal number",
        value: raw.to_string(),
    })
}

/// Named slots of a [`RuleBreakdown`], in policy-layer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Contribution {
    PerDiem,
    Mileage,
    HighMileageBonus,
    LongTripBonus,
    Receipts,
    ReceiptCentsBonus,
    Efficiency,
    FiveDayBonus,
    HighValueBonus,
    SingleDayActivityBonus,
}

pub const CONTRIBUTION_COUNT: usize = 10;

impl Contribution {
    pub const ALL: [Contribution; CONTRIBUTION_COUNT] = [
        Contribution::PerDiem,
        Contribution::Mileage,
        Contribution::HighMileageBonus,
        Contribution::LongTripBonus,
        Contribution::Receipts,
        Contribution::ReceiptCentsBonus,
        Contribution::Efficiency,
        Contribution::FiveDayBonus,
        Contribution::HighValueBonus,
        Contribution::SingleDayActivityBonus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Contribution::PerDiem => "per_diem",
            Contribution::Mileage => "mileage",
            Contribution::HighMileageBonus => "high_mileage_bonus",
            Contribution::LongTripBonus => "long_trip_bonus",
            Contribution::Receipts => "receipts",
            Contribution::ReceiptCentsBonus => "receipt_cents_bonus",
            Contribution::Efficiency => "efficiency",
            Contribution::FiveDayBonus => "five_day_bonus",
            Contribution::HighValueBonus => "high_value_bonus",
            Contribution::SingleDayActivityBonus => "single_day_activity_bonus",
        }
    }

    #[inline(always)]
    fn index(self) -> usize {
        self as usize
    }
}

/// Signed per-layer contributions. Their sum is the base estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RuleBreakdown {
    amounts: [Decimal; CONTRIBUTION_COUNT],
}

impl RuleBreakdown {
    pub fn get(&self, slot: Contribution) -> Decimal {
        self.amounts[slot.index()]
    }

    pub fn set(&mut self, slot: Contribution, amount: Decimal) {
        self.amounts[slot.index()] = amount;
    }

    /// Everything the mileage layer paid, bonuses included. The efficiency
    /// layer scales this.
    pub fn mileage_total(&self) -> Decimal {
        self.get(Contribution::Mileage)
            + self.get(Contribution::HighMileageBonus)
            + self.get(Contribution::LongTripBonus)
    }

    /// Base estimate: the sum of every slot.
    pub fn total(&self) -> Decimal {
        self.amounts.iter().copied().sum()
    }

    /// `(name, amount)` pairs in layer order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, Decimal)> + '_ {
        Contribution::ALL.iter().map(|&c| (c.name(), self.get(c)))
    }
}

impl Serialize for RuleBreakdown {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(CONTRIBUTION_COUNT))?;
        for (name, amount) in self.entries() {
            map.serialize_entry(name, &amount)?;
        }
        map.end()
    }
}

/// Round half away from zero to two fractional digits, then pin the scale so
/// the amount always prints with exactly two digits.
pub fn round_amount(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(AMOUNT_SCALE);
    rounded
}

/// Final reimbursement: a decimal with exactly two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FinalResult(Decimal);

impl FinalResult {
    pub fn from_unrounded(value: Decimal) -> Self {
        Self(round_amount(value))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for FinalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
