//! Feature derivation shared by the rule engine and the residual model.
//!
//! [`derive_features`] is the single validation gate of the pipeline: once a
//! [`FeatureVector`] exists, `days >= 1` and both amounts are non-negative and
//! bounded, so no later stage needs to re-check or can divide by zero.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::constants::{MAX_INPUT_AMOUNT, MAX_TRIP_DAYS};
use crate::error::TripError;
use crate::types::Trip;

/// Validated trip plus per-day rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    pub days: i64,
    pub miles: Decimal,
    pub receipts: Decimal,
    pub miles_per_day: Decimal,
    pub receipts_per_day: Decimal,
    /// Float copies of the amounts, converted once at the validation gate.
    #[serde(skip)]
    miles_f64: f64,
    #[serde(skip)]
    receipts_f64: f64,
}

/// Features a residual model may reference by name.
///
/// The first five are the base feature set. The rest were emitted by the
/// enhanced trainer and are still accepted in artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModelFeature {
    #[serde(rename = "trip_duration_days")]
    Days,
    #[serde(rename = "miles_traveled")]
    Miles,
    #[serde(rename = "total_receipts_amount")]
    Receipts,
    #[serde(rename = "miles_per_day")]
    MilesPerDay,
    #[serde(rename = "receipts_per_day")]
    ReceiptsPerDay,
    #[serde(rename = "log_receipts")]
    LogReceipts,
    #[serde(rename = "log_miles")]
    LogMiles,
    #[serde(rename = "is_one_day_big")]
    OneDayBig,
    #[serde(rename = "is_long_hi_eff")]
    LongHighEfficiency,
}

impl ModelFeature {
    /// Parse an artifact feature name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "trip_duration_days" => Self::Days,
            "miles_traveled" => Self::Miles,
            "total_receipts_amount" => Self::Receipts,
            "miles_per_day" => Self::MilesPerDay,
            "receipts_per_day" => Self::ReceiptsPerDay,
            "log_receipts" => Self::LogReceipts,
            "log_miles" => Self::LogMiles,
            "is_one_day_big" => Self::OneDayBig,
            "is_long_hi_eff" => Self::LongHighEfficiency,
            _ => return None,
        })
    }
}

/// Validate a trip and derive its features.
pub fn derive_features(trip: &Trip) -> Result<FeatureVector, TripError> {
    if trip.days < 1 {
        return Err(TripError::NonPositiveDays(trip.days));
    }
    if trip.days > MAX_TRIP_DAYS {
        return Err(TripError::OutOfRange {
            field: "days",
            value: trip.days.to_string(),
        });
    }
    if trip.miles < Decimal::ZERO {
        return Err(TripError::NegativeMiles(trip.miles));
    }
    if trip.receipts < Decimal::ZERO {
        return Err(TripError::NegativeReceipts(trip.receipts));
    }
    if trip.miles > MAX_INPUT_AMOUNT {
        return Err(TripError::OutOfRange {
            field: "miles",
            value: trip.miles.to_string(),
        });
    }
    if trip.receipts > MAX_INPUT_AMOUNT {
        return Err(TripError::OutOfRange {
            field: "receipts",
            value: trip.receipts.to_string(),
        });
    }

    let days = Decimal::from(trip.days);
    let miles_per_day = trip
        .miles
        .checked_div(days)
        .ok_or(TripError::NonFinite("miles per day"))?;
    let receipts_per_day = trip
        .receipts
        .checked_div(days)
        .ok_or(TripError::NonFinite("receipts per day"))?;

    Ok(FeatureVector {
        days: trip.days,
        miles: trip.miles,
        receipts: trip.receipts,
        miles_per_day,
        receipts_per_day,
        miles_f64: to_f64("miles", trip.miles)?,
        receipts_f64: to_f64("receipts", trip.receipts)?,
    })
}

impl FeatureVector {
    /// Float value of a model feature.
    ///
    /// Per-day rates are divided in floating point from the float amounts,
    /// matching how the model's training rows were built.
    pub fn model_value(&self, feature: ModelFeature) -> f64 {
        let days = self.days as f64;
        let miles = self.miles_f64;
        let receipts = self.receipts_f64;
        match feature {
            ModelFeature::Days => days,
            ModelFeature::Miles => miles,
            ModelFeature::Receipts => receipts,
            ModelFeature::MilesPerDay => miles / days,
            ModelFeature::ReceiptsPerDay => receipts / days,
            ModelFeature::LogReceipts => receipts.ln_1p(),
            ModelFeature::LogMiles => miles.ln_1p(),
            ModelFeature::OneDayBig => flag(self.days == 1 && receipts > 1000.0),
            ModelFeature::LongHighEfficiency => flag(self.days >= 7 && miles / days > 150.0),
        }
    }

    /// Model input row in the artifact's feature order.
    pub fn model_inputs(&self, layout: &[ModelFeature]) -> Vec<f64> {
        layout.iter().map(|&f| self.model_value(f)).collect()
    }
}

#[inline]
fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn to_f64(field: &'static str, d: Decimal) -> Result<f64, TripError> {
    d.to_f64()
        .filter(|v| v.is_finite())
        .ok_or(TripError::NonFinite(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trip(days: i64, miles: Decimal, receipts: Decimal) -> Trip {
        Trip::new(days, miles, receipts)
    }

    #[test]
    fn derives_per_day_rates() {
        let f = derive_features(&trip(4, dec!(800), dec!(600))).unwrap();
        assert_eq!(f.miles_per_day, dec!(200));
        assert_eq!(f.receipts_per_day, dec!(150));
    }

    #[test]
    fn rejects_zero_and_negative_days() {
        assert_eq!(
            derive_features(&trip(0, dec!(10), dec!(10))),
            Err(TripError::NonPositiveDays(0))
        );
        assert_eq!(
            derive_features(&trip(-2, dec!(10), dec!(10))),
            Err(TripError::NonPositiveDays(-2))
        );
    }

    #[test]
    fn rejects_negative_amounts() {
        assert_eq!(
            derive_features(&trip(1, dec!(-0.01), dec!(10))),
            Err(TripError::NegativeMiles(dec!(-0.01)))
        );
        assert_eq!(
            derive_features(&trip(1, dec!(10), dec!(-5))),
            Err(TripError::NegativeReceipts(dec!(-5)))
        );
    }

    #[test]
    fn zero_amounts_are_valid() {
        let f = derive_features(&trip(1, dec!(0), dec!(0))).unwrap();
        assert_eq!(f.miles_per_day, Decimal::ZERO);
    }

    #[test]
    fn rejects_amounts_beyond_supported_range() {
        let huge = MAX_INPUT_AMOUNT + dec!(1);
        assert!(matches!(
            derive_features(&trip(1, huge, dec!(0))),
            Err(TripError::OutOfRange { field: "miles", .. })
        ));
        assert!(matches!(
            derive_features(&trip(MAX_TRIP_DAYS + 1, dec!(0), dec!(0))),
            Err(TripError::OutOfRange { field: "days", .. })
        ));
    }

    #[test]
    fn model_values_follow_training_definitions() {
        let f = derive_features(&trip(1, dec!(120), dec!(1200))).unwrap();
        assert_eq!(f.model_value(ModelFeature::Days), 1.0);
        assert_eq!(f.model_value(ModelFeature::MilesPerDay), 120.0);
        assert_eq!(f.model_value(ModelFeature::OneDayBig), 1.0);
        assert_eq!(f.model_value(ModelFeature::LongHighEfficiency), 0.0);
        assert!((f.model_value(ModelFeature::LogMiles) - 121f64.ln()).abs() < 1e-12);

        let long = derive_features(&trip(8, dec!(1600), dec!(100))).unwrap();
        assert_eq!(long.model_value(ModelFeature::LongHighEfficiency), 1.0);
    }

    #[test]
    fn float_copies_match_decimal_amounts() {
        let f = derive_features(&trip(3, dec!(93.5), dec!(1.42))).unwrap();
        assert_eq!(f.model_value(ModelFeature::Miles), 93.5);
        assert_eq!(f.model_value(ModelFeature::Receipts), 1.42);
        let max = derive_features(&trip(1, MAX_INPUT_AMOUNT, MAX_INPUT_AMOUNT)).unwrap();
        assert_eq!(max.model_value(ModelFeature::Miles), 1e15);
        assert_eq!(to_f64("miles", dec!(12.25)), Ok(12.25));
    }

    #[test]
    fn model_inputs_follow_layout_order() {
        let f = derive_features(&trip(2, dec!(300), dec!(50))).unwrap();
        let row = f.model_inputs(&[ModelFeature::Receipts, ModelFeature::Days]);
        assert_eq!(row, vec![50.0, 2.0]);
    }

    #[test]
    fn unknown_feature_names_are_rejected() {
        assert_eq!(
            ModelFeature::from_name("receipts_per_day"),
            Some(ModelFeature::ReceiptsPerDay)
        );
        assert_eq!(ModelFeature::from_name("altitude"), None);
    }
}
