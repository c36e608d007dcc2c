//! Shrink-then-clip post-processing of the model residual.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::constants::*;
use crate::error::TripError;
use crate::features::FeatureVector;

/// Symmetric clip bound for a trip: 400, plus up to 150 for trip length and
/// up to 150 for distance.
pub fn complexity_cap(features: &FeatureVector) -> Decimal {
    let by_days = CAP_STEPS_BY_DAYS
        .iter()
        .filter(|(min_days, _)| features.days >= *min_days)
        .map(|&(_, extra)| extra)
        .max()
        .unwrap_or(Decimal::ZERO);
    let by_miles = CAP_STEPS_BY_MILES
        .iter()
        .filter(|(min_miles, _)| features.miles >= *min_miles)
        .map(|&(_, extra)| extra)
        .max()
        .unwrap_or(Decimal::ZERO);
    BASE_CORRECTION_CAP + by_days + by_miles
}

/// Shrink factor for a residual of this size.
pub fn shrink_factor(raw: Decimal) -> Decimal {
    if raw.abs() > LARGE_CORRECTION_THRESHOLD {
        LARGE_CORRECTION_SHRINK
    } else {
        SMALL_CORRECTION_SHRINK
    }
}

/// Shrink, then clamp to `[-cap, +cap]`.
pub fn bound_correction(raw: Decimal, features: &FeatureVector) -> Decimal {
    let cap = complexity_cap(features);
    (raw * shrink_factor(raw)).clamp(-cap, cap)
}

/// Raw residuals are saturated to this magnitude before conversion. Any value
/// this large clips to the cap whatever the shrink factor, so saturation never
/// changes the bounded adjustment.
pub const RESIDUAL_SATURATION: f64 = 1e9;

/// Residuals smaller than this are far below a cent and convert to zero.
pub const RESIDUAL_RESOLUTION: f64 = 1e-12;

/// Convert the model's float residual into a decimal.
///
/// Finite residuals always convert: a huge but finite model output saturates
/// and is clipped downstream. Only NaN or infinity is rejected.
pub fn residual_to_decimal(raw: f64) -> Result<Decimal, TripError> {
    if !raw.is_finite() {
        return Err(TripError::NonFinite("model residual"));
    }
    if raw.abs() < RESIDUAL_RESOLUTION {
        return Ok(Decimal::ZERO);
    }
    let saturated = raw.clamp(-RESIDUAL_SATURATION, RESIDUAL_SATURATION);
    Decimal::from_f64(saturated).ok_or(TripError::NonFinite("model residual"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::derive_features;
    use crate::types::Trip;
    use rust_decimal_macros::dec;

    fn features(days: i64, miles: Decimal) -> FeatureVector {
        derive_features(&Trip::new(days, miles, dec!(0))).unwrap()
    }

    #[test]
    fn cap_grows_with_complexity() {
        assert_eq!(complexity_cap(&features(1, dec!(50))), dec!(400));
        assert_eq!(complexity_cap(&features(3, dec!(299.99))), dec!(400));
        assert_eq!(complexity_cap(&features(4, dec!(0))), dec!(475));
        assert_eq!(complexity_cap(&features(1, dec!(300))), dec!(475));
        assert_eq!(complexity_cap(&features(5, dec!(800))), dec!(625));
        assert_eq!(complexity_cap(&features(8, dec!(300))), dec!(625));
        assert_eq!(complexity_cap(&features(14, dec!(2000))), dec!(700));
    }

    #[test]
    fn small_residuals_shrink_mildly() {
        let f = features(1, dec!(10));
        assert_eq!(bound_correction(dec!(100), &f), dec!(95));
        assert_eq!(bound_correction(dec!(-40), &f), dec!(-38));
        assert_eq!(bound_correction(dec!(0), &f), dec!(0));
    }

    #[test]
    fn large_residuals_shrink_harder() {
        let f = features(1, dec!(10));
        assert_eq!(bound_correction(dec!(200), &f), dec!(170));
        assert_eq!(bound_correction(dec!(-100.01), &f), dec!(-85.0085));
    }

    #[test]
    fn clip_is_symmetric() {
        let f = features(1, dec!(10));
        assert_eq!(bound_correction(dec!(10000), &f), dec!(400));
        assert_eq!(bound_correction(dec!(-10000), &f), dec!(-400));
        let long = features(10, dec!(1500));
        assert_eq!(bound_correction(dec!(900), &long), dec!(700));
        assert_eq!(bound_correction(dec!(-900), &long), dec!(-700));
    }

    #[test]
    fn non_finite_residuals_are_rejected() {
        assert!(residual_to_decimal(f64::NAN).is_err());
        assert!(residual_to_decimal(f64::INFINITY).is_err());
        assert!(residual_to_decimal(f64::NEG_INFINITY).is_err());
        assert_eq!(residual_to_decimal(50.5).unwrap(), dec!(50.5));
    }

    #[test]
    fn tiny_residuals_convert_to_zero() {
        assert_eq!(residual_to_decimal(1e-300).unwrap(), Decimal::ZERO);
        assert_eq!(residual_to_decimal(-f64::MIN_POSITIVE).unwrap(), Decimal::ZERO);
        assert_eq!(residual_to_decimal(0.0).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn huge_finite_residuals_saturate_then_clip() {
        let f = features(5, dec!(800));
        for raw in [1e30, 1e300, f64::MAX] {
            let d = residual_to_decimal(raw).unwrap();
            assert_eq!(bound_correction(d, &f), dec!(625));
            let d = residual_to_decimal(-raw).unwrap();
            assert_eq!(bound_correction(d, &f), dec!(-625));
        }
    }

    #[test]
    fn saturation_always_clips_to_the_largest_cap() {
        let largest_cap = BASE_CORRECTION_CAP
            + CAP_STEPS_BY_DAYS[CAP_STEPS_BY_DAYS.len() - 1].1
            + CAP_STEPS_BY_MILES[CAP_STEPS_BY_MILES.len() - 1].1;
        let smallest_shrink = LARGE_CORRECTION_SHRINK.min(SMALL_CORRECTION_SHRINK);
        let saturated = residual_to_decimal(RESIDUAL_SATURATION).unwrap();
        assert!(saturated * smallest_shrink > largest_cap);
    }
}
