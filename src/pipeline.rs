//! End-to-end estimate: validate, apply rules, correct, round.
//!
//! The model residual is only an adjustment on top of the rule estimate. With
//! no model loaded the residual is zero and the result is the rounded base.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::correction::{bound_correction, complexity_cap, residual_to_decimal};
use crate::error::{Result, TripError};
use crate::features::derive_features;
use crate::rules::apply_rules;
use crate::storage::ModelState;
use crate::types::{FinalResult, RuleBreakdown, Trip};

/// Every intermediate of one calculation, for `--explain` and batch reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub breakdown: RuleBreakdown,
    pub base: Decimal,
    /// Model output, saturated at `±RESIDUAL_SATURATION`.
    pub raw_residual: Decimal,
    pub cap: Decimal,
    pub adjustment: Decimal,
    pub amount: FinalResult,
}

/// Run the full pipeline and keep the intermediates.
pub fn estimate(trip: &Trip, model: &ModelState) -> Result<Estimate> {
    let features = derive_features(trip)?;
    let breakdown = apply_rules(&features);
    let base = breakdown.total();

    let raw_residual = residual_to_decimal(model.residual(&features))?;
    let cap = complexity_cap(&features);
    let adjustment = bound_correction(raw_residual, &features);
    let unrounded = base
        .checked_add(adjustment)
        .ok_or(TripError::NonFinite("final amount"))?;
    let amount = FinalResult::from_unrounded(unrounded);

    log::debug!(
        "trip {}d/{}mi/${}: base {} residual {} (cap {}) adjustment {} -> {}",
        trip.days,
        trip.miles,
        trip.receipts,
        base,
        raw_residual,
        cap,
        adjustment,
        amount
    );

    Ok(Estimate {
        breakdown,
        base,
        raw_residual,
        cap,
        adjustment,
        amount,
    })
}

/// Reimbursement for one trip, rounded half away from zero to cents.
pub fn calculate_reimbursement(trip: &Trip, model: &ModelState) -> Result<FinalResult> {
    estimate(trip, model).map(|e| e.amount)
}
