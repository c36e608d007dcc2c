//! Batch evaluation against labelled historical cases.
//!
//! Cases use the legacy export layout:
//!
//! ```json
//! [{"input": {"trip_duration_days": 3, "miles_traveled": 93,
//!             "total_receipts_amount": 1.42},
//!   "expected_output": 364.51}]
//! ```
//!
//! Numbers are read through their JSON text so `1.42` becomes exactly
//! `1.42`, never the nearest binary float.

use std::str::FromStr;

use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TripError};
use crate::pipeline::calculate_reimbursement;
use crate::storage::ModelState;
use crate::types::{FinalResult, Trip};

/// Within a cent of the expected amount.
pub const EXACT_TOLERANCE: Decimal = dec!(0.01);
/// Within a dollar of the expected amount.
pub const CLOSE_TOLERANCE: Decimal = dec!(1.00);

/// Evaluate many trips in parallel. Output order matches input order.
pub fn evaluate_batch(trips: &[Trip], model: &ModelState) -> Vec<Result<FinalResult>> {
    trips
        .par_iter()
        .map(|trip| calculate_reimbursement(trip, model))
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaseInput {
    pub trip_duration_days: serde_json::Number,
    pub miles_traveled: serde_json::Number,
    pub total_receipts_amount: serde_json::Number,
}

/// One labelled historical case.
#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    pub input: CaseInput,
    pub expected_output: serde_json::Number,
}

impl TestCase {
    pub fn trip(&self) -> std::result::Result<Trip, TripError> {
        let days_raw = &self.input.trip_duration_days;
        let days = days_raw.as_i64().ok_or_else(|| TripError::Unparseable {
            field: "trip_duration_days",
            expected: "integer",
            value: days_raw.to_string(),
        })?;
        Ok(Trip::new(
            days,
            number_to_decimal("miles_traveled", &self.input.miles_traveled)?,
            number_to_decimal("total_receipts_amount", &self.input.total_receipts_amount)?,
        ))
    }

    pub fn expected(&self) -> std::result::Result<Decimal, TripError> {
        number_to_decimal("expected_output", &self.expected_output)
    }
}

fn number_to_decimal(
    field: &'static str,
    n: &serde_json::Number,
) -> std::result::Result<Decimal, TripError> {
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| TripError::Unparseable {
            field,
            expected: "decimal number",
            value: text,
        })
}

/// Parse a JSON array of cases.
pub fn parse_cases(json: &str) -> serde_json::Result<Vec<TestCase>> {
    serde_json::from_str(json)
}

/// One scored case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub index: usize,
    pub trip: Trip,
    pub expected: Decimal,
    pub actual: FinalResult,
    pub error: Decimal,
}

/// Accuracy over a labelled set.
#[derive(Debug, Clone, Serialize)]
pub struct AccuracySummary {
    pub total: usize,
    pub scored: usize,
    pub exact: usize,
    pub close: usize,
    pub rejected: usize,
    pub average_error: Decimal,
    pub max_error: Decimal,
    /// Largest errors first.
    pub worst: Vec<CaseReport>,
}

impl AccuracySummary {
    pub fn exact_ratio(&self) -> f64 {
        ratio(self.exact, self.scored)
    }

    pub fn close_ratio(&self) -> f64 {
        ratio(self.close, self.scored)
    }
}

fn ratio(n: usize, d: usize) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}

/// Score every case and keep the `top` worst.
///
/// Cases whose input is rejected are counted but not scored.
pub fn score_cases(cases: &[TestCase], model: &ModelState, top: usize) -> AccuracySummary {
    let outcomes: Vec<Option<CaseReport>> = cases
        .par_iter()
        .enumerate()
        .map(|(index, case)| {
            let trip = case.trip().ok()?;
            let expected = case.expected().ok()?;
            let actual = calculate_reimbursement(&trip, model).ok()?;
            Some(CaseReport {
                index,
                trip,
                expected,
                actual,
                error: (actual.amount() - expected).abs(),
            })
        })
        .collect();

    let rejected = outcomes.iter().filter(|o| o.is_none()).count();
    let mut reports: Vec<CaseReport> = outcomes.into_iter().flatten().collect();

    let scored = reports.len();
    let exact = reports.iter().filter(|r| r.error <= EXACT_TOLERANCE).count();
    let close = reports.iter().filter(|r| r.error <= CLOSE_TOLERANCE).count();
    let error_sum: Decimal = reports.iter().map(|r| r.error).sum();
    let average_error = if scored == 0 {
        Decimal::ZERO
    } else {
        crate::types::round_amount(error_sum / Decimal::from(scored))
    };
    let max_error = reports
        .iter()
        .map(|r| r.error)
        .max()
        .unwrap_or(Decimal::ZERO);

    // Stable sort keeps input order among ties.
    reports.sort_by(|a, b| b.error.cmp(&a.error));
    reports.truncate(top);

    AccuracySummary {
        total: cases.len(),
        scored,
        exact,
        close,
        rejected,
        average_error,
        max_error,
        worst: reports,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CASES: &str = r#"[
        {"input": {"trip_duration_days": 5, "miles_traveled": 800, "total_receipts_amount": 600},
         "expected_output": 1196.00},
        {"input": {"trip_duration_days": 1, "miles_traveled": 100, "total_receipts_amount": 0},
         "expected_output": 180.00},
        {"input": {"trip_duration_days": 0, "miles_traveled": 10, "total_receipts_amount": 1.42},
         "expected_output": 10.0},
        {"input": {"trip_duration_days": 2.5, "miles_traveled": 10, "total_receipts_amount": 1},
         "expected_output": 10.0}
    ]"#;

    #[test]
    fn batch_preserves_order_and_errors() {
        let trips = [
            Trip::new(5, dec!(800), dec!(600)),
            Trip::new(0, dec!(1), dec!(1)),
            Trip::new(1, dec!(100), dec!(0)),
        ];
        let results = evaluate_batch(&trips, &ModelState::unavailable("test"));
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().to_string(), "1196.00");
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn case_numbers_keep_their_decimal_text() {
        let cases = parse_cases(CASES).unwrap();
        let trip = cases[2].trip().unwrap();
        assert_eq!(trip.receipts, dec!(1.42));
        assert_eq!(cases[0].expected().unwrap(), dec!(1196));
        assert!(cases[3].trip().is_err());
    }

    #[test]
    fn summary_counts_exact_close_and_rejected() {
        let cases = parse_cases(CASES).unwrap();
        // 1 day, 100 mi: 120 per diem + 58 mileage = 178.00, two dollars short
        let summary = score_cases(&cases, &ModelState::unavailable("test"), 5);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.rejected, 2);
        assert_eq!(summary.scored, 2);
        assert_eq!(summary.exact, 1);
        assert_eq!(summary.close, 1);
        assert_eq!(summary.max_error, dec!(2.00));
        assert_eq!(summary.worst.len(), 2);
        assert_eq!(summary.worst[0].index, 1);
        assert_eq!(summary.exact_ratio(), 0.5);
    }

    #[test]
    fn top_limits_worst_cases() {
        let cases = parse_cases(CASES).unwrap();
        let summary = score_cases(&cases, &ModelState::unavailable("test"), 1);
        assert_eq!(summary.worst.len(), 1);
        assert_eq!(score_cases(&[], &ModelState::unavailable("test"), 3).average_error, dec!(0));
    }
}
