//! # Reimburse — legacy travel reimbursement estimator
//!
//! Reproduces the amounts of a retired reimbursement system from three trip
//! inputs: duration in days, miles traveled, and total receipts.
//!
//! ## Pipeline
//!
//! | Stage | Rust module | Description |
//! |-------|-------------|-------------|
//! | 1 | [`features`] | Validate the trip, derive per-day rates. The only place input is rejected |
//! | 2 | [`rules`] | Ordered policy table: per-diem, mileage, receipts, efficiency, special bonuses. Sum is the base estimate |
//! | 3 | [`ensemble`] + [`storage`] | Optional gradient-boosted tree ensemble predicting the residual the rules miss |
//! | 4 | [`correction`] | Shrink the residual, clip it to a trip-dependent cap |
//! | 5 | [`pipeline`] | Base + adjustment, rounded once, half away from zero, to cents |
//!
//! All money is [`rust_decimal::Decimal`]. Only the ensemble works in `f64`,
//! and its output is converted back before the bounder sees it.
//!
//! ## Degraded mode
//!
//! A missing or malformed model artifact is not an error. The model state is
//! recorded as unavailable, the residual is zero, and every result is the
//! rounded rule estimate.
//!
//! ## Configuration
//!
//! - `REIMBURSE_MODEL_PATH`: artifact location (default `data/residual_model.json`)
//! - `RAYON_NUM_THREADS`: batch evaluation threads (default 8)
//! - `RUST_LOG`: log filter (default `warn`, output on stderr)

pub mod batch;
pub mod constants;
pub mod correction;
pub mod ensemble;
pub mod env_config;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod rules;
pub mod storage;
pub mod types;

pub use error::{ModelError, ReimburseError, Result, TripError};
pub use pipeline::{calculate_reimbursement, estimate, Estimate};
pub use storage::{shared_model, ModelState};
pub use types::{FinalResult, Trip};
