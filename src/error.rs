//! Error taxonomy.
//!
//! Only [`ReimburseError`] ever reaches a caller. [`ModelError`] is recovered
//! inside [`crate::storage`]: a model that fails to load is cached as
//! unavailable and the pipeline continues with a zero residual.

use std::path::PathBuf;

use rust_decimal::Decimal;

/// Why a trip was rejected before any computation ran.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TripError {
    #[error("trip duration must be at least 1 day, got {0}")]
    NonPositiveDays(i64),

    #[error("miles traveled must not be negative, got {0}")]
    NegativeMiles(Decimal),

    #[error("receipt total must not be negative, got {0}")]
    NegativeReceipts(Decimal),

    #[error("{field} is not a valid {expected}: {value:?}")]
    Unparseable {
        field: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{field} is outside the supported range: {value}")]
    OutOfRange { field: &'static str, value: String },

    #[error("non-finite intermediate in {0}")]
    NonFinite(&'static str),
}

/// Crate-level error surfaced by every public computation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReimburseError {
    #[error("invalid trip: {0}")]
    InvalidTrip(#[from] TripError),
}

/// Why a residual model artifact could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("cannot read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model artifact lists no features")]
    NoFeatures,

    #[error("model has no boosters")]
    NoBoosters,

    #[error("unknown model feature {0:?}")]
    UnknownFeature(String),

    #[error("non-finite {0} in model artifact")]
    NonFiniteScalar(&'static str),

    #[error("tree {tree} has no nodes")]
    EmptyTree { tree: usize },

    #[error("tree {tree} node {node}: feature index {feature} out of range (model has {count} features)")]
    FeatureOutOfRange {
        tree: usize,
        node: usize,
        feature: i64,
        count: usize,
    },

    #[error("tree {tree} node {node}: child {child} does not exist")]
    DanglingChild { tree: usize, node: usize, child: i64 },

    #[error("tree {tree} node {node}: child {child} does not come after its parent")]
    BackwardChild { tree: usize, node: usize, child: i64 },

    #[error("tree {tree} node {node}: exactly one child is missing")]
    HalfLeaf { tree: usize, node: usize },

    #[error("tree {tree} node {node}: non-finite {what}")]
    NonFiniteNode {
        tree: usize,
        node: usize,
        what: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, ReimburseError>;
