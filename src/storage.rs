//! Residual model artifact loading and the cached model state.
//!
//! Loading is a scoped acquisition: open, parse, validate, and drop the file
//! handle before returning. Any failure yields [`ModelState::Unavailable`],
//! which the pipeline treats as "no correction available" rather than an
//! error. [`shared_model`] performs that load at most once per process.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;

use crate::ensemble::{EnsembleModel, ModelArtifact};
use crate::env_config;
use crate::error::ModelError;
use crate::features::FeatureVector;

/// Loaded residual model, or the recorded reason it is missing.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelState {
    Ready(EnsembleModel),
    Unavailable { reason: String },
}

impl ModelState {
    /// Load an artifact, degrading to `Unavailable` on any failure.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match load_model(path) {
            Ok(model) => Self::Ready(model),
            Err(e) => {
                log::warn!("residual model unavailable, using rule estimate only: {}", e);
                Self::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn model(&self) -> Option<&EnsembleModel> {
        match self {
            Self::Ready(model) => Some(model),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Raw residual, or a neutral zero without a model.
    pub fn residual(&self, features: &FeatureVector) -> f64 {
        match self {
            Self::Ready(model) => model.predict(features),
            Self::Unavailable { .. } => 0.0,
        }
    }
}

impl From<EnsembleModel> for ModelState {
    fn from(model: EnsembleModel) -> Self {
        Self::Ready(model)
    }
}

/// Read, parse, and validate a model artifact.
pub fn load_model(path: &Path) -> Result<EnsembleModel, ModelError> {
    let start_time = Instant::now();
    log::debug!("loading residual model from {}", path.display());

    let artifact: ModelArtifact = {
        let file = File::open(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file))?
    };
    let model = EnsembleModel::from_artifact(artifact)?;

    log::info!(
        "loaded residual model from {}: {} trees over {} features in {:.2} ms",
        path.display(),
        model.tree_count(),
        model.features().len(),
        start_time.elapsed().as_secs_f64() * 1000.0
    );
    Ok(model)
}

static SHARED_MODEL: OnceLock<ModelState> = OnceLock::new();

/// Process-wide model loaded from [`env_config::model_path`] on first use.
/// A failed load is cached too, so later calls skip straight to the
/// degraded path.
pub fn shared_model() -> &'static ModelState {
    SHARED_MODEL.get_or_init(|| ModelState::load(env_config::model_path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::derive_features;
    use crate::types::Trip;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const TINY_MODEL: &str = r#"{
        "features": ["miles_traveled"],
        "bias": 2.0,
        "learning_rate": 0.5,
        "trees": [{"leaf": {"value": 4.0}}]
    }"#;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_valid_artifact() {
        let file = write_temp(TINY_MODEL);
        let state = ModelState::load(file.path());
        assert!(state.is_ready());
        let f = derive_features(&Trip::new(1, dec!(10), dec!(10))).unwrap();
        assert_eq!(state.residual(&f), 4.0);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let state = ModelState::load(dir.path().join("absent.json"));
        assert!(!state.is_ready());
        let f = derive_features(&Trip::new(3, dec!(10), dec!(10))).unwrap();
        assert_eq!(state.residual(&f), 0.0);
    }

    #[test]
    fn corrupt_file_is_unavailable() {
        for bad in ["", "{not json", r#"{"features": ["miles_traveled"]}"#] {
            let file = write_temp(bad);
            match ModelState::load(file.path()) {
                ModelState::Unavailable { reason } => assert!(!reason.is_empty()),
                ModelState::Ready(_) => panic!("loaded corrupt artifact {bad:?}"),
            }
        }
    }

    #[test]
    fn load_model_reports_io_errors_with_path() {
        let err = load_model(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
