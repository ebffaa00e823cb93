//! Lazily initialized shared predictor
//!
//! Request layers hold one [`SharedPredictor`]. The first caller triggers the
//! model load on the blocking thread pool; concurrent callers wait for that
//! same load and every caller sees its outcome, including the unavailable state.

use crate::{config::PredictorConfig, inference::BackendFactory, processor::Predictor};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// One-shot lazy holder for a [`Predictor`]
pub struct SharedPredictor {
    config: PredictorConfig,
    factory: Arc<dyn BackendFactory>,
    cell: OnceCell<Arc<Predictor>>,
}

impl SharedPredictor {
    #[must_use]
    pub fn new(config: PredictorConfig, factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            config,
            factory,
            cell: OnceCell::new(),
        }
    }

    /// Return the predictor, loading it on first use
    pub async fn get(&self) -> Arc<Predictor> {
        self.cell
            .get_or_init(|| async {
                let config = self.config.clone();
                let factory = Arc::clone(&self.factory);
                info!("Initializing shared predictor");

                match tokio::task::spawn_blocking({
                    let config = config.clone();
                    move || Predictor::load(config, factory.as_ref())
                })
                .await
                {
                    Ok(predictor) => Arc::new(predictor),
                    Err(e) => {
                        error!(error = %e, "Predictor initialization task failed");
                        Arc::new(Predictor::unavailable(
                            config,
                            format!("Predictor initialization task failed: {e}"),
                        ))
                    },
                }
            })
            .await
            .clone()
    }

    /// The predictor if initialization has already completed
    #[must_use]
    pub fn get_if_initialized(&self) -> Option<Arc<Predictor>> {
        self.cell.get().cloned()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl std::fmt::Debug for SharedPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPredictor")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{uniform, MockBackendFactory};

    #[tokio::test]
    async fn test_unavailable_outcome_is_shared() {
        let dir = tempfile::tempdir().unwrap();
        let config = PredictorConfig::builder()
            .primary_model(dir.path().join("missing.onnx"))
            .fallback_model(None::<std::path::PathBuf>)
            .labels(dir.path().join("missing.txt"))
            .build()
            .unwrap();

        let shared = SharedPredictor::new(config, Arc::new(MockBackendFactory::new(uniform(2))));
        assert!(shared.get_if_initialized().is_none());

        let first = shared.get().await;
        let second = shared.get().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!first.is_available());
        assert!(shared.is_initialized());
    }
}
