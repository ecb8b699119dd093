use crate::error::PredictError;
use crate::model::classifier::Classifier;
use serde::Serialize;
use std::sync::{Arc, OnceLock};

type LoadOutcome = Result<Arc<dyn Classifier>, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Loading,
    Ready,
    Failed,
}

/// Readiness gate around the process-wide classifier.
///
/// Starts empty; the start-up task publishes either the loaded model or the
/// load failure exactly once. Handlers clone the handle and ask for the
/// classifier per request.
#[derive(Clone, Default)]
pub struct ModelHandle {
    slot: Arc<OnceLock<LoadOutcome>>,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that is ready from the start.
    pub fn ready(model: Arc<dyn Classifier>) -> Self {
        let handle = Self::new();
        handle.publish(Ok(model));
        handle
    }

    /// Stores the load outcome. Returns false if one was already stored.
    pub fn publish(&self, outcome: LoadOutcome) -> bool {
        self.slot.set(outcome).is_ok()
    }

    pub fn status(&self) -> ModelStatus {
        match self.slot.get() {
            None => ModelStatus::Loading,
            Some(Ok(_)) => ModelStatus::Ready,
            Some(Err(_)) => ModelStatus::Failed,
        }
    }

    pub fn get(&self) -> Result<Arc<dyn Classifier>, PredictError> {
        match self.slot.get() {
            None => Err(PredictError::NotReady),
            Some(Ok(model)) => Ok(Arc::clone(model)),
            Some(Err(_)) => Err(PredictError::ModelUnavailable),
        }
    }
}
