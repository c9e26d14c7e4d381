//! Arena of loaded models and their lazily built static tables.
//!
//! Models are inserted while loading and addressed by [`ModelHandle`]
//! afterwards. The tables of a model are built on first request; when two
//! threads race the first inserted table wins and every caller observes it.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::model::GeneralRegressionModel;
use crate::regression::RegressionTables;
use crate::{EvalResult, ModelError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelHandle(usize);

impl ModelHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct ModelArena {
    models: Vec<Arc<GeneralRegressionModel>>,
    tables: DashMap<ModelHandle, Arc<RegressionTables>>,
}

impl ModelArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: GeneralRegressionModel) -> ModelHandle {
        let handle = ModelHandle(self.models.len());
        self.models.push(Arc::new(model));
        handle
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn model(&self, handle: ModelHandle) -> EvalResult<Arc<GeneralRegressionModel>> {
        self.models
            .get(handle.0)
            .cloned()
            .ok_or_else(|| unknown_handle(handle).into())
    }

    /// Compute-or-fetch of the model's static tables.
    pub fn tables(&self, handle: ModelHandle) -> EvalResult<Arc<RegressionTables>> {
        if let Some(tables) = self.tables.get(&handle) {
            return Ok(tables.value().clone());
        }
        let model = self.model(handle)?;
        let built = Arc::new(RegressionTables::build(&model)?);
        debug!("Cached regression tables for model {}", handle.0);
        Ok(self.tables.entry(handle).or_insert(built).value().clone())
    }

    pub fn is_cached(&self, handle: ModelHandle) -> bool {
        self.tables.contains_key(&handle)
    }
}

fn unknown_handle(handle: ModelHandle) -> ModelError {
    ModelError::UnknownReference {
        element: "ModelArena",
        kind: "model handle",
        name: handle.0.to_string(),
    }
}
