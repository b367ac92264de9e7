//! Business actions reachable over HTTP once auth and validation pass.
//!
//! Handlers are registered by name and resolved once when the router is
//! built; an endpoint naming an unregistered action fails startup.

mod test_calls;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::baton::{Baton, StageResult};
use crate::database::Database;
use crate::validation::ValidatedParams;

pub use test_calls::{TestGetCall, TestPostCall, TEST_DATA_ID_LENGTH};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("Unknown action: {0}")]
    Unknown(String),

    #[error("Action registered twice: {0}")]
    Duplicate(String),
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs after auth and validation; writes the success payload through
    /// the baton or returns the [`crate::baton::Halt`] of a recorded failure.
    async fn run(&self, db: &Database, baton: &mut Baton, params: &ValidatedParams) -> StageResult<()>;
}

#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<&'static str, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, handler: Arc<dyn ActionHandler>) -> Result<Self, ActionError> {
        let name = handler.name();
        if self.handlers.insert(name, handler).is_some() {
            return Err(ActionError::Duplicate(name.to_string()));
        }
        Ok(self)
    }

    pub fn standard() -> Self {
        let handlers: [Arc<dyn ActionHandler>; 2] = [Arc::new(TestGetCall), Arc::new(TestPostCall)];
        Self {
            handlers: handlers.into_iter().map(|h| (h.name(), h)).collect(),
        }
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ActionHandler>, ActionError> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| ActionError::Unknown(name.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort();
        names
    }
}
