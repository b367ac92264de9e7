//! Shared, read-only state handed to every request.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::actions::ActionRegistry;
use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::database::{Database, Executor};
use crate::schema::SchemaRegistry;
use crate::validation::{ParamValidator, ValidationSpec};

pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub validator: ParamValidator,
    pub auth: AuthService,
    pub actions: ActionRegistry,
}

impl AppState {
    /// Wire the service from config, loading the validation spec from
    /// `validation.spec_path` when one is configured.
    pub fn build(config: AppConfig, executor: Arc<dyn Executor>) -> Result<Self> {
        let spec = match &config.validation.spec_path {
            Some(path) => {
                info!("Loading validation spec from {}", path.display());
                ValidationSpec::from_yaml_file(path)?
            }
            None => ValidationSpec::standard(),
        };
        Self::with_spec(config, executor, spec)
    }

    pub fn with_spec(config: AppConfig, executor: Arc<dyn Executor>, spec: ValidationSpec) -> Result<Self> {
        spec.validate()?;

        let db = Database::new(Arc::new(SchemaRegistry::standard()), executor)
            .with_query_logging(config.database.enable_query_logging);
        let auth = AuthService::from_config(db.clone(), &config.security)
            .context("security.jwt_secret must be set (JWT_SECRET)")?;

        Ok(Self {
            validator: ParamValidator::new(Arc::new(spec)),
            actions: ActionRegistry::standard(),
            auth,
            db,
            config,
        })
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.config.api.stage_timeout_ms)
    }
}
