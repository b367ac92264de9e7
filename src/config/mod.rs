use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Signing secret of the development profile. Only usable with the in-memory store.
pub const DEV_JWT_SECRET: &str = "development-only-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set when DATABASE_URL is configured")]
    DevelopmentSecret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// MySQL connection string. When absent outside production the in-memory store is used.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    /// Deadline applied to every pipeline stage (auth, validation, action).
    pub stage_timeout_ms: u64,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Honour the `test_mode` request header and skip identity resolution.
    /// Off in every profile; only `SECURITY_ALLOW_TEST_MODE=true` turns it on,
    /// and never in production.
    pub allow_test_mode: bool,
    pub password_min_length: usize,
    pub enable_audit_logging: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// YAML file replacing the built-in action validation spec.
    pub spec_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // API overrides
        if let Ok(v) = env::var("PORT") {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_STAGE_TIMEOUT_MS") {
            self.api.stage_timeout_ms = v.parse().unwrap_or(self.api.stage_timeout_ms);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ALLOW_TEST_MODE") {
            self.security.allow_test_mode = v.parse().unwrap_or(self.security.allow_test_mode);
        }
        if let Ok(v) = env::var("SECURITY_PASSWORD_MIN_LENGTH") {
            self.security.password_min_length = v.parse().unwrap_or(self.security.password_min_length);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }

        // Validation overrides
        if let Ok(v) = env::var("VALIDATION_SPEC_PATH") {
            self.validation.spec_path = Some(PathBuf::from(v));
        }

        self.enforce_profile_limits()
    }

    /// Production never honours the test-mode bypass, whatever the env says.
    fn enforce_profile_limits(mut self) -> Self {
        if self.environment == Environment::Production {
            self.security.allow_test_mode = false;
        }
        self
    }

    /// Refuse to pair a real database with the public development secret.
    pub fn check_deployable(&self) -> Result<(), ConfigError> {
        if self.database.url.is_some() && self.security.jwt_secret == DEV_JWT_SECRET {
            return Err(ConfigError::DevelopmentSecret);
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 9,
                connection_timeout: 30,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 8081,
                stage_timeout_ms: 10_000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: DEV_JWT_SECRET.to_string(),
                allow_test_mode: false,
                jwt_expiry_hours: 24 * 7, // 1 week
                password_min_length: 8,
                enable_audit_logging: false,
            },
            validation: ValidationConfig::default(),
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 8081,
                stage_timeout_ms: 5_000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                allow_test_mode: false,
                jwt_expiry_hours: 24,
                password_min_length: 8,
                enable_audit_logging: true,
            },
            validation: ValidationConfig::default(),
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
            },
            api: ApiConfig {
                port: 8081,
                stage_timeout_ms: 3_000,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                allow_test_mode: false,
                jwt_expiry_hours: 4,
                password_min_length: 8,
                enable_audit_logging: true,
            },
            validation: ValidationConfig::default(),
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(!config.security.allow_test_mode);
        assert!(config.database.url.is_none());
        assert_eq!(config.api.port, 8081);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.security.allow_test_mode);
        assert!(config.is_production());
        assert!(config.security.jwt_secret.is_empty());
    }

    #[test]
    fn production_cannot_enable_test_mode() {
        let mut config = AppConfig::production();
        config.security.allow_test_mode = true;
        let config = config.enforce_profile_limits();
        assert!(!config.security.allow_test_mode);
    }

    #[test]
    fn unset_app_env_leaves_test_mode_off() {
        env::remove_var("APP_ENV");
        env::remove_var("SECURITY_ALLOW_TEST_MODE");
        let config = AppConfig::from_env();
        assert_eq!(config.environment, Environment::Development);
        assert!(!config.security.allow_test_mode);
    }

    #[test]
    fn development_secret_is_refused_with_database() {
        let mut config = AppConfig::development();
        assert_eq!(config.check_deployable(), Ok(()));

        config.database.url = Some("mysql://app@db/baton".to_string());
        assert_eq!(config.check_deployable(), Err(ConfigError::DevelopmentSecret));

        config.security.jwt_secret = "rotated-secret".to_string();
        assert_eq!(config.check_deployable(), Ok(()));
    }
}
