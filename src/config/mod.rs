use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Deepest allowed nesting of logical groups
    pub max_nested_depth: u32,
    pub default_limit: u64,
    /// Page sizes above this are capped; `None` leaves them alone
    pub max_limit: Option<u64>,
    pub default_sort_by: String,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        AppConfig::development().filter
    }
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
        .with_env_overrides(|key| env::var(key).ok())
    }

    fn with_env_overrides<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Filter overrides
        if let Some(v) = var("FILTER_MAX_NESTED_DEPTH") {
            self.filter.max_nested_depth = v.parse().unwrap_or(self.filter.max_nested_depth);
        }
        if let Some(v) = var("FILTER_DEFAULT_LIMIT") {
            self.filter.default_limit = v.parse().unwrap_or(self.filter.default_limit);
        }
        if let Some(v) = var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }
        if let Some(v) = var("FILTER_DEFAULT_SORT_BY") {
            if !v.trim().is_empty() {
                self.filter.default_sort_by = v.trim().to_string();
            }
        }
        if let Some(v) = var("FILTER_DEBUG_LOGGING") {
            self.filter.debug_logging = v.parse().unwrap_or(self.filter.debug_logging);
        }

        // Database overrides
        if let Some(v) = var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Some(v) = var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            filter: FilterConfig {
                max_nested_depth: 32,
                default_limit: 10,
                max_limit: None,
                default_sort_by: "createdAt".to_string(),
                debug_logging: true,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            filter: FilterConfig {
                max_nested_depth: 16,
                default_limit: 10,
                max_limit: Some(500),
                default_sort_by: "createdAt".to_string(),
                debug_logging: false,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            filter: FilterConfig {
                max_nested_depth: 8,
                default_limit: 10,
                max_limit: Some(100),
                default_sort_by: "createdAt".to_string(),
                debug_logging: false,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
        }
    }
}

// Global singleton config - read by the binary and service wiring only
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.filter.default_limit, 10);
        assert_eq!(config.filter.default_sort_by, "createdAt");
        assert_eq!(config.filter.max_limit, None);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.filter.max_limit, Some(100));
        assert!(!config.filter.debug_logging);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FILTER_MAX_NESTED_DEPTH", "4"),
            ("FILTER_MAX_LIMIT", "50"),
            ("FILTER_DEFAULT_SORT_BY", "updatedAt"),
            ("DATABASE_MAX_CONNECTIONS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::development().with_env_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.filter.max_nested_depth, 4);
        assert_eq!(config.filter.max_limit, Some(50));
        assert_eq!(config.filter.default_sort_by, "updatedAt");
        assert_eq!(config.database.max_connections, 10);
    }
}
