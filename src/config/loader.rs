//! Configuration Loader
//!
//! Environment-aware configuration loading. The environment preset forms the
//! base layer, an optional configuration file (TOML, YAML or JSON, picked by
//! extension) overrides it, and `ITEMS_CACHE__SECTION__FIELD` variables
//! override both.

use super::error::{ConfigResult, ConfigurationError};
use super::{detect_environment, CacheConfig, SharedRefreshConfig};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded configuration plus the hot-reloadable refresh handle
pub struct ConfigManager {
    config: RwLock<CacheConfig>,
    refresh: SharedRefreshConfig,
    environment: String,
    config_path: Option<PathBuf>,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("config", &*self.config.read())
            .field("environment", &self.environment)
            .field("config_path", &self.config_path)
            .finish()
    }
}

impl ConfigManager {
    /// Load configuration with environment auto-detection and no file layer
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_env(None, &detect_environment())
    }

    /// Load configuration layered over the given file
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_env(Some(path.as_ref().to_path_buf()), &detect_environment())
    }

    /// Load configuration with an explicit environment.
    /// Useful for testing without modifying global environment variables.
    pub fn load_with_env(
        config_path: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        if let Some(path) = &config_path {
            if !path.is_file() {
                return Err(ConfigurationError::file_read_error(
                    path.display().to_string(),
                    "configuration path must point to a regular file",
                ));
            }
        }

        let config = Self::build_config(config_path.as_deref(), environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            config_path = ?config_path,
            refresh_interval_ms = config.refresh.interval_ms,
            retry_max_attempts = config.retry.max_attempts,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            refresh: config.refresh.clone().shared(),
            config: RwLock::new(config),
            environment: environment.to_string(),
            config_path,
        }))
    }

    fn build_config(path: Option<&Path>, environment: &str) -> ConfigResult<CacheConfig> {
        let preset = match environment {
            "test" => CacheConfig::for_test(),
            "development" => CacheConfig::for_development(),
            _ => CacheConfig::default(),
        };

        let mut builder = config::Config::builder().add_source(config::Config::try_from(&preset)?);

        if let Some(path) = path {
            debug!("Layering configuration file: {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let layered = builder
            .add_source(
                config::Environment::with_prefix("ITEMS_CACHE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(layered.try_deserialize::<CacheConfig>()?)
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> CacheConfig {
        self.config.read().clone()
    }

    /// Shared refresh handle to hand to a refresh scheduler
    pub fn refresh_handle(&self) -> SharedRefreshConfig {
        self.refresh.clone()
    }

    /// Re-read every layer and publish the result.
    ///
    /// The refresh scheduler picks up a changed interval on its next tick. On
    /// error the previous configuration stays in effect.
    pub fn reload(&self) -> ConfigResult<()> {
        let config = Self::build_config(self.config_path.as_deref(), &self.environment)?;
        config.validate()?;

        *self.refresh.write() = config.refresh.clone();
        *self.config.write() = config;

        info!(environment = %self.environment, "Configuration reloaded");
        Ok(())
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the layered configuration file, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Configuration as JSON for display
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::json!(&*self.config.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CursorPolicy;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::Builder;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_environment_presets() {
        let manager = ConfigManager::load_with_env(None, "test").unwrap();
        assert_eq!(manager.config(), CacheConfig::for_test());
        assert_eq!(manager.environment(), "test");

        let manager = ConfigManager::load_with_env(None, "production").unwrap();
        assert_eq!(manager.config(), CacheConfig::default());
    }

    #[test]
    fn test_file_layer_overrides_preset() {
        let file = write_config(
            r#"
[refresh]
interval_ms = 1500
cursor_policy = "advance_on_fetch"

[retry]
max_attempts = 5
"#,
        );

        let manager = ConfigManager::load_with_env(Some(file.path().to_path_buf()), "test").unwrap();
        let config = manager.config();

        assert_eq!(config.refresh.interval(), Duration::from_millis(1500));
        assert_eq!(config.refresh.cursor_policy, CursorPolicy::AdvanceOnFetch);
        assert_eq!(config.retry.max_attempts, 5);
        // untouched fields keep the preset
        assert_eq!(
            config.retry.initial_delay_ms,
            CacheConfig::for_test().retry.initial_delay_ms
        );
    }

    #[test]
    fn test_debug_output_names_environment() {
        let manager = ConfigManager::load_with_env(None, "test").unwrap();
        let rendered = format!("{manager:?}");

        assert!(rendered.starts_with("ConfigManager"));
        assert!(rendered.contains("\"test\""));
        assert!(rendered.contains("interval_ms: 50"));
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let file = write_config("[retry]\nmax_attempts = 0\n");
        let result = ConfigManager::load_with_env(Some(file.path().to_path_buf()), "test");
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result =
            ConfigManager::load_with_env(Some(PathBuf::from("/nonexistent/items-cache.toml")), "test");
        assert!(matches!(result, Err(ConfigurationError::FileRead { .. })));
    }

    #[test]
    fn test_reload_publishes_refresh_interval() {
        let file = write_config("[refresh]\ninterval_ms = 100\n");
        let manager = ConfigManager::load_with_env(Some(file.path().to_path_buf()), "test").unwrap();
        let handle = manager.refresh_handle();
        assert_eq!(handle.read().interval_ms, 100);

        std::fs::write(file.path(), "[refresh]\ninterval_ms = 400\n").unwrap();
        manager.reload().unwrap();

        assert_eq!(handle.read().interval_ms, 400);
        assert_eq!(manager.config().refresh.interval_ms, 400);
    }
}
