//! Configuration Module Tests
//!
//! Presets, `ITEMS_CACHE_*` overrides and hot reload through the config manager.

use items_cache::config::{CacheConfig, ConfigManager, ConfigurationError, CursorPolicy};
use items_cache::CacheError;
use std::io::Write;
use std::sync::Mutex;
use tokio_test::{assert_err, assert_ok};

// environment variables are process-wide
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn with_env<F: FnOnce()>(vars: &[(&str, &str)], test: F) {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    for (name, value) in vars {
        std::env::set_var(name, value);
    }
    test();
    for (name, _) in vars {
        std::env::remove_var(name);
    }
}

#[test]
fn config_has_expected_defaults() {
    let config = CacheConfig::default();

    assert_eq!(config.refresh.interval_ms, 30_000);
    assert_eq!(config.refresh.cursor_policy, CursorPolicy::AdvanceOnSuccess);
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.initial_delay_ms, 1_000);
    assert_eq!(config.retry.max_delay_ms, 30_000);
    assert_eq!(config.retry.operation_timeout_ms, 30_000);
    assert_ok!(config.validate());
}

#[test]
fn validate_rejects_unusable_values() {
    let mut config = CacheConfig::for_test();
    config.refresh.interval_ms = 0;
    assert_err!(config.validate());

    let mut config = CacheConfig::for_test();
    config.retry.max_attempts = 0;
    assert_err!(config.validate());

    let mut config = CacheConfig::for_test();
    config.retry.initial_delay_ms = config.retry.max_delay_ms + 1;
    assert_err!(config.validate());

    let mut config = CacheConfig::for_test();
    config.retry.operation_timeout_ms = 0;
    assert_err!(config.validate());
}

#[test]
fn cursor_policy_parses_short_and_long_names() {
    assert_eq!(
        assert_ok!("on_fetch".parse::<CursorPolicy>()),
        CursorPolicy::AdvanceOnFetch
    );
    assert_eq!(
        assert_ok!(" Advance_On_Success ".parse::<CursorPolicy>()),
        CursorPolicy::AdvanceOnSuccess
    );
    assert_err!("eventually".parse::<CursorPolicy>());
}

#[test]
fn explicit_overrides_apply() {
    with_env(
        &[
            ("ITEMS_CACHE_REFRESH_INTERVAL_MS", "250"),
            ("ITEMS_CACHE_CURSOR_POLICY", "advance_on_fetch"),
            ("ITEMS_CACHE_RETRY_MAX_ATTEMPTS", "7"),
        ],
        || {
            let config = CacheConfig::default().with_env_overrides();
            assert_eq!(config.refresh.interval_ms, 250);
            assert_eq!(config.refresh.cursor_policy, CursorPolicy::AdvanceOnFetch);
            assert_eq!(config.retry.max_attempts, 7);
        },
    );
}

#[test]
fn unparseable_overrides_are_ignored() {
    with_env(
        &[
            ("ITEMS_CACHE_REFRESH_INTERVAL_MS", "soon"),
            ("ITEMS_CACHE_CURSOR_POLICY", "sometimes"),
        ],
        || {
            let config = CacheConfig::default().with_env_overrides();
            assert_eq!(config.refresh.interval_ms, 30_000);
            assert_eq!(config.refresh.cursor_policy, CursorPolicy::AdvanceOnSuccess);
        },
    );
}

#[test]
fn environment_selects_preset() {
    with_env(&[("ITEMS_CACHE_ENV", "test")], || {
        assert_eq!(CacheConfig::from_environment(), CacheConfig::for_test());
    });
    with_env(&[("ITEMS_CACHE_ENV", "development")], || {
        assert_eq!(
            CacheConfig::from_environment(),
            CacheConfig::for_development()
        );
    });
}

#[test]
fn layered_environment_variables_reach_config_manager() {
    with_env(&[("ITEMS_CACHE__RETRY__MAX_ATTEMPTS", "9")], || {
        let manager = ConfigManager::load_with_env(None, "test").unwrap();
        assert_eq!(manager.config().retry.max_attempts, 9);
        assert_eq!(manager.config().refresh.interval_ms, 50);
    });
}

#[test]
fn reload_publishes_new_interval_to_refresh_handle() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[refresh]\ninterval_ms = 1000").unwrap();

    let manager = assert_ok!(ConfigManager::load_with_env(
        Some(file.path().to_path_buf()),
        "production"
    ));
    let handle = manager.refresh_handle();
    assert_eq!(handle.read().interval_ms, 1_000);

    std::fs::write(file.path(), "[refresh]\ninterval_ms = 200\n").unwrap();
    assert_ok!(manager.reload());

    assert_eq!(handle.read().interval_ms, 200);
    assert_eq!(manager.config().refresh.interval_ms, 200);
}

#[test]
fn invalid_file_is_rejected_as_configuration_error() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[retry]\nmax_attempts = 0").unwrap();

    let error = assert_err!(ConfigManager::load_with_env(
        Some(file.path().to_path_buf()),
        "production"
    ));
    assert!(matches!(error, ConfigurationError::InvalidValue { .. }));

    let cache_error: CacheError = error.into();
    assert!(cache_error.is_fatal());
}
