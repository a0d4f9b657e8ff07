//! Tests for configuration system.

use std::io::Write;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use parley::config::ParleyConfig;
use parley::error::ParleyError;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 6] = [
    "OPENAI_API_KEY",
    "PARLEY_REALTIME_URL",
    "PARLEY_REALTIME_MODEL",
    "PARLEY_VOICE",
    "PARLEY_SIGNALING_TIMEOUT_MS",
    "PARLEY_TOOL_TIMEOUT_MS",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clear_config_env() {
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
}

#[test]
fn from_env_reads_realtime_settings() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();
    std::env::set_var("OPENAI_API_KEY", "sk-env");
    std::env::set_var("PARLEY_REALTIME_MODEL", "gpt-realtime");
    std::env::set_var("PARLEY_TOOL_TIMEOUT_MS", "2500");

    let realtime = ParleyConfig::from_env().unwrap().realtime().unwrap();

    assert_eq!(realtime.api_key, "sk-env");
    assert_eq!(realtime.model, "gpt-realtime");
    assert_eq!(realtime.tool_timeout, Some(Duration::from_millis(2500)));
    assert_eq!(realtime.signaling_timeout, None);
}

#[test]
fn env_overrides_file_values() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();
    std::env::set_var("PARLEY_VOICE", "verse");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "api_key = \"sk-file\"\nvoice = \"shimmer\"").unwrap();

    let realtime = ParleyConfig::load(Some(file.path()))
        .unwrap()
        .realtime()
        .unwrap();

    assert_eq!(realtime.api_key, "sk-file");
    assert_eq!(realtime.voice, "verse");
}

#[test]
fn invalid_timeout_env_value_is_rejected() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();
    std::env::set_var("PARLEY_SIGNALING_TIMEOUT_MS", "-5");

    let err = ParleyConfig::from_env().unwrap_err();

    assert!(matches!(err, ParleyError::Configuration(_)));
}

#[test]
fn missing_config_file_is_an_io_error() {
    let _lock = env_lock_guard();
    let dir = tempfile::tempdir().unwrap();

    let err = ParleyConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();

    assert!(matches!(err, ParleyError::Io(_)));
}

#[test]
fn code_layer_wins_over_everything() {
    let realtime = ParleyConfig::new()
        .with_api_key("sk-code")
        .merge(ParleyConfig::from_toml_str("api_key = \"sk-file\"\nmodel = \"m\"").unwrap())
        .realtime()
        .unwrap();

    assert_eq!(realtime.api_key, "sk-code");
    assert_eq!(realtime.model, "m");
}
