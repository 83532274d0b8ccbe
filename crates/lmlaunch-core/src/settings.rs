//! Settings domain types and validation.
//!
//! Settings are a plain value: loaded once at startup, replaced as a whole
//! through `Launcher::apply_settings`, and read by the next start. Loading
//! and saving lives in [`crate::paths`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default llama-server executable, resolved through `PATH`.
pub const DEFAULT_LLAMA_EXECUTABLE: &str = "llama-server";

/// Default llama-server port.
pub const DEFAULT_LLAMA_PORT: u16 = 8080;

/// Default TabbyAPI port.
pub const DEFAULT_TABBY_PORT: u16 = 5000;

/// Default bind host for both engines.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Application settings, grouped by section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llamacpp: LlamaCppSettings,
    pub tabbyapi: TabbyApiSettings,
}

/// Settings that apply regardless of engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory scanned for models.
    pub model_dir: Option<String>,

    /// Label of the selected model (see `ModelEntry::label`).
    pub model: Option<String>,

    /// Start the selected model when the launcher starts.
    pub run_at_startup: bool,

    /// Seconds without any output before startup is considered hung.
    pub startup_timeout_secs: u64,

    /// Delay between a crash and the next restart attempt.
    pub restart_delay_ms: u64,

    /// Seconds to wait after SIGTERM before sending SIGKILL.
    pub stop_timeout_secs: u64,

    /// How often the readiness loop polls the output queue.
    pub poll_interval_ms: u64,

    /// Directories prepended to `PATH` for the child process.
    pub extra_paths: Vec<String>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            model_dir: None,
            model: None,
            run_at_startup: true,
            startup_timeout_secs: 30,
            restart_delay_ms: 1000,
            stop_timeout_secs: 5,
            poll_interval_ms: 200,
            extra_paths: Vec::new(),
        }
    }
}

impl GeneralSettings {
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    #[must_use]
    pub const fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// llama.cpp (`llama-server`) settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlamaCppSettings {
    /// Executable name (looked up in `PATH`) or path.
    pub executable: String,
    /// `--port`; omitted from the command line when unset.
    pub port: Option<u16>,
    /// `--host`; omitted from the command line when unset or empty.
    pub host: Option<String>,
    /// Options appended for every model.
    pub cmdline: String,
    /// Per-model options, one `fragment: options` rule per line.
    pub cmdline_permodel: String,
    /// How long request stats are kept.
    pub telemetry_retention_secs: u64,
}

impl Default for LlamaCppSettings {
    fn default() -> Self {
        Self {
            executable: DEFAULT_LLAMA_EXECUTABLE.to_string(),
            port: Some(DEFAULT_LLAMA_PORT),
            host: Some(DEFAULT_HOST.to_string()),
            cmdline: String::new(),
            cmdline_permodel: String::new(),
            telemetry_retention_secs: 600,
        }
    }
}

/// TabbyAPI settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TabbyApiSettings {
    /// TabbyAPI checkout containing `start.py` and its `venv`.
    pub install_dir: Option<String>,
    pub port: Option<u16>,
    pub host: Option<String>,
    pub cmdline: String,
    pub cmdline_permodel: String,
    pub telemetry_retention_secs: u64,
}

impl Default for TabbyApiSettings {
    fn default() -> Self {
        Self {
            install_dir: None,
            port: Some(DEFAULT_TABBY_PORT),
            host: Some(DEFAULT_HOST.to_string()),
            cmdline: String::new(),
            cmdline_permodel: String::new(),
            telemetry_retention_secs: 1800,
        }
    }
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Dotted keys (`section.field`) whose values differ between `self` and
    /// `other`, sorted.
    #[must_use]
    pub fn changed_keys(&self, other: &Self) -> Vec<String> {
        let (Ok(Value::Object(old)), Ok(Value::Object(new))) =
            (serde_json::to_value(self), serde_json::to_value(other))
        else {
            return Vec::new();
        };

        let mut changed = Vec::new();
        for (section, old_value) in &old {
            let new_value = new.get(section).unwrap_or(&Value::Null);
            match (old_value, new_value) {
                (Value::Object(old_fields), Value::Object(new_fields)) => {
                    for (field, value) in old_fields {
                        if new_fields.get(field) != Some(value) {
                            changed.push(format!("{section}.{field}"));
                        }
                    }
                }
                (a, b) if a != b => changed.push(section.clone()),
                _ => {}
            }
        }
        changed
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Startup timeout must be between 1 and 3600 seconds, got {0}")]
    InvalidStartupTimeout(u64),

    #[error("Poll interval must be between 10 and 5000 ms, got {0}")]
    InvalidPollInterval(u64),

    #[error("Stop timeout must be between 1 and 300 seconds, got {0}")]
    InvalidStopTimeout(u64),

    #[error("Port cannot be 0 ({0})")]
    InvalidPort(&'static str),

    #[error("Telemetry retention must be at least 1 second ({0})")]
    InvalidRetention(&'static str),

    #[error("Model directory cannot be empty")]
    EmptyModelDir,

    #[error("Executable cannot be empty")]
    EmptyExecutable,

    #[error("Per-model option line must look like 'fragment: options', got '{0}'")]
    InvalidOverrideLine(String),

    #[error("Failed to read settings file: {0}")]
    Io(String),

    #[error("Failed to parse settings file: {0}")]
    Parse(String),
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    let general = &settings.general;

    if !(1..=3600).contains(&general.startup_timeout_secs) {
        return Err(SettingsError::InvalidStartupTimeout(
            general.startup_timeout_secs,
        ));
    }

    if !(10..=5000).contains(&general.poll_interval_ms) {
        return Err(SettingsError::InvalidPollInterval(general.poll_interval_ms));
    }

    if !(1..=300).contains(&general.stop_timeout_secs) {
        return Err(SettingsError::InvalidStopTimeout(general.stop_timeout_secs));
    }

    if general
        .model_dir
        .as_ref()
        .is_some_and(|p| p.trim().is_empty())
    {
        return Err(SettingsError::EmptyModelDir);
    }

    if settings.llamacpp.executable.trim().is_empty() {
        return Err(SettingsError::EmptyExecutable);
    }

    if settings.llamacpp.port == Some(0) {
        return Err(SettingsError::InvalidPort("llamacpp.port"));
    }
    if settings.tabbyapi.port == Some(0) {
        return Err(SettingsError::InvalidPort("tabbyapi.port"));
    }

    if settings.llamacpp.telemetry_retention_secs == 0 {
        return Err(SettingsError::InvalidRetention("llamacpp"));
    }
    if settings.tabbyapi.telemetry_retention_secs == 0 {
        return Err(SettingsError::InvalidRetention("tabbyapi"));
    }

    for rules in [
        &settings.llamacpp.cmdline_permodel,
        &settings.tabbyapi.cmdline_permodel,
    ] {
        validate_override_rules(rules)?;
    }

    Ok(())
}

fn validate_override_rules(rules: &str) -> Result<(), SettingsError> {
    for line in rules.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line.split_once(':') {
            Some((fragment, _)) if !fragment.trim().is_empty() => {}
            _ => return Err(SettingsError::InvalidOverrideLine(line.to_string())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::with_defaults();
        assert!(settings.general.run_at_startup);
        assert_eq!(settings.general.startup_timeout(), Duration::from_secs(30));
        assert_eq!(settings.general.poll_interval(), Duration::from_millis(200));
        assert_eq!(settings.llamacpp.executable, "llama-server");
        assert_eq!(settings.llamacpp.port, Some(8080));
        assert_eq!(settings.tabbyapi.port, Some(5000));
        assert_eq!(settings.tabbyapi.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(settings.tabbyapi.install_dir, None);
    }

    #[test]
    fn test_validate_settings_valid() {
        assert!(validate_settings(&Settings::with_defaults()).is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{"general": {"model": "a.gguf [llama.cpp]"}, "llamacpp": {"port": 9090}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.general.model.as_deref(), Some("a.gguf [llama.cpp]"));
        assert_eq!(settings.general.startup_timeout_secs, 30);
        assert_eq!(settings.llamacpp.port, Some(9090));
        assert_eq!(settings.llamacpp.executable, "llama-server");
    }

    #[test]
    fn test_validate_startup_timeout_zero() {
        let mut settings = Settings::with_defaults();
        settings.general.startup_timeout_secs = 0;
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidStartupTimeout(0))
        ));
    }

    #[test]
    fn test_validate_poll_interval_too_large() {
        let mut settings = Settings::with_defaults();
        settings.general.poll_interval_ms = 60_000;
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidPollInterval(60_000))
        ));
    }

    #[test]
    fn test_validate_port_zero() {
        let mut settings = Settings::with_defaults();
        settings.tabbyapi.port = Some(0);
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidPort("tabbyapi.port"))
        ));
    }

    #[test]
    fn test_validate_empty_model_dir() {
        let mut settings = Settings::with_defaults();
        settings.general.model_dir = Some("  ".to_string());
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::EmptyModelDir)
        ));
    }

    #[test]
    fn test_validate_override_lines() {
        let mut settings = Settings::with_defaults();
        settings.llamacpp.cmdline_permodel = "qwen: -c 8192\n\nllama: --mlock".to_string();
        assert!(validate_settings(&settings).is_ok());

        settings.llamacpp.cmdline_permodel = "qwen -c 8192".to_string();
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidOverrideLine(_))
        ));

        settings.llamacpp.cmdline_permodel = ": -c 8192".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_changed_keys() {
        let old = Settings::with_defaults();
        let mut new = old.clone();
        assert!(old.changed_keys(&new).is_empty());

        new.general.model = Some("x [llama.cpp]".to_string());
        new.llamacpp.port = None;
        new.tabbyapi.cmdline = "--foo".to_string();

        let changed = old.changed_keys(&new);
        assert_eq!(
            changed,
            vec!["general.model", "llamacpp.port", "tabbyapi.cmdline"]
        );
    }
}
