use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{SignalError, SignalResult};
use crate::metrics::{MetricsConfig, PASTE_THRESHOLD_CHARS};

pub const DB_PATH_ENV: &str = "SIGNAL_DB_PATH";
pub const DEBUG_ENV: &str = "SIGNAL_DEBUG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Use the chat-completions synthesizer when its API key is available.
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_ms: u64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_ms: 20_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Program and arguments of the test harness. Empty means no evaluator.
    pub command: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub database_path: PathBuf,
    pub paste_threshold_chars: i64,
    pub content_preview_chars: usize,
    pub debug: bool,
    pub insight: InsightConfig,
    pub evaluator: EvaluatorConfig,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("workflow-signal.sqlite3"),
            paste_threshold_chars: PASTE_THRESHOLD_CHARS,
            content_preview_chars: 200,
            debug: false,
            insight: InsightConfig::default(),
            evaluator: EvaluatorConfig::default(),
        }
    }
}

impl SignalConfig {
    /// Reads `path` (defaults when it does not exist) and applies environment
    /// overrides.
    pub fn load(path: &Path) -> SignalResult<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> SignalResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|err| {
            SignalError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&contents)
            .map_err(|err| SignalError::Config(format!("invalid {}: {err}", path.display())))
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(DB_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(flag) = lookup(DEBUG_ENV) {
            self.debug = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn validate(&self) -> SignalResult<()> {
        if self.paste_threshold_chars < 1 {
            return Err(SignalError::Config(format!(
                "paste_threshold_chars must be at least 1, got {}",
                self.paste_threshold_chars
            )));
        }
        if self.insight.timeout_ms == 0 || self.evaluator.timeout_ms == 0 {
            return Err(SignalError::Config(
                "collaborator timeouts must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            paste_threshold_chars: self.paste_threshold_chars,
        }
    }

    pub fn insight_timeout(&self) -> Duration {
        Duration::from_millis(self.insight.timeout_ms)
    }

    pub fn evaluator_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluator.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SignalConfig::from_file(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, SignalConfig::default());
        assert_eq!(config.paste_threshold_chars, 50);
        assert_eq!(config.content_preview_chars, 200);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal.json");
        fs::write(
            &path,
            r#"{ "paste_threshold_chars": 80, "evaluator": { "command": ["python3", "runner.py"] } }"#,
        )
        .unwrap();

        let config = SignalConfig::from_file(&path).unwrap();
        assert_eq!(config.paste_threshold_chars, 80);
        assert_eq!(config.evaluator.command, vec!["python3", "runner.py"]);
        assert_eq!(config.evaluator.timeout_ms, 10_000);
        assert_eq!(config.insight.model, "gpt-4o-mini");
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal.json");
        fs::write(&path, "{ not json").unwrap();

        let err = SignalConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, SignalError::Config(_)));
    }

    #[test]
    fn environment_overrides_apply() {
        let env: HashMap<&str, &str> = [(DB_PATH_ENV, "/tmp/other.sqlite3"), (DEBUG_ENV, "TRUE")]
            .into_iter()
            .collect();
        let mut config = SignalConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_path, PathBuf::from("/tmp/other.sqlite3"));
        assert!(config.debug);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let config = SignalConfig {
            paste_threshold_chars: 0,
            ..SignalConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
