//! Agent configuration stored in `.lovelaice.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// File name searched for when discovering the configuration.
pub const CONFIG_FILE_NAME: &str = ".lovelaice.toml";

/// Agent configuration (TOML).
///
/// Edited by humans; missing fields fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LovelaiceConfig {
    /// Alias (key of `models`) used when `--model` is not given.
    pub default_model: String,

    /// Replaces the built-in system prompt when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    pub models: BTreeMap<String, ModelConfig>,

    pub limits: Limits,
}

/// One OpenAI-compatible model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    /// Model identifier sent in the request body.
    pub model: String,
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "google/gemini-2.5-flash".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key_env: Some("API_KEY".to_string()),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Limits {
    /// Wall-clock limit for `execute_command`.
    pub command_timeout_secs: u64,
    /// Captured stdout/stderr beyond this many bytes is dropped.
    pub command_output_limit_bytes: usize,
    /// Timeout for a whole completion request, streaming included.
    pub request_timeout_secs: u64,
    /// `read_file` returns at most this many bytes.
    pub read_limit_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            command_timeout_secs: 60,
            command_output_limit_bytes: 64_000,
            request_timeout_secs: 120,
            read_limit_bytes: 64_000,
        }
    }
}

impl Limits {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for LovelaiceConfig {
    fn default() -> Self {
        Self {
            default_model: "default".to_string(),
            system_prompt: None,
            models: BTreeMap::from([("default".to_string(), ModelConfig::default())]),
            limits: Limits::default(),
        }
    }
}

impl LovelaiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(anyhow!("at least one [models.<alias>] table is required"));
        }
        if !self.models.contains_key(&self.default_model) {
            return Err(anyhow!(
                "default_model '{}' is not defined under [models]",
                self.default_model
            ));
        }
        for (alias, model) in &self.models {
            if model.model.trim().is_empty() {
                return Err(anyhow!("models.{alias}.model must be non-empty"));
            }
            if model.base_url.trim().is_empty() {
                return Err(anyhow!("models.{alias}.base_url must be non-empty"));
            }
            if model.max_tokens == 0 {
                return Err(anyhow!("models.{alias}.max_tokens must be > 0"));
            }
        }
        if self.limits.command_timeout_secs == 0 {
            return Err(anyhow!("limits.command_timeout_secs must be > 0"));
        }
        if self.limits.command_output_limit_bytes == 0 {
            return Err(anyhow!("limits.command_output_limit_bytes must be > 0"));
        }
        if self.limits.request_timeout_secs == 0 {
            return Err(anyhow!("limits.request_timeout_secs must be > 0"));
        }
        if self.limits.read_limit_bytes == 0 {
            return Err(anyhow!("limits.read_limit_bytes must be > 0"));
        }
        Ok(())
    }

    /// Look up a model by alias, or the default model when `alias` is `None`.
    pub fn model(&self, alias: Option<&str>) -> Result<&ModelConfig> {
        let alias = alias.unwrap_or(&self.default_model);
        self.models.get(alias).ok_or_else(|| {
            let known: Vec<&str> = self.models.keys().map(String::as_str).collect();
            anyhow!("unknown model '{alias}' (configured: {})", known.join(", "))
        })
    }
}

/// Walk upward from `start` and return the first `.lovelaice.toml` found.
pub fn discover_config(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "discovered config");
            return Some(candidate);
        }
    }
    None
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LovelaiceConfig::default()`.
pub fn load_config(path: &Path) -> Result<LovelaiceConfig> {
    if !path.exists() {
        let cfg = LovelaiceConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LovelaiceConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Discover the config starting at `start`, falling back to defaults.
pub fn load_discovered(start: &Path) -> Result<(Option<PathBuf>, LovelaiceConfig)> {
    match discover_config(start) {
        Some(path) => {
            let cfg = load_config(&path)?;
            Ok((Some(path), cfg))
        }
        None => {
            debug!("no config found, using defaults");
            Ok((None, LovelaiceConfig::default()))
        }
    }
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &LovelaiceConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, LovelaiceConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        let mut cfg = LovelaiceConfig::default();
        cfg.system_prompt = Some("Be brief.".to_string());
        write_config(&path, &cfg).expect("write");
        assert_eq!(load_config(&path).expect("load"), cfg);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"
default_model = "local"

[models.local]
model = "llama3"
base_url = "http://localhost:11434/v1"

[limits]
command_timeout_secs = 5
"#,
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        let local = cfg.model(None).expect("model");
        assert_eq!(local.model, "llama3");
        assert_eq!(local.api_key_env, None);
        assert_eq!(local.max_tokens, 2048);
        assert_eq!(cfg.limits.command_timeout_secs, 5);
        assert_eq!(cfg.limits.read_limit_bytes, 64_000);
    }

    #[test]
    fn rejects_unknown_default_model() {
        let mut cfg = LovelaiceConfig::default();
        cfg.default_model = "missing".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn rejects_zero_limits_and_empty_fields() {
        let mut cfg = LovelaiceConfig::default();
        cfg.limits.read_limit_bytes = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = LovelaiceConfig::default();
        if let Some(model) = cfg.models.get_mut("default") {
            model.base_url = " ".to_string();
        }
        assert!(cfg.validate().is_err());

        let mut cfg = LovelaiceConfig::default();
        cfg.models.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_alias_lists_configured_models() {
        let cfg = LovelaiceConfig::default();
        let err = cfg.model(Some("gpt")).unwrap_err();
        assert!(err.to_string().contains("configured: default"));
    }

    #[test]
    fn discovers_config_in_ancestor() {
        let temp = tempfile::tempdir().expect("tempdir");
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).expect("mkdir");
        assert_eq!(discover_config(&nested), None);

        let path = temp.path().join(CONFIG_FILE_NAME);
        write_config(&path, &LovelaiceConfig::default()).expect("write");
        assert_eq!(discover_config(&nested), Some(path.clone()));

        let (found, cfg) = load_discovered(&nested).expect("load");
        assert_eq!(found, Some(path));
        assert_eq!(cfg, LovelaiceConfig::default());
    }
}
