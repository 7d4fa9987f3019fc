//! `lovelaice init`: write a starter `.lovelaice.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tracing::info;

use super::config::{CONFIG_FILE_NAME, LovelaiceConfig, ModelConfig, write_config};

/// Options for `init_config`.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Model identifier for the `default` alias.
    pub model: Option<String>,
    /// Endpoint base URL for the `default` alias.
    pub base_url: Option<String>,
    /// If true, overwrite an existing config file.
    pub force: bool,
}

/// Write a default config into `root` and return its path.
///
/// Fails if the file already exists unless `options.force` is set.
pub fn init_config(root: &Path, options: &InitOptions) -> Result<PathBuf> {
    let path = root.join(CONFIG_FILE_NAME);
    if path.exists() && !options.force {
        return Err(anyhow!(
            "lovelaice init: {} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    if path.is_dir() {
        return Err(anyhow!(
            "lovelaice init: {} exists but is a directory",
            path.display()
        ));
    }

    let mut cfg = LovelaiceConfig::default();
    let defaults = ModelConfig::default();
    let model = ModelConfig {
        model: options.model.clone().unwrap_or(defaults.model),
        base_url: options.base_url.clone().unwrap_or(defaults.base_url),
        ..ModelConfig::default()
    };
    cfg.models.insert(cfg.default_model.clone(), model);
    write_config(&path, &cfg)?;
    info!(path = %path.display(), "wrote config");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;
    use std::fs;

    #[test]
    fn init_writes_loadable_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let options = InitOptions {
            model: Some("llama3".to_string()),
            base_url: Some("http://localhost:11434/v1".to_string()),
            force: false,
        };
        let path = init_config(temp.path(), &options).expect("init");
        assert_eq!(path, temp.path().join(CONFIG_FILE_NAME));

        let cfg = load_config(&path).expect("load");
        let model = cfg.model(None).expect("default model");
        assert_eq!(model.model, "llama3");
        assert_eq!(model.base_url, "http://localhost:11434/v1");
        assert_eq!(model.api_key_env.as_deref(), Some("API_KEY"));
    }

    #[test]
    fn init_without_force_refuses_existing_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_config(temp.path(), &InitOptions::default()).expect("init");
        let err = init_config(temp.path(), &InitOptions::default()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn init_with_force_rewrites_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = init_config(temp.path(), &InitOptions::default()).expect("init");
        fs::write(&path, "garbage = [").expect("write custom");

        let options = InitOptions {
            force: true,
            ..InitOptions::default()
        };
        init_config(temp.path(), &options).expect("re-init");
        assert_eq!(load_config(&path).expect("load"), LovelaiceConfig::default());
    }
}
