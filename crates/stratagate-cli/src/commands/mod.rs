//! CLI command implementations for `sgate`.
//!
//! Each subcommand is implemented in its own module:
//!
//! - [`generate`] -- Prompt generation through the gateway.
//! - [`chunk`] -- Chunk boundary preview.
//! - [`estimate`] -- Token estimation.
//! - [`status`] -- Configuration diagnostics.

pub mod chunk;
pub mod estimate;
pub mod generate;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::Context;

use stratagate_types::config::GatewayConfig;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "STRATAGATE_CONFIG";

/// Load configuration from the given path override or via auto-discovery.
///
/// If `config_override` is provided, loads from that path. Otherwise the
/// discovery chain is:
/// 1. `STRATAGATE_CONFIG` env var
/// 2. `~/.stratagate/config.json`
///
/// Returns a default `GatewayConfig` if no config file is found. The
/// result is always validated.
pub fn load_config(config_override: Option<&str>) -> anyhow::Result<GatewayConfig> {
    let path = match config_override {
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !path.exists() {
                anyhow::bail!("config file not found: {path_str}");
            }
            Some(path)
        }
        None => discover_config_path(),
    };

    let config = match path {
        Some(path) => read_config(&path)?,
        None => GatewayConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> anyhow::Result<GatewayConfig> {
    GatewayConfig::from_json_file(path)
        .with_context(|| format!("failed to load config: {}", path.display()))
}

/// Discover the config file path (also shown by `sgate status`).
///
/// An env var pointing at a missing file is still returned so that
/// loading reports it instead of silently falling back to defaults.
pub fn discover_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(CONFIG_ENV)
        && !raw.trim().is_empty()
    {
        return Some(PathBuf::from(raw.trim()));
    }
    let home = dirs::home_dir()?.join(".stratagate").join("config.json");
    home.exists().then_some(home)
}

/// Read a whole input file, mapping errors to a readable message.
pub fn read_text_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn explicit_path_is_loaded() {
        let file = write_config(r#"{"rateLimit": {"maxTpm": 1234}, "priority": ["groq"]}"#);
        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.rate_limit.max_tpm, 1234);
        assert_eq!(config.priority, vec!["groq"]);
    }

    #[test]
    fn explicit_missing_path_fails() {
        let err = load_config(Some("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn malformed_json_fails() {
        let file = write_config("{not json");
        let err = load_config(file.path().to_str()).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let file = write_config(r#"{"priority": ["openai", "skynet"]}"#);
        assert!(load_config(file.path().to_str()).is_err());
    }

    #[test]
    fn env_var_is_discovered() {
        let file = write_config(r#"{"chunking": {"max_tokens_per_chunk": 300}}"#);
        let path = file.path().to_str().unwrap().to_string();
        temp_env::with_var(CONFIG_ENV, Some(path.as_str()), || {
            assert_eq!(discover_config_path(), Some(PathBuf::from(&path)));
            let config = load_config(None).unwrap();
            assert_eq!(config.chunking.max_tokens_per_chunk, 300);
        });
    }

    #[test]
    fn no_config_gives_defaults() {
        let home = tempfile::tempdir().unwrap();
        temp_env::with_vars(
            [
                (CONFIG_ENV, None),
                ("HOME", Some(home.path().to_str().unwrap())),
            ],
            || {
                assert_eq!(discover_config_path(), None);
                let config = load_config(None).unwrap();
                assert_eq!(config.rate_limit.max_tpm, 90_000);
            },
        );
    }

    #[test]
    fn read_text_file_reports_path() {
        let err = read_text_file(Path::new("/missing/input.txt")).unwrap_err();
        assert!(err.to_string().contains("/missing/input.txt"));
    }
}
