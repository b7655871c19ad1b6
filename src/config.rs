use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "claude-local-proxy.toml";
const CONFIG_DIR_NAME: &str = "claude-local-proxy";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub models: ModelOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Per-role model overrides plus an optional free-form alias table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sonnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub haiku: Option<String>,
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_port() -> u16 {
    4222
}

fn default_request_timeout_secs() -> u64 {
    600
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            backend: BackendConfig::default(),
            models: ModelOverrides::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl ModelOverrides {
    /// The three logical roles in a fixed order.
    pub fn roles(&self) -> [(&'static str, Option<&str>); 3] {
        [
            ("opus", self.opus.as_deref()),
            ("sonnet", self.sonnet.as_deref()),
            ("haiku", self.haiku.as_deref()),
        ]
    }
}

impl ProxyConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file, falling back to defaults.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = self.backend.base_url.trim();
        if url.is_empty() {
            return Err(ProxyError::config("backend.base_url must not be empty"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ProxyError::config(format!(
                "backend.base_url must start with http:// or https://, got '{url}'"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ProxyError::config(
                "request_timeout_secs must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Backend base URL without a trailing slash, ready for path concatenation.
    pub fn base_url(&self) -> String {
        self.backend.base_url.trim().trim_end_matches('/').to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Candidate config file locations, highest priority first.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];

    if cfg!(target_os = "macos") {
        if let Some(home) = home_dir() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join(CONFIG_DIR_NAME)
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join(CONFIG_DIR_NAME).join("config.toml"));
        }
        if let Some(home) = home_dir() {
            paths.push(home.join(".config").join(CONFIG_DIR_NAME).join("config.toml"));
        }
    }

    if let Some(home) = home_dir() {
        paths.push(home.join(format!(".{CONFIG_FILE_NAME}")));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000
request_timeout_secs = 120

[backend]
base_url = "http://10.0.0.5:8080/"

[models]
sonnet = "qwen2.5-coder:32b"
haiku = ""

[models.aliases]
"claude-sonnet-4-20250514" = "qwen2.5-coder:32b"
"#
        )
        .unwrap();

        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert_eq!(config.base_url(), "http://10.0.0.5:8080");
        assert_eq!(config.models.sonnet.as_deref(), Some("qwen2.5-coder:32b"));
        assert_eq!(config.models.haiku.as_deref(), Some(""));
        assert!(config.models.opus.is_none());
        assert_eq!(
            config.models.aliases.get("claude-sonnet-4-20250514"),
            Some(&"qwen2.5-coder:32b".to_string())
        );
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let f = NamedTempFile::new().unwrap();
        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 4222);
        assert_eq!(config.request_timeout_secs, 600);
        assert_eq!(config.base_url(), "http://localhost:11434");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let result = ProxyConfig::find_and_load(Some(Path::new("/nonexistent/proxy.toml")));
        assert!(matches!(result, Err(ProxyError::Config { .. })));
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "port = \"not a number\"").unwrap();
        assert!(matches!(
            ProxyConfig::load(f.path()),
            Err(ProxyError::Toml(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = ProxyConfig::default();
        config.backend.base_url = "localhost:11434".to_string();
        assert!(config.validate().is_err());

        config.backend.base_url = "  ".to_string();
        assert!(config.validate().is_err());

        let config = ProxyConfig {
            request_timeout_secs: 0,
            ..ProxyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roles_order() {
        let overrides = ModelOverrides {
            opus: Some("a".to_string()),
            haiku: Some("c".to_string()),
            ..ModelOverrides::default()
        };
        assert_eq!(
            overrides.roles(),
            [("opus", Some("a")), ("sonnet", None), ("haiku", Some("c"))]
        );
    }

    #[test]
    fn test_search_paths_start_with_cwd() {
        let paths = config_search_paths();
        assert_eq!(paths[0], PathBuf::from("claude-local-proxy.toml"));
    }
}
