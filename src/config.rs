use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub graphmem: GraphmemConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GraphmemConfig {
    /// Path of the SQLite database file holding the knowledge graph.
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_http_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub authless: bool,
}

// Keep the missing-section defaults identical to the per-field serde
// defaults.
impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_http_port(),
            api_key_env: default_http_api_key_env(),
            allowed_origins: Vec::new(),
            authless: false,
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_api_key_env() -> String {
    "GRAPHMEM_API_KEY".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file.
    ///
    /// Loads environment variables from .env file (if present) first.
    /// Looks for the config file in this order:
    /// 1. Path specified in the GRAPHMEM_CONFIG environment variable
    /// 2. ./config.toml in the current directory
    pub fn load() -> Result<Self> {
        // .env is optional; ignore a missing file.
        let _ = dotenv::dotenv();

        let config_path = std::env::var("GRAPHMEM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config =
            toml::from_str(&config_str).context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.graphmem.db_path.as_os_str().is_empty() {
            anyhow::bail!("graphmem.db_path must not be empty");
        }

        // The parent directory must already exist; SQLite will not create it.
        if let Some(parent) = self.graphmem.db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                anyhow::bail!(
                    "db_path parent directory does not exist: {}",
                    parent.display()
                );
            }
        }

        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.graphmem.log_level.as_str()) {
            anyhow::bail!(
                "graphmem.log_level must be one of {:?}, got '{}'",
                LEVELS,
                self.graphmem.log_level
            );
        }

        if self.http_server.enabled && self.http_server.port == 0 {
            anyhow::bail!("http_server.port must be greater than 0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.graphmem.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn write_config(temp_dir: &TempDir, body: &str) -> PathBuf {
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, body).unwrap();
        config_path
    }

    fn with_config_env(config_path: &Path, f: impl FnOnce()) {
        let original = std::env::var("GRAPHMEM_CONFIG").ok();
        std::env::set_var("GRAPHMEM_CONFIG", config_path.to_str().unwrap());
        f();
        match original {
            Some(val) => std::env::set_var("GRAPHMEM_CONFIG", val),
            None => std::env::remove_var("GRAPHMEM_CONFIG"),
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("graph.db");
        let body = format!(
            "[graphmem]\ndb_path = {:?}\nlog_level = \"debug\"\n\n\
             [http_server]\nenabled = true\nport = 9090\n",
            db_path.to_str().unwrap()
        );
        let config_path = write_config(&temp_dir, &body);

        with_config_env(&config_path, || {
            let config = Config::load().expect("config should load");
            assert_eq!(config.graphmem.log_level, "debug");
            assert!(config.http_server.enabled);
            assert_eq!(config.http_server.port, 9090);
            assert_eq!(config.http_server.api_key_env, "GRAPHMEM_API_KEY");
        });
    }

    #[test]
    fn test_config_defaults() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("graph.db");
        let body = format!("[graphmem]\ndb_path = {:?}\n", db_path.to_str().unwrap());
        let config_path = write_config(&temp_dir, &body);

        with_config_env(&config_path, || {
            let config = Config::load().unwrap();
            assert_eq!(config.graphmem.log_level, "info");
            assert!(!config.http_server.enabled);
            assert_eq!(config.http_server.port, 8080);
            assert!(!config.http_server.authless);
        });
    }

    #[test]
    fn test_config_rejects_bad_log_level() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("graph.db");
        let body = format!(
            "[graphmem]\ndb_path = {:?}\nlog_level = \"loud\"\n",
            db_path.to_str().unwrap()
        );
        let config_path = write_config(&temp_dir, &body);

        with_config_env(&config_path, || {
            let err = Config::load().unwrap_err();
            assert!(err.to_string().contains("log_level"));
        });
    }

    #[test]
    fn test_config_rejects_missing_parent_dir() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("no-such-dir").join("graph.db");
        let body = format!("[graphmem]\ndb_path = {:?}\n", db_path.to_str().unwrap());
        let config_path = write_config(&temp_dir, &body);

        with_config_env(&config_path, || {
            let err = Config::load().unwrap_err();
            assert!(err.to_string().contains("parent directory"));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        with_config_env(Path::new("nonexistent.toml"), || {
            assert!(Config::load().is_err());
        });
    }
}
