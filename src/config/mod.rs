//! Configuration module

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Directory holding config, store and schema
pub const CONFIG_DIR: &str = ".memtree";

pub const CONFIG_FILE: &str = "config.toml";
pub const STORE_FILE: &str = "memory_tree.json";
pub const SCHEMA_FILE: &str = "schema.json";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    /// Directory of the file this config was read from
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Store file; relative paths resolve against the config directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Schema used to seed a fresh store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<PathBuf>,
}

/// Chat-completions endpoint used by the oracles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Bearer token; prefer MEMTREE_API_KEY over writing it here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load config from an explicit file or the default locations, then
    /// apply environment overrides
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load config from default locations
    pub fn load() -> Result<Self> {
        if let Some(local) = Self::find_local_config() {
            return Self::load_from(&local);
        }

        if let Some(global) = Self::global_config_path() {
            if global.exists() {
                return Self::load_from(&global);
            }
        }

        Ok(Self::default())
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply MEMTREE_STORE, MEMTREE_SCHEMA and MEMTREE_API_KEY.
    ///
    /// Relative paths from the environment resolve against the current
    /// directory, not the config directory.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(store) = lookup("MEMTREE_STORE").filter(|v| !v.is_empty()) {
            self.store.path = Some(from_cwd(store));
        }
        if let Some(schema) = lookup("MEMTREE_SCHEMA").filter(|v| !v.is_empty()) {
            self.store.schema = Some(from_cwd(schema));
        }
        if let Some(key) = lookup("MEMTREE_API_KEY").filter(|v| !v.is_empty()) {
            self.oracle.api_key = Some(key);
        }
    }

    /// Find local .memtree/config.toml walking up directories
    pub fn find_local_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Global directory (~/.memtree)
    pub fn global_dir() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(CONFIG_DIR))
    }

    /// Get global config path (~/.memtree/config.toml)
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    /// Directory default files live in: the loaded config's directory,
    /// else ~/.memtree, else ./.memtree
    pub fn home(&self) -> PathBuf {
        self.base_dir
            .clone()
            .or_else(Self::global_dir)
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR))
    }

    /// Store file path
    pub fn store_path(&self) -> PathBuf {
        self.resolve_path(self.store.path.as_deref(), STORE_FILE)
    }

    /// Schema file path
    pub fn schema_path(&self) -> PathBuf {
        self.resolve_path(self.store.schema.as_deref(), SCHEMA_FILE)
    }

    fn resolve_path(&self, configured: Option<&Path>, default_name: &str) -> PathBuf {
        match configured {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => match self.base_dir {
                Some(ref base) => base.join(path),
                None => path.to_path_buf(),
            },
            None => self.home().join(default_name),
        }
    }
}

fn from_cwd(value: String) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.oracle.base_url, "https://api.openai.com/v1");
        assert_eq!(config.oracle.timeout_secs, 30);
        assert!(config.oracle.api_key.is_none());
        assert!(config.store.path.is_none());
    }

    #[test]
    fn test_load_resolves_relative_paths_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
[store]
path = "data/tree.json"

[oracle]
model = "local-model"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.store_path(), dir.path().join("data/tree.json"));
        assert_eq!(config.schema_path(), dir.path().join(SCHEMA_FILE));
        assert_eq!(config.oracle.model, "local-model");
        assert_eq!(config.oracle.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = Config::default();
        config.oracle.base_url = "http://localhost:11434/v1".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.oracle.base_url, "http://localhost:11434/v1");
        assert_eq!(loaded.home(), dir.path().join("nested"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "MEMTREE_STORE" => Some("/tmp/store.json".to_string()),
            "MEMTREE_API_KEY" => Some("sk-test".to_string()),
            "MEMTREE_SCHEMA" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.store_path(), PathBuf::from("/tmp/store.json"));
        assert_eq!(config.oracle.api_key.as_deref(), Some("sk-test"));
        assert!(config.store.schema.is_none());
    }

    #[test]
    fn test_relative_env_paths_resolve_against_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[store]\npath = \"tree.json\"\n").unwrap();

        let mut config = Config::load_from(&path).unwrap();
        assert_eq!(config.store_path(), dir.path().join("tree.json"));

        config.apply_overrides(|key| match key {
            "MEMTREE_STORE" => Some("data/store.json".to_string()),
            "MEMTREE_SCHEMA" => Some("schema/custom.json".to_string()),
            _ => None,
        });

        let cwd = std::env::current_dir().unwrap();
        assert_eq!(config.store_path(), cwd.join("data/store.json"));
        assert_eq!(config.schema_path(), cwd.join("schema/custom.json"));
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[oracle\nmodel =").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
