//! Configuration loading for cahier.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.cahier/config.toml`)
//! 3. User config (`~/.cahier/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. Without any, cahier runs local-only with
//! its stores under the cahier home directory.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CahierError, Result};

/// Default number of due items printed by `cahier due`.
pub const DEFAULT_REVIEW_LIMIT: usize = 50;

/// Main configuration struct for cahier.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Where the document stores live.
    pub storage: StorageConfig,
    /// Cloud identity for this session.
    pub session: SessionConfig,
    /// Review queue presentation.
    pub review: ReviewConfig,
}

/// Store locations. Unset directories resolve under the cahier home.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Device-local store.
    pub local_dir: Option<PathBuf>,
    /// Synced store shared by every device of an identity.
    pub remote_dir: Option<PathBuf>,
}

/// Session identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Signed-in identity; absent means local-only.
    pub identity: Option<String>,
}

/// Review queue settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReviewConfig {
    /// Maximum due items printed at once.
    pub default_limit: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_REVIEW_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration with full precedence chain.
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Load user config from `<cahier_home>/config.toml`.
    fn load_user_config() -> Option<Config> {
        let config_path = cahier_home()?.join("config.toml");
        Self::load_layer(&config_path)
    }

    /// Load project config from `.cahier/config.toml` in the given directory.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        Self::load_layer(&cwd.join(".cahier").join("config.toml"))
    }

    /// A missing file is silently skipped; a broken one is reported.
    fn load_layer(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        match Self::load_from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("Warning: Ignoring config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| CahierError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| CahierError::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // CAHIER_IDENTITY; an empty value signs out
        if let Ok(val) = env::var("CAHIER_IDENTITY") {
            let trimmed = val.trim();
            self.session.identity = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            };
        }

        if let Ok(val) = env::var("CAHIER_LOCAL_DIR") {
            if !val.is_empty() {
                self.storage.local_dir = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = env::var("CAHIER_REMOTE_DIR") {
            if !val.is_empty() {
                self.storage.remote_dir = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = env::var("CAHIER_REVIEW_LIMIT") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => self.review.default_limit = n,
                _ => eprintln!(
                    "Warning: Invalid CAHIER_REVIEW_LIMIT value '{}'. \
                    Expected a positive integer. Using '{}'.",
                    val, self.review.default_limit
                ),
            }
        }
    }

    /// Merge another config into this one field by field.
    ///
    /// Values in `other` override `self` only when they are set (or differ
    /// from the default, for plain values), so each layer only needs to
    /// name its customizations. A layer cannot reset a value to its default.
    fn merge(mut self, other: Config) -> Self {
        if other.storage.local_dir.is_some() {
            self.storage.local_dir = other.storage.local_dir;
        }
        if other.storage.remote_dir.is_some() {
            self.storage.remote_dir = other.storage.remote_dir;
        }
        if other.session.identity.is_some() {
            self.session.identity = other.session.identity;
        }
        if other.review.default_limit != ReviewConfig::default().default_limit {
            self.review.default_limit = other.review.default_limit;
        }
        self
    }

    /// The device-local store directory.
    pub fn local_dir(&self) -> Option<PathBuf> {
        self.storage
            .local_dir
            .clone()
            .or_else(|| cahier_home().map(|h| h.join("local")))
    }

    /// The synced store directory.
    pub fn remote_dir(&self) -> Option<PathBuf> {
        self.storage
            .remote_dir
            .clone()
            .or_else(|| cahier_home().map(|h| h.join("remote")))
    }
}

/// Get the cahier home directory.
///
/// Checks `CAHIER_HOME` first, then falls back to `~/.cahier`. An empty
/// `CAHIER_HOME` is ignored.
pub fn cahier_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("CAHIER_HOME") {
        if home.is_empty() {
            tracing::warn!("CAHIER_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("CAHIER_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".cahier"));
    }

    // Containerized/minimal environments without HOME
    let fallback_path = env::temp_dir().join("cahier");
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback_path.display()
    );
    Some(fallback_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "CAHIER_HOME",
        "CAHIER_IDENTITY",
        "CAHIER_LOCAL_DIR",
        "CAHIER_REMOTE_DIR",
        "CAHIER_REVIEW_LIMIT",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            env::remove_var(var);
        }
    }

    /// Point CAHIER_HOME at an empty temp dir so the real user config is not read.
    fn isolated_home() -> TempDir {
        clear_env();
        let home = TempDir::new().unwrap();
        env::set_var("CAHIER_HOME", home.path());
        home
    }

    fn write_project_config(dir: &Path, content: &str) {
        let cahier_dir = dir.join(".cahier");
        fs::create_dir_all(&cahier_dir).unwrap();
        fs::write(cahier_dir.join("config.toml"), content).unwrap();
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.storage.local_dir.is_none());
        assert!(config.storage.remote_dir.is_none());
        assert!(config.session.identity.is_none());
        assert_eq!(config.review.default_limit, 50);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[storage]
local_dir = "/data/local"

[session]
identity = "ana"

[review]
default_limit = 20
"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.storage.local_dir, Some(PathBuf::from("/data/local")));
        assert!(config.storage.remote_dir.is_none());
        assert_eq!(config.session.identity.as_deref(), Some("ana"));
        assert_eq!(config.review.default_limit, 20);
    }

    #[test]
    fn test_load_from_file_missing() {
        let dir = TempDir::new().unwrap();
        let result = Config::load_from_file(&dir.path().join("nope.toml"));
        assert!(matches!(result, Err(CahierError::Storage { .. })));
    }

    #[test]
    fn test_load_from_file_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(
            Config::load_from_file(&path),
            Err(CahierError::Config { .. })
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[session]\nidentity = \"bo\"\n").unwrap();
        assert_eq!(config.session.identity.as_deref(), Some("bo"));
        assert_eq!(config.review.default_limit, DEFAULT_REVIEW_LIMIT);
    }

    #[test]
    fn test_merge_field_by_field() {
        let user = Config {
            storage: StorageConfig {
                local_dir: Some(PathBuf::from("/user/local")),
                remote_dir: Some(PathBuf::from("/user/remote")),
            },
            review: ReviewConfig { default_limit: 10 },
            ..Default::default()
        };
        let project = Config {
            storage: StorageConfig {
                local_dir: Some(PathBuf::from("/project/local")),
                remote_dir: None,
            },
            session: SessionConfig {
                identity: Some("ana".to_string()),
            },
            ..Default::default()
        };

        let merged = Config::default().merge(user).merge(project);
        assert_eq!(merged.storage.local_dir, Some(PathBuf::from("/project/local")));
        assert_eq!(merged.storage.remote_dir, Some(PathBuf::from("/user/remote")));
        assert_eq!(merged.session.identity.as_deref(), Some("ana"));
        assert_eq!(merged.review.default_limit, 10);
    }

    #[test]
    #[serial]
    fn test_project_config_precedence() {
        let home = isolated_home();
        fs::write(
            home.path().join("config.toml"),
            "[review]\ndefault_limit = 5\n[session]\nidentity = \"user\"\n",
        )
        .unwrap();
        let project = TempDir::new().unwrap();
        write_project_config(project.path(), "[session]\nidentity = \"project\"\n");

        let config = Config::load_from_cwd(project.path());
        assert_eq!(config.session.identity.as_deref(), Some("project"));
        assert_eq!(config.review.default_limit, 5);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_var_precedence() {
        let _home = isolated_home();
        let project = TempDir::new().unwrap();
        write_project_config(
            project.path(),
            "[session]\nidentity = \"project\"\n[review]\ndefault_limit = 7\n",
        );

        env::set_var("CAHIER_IDENTITY", "env-user");
        env::set_var("CAHIER_REVIEW_LIMIT", "12");
        env::set_var("CAHIER_LOCAL_DIR", "/env/local");
        env::set_var("CAHIER_REMOTE_DIR", "/env/remote");

        let config = Config::load_from_cwd(project.path());
        assert_eq!(config.session.identity.as_deref(), Some("env-user"));
        assert_eq!(config.review.default_limit, 12);
        assert_eq!(config.local_dir(), Some(PathBuf::from("/env/local")));
        assert_eq!(config.remote_dir(), Some(PathBuf::from("/env/remote")));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_empty_identity_env_signs_out() {
        let _home = isolated_home();
        let project = TempDir::new().unwrap();
        write_project_config(project.path(), "[session]\nidentity = \"project\"\n");
        env::set_var("CAHIER_IDENTITY", "  ");

        let config = Config::load_from_cwd(project.path());
        assert!(config.session.identity.is_none());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_var_invalid_limit_ignored() {
        let _home = isolated_home();
        let project = TempDir::new().unwrap();

        for bad in ["zero", "0", "-3"] {
            env::set_var("CAHIER_REVIEW_LIMIT", bad);
            let config = Config::load_from_cwd(project.path());
            assert_eq!(config.review.default_limit, DEFAULT_REVIEW_LIMIT, "{}", bad);
        }

        clear_env();
    }

    #[test]
    #[serial]
    fn test_broken_project_config_is_skipped() {
        let _home = isolated_home();
        let project = TempDir::new().unwrap();
        write_project_config(project.path(), "[review\n");

        let config = Config::load_from_cwd(project.path());
        assert_eq!(config, Config::default());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_store_dirs_default_under_home() {
        let home = isolated_home();
        let config = Config::default();
        assert_eq!(config.local_dir(), Some(home.path().join("local")));
        assert_eq!(config.remote_dir(), Some(home.path().join("remote")));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_cahier_home_with_env() {
        clear_env();
        let dir = TempDir::new().unwrap();
        env::set_var("CAHIER_HOME", dir.path());

        assert_eq!(cahier_home().unwrap(), dir.path());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_cahier_home_empty_env_falls_back() {
        clear_env();
        env::set_var("CAHIER_HOME", "");

        let home = cahier_home().unwrap();
        assert!(home.ends_with(".cahier") || home.ends_with("cahier"));

        clear_env();
    }
}
