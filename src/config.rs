use crate::error::{BibliotecaError, Result};
use crate::google_books::DEFAULT_SEARCH_URL;
use crate::sync::{DEFAULT_FRESHNESS_MS, DEFAULT_POLL_INTERVAL_MS};
use etcetera::{app_strategy, AppStrategy, AppStrategyArgs};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "biblioteca.toml";

fn strategy() -> Result<app_strategy::Xdg> {
    app_strategy::Xdg::new(AppStrategyArgs {
        top_level_domain: "br".to_string(),
        author: "minhabiblioteca".to_string(),
        app_name: "biblioteca".to_string(),
    })
    .map_err(|err| BibliotecaError::Config {
        message: format!("home directory not found: {}", err),
    })
}

pub fn get_config_dir() -> Result<PathBuf> {
    Ok(strategy()?.config_dir())
}

pub fn get_data_dir() -> Result<PathBuf> {
    Ok(strategy()?.data_dir())
}

pub fn get_cache_dir() -> Result<PathBuf> {
    Ok(strategy()?.cache_dir())
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub search_url: String,
    pub search_max_results: u32,
    pub http_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub marker_freshness_ms: i64,
    pub storage_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: "https://tcc-back-2025.vercel.app".to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            search_max_results: 20,
            http_timeout_secs: 10,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            marker_freshness_ms: DEFAULT_FRESHNESS_MS,
            storage_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reads `path`, or the default config file; a missing default file is
    /// created with default values when possible.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let dir = get_config_dir()?;
        let file = dir.join(CONFIG_FILE_NAME);
        if file.exists() {
            return Self::from_file(&file);
        }
        let config = Config::default();
        if std::fs::create_dir_all(&dir).is_ok() {
            if let Ok(contents) = toml::to_string_pretty(&config) {
                drop(std::fs::write(&file, contents));
            }
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path).map_err(|err| BibliotecaError::Config {
            message: format!("cannot read {}: {}", path.display(), err),
        })?;
        Self::parse(&contents).map_err(|err| match err {
            BibliotecaError::Config { message } => BibliotecaError::Config {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })
    }

    pub fn parse(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents).map_err(|err| BibliotecaError::Config {
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(BibliotecaError::Config {
                message: "api_base_url must not be empty".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(BibliotecaError::Config {
                message: "poll_interval_ms must be positive".to_string(),
            });
        }
        self.level()?;
        Ok(())
    }

    pub fn level(&self) -> Result<log::LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| BibliotecaError::Config {
                message: format!("unknown log_level {}", self.log_level),
            })
    }

    pub fn storage_path(&self) -> Result<PathBuf> {
        match &self.storage_path {
            Some(path) => Ok(path.clone()),
            None => Ok(get_data_dir()?.join("storage.db")),
        }
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        Ok(get_cache_dir()?.join("biblioteca.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::path::PathBuf;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let config = Config::parse(
            r#"
            api_base_url = "http://localhost:3000"
            poll_interval_ms = 1000
            storage_path = "/tmp/biblioteca.db"
            "#,
        )
        .expect("config");
        assert_eq!(config.api_base_url, "http://localhost:3000");
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.marker_freshness_ms, 5000);
        assert_eq!(config.search_max_results, 20);
        assert_eq!(config.storage_path().unwrap(), PathBuf::from("/tmp/biblioteca.db"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::parse("poll_interval_ms = 0").is_err());
        assert!(Config::parse("log_level = \"chatty\"").is_err());
        assert!(Config::parse("api_base_url = 3").is_err());
    }

    #[test]
    fn default_config_survives_a_toml_round_trip() {
        let written = toml::to_string_pretty(&Config::default()).expect("toml");
        assert_eq!(Config::parse(&written).expect("config"), Config::default());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "log_level = \"debug\"\n").unwrap();
        let config = Config::load(Some(&path)).expect("config");
        assert_eq!(config.level().unwrap(), log::LevelFilter::Debug);
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
