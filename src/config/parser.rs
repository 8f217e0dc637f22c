use crate::config::types::{AppConfig, FilterSet};
use crate::config::validation::{validate, validate_filters};
use crate::ConfigError;
use std::path::{Path, PathBuf};

/// Environment variable overriding the configured API token
const API_TOKEN_ENV: &str = "TELEMETR_API_TOKEN";

/// Loads and parses the application configuration from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(AppConfig)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let mut config: AppConfig = toml::from_str(&content)?;

    // Environment token takes precedence over the file
    if let Ok(token) = std::env::var(API_TOKEN_ENV) {
        if !token.is_empty() {
            config.site.api_token = Some(token);
        }
    }

    validate(&config)?;

    Ok(config)
}

/// Persistent store for the current filter configuration
///
/// The store is replaced wholesale by the control plane and re-read from disk at
/// the start of every crawl run, so operator edits between runs take effect
/// without a process restart. Nothing is cached here.
#[derive(Debug, Clone)]
pub struct FilterStore {
    path: PathBuf,
}

impl FilterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current filter set from disk
    ///
    /// A missing store is a configuration error: a run must not start before an
    /// operator has saved a filter set at least once.
    pub fn load(&self) -> Result<FilterSet, ConfigError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::Validation(format!(
                    "no filter configuration saved yet (expected {})",
                    self.path.display()
                ))
            } else {
                ConfigError::Io(e)
            }
        })?;

        let filters: FilterSet = toml::from_str(&content)?;
        validate_filters(&filters)?;

        Ok(filters)
    }

    /// Validates and writes a new filter set, replacing any previous one
    pub fn save(&self, filters: &FilterSet) -> Result<(), ConfigError> {
        validate_filters(filters)?;

        let content = toml::to_string_pretty(filters)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, content)?;

        tracing::info!("Filter configuration saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[site]
base-url = "https://telemetr.me"
api-base-url = "https://api.telemetr.me"

[http]
cookie = "PHPSESSID=abc"

[output]
data-dir = "./data"
ledger-path = "./data/processed.db"

[server]
host = "0.0.0.0"
port = 9000
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.site.base_url, "https://telemetr.me");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.http.cookie.as_deref(), Some("PHPSESSID=abc"));
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[site]
base-url = "not a url"

[http]

[output]
data-dir = "./data"
ledger-path = "./data/processed.db"
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn test_filter_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FilterStore::new(dir.path().join("filters.toml"));

        let filters = FilterSet {
            categories: Some(vec!["Авторский блог".to_string()]),
            participants_from: Some(1000),
            participants_to: Some(100_000),
            lang_code: Some("ru".to_string()),
            start_page: 3,
            end_page: Some(5),
            ..Default::default()
        };

        store.save(&filters).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, filters);
    }

    #[test]
    fn test_filter_store_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = FilterStore::new(dir.path().join("filters.toml"));
        assert!(matches!(
            store.load(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_filter_store_rejects_invalid_save() {
        let dir = TempDir::new().unwrap();
        let store = FilterStore::new(dir.path().join("filters.toml"));

        let filters = FilterSet {
            participants_from: Some(10),
            participants_to: Some(5),
            ..Default::default()
        };
        assert!(store.save(&filters).is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_reload_on_read_sees_external_edit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("filters.toml");
        let store = FilterStore::new(&path);

        store.save(&FilterSet::default()).unwrap();
        assert_eq!(store.load().unwrap().start_page, 1);

        // Simulate an operator editing the file between runs
        std::fs::write(&path, "start_page = 7\n").unwrap();
        assert_eq!(store.load().unwrap().start_page, 7);
    }
}
