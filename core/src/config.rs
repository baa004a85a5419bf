//! Configuration Management Module
//!
//! Platform-wide defaults (project, location, staging bucket, credentials)
//! with file-based loading and environment variable overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::credentials::{Credentials, ACCESS_TOKEN_ENV};
use crate::error::{Error, Result};

/// Location used when none is configured
pub const DEFAULT_LOCATION: &str = "us-central1";
/// Metadata store used when none is configured
pub const DEFAULT_METADATA_STORE: &str = "default";
/// Cloud Storage JSON API endpoint
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl Default for ConfigFormat {
    fn default() -> Self {
        ConfigFormat::Toml
    }
}

impl std::str::FromStr for ConfigFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(Error::Config(format!("Unsupported config format: {}", s))),
        }
    }
}

/// Shared platform configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub project: Option<String>,
    pub location: String,
    #[serde(skip)]
    pub credentials: Option<Credentials>,
    /// `gs://` bucket for transient uploads
    pub staging_bucket: Option<String>,
    pub experiment: Option<String>,
    pub experiment_description: Option<String>,
    /// Cloud KMS key protecting created resources
    pub encryption_spec_key_name: Option<String>,
    /// Overrides `https://{location}-aiplatform.googleapis.com`
    pub api_endpoint: Option<String>,
    pub storage_endpoint: String,
    pub metadata_store_id: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            project: None,
            location: DEFAULT_LOCATION.to_string(),
            credentials: None,
            staging_bucket: None,
            experiment: None,
            experiment_description: None,
            encryption_spec_key_name: None,
            api_endpoint: None,
            storage_endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
            metadata_store_id: DEFAULT_METADATA_STORE.to_string(),
        }
    }
}

/// Overrides accepted by [`GlobalConfig::init`]
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub project: Option<String>,
    pub location: Option<String>,
    pub credentials: Option<Credentials>,
    pub staging_bucket: Option<String>,
    pub experiment: Option<String>,
    pub experiment_description: Option<String>,
    pub encryption_spec_key_name: Option<String>,
    pub api_endpoint: Option<String>,
    pub storage_endpoint: Option<String>,
    pub metadata_store_id: Option<String>,
}

impl GlobalConfig {
    /// Apply the fields set in `options`, leaving the rest untouched
    pub fn init(&mut self, options: InitOptions) {
        if let Some(project) = options.project {
            self.project = Some(project);
        }
        if let Some(location) = options.location {
            self.location = location;
        }
        if let Some(credentials) = options.credentials {
            self.credentials = Some(credentials);
        }
        if let Some(bucket) = options.staging_bucket {
            self.staging_bucket = Some(bucket);
        }
        if let Some(experiment) = options.experiment {
            self.experiment = Some(experiment);
        }
        if let Some(description) = options.experiment_description {
            self.experiment_description = Some(description);
        }
        if let Some(key) = options.encryption_spec_key_name {
            self.encryption_spec_key_name = Some(key);
        }
        if let Some(endpoint) = options.api_endpoint {
            self.api_endpoint = Some(endpoint);
        }
        if let Some(endpoint) = options.storage_endpoint {
            self.storage_endpoint = endpoint;
        }
        if let Some(store) = options.metadata_store_id {
            self.metadata_store_id = store;
        }
        debug!("Initialized global config for project {:?}", self.project);
    }

    /// Resolve the project/location/credentials a call runs under
    ///
    /// Explicit values win over the configured ones.
    pub fn resolve_scope(
        &self,
        project: Option<String>,
        location: Option<String>,
        credentials: Option<Credentials>,
    ) -> Result<ResourceScope> {
        let project = project
            .or_else(|| self.project.clone())
            .ok_or(Error::MissingConfig("project"))?;

        Ok(ResourceScope {
            project,
            location: location.unwrap_or_else(|| self.location.clone()),
            credentials: credentials.or_else(|| self.credentials.clone()),
        })
    }

    /// Base URL of the Vertex AI API for a location
    pub fn api_base_url(&self, location: &str) -> String {
        api_base_url(self.api_endpoint.as_deref(), location)
    }
}

/// Base URL of the Vertex AI API, honouring an endpoint override
pub fn api_base_url(endpoint: Option<&str>, location: &str) -> String {
    match endpoint {
        Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
        None => format!("https://{}-aiplatform.googleapis.com", location),
    }
}

/// Project, location and credentials of a single call
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceScope {
    pub project: String,
    pub location: String,
    pub credentials: Option<Credentials>,
}

impl ResourceScope {
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.location)
    }
}

/// Configuration manager
#[derive(Debug)]
pub struct ConfigManager {
    config_file: PathBuf,
    config_format: ConfigFormat,
    config: GlobalConfig,
}

impl ConfigManager {
    /// Load the configuration from the default location
    ///
    /// The first of `config.toml`, `config.json`, `config.yaml` and
    /// `config.yml` found is read; none existing leaves the defaults.
    pub fn new() -> Result<Self> {
        let base_path = Self::get_config_dir()?.join("vertexkit").join("config");
        let (config_file, config_format) = Self::detect_config_file(&base_path);

        let mut manager = Self {
            config_file,
            config_format,
            config: GlobalConfig::default(),
        };

        if manager.config_exists() {
            manager.load_config()?;
        }
        manager.apply_env_overrides();

        Ok(manager)
    }

    /// Load the configuration from an explicit file
    ///
    /// The format follows the extension (TOML when there is none). The file
    /// must exist.
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut manager = Self::at_path(path)?;

        if !manager.config_exists() {
            return Err(Error::Config(format!(
                "Configuration file not found: {}",
                manager.config_file.display()
            )));
        }
        manager.load_config()?;
        manager.apply_env_overrides();

        Ok(manager)
    }

    /// Manager for `path` holding the default configuration, without reading it
    pub fn at_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_format = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => ext.parse()?,
            None => ConfigFormat::default(),
        };

        Ok(Self {
            config_file: path.to_path_buf(),
            config_format,
            config: GlobalConfig::default(),
        })
    }

    fn get_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    fn detect_config_file(base_path: &Path) -> (PathBuf, ConfigFormat) {
        let candidates = [
            ("toml", ConfigFormat::Toml),
            ("json", ConfigFormat::Json),
            ("yaml", ConfigFormat::Yaml),
            ("yml", ConfigFormat::Yaml),
        ];

        candidates
            .into_iter()
            .map(|(ext, format)| (base_path.with_extension(ext), format))
            .find(|(path, _)| path.exists())
            .unwrap_or_else(|| (base_path.with_extension("toml"), ConfigFormat::Toml))
    }

    pub fn config_exists(&self) -> bool {
        self.config_file.is_file()
    }

    pub fn get_config_file_path(&self) -> PathBuf {
        self.config_file.clone()
    }

    /// Load configuration from file
    pub fn load_config(&mut self) -> Result<()> {
        let content = fs::read_to_string(&self.config_file)?;

        self.config = match self.config_format {
            ConfigFormat::Toml => toml::from_str(&content)?,
            ConfigFormat::Json => serde_json::from_str(&content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(&content)?,
        };

        info!("Loaded configuration from {:?}", self.config_file);
        Ok(())
    }

    /// Save configuration to file
    pub fn save_config(&self) -> Result<()> {
        if let Some(parent) = self.config_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = match self.config_format {
            ConfigFormat::Toml => toml::to_string_pretty(&self.config)?,
            ConfigFormat::Json => serde_json::to_string_pretty(&self.config)?,
            ConfigFormat::Yaml => serde_yaml::to_string(&self.config)?,
        };

        fs::write(&self.config_file, content)?;

        info!("Saved configuration to {:?}", self.config_file);
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(project) = lookup("VERTEXKIT_PROJECT").or_else(|| lookup("GOOGLE_CLOUD_PROJECT")) {
            self.config.project = Some(project);
            debug!("Applied env override for project");
        }

        if let Some(location) = lookup("VERTEXKIT_LOCATION") {
            self.config.location = location;
            debug!("Applied env override for location");
        }

        if let Some(bucket) = lookup("VERTEXKIT_STAGING_BUCKET") {
            self.config.staging_bucket = Some(bucket);
            debug!("Applied env override for staging bucket");
        }

        if let Some(experiment) = lookup("VERTEXKIT_EXPERIMENT") {
            self.config.experiment = Some(experiment);
            debug!("Applied env override for experiment");
        }

        if let Some(endpoint) = lookup("VERTEXKIT_API_ENDPOINT") {
            self.config.api_endpoint = Some(endpoint);
            debug!("Applied env override for API endpoint");
        }

        if let Some(endpoint) = lookup("VERTEXKIT_STORAGE_ENDPOINT") {
            self.config.storage_endpoint = endpoint;
            debug!("Applied env override for storage endpoint");
        }

        if let Some(token) = lookup(ACCESS_TOKEN_ENV) {
            self.config.credentials = Some(Credentials::from_access_token(token));
            debug!("Applied env override for credentials");
        }
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut GlobalConfig {
        &mut self.config
    }

    pub fn into_config(self) -> GlobalConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_format_from_str() {
        assert_eq!("yml".parse::<ConfigFormat>().unwrap(), ConfigFormat::Yaml);
        assert_eq!("TOML".parse::<ConfigFormat>().unwrap(), ConfigFormat::Toml);
        assert!("ini".parse::<ConfigFormat>().is_err());
    }

    #[test]
    fn test_init_only_overrides_given_fields() {
        let mut config = GlobalConfig {
            project: Some("first".to_string()),
            staging_bucket: Some("gs://keep".to_string()),
            ..Default::default()
        };

        config.init(InitOptions {
            project: Some("second".to_string()),
            location: Some("europe-west4".to_string()),
            ..Default::default()
        });

        assert_eq!(config.project.as_deref(), Some("second"));
        assert_eq!(config.location, "europe-west4");
        assert_eq!(config.staging_bucket.as_deref(), Some("gs://keep"));
        assert_eq!(config.metadata_store_id, DEFAULT_METADATA_STORE);
    }

    #[test]
    fn test_resolve_scope_prefers_explicit_values() {
        let config = GlobalConfig {
            project: Some("configured".to_string()),
            credentials: Some(Credentials::from_access_token("global")),
            ..Default::default()
        };

        let scope = config
            .resolve_scope(Some("explicit".to_string()), None, None)
            .unwrap();
        assert_eq!(scope.project, "explicit");
        assert_eq!(scope.location, DEFAULT_LOCATION);
        assert_eq!(scope.credentials.unwrap().access_token(), "global");
        assert_eq!(
            ResourceScope {
                project: "p".to_string(),
                location: "l".to_string(),
                credentials: None
            }
            .parent(),
            "projects/p/locations/l"
        );
    }

    #[test]
    fn test_resolve_scope_requires_project() {
        let err = GlobalConfig::default()
            .resolve_scope(None, None, None)
            .unwrap_err();
        assert!(matches!(err, Error::MissingConfig("project")));
    }

    #[test]
    fn test_api_base_url() {
        let mut config = GlobalConfig::default();
        assert_eq!(
            config.api_base_url("us-central1"),
            "https://us-central1-aiplatform.googleapis.com"
        );

        config.api_endpoint = Some("http://127.0.0.1:8080/".to_string());
        assert_eq!(config.api_base_url("us-central1"), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GOOGLE_CLOUD_PROJECT", "fallback-project"),
            ("VERTEXKIT_LOCATION", "asia-east1"),
            ("VERTEXKIT_STAGING_BUCKET", "gs://staging"),
            ("VERTEXKIT_EXPERIMENT", ""),
            (ACCESS_TOKEN_ENV, "token"),
        ]
        .into_iter()
        .collect();

        let mut manager = ConfigManager::at_path("unused.toml").unwrap();
        manager.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        let config = manager.config();
        assert_eq!(config.project.as_deref(), Some("fallback-project"));
        assert_eq!(config.location, "asia-east1");
        assert_eq!(config.staging_bucket.as_deref(), Some("gs://staging"));
        assert_eq!(config.experiment, None);
        assert_eq!(config.credentials.as_ref().unwrap().access_token(), "token");
    }

    #[test]
    fn test_save_and_load_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");

        let mut manager = ConfigManager::at_path(&path).unwrap();
        manager.config_mut().project = Some("from-file".to_string());
        manager.config_mut().staging_bucket = Some("gs://bucket".to_string());
        manager.save_config().unwrap();
        assert!(path.exists());

        let mut reloaded = ConfigManager::at_path(&path).unwrap();
        reloaded.load_config().unwrap();
        assert_eq!(reloaded.config().project.as_deref(), Some("from-file"));
        assert_eq!(reloaded.config().location, DEFAULT_LOCATION);
    }

    #[test]
    fn test_with_path_reads_the_given_file() {
        let dir = tempfile::tempdir().unwrap();

        let yml = dir.path().join("settings.yml");
        fs::write(&yml, "metadata_store_id: from-yml\n").unwrap();
        let manager = ConfigManager::with_path(&yml).unwrap();
        assert_eq!(manager.get_config_file_path(), yml);
        assert_eq!(manager.config_format, ConfigFormat::Yaml);
        assert_eq!(manager.config().metadata_store_id, "from-yml");

        let bare = dir.path().join("myconf");
        fs::write(&bare, "metadata_store_id = \"from-bare\"\n").unwrap();
        let manager = ConfigManager::with_path(&bare).unwrap();
        assert_eq!(manager.get_config_file_path(), bare);
        assert_eq!(manager.config().metadata_store_id, "from-bare");
    }

    #[test]
    fn test_with_path_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigManager::with_path(dir.path().join("missing.yml")).unwrap_err();
        assert!(matches!(err, Error::Config(ref message) if message.contains("missing.yml")));
    }

    #[test]
    fn test_toml_config_uses_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "project = \"toml-project\"\nlocation = \"europe-west1\"\n").unwrap();

        let mut manager = ConfigManager::at_path(&path).unwrap();
        manager.load_config().unwrap();

        assert_eq!(manager.config().project.as_deref(), Some("toml-project"));
        assert_eq!(manager.config().location, "europe-west1");
        assert_eq!(manager.config().storage_endpoint, DEFAULT_STORAGE_ENDPOINT);
    }

    #[test]
    fn test_invalid_toml_is_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "project = \n").unwrap();

        let mut manager = ConfigManager::at_path(&path).unwrap();
        assert!(matches!(manager.load_config(), Err(Error::Toml(_))));
    }
}
