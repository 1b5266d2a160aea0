//! Engine configuration.
//!
//! Loaded once at startup, shared behind an `Arc` and never mutated.

use std::path::Path;

use edge_core::header_pair;
use edge_observability::LoggingConfig;
use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_STORAGE_CACHE_CONTROL;
use crate::headers::header_names;
use crate::key::DEFAULT_VERSION_PARAM;
use crate::version::DEFAULT_VERSION_KEY;

/// Default advertisement sent to the origin.
pub const DEFAULT_ADVERTISED_SUPPORT: &str = "supports=cache|purgeall|bypass-cookies";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to serialize TOML config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {value:?}")]
    InvalidHeaderValue { field: &'static str, value: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Header added to every response leaving the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessHeader {
    /// Whether the header is added at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Header name.
    #[serde(default = "default_liveness_name")]
    pub name: String,
    /// Header value.
    #[serde(default = "default_liveness_value")]
    pub value: String,
}

impl LivenessHeader {
    /// An enabled liveness header.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            enabled: true,
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Default for LivenessHeader {
    fn default() -> Self {
        Self::new(default_liveness_name(), default_liveness_value())
    }
}

/// Edge cache configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeCacheConfig {
    /// Cookie prefixes that bypass the cache when the origin sends no list.
    #[serde(default = "default_bypass_prefixes")]
    pub default_bypass_prefixes: Vec<String>,

    /// Value of `x-HTML-Edge-Cache` on requests sent to the origin.
    #[serde(default = "default_advertised_support")]
    pub advertised_support: String,

    /// Counter store key holding the cache version.
    #[serde(default = "default_version_key")]
    pub version_key: String,

    /// Query parameter carrying the version in cache keys.
    #[serde(default = "default_version_param")]
    pub version_param: String,

    /// `Cache-Control` written on stored entries.
    #[serde(default = "default_storage_cache_control")]
    pub storage_cache_control: String,

    /// Pass image requests straight through.
    #[serde(default = "default_true")]
    pub skip_image_requests: bool,

    /// Pass through requests that already carry `x-HTML-Edge-Cache`.
    #[serde(default = "default_true")]
    pub respect_upstream_edge_cache: bool,

    /// Marker header added to every response.
    #[serde(default)]
    pub liveness_header: LivenessHeader,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_bypass_prefixes() -> Vec<String> {
    ["wp-", "wordpress", "comment_", "woocommerce_"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_advertised_support() -> String {
    DEFAULT_ADVERTISED_SUPPORT.to_string()
}

fn default_version_key() -> String {
    DEFAULT_VERSION_KEY.to_string()
}

fn default_version_param() -> String {
    DEFAULT_VERSION_PARAM.to_string()
}

fn default_storage_cache_control() -> String {
    DEFAULT_STORAGE_CACHE_CONTROL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_liveness_name() -> String {
    "X-Worker-Status".to_string()
}

fn default_liveness_value() -> String {
    "Active".to_string()
}

impl Default for EdgeCacheConfig {
    fn default() -> Self {
        Self {
            default_bypass_prefixes: default_bypass_prefixes(),
            advertised_support: default_advertised_support(),
            version_key: default_version_key(),
            version_param: default_version_param(),
            storage_cache_control: default_storage_cache_control(),
            skip_image_requests: true,
            respect_upstream_edge_cache: true,
            liveness_header: LivenessHeader::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EdgeCacheConfig {
    /// Defaults for a Node.js origin.
    pub fn nodejs_defaults() -> Self {
        Self {
            default_bypass_prefixes: ["wp-", "nodejs", "comment_", "shop_"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..Self::default()
        }
    }

    /// Set the default bypass prefixes.
    pub fn with_bypass_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.default_bypass_prefixes = prefixes;
        self
    }

    /// Set the liveness header.
    pub fn with_liveness_header(mut self, header: LivenessHeader) -> Self {
        self.liveness_header = header;
        self
    }

    /// Stop tagging responses with the liveness header.
    pub fn without_liveness_header(mut self) -> Self {
        self.liveness_header.enabled = false;
        self
    }

    /// The liveness header, if enabled.
    pub fn liveness(&self) -> Option<&LivenessHeader> {
        Some(&self.liveness_header).filter(|header| header.enabled)
    }

    /// Load config from a file. `.json` files are JSON, anything else TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to a file in the format its extension implies.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };

        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// Check that every value can be used on the wire.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.advertised_support.trim().is_empty() {
            return Err(ConfigError::Invalid("advertised_support must not be empty".to_string()));
        }
        header_pair(header_names::EDGE_CACHE, &self.advertised_support).map_err(|_| {
            ConfigError::InvalidHeaderValue {
                field: "advertised_support",
                value: self.advertised_support.clone(),
            }
        })?;

        if self.version_key.trim().is_empty() {
            return Err(ConfigError::Invalid("version_key must not be empty".to_string()));
        }

        if self.version_param.is_empty()
            || self
                .version_param
                .contains(|c: char| matches!(c, '=' | '&' | '?' | '#'))
        {
            return Err(ConfigError::Invalid(format!(
                "version_param {:?} must be a bare query parameter name",
                self.version_param
            )));
        }

        if let Some(prefix) = self
            .default_bypass_prefixes
            .iter()
            .find(|p| p.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "default_bypass_prefixes contains an empty prefix {:?}",
                prefix
            )));
        }

        crate::codec::EntryCodec::new(&self.storage_cache_control)?;

        if let Some(liveness) = self.liveness() {
            header_pair(&liveness.name, &liveness.value).map_err(|err| {
                ConfigError::Invalid(format!("liveness_header: {}", err))
            })?;
        }

        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Generate a default edge-cache.toml config file.
pub fn generate_default_config(prefixes: &[String]) -> String {
    let prefixes = prefixes
        .iter()
        .map(|p| format!("{:?}", p))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"# HTML edge cache configuration

# Cookie prefixes that skip the cache unless the origin sends its own
# list with `x-HTML-Edge-Cache: bypass-cookies=...`.
default_bypass_prefixes = [{prefixes}]

# Sent to the origin so it knows which directives are understood.
advertised_support = "{support}"

# Counter store key and cache key query parameter.
version_key = "{version_key}"
version_param = "{version_param}"

# Freshness header written on stored entries.
storage_cache_control = "{storage}"

skip_image_requests = true
respect_upstream_edge_cache = true

[liveness_header]
enabled = true
name = "X-Worker-Status"
value = "Active"

[logging]
level = "info"
format = "human"
"#,
        prefixes = prefixes,
        support = DEFAULT_ADVERTISED_SUPPORT,
        version_key = DEFAULT_VERSION_KEY,
        version_param = DEFAULT_VERSION_PARAM,
        storage = DEFAULT_STORAGE_CACHE_CONTROL,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_observability::{LogFormat, LogLevel};

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("edge-cache-config-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_defaults() {
        let config = EdgeCacheConfig::default();

        assert_eq!(
            config.default_bypass_prefixes,
            vec!["wp-", "wordpress", "comment_", "woocommerce_"]
        );
        assert_eq!(config.advertised_support, "supports=cache|purgeall|bypass-cookies");
        assert_eq!(config.version_key, "html_cache_version");
        assert_eq!(config.version_param, "cf_edge_cache_ver");
        assert_eq!(config.liveness(), Some(&LivenessHeader::default()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nodejs_defaults() {
        let config = EdgeCacheConfig::nodejs_defaults();
        assert_eq!(config.default_bypass_prefixes, vec!["wp-", "nodejs", "comment_", "shop_"]);
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let defaults = EdgeCacheConfig::default();
        let text = generate_default_config(&defaults.default_bypass_prefixes);
        let parsed: EdgeCacheConfig = toml::from_str(&text).unwrap();

        assert_eq!(parsed, defaults);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: EdgeCacheConfig = toml::from_str(
            r#"
default_bypass_prefixes = ["sess_"]

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();

        assert_eq!(parsed.default_bypass_prefixes, vec!["sess_"]);
        assert_eq!(parsed.version_key, "html_cache_version");
        assert_eq!(parsed.logging.level, LogLevel::Debug);
        assert_eq!(parsed.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = EdgeCacheConfig {
            version_param: "ver=1".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let prefixes = vec!["wp-".to_string(), " ".to_string()];
        let config = EdgeCacheConfig::default().with_bypass_prefixes(prefixes);
        assert!(config.validate().is_err());

        let config =
            EdgeCacheConfig::default().with_liveness_header(LivenessHeader::new("bad name", "x"));
        assert!(config.validate().is_err());

        let config = EdgeCacheConfig {
            advertised_support: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_toml() {
        let path = temp_path("roundtrip.toml");
        let config = EdgeCacheConfig::nodejs_defaults().without_liveness_header();

        config.save(&path).unwrap();
        let loaded = EdgeCacheConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
        assert_eq!(loaded.liveness(), None);
    }

    #[test]
    fn test_disabled_liveness_header_parses() {
        let parsed: EdgeCacheConfig = toml::from_str(
            r#"
[liveness_header]
enabled = false
"#,
        )
        .unwrap();

        assert_eq!(parsed.liveness(), None);
        assert_eq!(parsed.liveness_header.name, "X-Worker-Status");

        let parsed: EdgeCacheConfig = toml::from_str(
            r#"
[liveness_header]
name = "X-Edge"
value = "up"
"#,
        )
        .unwrap();
        assert_eq!(parsed.liveness(), Some(&LivenessHeader::new("X-Edge", "up")));
    }

    #[test]
    fn test_save_and_load_json() {
        let path = temp_path("roundtrip.json");
        let config = EdgeCacheConfig::default();

        config.save(&path).unwrap();
        let loaded = EdgeCacheConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = EdgeCacheConfig::load(temp_path("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
