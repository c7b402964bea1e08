//! Application configuration.
//!
//! The host loads a JSON document (typically served next to the app) and
//! hands the parsed [`AppConfig`] to the workbench. Every field has a
//! default so a partial document is enough.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON for [`AppConfig`].
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The mapping endpoint is missing.
    #[error("mapping_url must not be empty")]
    MissingMappingUrl,
}

/// Settings shared by the catalog client, navigator and query pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the mapping service (catalog and plot requests).
    pub mapping_url: String,

    /// Session token appended to every request.
    pub session_token: String,

    /// Option lists longer than this get a client-side search box.
    pub search_threshold: usize,

    /// CRS used when a dataset does not declare one.
    pub default_crs: String,

    /// Longer side of the statistics raster, in pixels.
    pub max_query_resolution: u32,

    /// Raster holding one channel per region mask.
    pub mask_source_name: String,

    /// Colormap suggested for EBV layers.
    pub colormap: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mapping_url: "/cgi-bin/mapping".to_string(),
            session_token: String::new(),
            search_threshold: 5,
            default_crs: "EPSG:4326".to_string(),
            max_query_resolution: 1024,
            mask_source_name: "ne_10m_admin_0_countries_as_raster".to_string(),
            colormap: "COOLWARM".to_string(),
        }
    }
}

impl AppConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON configuration document, filling in defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        if config.mapping_url.trim().is_empty() {
            return Err(ConfigError::MissingMappingUrl);
        }
        log::info!("Loaded configuration for {}", config.mapping_url);
        Ok(config)
    }

    /// Returns a copy bound to a different session token.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = token.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_uses_defaults() {
        let json = r#"{"mapping_url": "https://example.org/mapping"}"#;
        let config = AppConfig::from_json(json).unwrap();

        assert_eq!(config.mapping_url, "https://example.org/mapping");
        assert_eq!(config.search_threshold, 5);
        assert_eq!(config.default_crs, "EPSG:4326");
        assert_eq!(config.max_query_resolution, 1024);
    }

    #[test]
    fn test_empty_mapping_url_rejected() {
        let err = AppConfig::from_json(r#"{"mapping_url": "  "}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingMappingUrl));
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(matches!(
            AppConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
