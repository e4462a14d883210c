//! Configuration structures for extraction and the web UI.

use serde::{Deserialize, Serialize};

/// Main configuration for invex.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvexConfig {
    /// Extraction model configuration.
    pub extraction: ExtractionConfig,

    /// Web UI server configuration.
    pub server: ServerConfig,
}

/// Extraction model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Model identifier.
    pub model: String,

    /// API base URL, without trailing slash.
    pub api_base: String,

    /// Name of the environment variable holding the API key.
    pub api_key_env: String,

    /// System instruction describing the extraction task.
    pub system_instruction: String,

    /// User prompt sent alongside each image.
    pub prompt: String,

    /// Request timeout in seconds (unset = transport default).
    pub timeout_secs: Option<u64>,

    /// Largest accepted image in bytes.
    pub max_image_bytes: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            system_instruction: "Parse the invoices and extract the relevant information \
                                 including items and customer details."
                .to_string(),
            prompt: "Extract all invoice information from this image including items and \
                     customer details"
                .to_string(),
            timeout_secs: None,
            max_image_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Web UI server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,

    /// Bind port.
    pub port: u16,

    /// Idle time after which a browser session is discarded.
    pub session_ttl_secs: u64,

    /// Maximum request body size for one upload batch.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            session_ttl_secs: 3600,
            max_upload_bytes: 200 * 1024 * 1024,
        }
    }
}

impl InvexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: InvexConfig =
            serde_json::from_str(r#"{"extraction": {"model": "gemini-1.5-pro"}}"#).unwrap();

        assert_eq!(config.extraction.model, "gemini-1.5-pro");
        assert_eq!(config.extraction.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(config.server.port, 8501);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = InvexConfig::default();
        config.server.port = 9000;
        config.extraction.timeout_secs = Some(30);
        config.save(&path).unwrap();

        let loaded = InvexConfig::from_file(&path).unwrap();
        assert_eq!(loaded.server.port, 9000);
        assert_eq!(loaded.extraction.timeout_secs, Some(30));
    }
}
