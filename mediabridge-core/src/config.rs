use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{MediaKind, RtpCapabilities, RtpCodecCapability, RtpHeaderExtension};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub router: RouterConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served under `/js` (client bundle)
    pub js_dir: String,
    /// Directory served under `/static`
    pub static_dir: String,
}

impl ServerConfig {
    /// Socket address string for the HTTP listener
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            js_dir: "./js".to_string(),
            static_dir: "./static".to_string(),
        }
    }
}

/// Capabilities this router announces to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub codecs: Vec<RtpCodecCapability>,
    pub header_extensions: Vec<RtpHeaderExtension>,
}

impl RouterConfig {
    #[must_use]
    pub fn capabilities(&self) -> RtpCapabilities {
        RtpCapabilities {
            codecs: self.codecs.clone(),
            header_extensions: self.header_extensions.clone(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            codecs: vec![
                RtpCodecCapability {
                    mime_type: "audio/opus".to_string(),
                    kind: MediaKind::Audio,
                    clock_rate: 48000,
                    channels: Some(2),
                    preferred_payload_type: Some(100),
                },
                RtpCodecCapability {
                    mime_type: "video/VP8".to_string(),
                    kind: MediaKind::Video,
                    clock_rate: 90000,
                    channels: None,
                    preferred_payload_type: Some(101),
                },
                RtpCodecCapability {
                    mime_type: "video/H264".to_string(),
                    kind: MediaKind::Video,
                    clock_rate: 90000,
                    channels: None,
                    preferred_payload_type: Some(102),
                },
            ],
            header_extensions: vec![
                RtpHeaderExtension {
                    uri: "urn:ietf:params:rtp-hdrext:sdes:mid".to_string(),
                    kind: MediaKind::Audio,
                    id: 1,
                },
                RtpHeaderExtension {
                    uri: "urn:ietf:params:rtp-hdrext:sdes:mid".to_string(),
                    kind: MediaKind::Video,
                    id: 1,
                },
                RtpHeaderExtension {
                    uri: "urn:3gpp:video-orientation".to_string(),
                    kind: MediaKind::Video,
                    id: 4,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // MEDIABRIDGE_SERVER__PORT, MEDIABRIDGE_LOGGING__LEVEL, etc.
        builder = builder.add_source(
            Environment::with_prefix("MEDIABRIDGE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }
}
