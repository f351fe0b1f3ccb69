//! RTP capability and parameter records
//!
//! Structured versions of the capability dictionaries exchanged during
//! signaling. Every field the negotiation depends on is typed and
//! validated at the boundary instead of being threaded through as an
//! untyped map.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Media kind of a stream, producer or consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Parse a kind string from a signaling request.
    ///
    /// Unrecognized kinds are a caller error (`UnsupportedKind`), not a
    /// deserialization fault.
    pub fn parse(kind: &str) -> Result<Self> {
        match kind {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(Error::UnsupportedKind(other.to_string())),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A codec a router or device is able to handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecCapability {
    /// Codec MIME type (e.g., "video/VP8", "audio/opus")
    pub mime_type: String,
    /// Media kind this codec applies to
    pub kind: MediaKind,
    /// RTP clock rate in Hz
    pub clock_rate: u32,
    /// Number of channels (audio only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    /// Payload type the router prefers for this codec
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_payload_type: Option<u8>,
}

impl RtpCodecCapability {
    /// Whether two capability entries describe the same codec.
    ///
    /// MIME types compare case-insensitively per RFC 6838.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.mime_type.eq_ignore_ascii_case(&other.mime_type)
            && self.clock_rate == other.clock_rate
    }
}

/// An RTP header extension a router or device supports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtension {
    /// Extension URI (e.g., "urn:ietf:params:rtp-hdrext:sdes:mid")
    pub uri: String,
    /// Media kind this extension applies to
    pub kind: MediaKind,
    /// Extension ID
    pub id: u8,
}

/// Capability set of a router or device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RtpCapabilities {
    pub codecs: Vec<RtpCodecCapability>,
    pub header_extensions: Vec<RtpHeaderExtension>,
}

impl RtpCapabilities {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty() && self.header_extensions.is_empty()
    }

    /// Whether the set declares any codec of the given kind
    #[must_use]
    pub fn has_kind(&self, kind: MediaKind) -> bool {
        self.codecs.iter().any(|c| c.kind == kind)
    }
}

/// Codec settings negotiated for one concrete stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecParameters {
    /// Codec MIME type (e.g., "video/VP8")
    pub mime_type: String,
    /// Negotiated payload type
    pub payload_type: u8,
    /// RTP clock rate in Hz
    pub clock_rate: u32,
    /// Number of channels (audio only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
}

/// A single RTP encoding (simulcast layer or plain stream)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RtpEncoding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssrc: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bitrate: Option<u32>,
}

/// RTP parameters describing one media stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpParameters {
    /// Media kind of the stream
    pub kind: MediaKind,
    /// Codecs in use, most preferred first
    pub codecs: Vec<RtpCodecParameters>,
    /// Stream encodings (one entry unless simulcast)
    #[serde(default)]
    pub encodings: Vec<RtpEncoding>,
    /// Header extensions in use
    #[serde(default)]
    pub header_extensions: Vec<RtpHeaderExtension>,
}

impl RtpParameters {
    /// A parameter bundle with no codecs cannot describe a stream.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}
