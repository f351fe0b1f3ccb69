//! ICE, DTLS and SCTP negotiation records
//!
//! Wire shapes follow the WebRTC transport objects clients send during
//! signaling (camelCase JSON). Emptiness checks back the
//! `InvalidNegotiationParameters` validation in the transport manager.

use serde::{Deserialize, Serialize};

/// ICE credentials for one transport
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IceParameters {
    pub username_fragment: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ice_lite: Option<bool>,
}

impl IceParameters {
    /// ICE parameters without credentials cannot negotiate anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username_fragment.is_empty() || self.password.is_empty()
    }
}

/// One reachable ICE candidate address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub foundation: String,
    pub priority: u32,
    pub address: String,
    /// "udp" or "tcp"
    pub protocol: String,
    pub port: u16,
    /// "host", "srflx", "prflx" or "relay"
    #[serde(rename = "type")]
    pub candidate_type: String,
}

/// DTLS role of one side of a transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtlsRole {
    #[default]
    Auto,
    Client,
    Server,
}

impl DtlsRole {
    /// Role the answering side takes for a given offered role.
    #[must_use]
    pub const fn complement(self) -> Self {
        match self {
            Self::Client => Self::Server,
            // An offer of "server" or "auto" leaves us the active side.
            Self::Server | Self::Auto => Self::Client,
        }
    }
}

/// Certificate fingerprint advertised during the DTLS handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtlsFingerprint {
    /// Hash algorithm (e.g., "sha-256")
    pub algorithm: String,
    /// Colon-separated hex digest
    pub value: String,
}

/// DTLS parameters for one transport
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DtlsParameters {
    pub role: DtlsRole,
    pub fingerprints: Vec<DtlsFingerprint>,
}

impl DtlsParameters {
    /// DTLS parameters without a fingerprint cannot be verified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
            || self.fingerprints.iter().any(|f| f.value.is_empty())
    }
}

/// SCTP association parameters (data channels)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SctpParameters {
    pub port: u16,
    /// Initially requested outgoing streams
    #[serde(rename = "OS")]
    pub os: u16,
    /// Maximum incoming streams
    #[serde(rename = "MIS")]
    pub mis: u16,
    pub max_message_size: u32,
}

impl Default for SctpParameters {
    fn default() -> Self {
        Self {
            port: 5000,
            os: 1024,
            mis: 1024,
            max_message_size: 262_144,
        }
    }
}
