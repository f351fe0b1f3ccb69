use thiserror::Error;

use crate::models::{ConsumerId, ProducerId, SessionId, TransportId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Incomplete offer: missing or empty field '{0}'")]
    IncompleteOffer(String),

    #[error("Invalid negotiation parameters: {0}")]
    InvalidNegotiationParameters(String),

    #[error("No compatible capabilities: {0}")]
    CapabilityMismatch(String),

    #[error("Transport not found: {0}")]
    TransportNotFound(TransportId),

    #[error("Producer not found: {0}")]
    ProducerNotFound(ProducerId),

    #[error("Consumer not found: {0}")]
    ConsumerNotFound(ConsumerId),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Transport not connected: {0}")]
    TransportNotConnected(TransportId),

    #[error("Already closed: {0}")]
    AlreadyClosed(String),

    #[error("Transport connect failed: {0}")]
    TransportConnectFailed(String),

    #[error("Unsupported media kind: {0}")]
    UnsupportedKind(String),
}

pub type Result<T> = std::result::Result<T, Error>;
