// Module: models
// Typed records exchanged over the signaling surface

pub mod id;
pub mod negotiation;
pub mod rtp;

pub use id::{generate_id, ConsumerId, ProducerId, SessionId, TransportId};
pub use negotiation::{
    DtlsFingerprint, DtlsParameters, DtlsRole, IceCandidate, IceParameters, SctpParameters,
};
pub use rtp::{
    MediaKind, RtpCapabilities, RtpCodecCapability, RtpCodecParameters, RtpEncoding,
    RtpHeaderExtension, RtpParameters,
};
