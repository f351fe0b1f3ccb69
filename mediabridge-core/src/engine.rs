//! Media engine seam
//!
//! The ICE/DTLS/SRTP stack that actually moves packets is an external
//! collaborator. The signaling core talks to it through [`MediaEngine`]
//! and only tracks the negotiation state; it never performs
//! cryptography itself.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{DtlsParameters, DtlsRole, TransportId};

/// Interface to the media stack performing the DTLS handshake.
///
/// `connect_transport` is the only suspension point of the core; a
/// failure here surfaces to callers as
/// [`Error::TransportConnectFailed`].
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Run the DTLS handshake for a transport and return the role the
    /// engine took.
    async fn connect_transport(
        &self,
        transport_id: &TransportId,
        dtls_parameters: &DtlsParameters,
    ) -> Result<DtlsRole>;

    /// Release engine-side resources for a transport. Best-effort;
    /// called on close and teardown.
    async fn close_transport(&self, _transport_id: &TransportId) {}
}

/// In-process engine used by the default server wiring and the tests.
///
/// Performs no cryptography: it validates the offered fingerprints and
/// answers with the complementary DTLS role, which is all the
/// bookkeeping core needs.
#[derive(Debug, Default)]
pub struct LocalMediaEngine;

#[async_trait]
impl MediaEngine for LocalMediaEngine {
    async fn connect_transport(
        &self,
        transport_id: &TransportId,
        dtls_parameters: &DtlsParameters,
    ) -> Result<DtlsRole> {
        if dtls_parameters.is_empty() {
            return Err(Error::TransportConnectFailed(
                "remote DTLS parameters carry no fingerprint".to_string(),
            ));
        }

        let role = dtls_parameters.role.complement();
        debug!(
            transport_id = %transport_id,
            remote_role = ?dtls_parameters.role,
            local_role = ?role,
            "DTLS handshake accepted"
        );
        Ok(role)
    }
}
