//! Transport manager
//!
//! Creates, tracks and connects WebRTC transports. Each transport runs
//! the state machine `new -> connecting -> connected -> closed`
//! (`new -> closed` and `connecting -> closed` are allowed on error or
//! teardown; `closed` is terminal). The DTLS handshake itself is
//! delegated to the [`MediaEngine`]; this module owns the bookkeeping.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::engine::MediaEngine;
use crate::error::{Error, Result};
use crate::models::{
    DtlsParameters, DtlsRole, IceCandidate, IceParameters, SctpParameters, SessionId, TransportId,
};

/// Direction of a transport relative to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportDirection {
    Send,
    Recv,
}

/// Lifecycle state of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Closed,
}

/// Outcome of a successful `connect`, retained for idempotent repeats
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResult {
    /// DTLS role the server side settled on
    pub dtls_role: DtlsRole,
}

/// Serializable snapshot of a transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportInfo {
    pub id: TransportId,
    pub direction: TransportDirection,
    pub ice_parameters: IceParameters,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: DtlsParameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sctp_parameters: Option<SctpParameters>,
    pub state: TransportState,
}

/// One ICE+DTLS negotiated path between client and server
pub struct Transport {
    pub id: TransportId,
    pub session_id: SessionId,
    pub direction: TransportDirection,
    pub created_at: DateTime<Utc>,

    ice_parameters: IceParameters,
    ice_candidates: Vec<IceCandidate>,
    /// Local DTLS parameters announced at creation
    dtls_parameters: DtlsParameters,
    sctp_parameters: Option<SctpParameters>,

    state: RwLock<TransportState>,
    /// Remote DTLS parameters accepted by the first successful connect
    remote_dtls: RwLock<Option<DtlsParameters>>,
    connection_result: RwLock<Option<ConnectionResult>>,
    /// Serializes connect attempts on this transport; concurrent calls
    /// observe the first one's completed transition.
    connect_lock: Mutex<()>,
}

impl Transport {
    #[must_use]
    pub fn state(&self) -> TransportState {
        *self.state.read()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == TransportState::Connected
    }

    #[must_use]
    pub fn ice_parameters(&self) -> &IceParameters {
        &self.ice_parameters
    }

    #[must_use]
    pub fn ice_candidates(&self) -> &[IceCandidate] {
        &self.ice_candidates
    }

    #[must_use]
    pub fn dtls_parameters(&self) -> &DtlsParameters {
        &self.dtls_parameters
    }

    #[must_use]
    pub fn info(&self) -> TransportInfo {
        TransportInfo {
            id: self.id.clone(),
            direction: self.direction,
            ice_parameters: self.ice_parameters.clone(),
            ice_candidates: self.ice_candidates.clone(),
            dtls_parameters: self.dtls_parameters.clone(),
            sctp_parameters: self.sctp_parameters.clone(),
            state: self.state(),
        }
    }
}

/// Registry of all live transports, keyed by transport id
pub struct TransportManager {
    engine: Arc<dyn MediaEngine>,
    transports: DashMap<TransportId, Arc<Transport>>,
}

impl TransportManager {
    #[must_use]
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            engine,
            transports: DashMap::new(),
        }
    }

    /// Create and register a transport in state `new`.
    pub fn create(
        &self,
        session_id: SessionId,
        direction: TransportDirection,
        ice_parameters: IceParameters,
        ice_candidates: Vec<IceCandidate>,
        dtls_parameters: DtlsParameters,
        sctp_parameters: Option<SctpParameters>,
    ) -> Result<Arc<Transport>> {
        if ice_parameters.is_empty() {
            return Err(Error::InvalidNegotiationParameters(
                "iceParameters must carry a username fragment and password".to_string(),
            ));
        }
        if dtls_parameters.is_empty() {
            return Err(Error::InvalidNegotiationParameters(
                "dtlsParameters must carry at least one fingerprint".to_string(),
            ));
        }

        let transport = Arc::new(Transport {
            id: TransportId::new(),
            session_id,
            direction,
            created_at: Utc::now(),
            ice_parameters,
            ice_candidates,
            dtls_parameters,
            sctp_parameters,
            state: RwLock::new(TransportState::New),
            remote_dtls: RwLock::new(None),
            connection_result: RwLock::new(None),
            connect_lock: Mutex::new(()),
        });
        self.transports
            .insert(transport.id.clone(), Arc::clone(&transport));

        info!(
            transport_id = %transport.id,
            session_id = %transport.session_id,
            direction = ?transport.direction,
            total_transports = self.transports.len(),
            "Created transport"
        );
        Ok(transport)
    }

    /// Look up a transport by id.
    pub fn get(&self, transport_id: &TransportId) -> Result<Arc<Transport>> {
        self.transports
            .get(transport_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::TransportNotFound(transport_id.clone()))
    }

    /// Drive the transport to `connected` with the remote DTLS parameters.
    ///
    /// Idempotent: repeating the call with the same parameters returns
    /// the stored [`ConnectionResult`]. Different parameters on a
    /// connected transport are rejected instead of renegotiated. On an
    /// engine failure the transport transitions to `closed`.
    pub async fn connect(
        &self,
        transport_id: &TransportId,
        dtls_parameters: DtlsParameters,
    ) -> Result<ConnectionResult> {
        let transport = self.get(transport_id)?;
        let _guard = transport.connect_lock.lock().await;

        match transport.state() {
            TransportState::Closed => {
                return Err(Error::AlreadyClosed(format!("transport {transport_id}")));
            }
            TransportState::Connected => {
                let matches = transport
                    .remote_dtls
                    .read()
                    .as_ref()
                    .is_some_and(|remote| *remote == dtls_parameters);
                if !matches {
                    return Err(Error::InvalidNegotiationParameters(
                        "dtlsParameters do not match the established connection".to_string(),
                    ));
                }
                debug!(transport_id = %transport_id, "Connect repeated on connected transport");
                return transport.connection_result.read().clone().ok_or_else(|| {
                    Error::TransportConnectFailed(
                        "connected transport has no stored connection result".to_string(),
                    )
                });
            }
            TransportState::New | TransportState::Connecting => {}
        }

        if dtls_parameters.is_empty() {
            return Err(Error::InvalidNegotiationParameters(
                "dtlsParameters must carry at least one fingerprint".to_string(),
            ));
        }

        {
            let mut state = transport.state.write();
            if *state == TransportState::Closed {
                return Err(Error::AlreadyClosed(format!("transport {transport_id}")));
            }
            *state = TransportState::Connecting;
        }
        match self
            .engine
            .connect_transport(transport_id, &dtls_parameters)
            .await
        {
            Ok(dtls_role) => {
                let result = ConnectionResult { dtls_role };
                {
                    // A close may have landed while the handshake was
                    // in flight; closed is terminal.
                    let mut state = transport.state.write();
                    if *state == TransportState::Closed {
                        return Err(Error::AlreadyClosed(format!("transport {transport_id}")));
                    }
                    *transport.remote_dtls.write() = Some(dtls_parameters);
                    *transport.connection_result.write() = Some(result.clone());
                    *state = TransportState::Connected;
                }
                info!(transport_id = %transport_id, dtls_role = ?result.dtls_role, "Transport connected");
                Ok(result)
            }
            Err(e) => {
                *transport.state.write() = TransportState::Closed;
                warn!(transport_id = %transport_id, error = %e, "DTLS handshake failed");
                Err(Error::TransportConnectFailed(e.to_string()))
            }
        }
    }

    /// Transition a transport to `closed` from any state.
    ///
    /// Returns the transport so the caller can cascade closure to the
    /// producers and consumers it carries. Closing a closed transport
    /// is a no-op.
    pub async fn close(&self, transport_id: &TransportId) -> Result<Arc<Transport>> {
        let transport = self.get(transport_id)?;
        let was_open = {
            let mut state = transport.state.write();
            let was_open = *state != TransportState::Closed;
            *state = TransportState::Closed;
            was_open
        };
        if was_open {
            self.engine.close_transport(transport_id).await;
            info!(transport_id = %transport_id, "Transport closed");
        }
        Ok(transport)
    }

    /// Unregister a transport (session teardown and rollback paths).
    pub fn remove(&self, transport_id: &TransportId) -> Option<Arc<Transport>> {
        self.transports
            .remove(transport_id)
            .map(|(_, transport)| transport)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.transports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}
