//! Session coordinator
//!
//! [`SignalingService`] orchestrates the capability registry, transport
//! manager and producer/consumer table into the signaling protocol: it
//! validates offers, drives transport creation and DTLS connection in
//! order, establishes produce/consume relationships and assembles
//! response payloads. It is the only place allowed to perform
//! multi-step compensation: any failure mid-offer unwinds everything
//! the exchange created.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::capability;
use crate::engine::MediaEngine;
use crate::error::{Error, Result};
use crate::media::{Consumer, ConsumerInfo, MediaTable, ProducerInfo};
use crate::models::{
    ConsumerId, DtlsParameters, IceCandidate, IceParameters, ProducerId, RtpCapabilities,
    RtpParameters, SctpParameters, SessionId, TransportId,
};
use crate::transport::{
    ConnectionResult, TransportDirection, TransportInfo, TransportManager,
};

/// Notification delivered to a session's owner so it can inform the
/// client (transport over websocket/long-poll is the caller's concern).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "event")]
pub enum SessionEvent {
    ConsumerClosed {
        consumer_id: ConsumerId,
        producer_id: ProducerId,
    },
}

/// One client's end-to-end negotiation context
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,

    router_capabilities: RtpCapabilities,
    /// Device capabilities after intersection; empty until declared
    device_capabilities: RwLock<RtpCapabilities>,
    transports: RwLock<Vec<TransportId>>,
    closed: AtomicBool,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    /// Receiver for session events (taken once by the notification path)
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
}

impl Session {
    fn new(router_capabilities: RtpCapabilities) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            id: SessionId::new(),
            created_at: Utc::now(),
            router_capabilities,
            device_capabilities: RwLock::new(RtpCapabilities::default()),
            transports: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    #[must_use]
    pub fn router_capabilities(&self) -> &RtpCapabilities {
        &self.router_capabilities
    }

    #[must_use]
    pub fn device_capabilities(&self) -> RtpCapabilities {
        self.device_capabilities.read().clone()
    }

    pub fn set_device_capabilities(&self, capabilities: RtpCapabilities) {
        *self.device_capabilities.write() = capabilities;
    }

    #[must_use]
    pub fn transport_ids(&self) -> Vec<TransportId> {
        self.transports.read().clone()
    }

    fn track_transport(&self, transport_id: TransportId) {
        self.transports.write().push(transport_id);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events_rx.lock().take()
    }

    fn emit(&self, event: SessionEvent) {
        if self.events_tx.send(event).is_err() {
            debug!(session_id = %self.id, "Session event dropped, receiver gone");
        }
    }
}

/// Full signaling offer as received from a client.
///
/// All six fields are required; validation reports the first missing or
/// empty one before any object is created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfferRequest {
    pub router_rtp_capabilities: Option<RtpCapabilities>,
    pub ice_parameters: Option<IceParameters>,
    pub ice_candidates: Option<Vec<IceCandidate>>,
    pub dtls_parameters: Option<DtlsParameters>,
    pub sctp_parameters: Option<SctpParameters>,
    pub rtp_parameters: Option<RtpParameters>,
}

struct ValidatedOffer {
    router_rtp_capabilities: RtpCapabilities,
    ice_parameters: IceParameters,
    ice_candidates: Vec<IceCandidate>,
    dtls_parameters: DtlsParameters,
    sctp_parameters: SctpParameters,
    rtp_parameters: RtpParameters,
}

impl OfferRequest {
    fn validate(self) -> Result<ValidatedOffer> {
        let missing = |field: &str| Error::IncompleteOffer(field.to_string());

        let router_rtp_capabilities = self
            .router_rtp_capabilities
            .filter(|caps| !caps.is_empty())
            .ok_or_else(|| missing("routerRtpCapabilities"))?;
        let ice_parameters = self
            .ice_parameters
            .filter(|ice| !ice.is_empty())
            .ok_or_else(|| missing("iceParameters"))?;
        let ice_candidates = self
            .ice_candidates
            .filter(|candidates| !candidates.is_empty())
            .ok_or_else(|| missing("iceCandidates"))?;
        let dtls_parameters = self
            .dtls_parameters
            .filter(|dtls| !dtls.is_empty())
            .ok_or_else(|| missing("dtlsParameters"))?;
        let sctp_parameters = self.sctp_parameters.ok_or_else(|| missing("sctpParameters"))?;
        let rtp_parameters = self
            .rtp_parameters
            .filter(|rtp| !rtp.is_empty())
            .ok_or_else(|| missing("rtpParameters"))?;

        Ok(ValidatedOffer {
            router_rtp_capabilities,
            ice_parameters,
            ice_candidates,
            dtls_parameters,
            sctp_parameters,
            rtp_parameters,
        })
    }
}

/// Response assembled for a successful offer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferResponse {
    /// Identifier of the created send transport
    pub id: TransportId,
    /// Negotiated capability set
    pub rtp_capabilities: RtpCapabilities,
    pub consumer: ConsumerInfo,
}

/// Request for the standalone `/createTransport` operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateTransportRequest {
    pub ice_parameters: Option<IceParameters>,
    pub ice_candidates: Option<Vec<IceCandidate>>,
    pub dtls_parameters: Option<DtlsParameters>,
    pub sctp_parameters: Option<SctpParameters>,
}

/// Closes everything a failed or abandoned offer created.
///
/// Armed for the whole exchange; dropping it before `disarm` (early
/// return or a cancelled request future) unwinds the session and all
/// objects registered under it.
struct RollbackGuard<'a> {
    service: &'a SignalingService,
    session_id: SessionId,
    armed: bool,
}

impl<'a> RollbackGuard<'a> {
    fn new(service: &'a SignalingService, session_id: SessionId) -> Self {
        Self {
            service,
            session_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(session_id = %self.session_id, "Unwinding incomplete signaling exchange");
            self.service.teardown_session(&self.session_id);
        }
    }
}

/// The session coordinator: entry point for all signaling operations
pub struct SignalingService {
    /// Capabilities this router announces to clients
    router_capabilities: RtpCapabilities,
    sessions: DashMap<SessionId, Arc<Session>>,
    transports: TransportManager,
    media: MediaTable,
    engine: Arc<dyn MediaEngine>,
}

impl SignalingService {
    #[must_use]
    pub fn new(router_capabilities: RtpCapabilities, engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            router_capabilities,
            sessions: DashMap::new(),
            transports: TransportManager::new(Arc::clone(&engine)),
            media: MediaTable::new(),
            engine,
        }
    }

    #[must_use]
    pub fn router_capabilities(&self) -> &RtpCapabilities {
        &self.router_capabilities
    }

    fn create_session(&self, router_capabilities: RtpCapabilities) -> Arc<Session> {
        let session = Arc::new(Session::new(router_capabilities));
        self.sessions.insert(session.id.clone(), Arc::clone(&session));
        debug!(session_id = %session.id, total_sessions = self.sessions.len(), "Created session");
        session
    }

    pub fn get_session(&self, session_id: &SessionId) -> Result<Arc<Session>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::SessionNotFound(session_id.clone()))
    }

    /// Run the full offer protocol: validate, intersect capabilities,
    /// create and connect a send transport, register the offered stream
    /// as a producer and derive a consumer from it.
    pub async fn offer(&self, request: OfferRequest) -> Result<OfferResponse> {
        let offer = request.validate()?;

        let session = self.create_session(offer.router_rtp_capabilities.clone());
        let mut rollback = RollbackGuard::new(self, session.id.clone());

        let rtp_capabilities = capability::intersect(
            &offer.router_rtp_capabilities,
            &session.device_capabilities(),
        )?;

        let transport = self.transports.create(
            session.id.clone(),
            TransportDirection::Send,
            offer.ice_parameters,
            offer.ice_candidates,
            offer.dtls_parameters.clone(),
            Some(offer.sctp_parameters),
        )?;
        session.track_transport(transport.id.clone());

        self.transports
            .connect(&transport.id, offer.dtls_parameters)
            .await?;

        let producer = self.media.create_producer(
            &transport,
            offer.rtp_parameters.kind,
            offer.rtp_parameters,
        )?;
        let consumer =
            self.media
                .create_consumer(&transport, &producer.id, &session.device_capabilities())?;

        let response = OfferResponse {
            id: transport.id.clone(),
            rtp_capabilities,
            consumer: consumer.info(),
        };
        rollback.disarm();

        info!(
            session_id = %session.id,
            transport_id = %response.id,
            producer_id = %consumer.producer_id,
            consumer_id = %consumer.id,
            "Offer completed"
        );
        Ok(response)
    }

    /// Create a transport outside the offer protocol. Opens a fresh
    /// session that owns it; follow-up calls are keyed by transport id.
    pub fn create_transport(&self, request: CreateTransportRequest) -> Result<TransportInfo> {
        let ice_parameters = request.ice_parameters.ok_or_else(|| {
            Error::InvalidNegotiationParameters("iceParameters is required".to_string())
        })?;
        let dtls_parameters = request.dtls_parameters.ok_or_else(|| {
            Error::InvalidNegotiationParameters("dtlsParameters is required".to_string())
        })?;

        let session = self.create_session(self.router_capabilities.clone());
        let transport = self.transports.create(
            session.id.clone(),
            TransportDirection::Send,
            ice_parameters,
            request.ice_candidates.unwrap_or_default(),
            dtls_parameters,
            request.sctp_parameters,
        );
        match transport {
            Ok(transport) => {
                session.track_transport(transport.id.clone());
                Ok(transport.info())
            }
            Err(e) => {
                self.teardown_session(&session.id);
                Err(e)
            }
        }
    }

    pub async fn connect_transport(
        &self,
        transport_id: &TransportId,
        dtls_parameters: DtlsParameters,
    ) -> Result<ConnectionResult> {
        self.transports.connect(transport_id, dtls_parameters).await
    }

    /// Register a producer for an inbound stream on a connected transport.
    pub fn produce(
        &self,
        transport_id: &TransportId,
        kind: &str,
        rtp_parameters: RtpParameters,
    ) -> Result<ProducerInfo> {
        let kind = crate::models::MediaKind::parse(kind)?;
        let transport = self.transports.get(transport_id)?;
        let producer = self.media.create_producer(&transport, kind, rtp_parameters)?;
        Ok(producer.info())
    }

    /// Derive a consumer from an existing producer (two-phase variant).
    pub fn consume(
        &self,
        transport_id: &TransportId,
        producer_id: &ProducerId,
        device_capabilities: &RtpCapabilities,
    ) -> Result<ConsumerInfo> {
        let transport = self.transports.get(transport_id)?;
        let consumer = self
            .media
            .create_consumer(&transport, producer_id, device_capabilities)?;
        Ok(consumer.info())
    }

    pub fn transport_info(&self, transport_id: &TransportId) -> Result<TransportInfo> {
        Ok(self.transports.get(transport_id)?.info())
    }

    /// Close a transport, cascading to its producers and consumers.
    ///
    /// The transport is unregistered; later lookups report it as
    /// unknown rather than closed. A session whose last transport goes
    /// away is released with it.
    pub async fn close_transport(&self, transport_id: &TransportId) -> Result<()> {
        let session_id = self.transports.get(transport_id)?.session_id.clone();
        self.transports.close(transport_id).await?;
        let cascaded = self.media.close_for_transport(transport_id);
        self.notify_consumers_closed(&cascaded);
        self.media.remove_for_transport(transport_id);
        self.transports.remove(transport_id);
        self.release_session_if_empty(&session_id);
        Ok(())
    }

    /// Drop a session once none of its transports are registered.
    fn release_session_if_empty(&self, session_id: &SessionId) {
        let Ok(session) = self.get_session(session_id) else {
            return;
        };
        let has_live = session
            .transport_ids()
            .iter()
            .any(|id| self.transports.get(id).is_ok());
        if !has_live {
            session.close();
            self.sessions.remove(session_id);
            debug!(session_id = %session_id, "Session released, no transports left");
        }
    }

    /// Close a producer, cascading to all dependent consumers and
    /// reporting each closure to its originating session.
    pub fn close_producer(&self, producer_id: &ProducerId) -> Result<()> {
        let cascaded = self.media.close_producer(producer_id)?;
        self.notify_consumers_closed(&cascaded);
        Ok(())
    }

    pub fn close_consumer(&self, consumer_id: &ConsumerId) -> Result<()> {
        self.media.close_consumer(consumer_id)
    }

    /// Explicit session teardown: close and unregister every transport,
    /// producer and consumer the session owns.
    pub async fn close_session(&self, session_id: &SessionId) -> Result<()> {
        let session = self.get_session(session_id)?;
        if !session.close() {
            return Err(Error::AlreadyClosed(format!("session {session_id}")));
        }
        for transport_id in session.transport_ids() {
            if self.transports.get(&transport_id).is_ok() {
                self.close_transport(&transport_id).await?;
            }
            self.media.remove_for_transport(&transport_id);
            self.transports.remove(&transport_id);
        }
        self.sessions.remove(session_id);
        info!(session_id = %session_id, "Session closed");
        Ok(())
    }

    /// Synchronous unwind used by the rollback guard. Engine-side
    /// release is spawned because `Drop` cannot await.
    fn teardown_session(&self, session_id: &SessionId) {
        let Some((_, session)) = self.sessions.remove(session_id) else {
            return;
        };
        session.close();
        let transport_ids = session.transport_ids();
        for transport_id in &transport_ids {
            self.media.remove_for_transport(transport_id);
            self.transports.remove(transport_id);
        }
        if !transport_ids.is_empty() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let engine = Arc::clone(&self.engine);
                handle.spawn(async move {
                    for transport_id in transport_ids {
                        engine.close_transport(&transport_id).await;
                    }
                });
            }
        }
    }

    fn notify_consumers_closed(&self, consumers: &[Arc<Consumer>]) {
        for consumer in consumers {
            if let Some(session) = self.sessions.get(&consumer.session_id) {
                session.emit(SessionEvent::ConsumerClosed {
                    consumer_id: consumer.id.clone(),
                    producer_id: consumer.producer_id.clone(),
                });
            }
        }
    }

    pub fn producer_is_closed(&self, producer_id: &ProducerId) -> Result<bool> {
        Ok(self.media.get_producer(producer_id)?.is_closed())
    }

    pub fn consumer_is_closed(&self, consumer_id: &ConsumerId) -> Result<bool> {
        Ok(self.media.get_consumer(consumer_id)?.is_closed())
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    #[must_use]
    pub fn producer_count(&self) -> usize {
        self.media.producer_count()
    }

    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.media.consumer_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LocalMediaEngine;
    use crate::models::{
        DtlsFingerprint, DtlsRole, MediaKind, RtpCodecCapability, RtpCodecParameters,
    };
    use async_trait::async_trait;

    fn router_caps() -> RtpCapabilities {
        RtpCapabilities {
            codecs: vec![RtpCodecCapability {
                mime_type: "video/VP8".to_string(),
                kind: MediaKind::Video,
                clock_rate: 90000,
                channels: None,
                preferred_payload_type: Some(96),
            }],
            header_extensions: vec![],
        }
    }

    fn valid_offer() -> OfferRequest {
        OfferRequest {
            router_rtp_capabilities: Some(router_caps()),
            ice_parameters: Some(IceParameters {
                username_fragment: "ufrag".to_string(),
                password: "secret".to_string(),
                ice_lite: None,
            }),
            ice_candidates: Some(vec![IceCandidate {
                foundation: "udpcandidate".to_string(),
                priority: 1_076_302_079,
                address: "203.0.113.10".to_string(),
                protocol: "udp".to_string(),
                port: 44444,
                candidate_type: "host".to_string(),
            }]),
            dtls_parameters: Some(DtlsParameters {
                role: DtlsRole::Client,
                fingerprints: vec![DtlsFingerprint {
                    algorithm: "sha-256".to_string(),
                    value: "AA:BB:CC".to_string(),
                }],
            }),
            sctp_parameters: Some(SctpParameters::default()),
            rtp_parameters: Some(RtpParameters {
                kind: MediaKind::Video,
                codecs: vec![RtpCodecParameters {
                    mime_type: "video/VP8".to_string(),
                    payload_type: 96,
                    clock_rate: 90000,
                    channels: None,
                }],
                encodings: vec![],
                header_extensions: vec![],
            }),
        }
    }

    fn service() -> SignalingService {
        SignalingService::new(router_caps(), Arc::new(LocalMediaEngine))
    }

    struct FailingEngine;

    #[async_trait]
    impl MediaEngine for FailingEngine {
        async fn connect_transport(
            &self,
            _transport_id: &TransportId,
            _dtls_parameters: &DtlsParameters,
        ) -> Result<DtlsRole> {
            Err(Error::TransportConnectFailed("no route to peer".to_string()))
        }
    }

    #[tokio::test]
    async fn test_offer_happy_path() {
        let service = service();
        let response = service.offer(valid_offer()).await.unwrap();

        assert_eq!(response.consumer.kind, MediaKind::Video);
        assert_eq!(response.consumer.rtp_parameters.codecs[0].mime_type, "video/VP8");
        assert_eq!(service.transport_count(), 1);
        assert_eq!(service.producer_count(), 1);
        assert_eq!(service.consumer_count(), 1);

        // The consumer's transport is the one returned in the response.
        let info = service.transport_info(&response.id).unwrap();
        assert_eq!(info.id, response.id);
    }

    #[tokio::test]
    async fn test_incomplete_offer_leaves_no_state() {
        let service = service();
        let mut request = valid_offer();
        request.dtls_parameters = None;

        let result = service.offer(request).await;
        assert!(matches!(
            result,
            Err(Error::IncompleteOffer(ref field)) if field == "dtlsParameters"
        ));
        assert_eq!(service.session_count(), 0);
        assert_eq!(service.transport_count(), 0);
        assert_eq!(service.producer_count(), 0);
        assert_eq!(service.consumer_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_unwinds_transport() {
        let service = SignalingService::new(router_caps(), Arc::new(FailingEngine));
        let result = service.offer(valid_offer()).await;

        assert!(matches!(result, Err(Error::TransportConnectFailed(_))));
        assert_eq!(service.session_count(), 0);
        assert_eq!(service.transport_count(), 0);
        assert_eq!(service.producer_count(), 0);
        assert_eq!(service.consumer_count(), 0);
    }

    #[tokio::test]
    async fn test_producer_close_is_reported_to_the_session() {
        let service = service();
        let response = service.offer(valid_offer()).await.unwrap();

        let transport = service.transports.get(&response.id).unwrap();
        let session = service.get_session(&transport.session_id).unwrap();
        let mut events = session.take_event_receiver().unwrap();

        service.close_producer(&response.consumer.producer_id).unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(
            event,
            SessionEvent::ConsumerClosed {
                consumer_id: response.consumer.id.clone(),
                producer_id: response.consumer.producer_id.clone(),
            }
        );
        assert!(service.consumer_is_closed(&response.consumer.id).unwrap());
    }

    #[tokio::test]
    async fn test_close_session_removes_everything() {
        let service = service();
        let response = service.offer(valid_offer()).await.unwrap();
        let transport = service.transports.get(&response.id).unwrap();
        let session_id = transport.session_id.clone();
        drop(transport);

        service.close_session(&session_id).await.unwrap();
        assert_eq!(service.session_count(), 0);
        assert_eq!(service.transport_count(), 0);
        assert_eq!(service.producer_count(), 0);
        assert_eq!(service.consumer_count(), 0);

        assert!(matches!(
            service.transport_info(&response.id),
            Err(Error::TransportNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_close_transport_releases_its_session() {
        let service = service();
        let response = service.offer(valid_offer()).await.unwrap();
        assert_eq!(service.session_count(), 1);

        service.close_transport(&response.id).await.unwrap();
        assert_eq!(service.session_count(), 0);
        assert_eq!(service.transport_count(), 0);
        assert_eq!(service.producer_count(), 0);
        assert_eq!(service.consumer_count(), 0);
    }

    #[tokio::test]
    async fn test_create_transport_requires_parameters() {
        let service = service();
        let result = service.create_transport(CreateTransportRequest::default());
        assert!(matches!(
            result,
            Err(Error::InvalidNegotiationParameters(_))
        ));
        assert_eq!(service.session_count(), 0);
        assert_eq!(service.transport_count(), 0);
    }

    #[tokio::test]
    async fn test_produce_with_unknown_kind() {
        let service = service();
        let response = service.offer(valid_offer()).await.unwrap();
        let rtp = valid_offer().rtp_parameters.unwrap();

        let result = service.produce(&response.id, "screenshare", rtp);
        assert!(matches!(result, Err(Error::UnsupportedKind(_))));
    }
}
