//! HTTP signaling endpoints
//!
//! JSON surface bridging WebRTC clients to the signaling core:
//! - `POST /offer` - atomic capability/transport/consume exchange
//! - `GET /getRouterRtpCapabilities` - router capability set
//! - `GET /getIceParameters|getIceCandidates|getDtlsParameters` -
//!   transport-scoped parameter queries (`?transportId=`)
//! - `POST /createTransport`, `POST /connectTransport`, `POST /produce`,
//!   `POST /consume` - two-phase signaling
//! - `DELETE /transports/{transportId}` - explicit teardown

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::http::{AppError, AppResult, AppState};
use mediabridge_core::models::{
    DtlsParameters, DtlsRole, ProducerId, RtpCapabilities, RtpParameters, TransportId,
};
use mediabridge_core::session::CreateTransportRequest;
use mediabridge_core::OfferRequest;

/// Request envelope for `POST /offer`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OfferEnvelope {
    pub offer: OfferRequest,
}

/// Run the full offer protocol for one signaling request.
///
/// A missing or empty negotiation field is rejected before any state is
/// created; any later failure unwinds the partially built transport,
/// producer and consumer.
pub async fn offer(
    State(state): State<AppState>,
    Json(envelope): Json<OfferEnvelope>,
) -> AppResult<impl IntoResponse> {
    let response = state.signaling.offer(envelope.offer).await?;
    Ok(Json(response))
}

/// Capabilities this router announces to clients
pub async fn get_router_rtp_capabilities(
    State(state): State<AppState>,
) -> Json<RtpCapabilities> {
    Json(state.signaling.router_capabilities().clone())
}

/// Query string for transport-scoped parameter lookups
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportQuery {
    pub transport_id: Option<String>,
}

impl TransportQuery {
    fn transport_id(self) -> AppResult<TransportId> {
        self.transport_id
            .filter(|id| !id.is_empty())
            .map(TransportId::from_string)
            .ok_or_else(|| AppError::bad_request("transportId query parameter is required"))
    }
}

pub async fn get_ice_parameters(
    State(state): State<AppState>,
    Query(query): Query<TransportQuery>,
) -> AppResult<impl IntoResponse> {
    let info = state.signaling.transport_info(&query.transport_id()?)?;
    Ok(Json(info.ice_parameters))
}

pub async fn get_ice_candidates(
    State(state): State<AppState>,
    Query(query): Query<TransportQuery>,
) -> AppResult<impl IntoResponse> {
    let info = state.signaling.transport_info(&query.transport_id()?)?;
    Ok(Json(info.ice_candidates))
}

pub async fn get_dtls_parameters(
    State(state): State<AppState>,
    Query(query): Query<TransportQuery>,
) -> AppResult<impl IntoResponse> {
    let info = state.signaling.transport_info(&query.transport_id()?)?;
    Ok(Json(info.dtls_parameters))
}

/// Create a transport record without the full offer protocol.
pub async fn create_transport(
    State(state): State<AppState>,
    Json(request): Json<CreateTransportRequest>,
) -> AppResult<impl IntoResponse> {
    let info = state.signaling.create_transport(request)?;
    Ok(Json(info))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectTransportRequest {
    pub transport_id: Option<String>,
    pub dtls_parameters: Option<DtlsParameters>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectTransportResponse {
    pub status: String,
    pub dtls_role: DtlsRole,
}

/// Drive a transport through the DTLS handshake.
pub async fn connect_transport(
    State(state): State<AppState>,
    Json(request): Json<ConnectTransportRequest>,
) -> AppResult<impl IntoResponse> {
    let transport_id = request
        .transport_id
        .filter(|id| !id.is_empty())
        .map(TransportId::from_string)
        .ok_or_else(|| AppError::bad_request("transportId is required"))?;
    let dtls_parameters = request
        .dtls_parameters
        .ok_or_else(|| AppError::bad_request("dtlsParameters is required"))?;

    let result = state
        .signaling
        .connect_transport(&transport_id, dtls_parameters)
        .await?;
    Ok(Json(ConnectTransportResponse {
        status: "connected".to_string(),
        dtls_role: result.dtls_role,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProduceRequest {
    pub transport_id: Option<String>,
    pub kind: Option<String>,
    pub rtp_parameters: Option<RtpParameters>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProduceResponse {
    pub id: ProducerId,
}

/// Register an inbound stream on a connected transport.
pub async fn produce(
    State(state): State<AppState>,
    Json(request): Json<ProduceRequest>,
) -> AppResult<impl IntoResponse> {
    let transport_id = request
        .transport_id
        .filter(|id| !id.is_empty())
        .map(TransportId::from_string)
        .ok_or_else(|| AppError::bad_request("transportId is required"))?;
    let kind = request
        .kind
        .ok_or_else(|| AppError::bad_request("kind is required"))?;
    let rtp_parameters = request
        .rtp_parameters
        .ok_or_else(|| AppError::bad_request("rtpParameters is required"))?;

    let producer = state.signaling.produce(&transport_id, &kind, rtp_parameters)?;
    Ok(Json(ProduceResponse { id: producer.id }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsumeRequest {
    pub transport_id: Option<String>,
    pub producer_id: Option<String>,
    /// Consuming device's declared capabilities; empty accepts the
    /// producer's parameters verbatim
    pub rtp_capabilities: Option<RtpCapabilities>,
}

/// Derive a consumer from an existing producer.
pub async fn consume(
    State(state): State<AppState>,
    Json(request): Json<ConsumeRequest>,
) -> AppResult<impl IntoResponse> {
    let transport_id = request
        .transport_id
        .filter(|id| !id.is_empty())
        .map(TransportId::from_string)
        .ok_or_else(|| AppError::bad_request("transportId is required"))?;
    let producer_id = request
        .producer_id
        .filter(|id| !id.is_empty())
        .map(ProducerId::from_string)
        .ok_or_else(|| AppError::bad_request("producerId is required"))?;
    let device_capabilities = request.rtp_capabilities.unwrap_or_default();

    let consumer = state
        .signaling
        .consume(&transport_id, &producer_id, &device_capabilities)?;
    Ok(Json(consumer))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CloseTransportResponse {
    pub status: String,
}

/// Explicitly tear a transport down, cascading to its producers and
/// consumers.
pub async fn close_transport(
    State(state): State<AppState>,
    Path(transport_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let transport_id = TransportId::from_string(transport_id);
    state.signaling.close_transport(&transport_id).await?;
    Ok(Json(CloseTransportResponse {
        status: "closed".to_string(),
    }))
}
