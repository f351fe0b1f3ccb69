//! HTTP API integration tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`,
//! covering the atomic offer exchange, the two-phase transport flow and
//! the error status mapping.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use mediabridge_api::create_router;
use mediabridge_core::config::ServerConfig;
use mediabridge_core::models::{MediaKind, RtpCapabilities, RtpCodecCapability};
use mediabridge_core::{LocalMediaEngine, SignalingService};

fn router_caps() -> RtpCapabilities {
    RtpCapabilities {
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
        ],
        header_extensions: vec![],
    }
}

fn app() -> Router {
    let signaling = Arc::new(SignalingService::new(
        router_caps(),
        Arc::new(LocalMediaEngine),
    ));
    create_router(signaling, &ServerConfig::default())
}

fn ice_json() -> Value {
    json!({
        "usernameFragment": "ufrag",
        "password": "ice-secret",
        "iceLite": true
    })
}

fn candidates_json() -> Value {
    json!([{
        "foundation": "udpcandidate",
        "priority": 1_076_302_079_u32,
        "address": "203.0.113.10",
        "protocol": "udp",
        "port": 44444,
        "type": "host"
    }])
}

fn dtls_json() -> Value {
    json!({
        "role": "client",
        "fingerprints": [{
            "algorithm": "sha-256",
            "value": "8C:5D:1A:42:F0:99:AB:CD:EF:01:23:45:67:89:AB:CD"
        }]
    })
}

fn vp8_rtp_parameters() -> Value {
    json!({
        "kind": "video",
        "codecs": [{
            "mimeType": "video/VP8",
            "payloadType": 96,
            "clockRate": 90000
        }],
        "encodings": [],
        "headerExtensions": []
    })
}

fn offer_body() -> Value {
    json!({
        "offer": {
            "routerRtpCapabilities": {
                "codecs": [{
                    "mimeType": "video/VP8",
                    "kind": "video",
                    "clockRate": 90000
                }],
                "headerExtensions": []
            },
            "iceParameters": ice_json(),
            "iceCandidates": candidates_json(),
            "dtlsParameters": dtls_json(),
            "sctpParameters": {
                "port": 5000,
                "OS": 1024,
                "MIS": 1024,
                "maxMessageSize": 262144
            },
            "rtpParameters": vp8_rtp_parameters()
        }
    })
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_returns_ok() {
    let response = app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn router_capabilities_are_served() {
    let response = app()
        .oneshot(get("/getRouterRtpCapabilities"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let codecs = body["codecs"].as_array().unwrap();
    assert_eq!(codecs.len(), 2);
    assert_eq!(codecs[0]["mimeType"], "audio/opus");
}

#[tokio::test]
async fn offer_returns_consumer_and_transport_id() {
    let app = app();
    let response = app.oneshot(post("/offer", offer_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["id"].as_str().unwrap().len() >= 16);
    assert_eq!(body["consumer"]["kind"], "video");
    assert_eq!(
        body["consumer"]["rtpParameters"]["codecs"][0]["mimeType"],
        "video/VP8"
    );
    assert_eq!(body["rtpCapabilities"]["codecs"][0]["mimeType"], "video/VP8");
}

#[tokio::test]
async fn incomplete_offer_is_rejected_with_400() {
    let mut body = offer_body();
    body["offer"]
        .as_object_mut()
        .unwrap()
        .remove("dtlsParameters");

    let response = app().oneshot(post("/offer", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("dtlsParameters"));
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn transport_queries_require_a_transport_id() {
    for uri in [
        "/getIceParameters",
        "/getIceCandidates",
        "/getDtlsParameters",
    ] {
        let response = app().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn unknown_transport_id_maps_to_404() {
    let response = app()
        .oneshot(get("/getIceParameters?transportId=does-not-exist"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn two_phase_flow_over_http() {
    let app = app();

    // createTransport
    let response = app
        .clone()
        .oneshot(post(
            "/createTransport",
            json!({
                "iceParameters": ice_json(),
                "iceCandidates": candidates_json(),
                "dtlsParameters": dtls_json()
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let transport = body_json(response).await;
    let transport_id = transport["id"].as_str().unwrap().to_string();
    assert_eq!(transport["state"], "new");

    // Producing before connect conflicts.
    let response = app
        .clone()
        .oneshot(post(
            "/produce",
            json!({
                "transportId": transport_id,
                "kind": "video",
                "rtpParameters": vp8_rtp_parameters()
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // connectTransport
    let response = app
        .clone()
        .oneshot(post(
            "/connectTransport",
            json!({
                "transportId": transport_id,
                "dtlsParameters": dtls_json()
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "connected");
    assert_eq!(body["dtlsRole"], "server");

    // produce
    let response = app
        .clone()
        .oneshot(post(
            "/produce",
            json!({
                "transportId": transport_id,
                "kind": "video",
                "rtpParameters": vp8_rtp_parameters()
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let producer_id = body_json(response).await["id"].as_str().unwrap().to_string();

    // consume
    let response = app
        .clone()
        .oneshot(post(
            "/consume",
            json!({
                "transportId": transport_id,
                "producerId": producer_id,
                "rtpCapabilities": {
                    "codecs": [{
                        "mimeType": "video/VP8",
                        "kind": "video",
                        "clockRate": 90000
                    }],
                    "headerExtensions": []
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let consumer = body_json(response).await;
    assert_eq!(consumer["producerId"], producer_id.as_str());
    assert_eq!(consumer["kind"], "video");

    // teardown
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/transports/{transport_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "closed");

    // Parameters of a closed transport are gone.
    let response = app
        .oneshot(get(&format!("/getIceParameters?transportId={transport_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_transport_releases_its_session() {
    let signaling = Arc::new(SignalingService::new(
        router_caps(),
        Arc::new(LocalMediaEngine),
    ));
    let app = create_router(Arc::clone(&signaling), &ServerConfig::default());

    let response = app
        .clone()
        .oneshot(post(
            "/createTransport",
            json!({
                "iceParameters": ice_json(),
                "iceCandidates": candidates_json(),
                "dtlsParameters": dtls_json()
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let transport_id = body_json(response).await["id"].as_str().unwrap().to_string();
    assert_eq!(signaling.session_count(), 1);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/transports/{transport_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(signaling.session_count(), 0);
    assert_eq!(signaling.transport_count(), 0);
}

#[tokio::test]
async fn connect_transport_requires_both_fields() {
    let response = app()
        .oneshot(post("/connectTransport", json!({"transportId": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app()
        .oneshot(post("/connectTransport", json!({"dtlsParameters": dtls_json()})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
