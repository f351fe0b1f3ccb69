//! Capability registry
//!
//! Pure intersection of router and device capability sets, and the
//! projection that derives a consumer's RTP parameters from its source
//! producer. No shared state; every function here is safe to call from
//! any number of tasks without synchronization.

use crate::error::{Error, Result};
use crate::models::{MediaKind, RtpCapabilities, RtpParameters};

/// Intersect router capabilities with a device's declared capabilities.
///
/// The result keeps the router's preference order. An empty device set
/// means the device has not declared anything yet and the router set
/// passes through unchanged; once both sides declare codecs, an empty
/// intersection for a kind both sides support is a
/// [`Error::CapabilityMismatch`].
pub fn intersect(router: &RtpCapabilities, device: &RtpCapabilities) -> Result<RtpCapabilities> {
    if device.is_empty() {
        return Ok(router.clone());
    }

    let codecs: Vec<_> = router
        .codecs
        .iter()
        .filter(|rc| device.codecs.iter().any(|dc| rc.matches(dc)))
        .cloned()
        .collect();

    let header_extensions: Vec<_> = router
        .header_extensions
        .iter()
        .filter(|re| {
            device
                .header_extensions
                .iter()
                .any(|de| re.kind == de.kind && re.uri == de.uri)
        })
        .cloned()
        .collect();

    for kind in [MediaKind::Audio, MediaKind::Video] {
        if router.has_kind(kind)
            && device.has_kind(kind)
            && !codecs.iter().any(|c| c.kind == kind)
        {
            return Err(Error::CapabilityMismatch(format!(
                "no common {kind} codec between router and device"
            )));
        }
    }

    if !router.codecs.is_empty() && codecs.is_empty() {
        return Err(Error::CapabilityMismatch(
            "router and device capability sets are disjoint".to_string(),
        ));
    }

    Ok(RtpCapabilities {
        codecs,
        header_extensions,
    })
}

/// Project a producer's RTP parameters onto a consuming device.
///
/// Keeps only the codecs and header extensions the device can receive.
/// An empty device set consumes the producer's parameters verbatim.
pub fn consumer_rtp_parameters(
    producer: &RtpParameters,
    device: &RtpCapabilities,
) -> Result<RtpParameters> {
    if device.is_empty() {
        return Ok(producer.clone());
    }

    let codecs: Vec<_> = producer
        .codecs
        .iter()
        .filter(|pc| {
            device.codecs.iter().any(|dc| {
                dc.kind == producer.kind
                    && dc.mime_type.eq_ignore_ascii_case(&pc.mime_type)
                    && dc.clock_rate == pc.clock_rate
            })
        })
        .cloned()
        .collect();

    if codecs.is_empty() {
        return Err(Error::CapabilityMismatch(format!(
            "device cannot receive any {} codec of the producer",
            producer.kind
        )));
    }

    let header_extensions: Vec<_> = producer
        .header_extensions
        .iter()
        .filter(|pe| {
            device
                .header_extensions
                .iter()
                .any(|de| de.kind == pe.kind && de.uri == pe.uri)
        })
        .cloned()
        .collect();

    Ok(RtpParameters {
        kind: producer.kind,
        codecs,
        encodings: producer.encodings.clone(),
        header_extensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RtpCodecCapability, RtpCodecParameters};

    fn codec(mime: &str, kind: MediaKind, clock_rate: u32) -> RtpCodecCapability {
        RtpCodecCapability {
            mime_type: mime.to_string(),
            kind,
            clock_rate,
            channels: None,
            preferred_payload_type: None,
        }
    }

    fn caps(codecs: Vec<RtpCodecCapability>) -> RtpCapabilities {
        RtpCapabilities {
            codecs,
            header_extensions: vec![],
        }
    }

    #[test]
    fn test_intersect_with_self_is_identity() {
        let set = caps(vec![
            codec("audio/opus", MediaKind::Audio, 48000),
            codec("video/VP8", MediaKind::Video, 90000),
        ]);
        let negotiated = intersect(&set, &set).unwrap();
        assert_eq!(negotiated, set);
    }

    #[test]
    fn test_intersect_disjoint_sets_fails() {
        let router = caps(vec![codec("video/VP8", MediaKind::Video, 90000)]);
        let device = caps(vec![codec("video/H264", MediaKind::Video, 90000)]);
        assert!(matches!(
            intersect(&router, &device),
            Err(Error::CapabilityMismatch(_))
        ));
    }

    #[test]
    fn test_intersect_empty_device_passes_router_through() {
        let router = caps(vec![codec("video/VP8", MediaKind::Video, 90000)]);
        let negotiated = intersect(&router, &RtpCapabilities::default()).unwrap();
        assert_eq!(negotiated, router);
    }

    #[test]
    fn test_intersect_keeps_router_order() {
        let router = caps(vec![
            codec("video/VP8", MediaKind::Video, 90000),
            codec("video/H264", MediaKind::Video, 90000),
        ]);
        let device = caps(vec![
            codec("video/h264", MediaKind::Video, 90000),
            codec("video/vp8", MediaKind::Video, 90000),
        ]);
        let negotiated = intersect(&router, &device).unwrap();
        assert_eq!(negotiated.codecs[0].mime_type, "video/VP8");
        assert_eq!(negotiated.codecs[1].mime_type, "video/H264");
    }

    #[test]
    fn test_intersect_fails_when_shared_kind_has_no_common_codec() {
        let router = caps(vec![
            codec("audio/opus", MediaKind::Audio, 48000),
            codec("video/VP8", MediaKind::Video, 90000),
        ]);
        let device = caps(vec![
            codec("audio/opus", MediaKind::Audio, 48000),
            codec("video/H264", MediaKind::Video, 90000),
        ]);
        assert!(matches!(
            intersect(&router, &device),
            Err(Error::CapabilityMismatch(_))
        ));
    }

    #[test]
    fn test_consumer_projection_filters_codecs() {
        let producer = RtpParameters {
            kind: MediaKind::Video,
            codecs: vec![
                RtpCodecParameters {
                    mime_type: "video/VP8".to_string(),
                    payload_type: 96,
                    clock_rate: 90000,
                    channels: None,
                },
                RtpCodecParameters {
                    mime_type: "video/H264".to_string(),
                    payload_type: 97,
                    clock_rate: 90000,
                    channels: None,
                },
            ],
            encodings: vec![],
            header_extensions: vec![],
        };
        let device = caps(vec![codec("video/VP8", MediaKind::Video, 90000)]);
        let projected = consumer_rtp_parameters(&producer, &device).unwrap();
        assert_eq!(projected.codecs.len(), 1);
        assert_eq!(projected.codecs[0].mime_type, "video/VP8");
    }

    #[test]
    fn test_consumer_projection_mismatch() {
        let producer = RtpParameters {
            kind: MediaKind::Video,
            codecs: vec![RtpCodecParameters {
                mime_type: "video/VP8".to_string(),
                payload_type: 96,
                clock_rate: 90000,
                channels: None,
            }],
            encodings: vec![],
            header_extensions: vec![],
        };
        let device = caps(vec![codec("audio/opus", MediaKind::Audio, 48000)]);
        assert!(matches!(
            consumer_rtp_parameters(&producer, &device),
            Err(Error::CapabilityMismatch(_))
        ));
    }
}
