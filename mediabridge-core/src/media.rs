//! Producer/consumer table
//!
//! Tracks inbound media streams (producers) and the outbound streams
//! derived from them (consumers), keyed by opaque ids and linked to the
//! transport that carries them. A consumer records which producer it
//! came from but does not own it; closing a producer cascades to every
//! dependent consumer.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::capability;
use crate::error::{Error, Result};
use crate::models::{
    ConsumerId, MediaKind, ProducerId, RtpCapabilities, RtpParameters, SessionId, TransportId,
};
use crate::transport::Transport;

/// One inbound media stream pushed by a client
pub struct Producer {
    pub id: ProducerId,
    pub transport_id: TransportId,
    pub session_id: SessionId,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    closed: AtomicBool,
}

impl Producer {
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns true if this call performed the transition.
    fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn info(&self) -> ProducerInfo {
        ProducerInfo {
            id: self.id.clone(),
            kind: self.kind,
            rtp_parameters: self.rtp_parameters.clone(),
            transport_id: self.transport_id.clone(),
        }
    }
}

/// One outbound media stream derived from a producer
pub struct Consumer {
    pub id: ConsumerId,
    pub transport_id: TransportId,
    pub session_id: SessionId,
    pub producer_id: ProducerId,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    closed: AtomicBool,
}

impl Consumer {
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn info(&self) -> ConsumerInfo {
        ConsumerInfo {
            id: self.id.clone(),
            kind: self.kind,
            rtp_parameters: self.rtp_parameters.clone(),
            producer_id: self.producer_id.clone(),
        }
    }
}

/// Serializable snapshot of a producer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerInfo {
    pub id: ProducerId,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    pub transport_id: TransportId,
}

/// Serializable snapshot of a consumer, as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerInfo {
    pub id: ConsumerId,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    pub producer_id: ProducerId,
}

/// Registry of all producers and consumers
pub struct MediaTable {
    producers: DashMap<ProducerId, Arc<Producer>>,
    consumers: DashMap<ConsumerId, Arc<Consumer>>,
}

impl Default for MediaTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            producers: DashMap::new(),
            consumers: DashMap::new(),
        }
    }

    /// Register a producer on a connected transport.
    pub fn create_producer(
        &self,
        transport: &Transport,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<Arc<Producer>> {
        if !transport.is_connected() {
            return Err(Error::TransportNotConnected(transport.id.clone()));
        }
        if rtp_parameters.is_empty() {
            return Err(Error::InvalidNegotiationParameters(
                "rtpParameters must carry at least one codec".to_string(),
            ));
        }
        if rtp_parameters.kind != kind {
            return Err(Error::InvalidNegotiationParameters(format!(
                "kind '{kind}' does not match rtpParameters kind '{}'",
                rtp_parameters.kind
            )));
        }

        let producer = Arc::new(Producer {
            id: ProducerId::new(),
            transport_id: transport.id.clone(),
            session_id: transport.session_id.clone(),
            kind,
            rtp_parameters,
            closed: AtomicBool::new(false),
        });
        self.producers
            .insert(producer.id.clone(), Arc::clone(&producer));

        info!(
            producer_id = %producer.id,
            transport_id = %producer.transport_id,
            kind = %producer.kind,
            "Created producer"
        );
        Ok(producer)
    }

    /// Derive a consumer from an open producer, on a connected transport.
    ///
    /// The consumer's RTP parameters are the capability-compatible
    /// projection of the producer's parameters onto the consuming
    /// device. A closed producer reads as not found.
    pub fn create_consumer(
        &self,
        transport: &Transport,
        producer_id: &ProducerId,
        device_capabilities: &RtpCapabilities,
    ) -> Result<Arc<Consumer>> {
        if !transport.is_connected() {
            return Err(Error::TransportNotConnected(transport.id.clone()));
        }
        let producer = self.get_producer(producer_id)?;
        if producer.is_closed() {
            return Err(Error::ProducerNotFound(producer_id.clone()));
        }

        let rtp_parameters =
            capability::consumer_rtp_parameters(&producer.rtp_parameters, device_capabilities)?;

        let consumer = Arc::new(Consumer {
            id: ConsumerId::new(),
            transport_id: transport.id.clone(),
            session_id: transport.session_id.clone(),
            producer_id: producer.id.clone(),
            kind: producer.kind,
            rtp_parameters,
            closed: AtomicBool::new(false),
        });
        self.consumers
            .insert(consumer.id.clone(), Arc::clone(&consumer));

        info!(
            consumer_id = %consumer.id,
            producer_id = %consumer.producer_id,
            transport_id = %consumer.transport_id,
            kind = %consumer.kind,
            "Created consumer"
        );
        Ok(consumer)
    }

    pub fn get_producer(&self, producer_id: &ProducerId) -> Result<Arc<Producer>> {
        self.producers
            .get(producer_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::ProducerNotFound(producer_id.clone()))
    }

    pub fn get_consumer(&self, consumer_id: &ConsumerId) -> Result<Arc<Consumer>> {
        self.consumers
            .get(consumer_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::ConsumerNotFound(consumer_id.clone()))
    }

    /// Close a producer and cascade to every consumer derived from it.
    ///
    /// Returns the consumers closed by the cascade so the caller can
    /// report them to the originating sessions.
    pub fn close_producer(&self, producer_id: &ProducerId) -> Result<Vec<Arc<Consumer>>> {
        let producer = self.get_producer(producer_id)?;
        if !producer.close() {
            return Err(Error::AlreadyClosed(format!("producer {producer_id}")));
        }

        let cascaded: Vec<Arc<Consumer>> = self
            .consumers
            .iter()
            .filter(|entry| entry.value().producer_id == *producer_id)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|consumer| consumer.close())
            .collect();

        info!(
            producer_id = %producer_id,
            closed_consumers = cascaded.len(),
            "Closed producer"
        );
        Ok(cascaded)
    }

    /// Close a consumer. No cascade.
    pub fn close_consumer(&self, consumer_id: &ConsumerId) -> Result<()> {
        let consumer = self.get_consumer(consumer_id)?;
        if !consumer.close() {
            return Err(Error::AlreadyClosed(format!("consumer {consumer_id}")));
        }
        debug!(consumer_id = %consumer_id, "Closed consumer");
        Ok(())
    }

    /// Close every producer and consumer carried by a transport.
    ///
    /// Consumers derived from this transport's producers are closed as
    /// well, whichever transport carries them. Returns the consumers
    /// that transitioned to closed.
    pub fn close_for_transport(&self, transport_id: &TransportId) -> Vec<Arc<Consumer>> {
        let closed_producers: Vec<ProducerId> = self
            .producers
            .iter()
            .filter(|entry| entry.value().transport_id == *transport_id)
            .filter(|entry| entry.value().close())
            .map(|entry| entry.key().clone())
            .collect();

        self.consumers
            .iter()
            .filter(|entry| {
                entry.value().transport_id == *transport_id
                    || closed_producers.contains(&entry.value().producer_id)
            })
            .map(|entry| Arc::clone(entry.value()))
            .filter(|consumer| consumer.close())
            .collect()
    }

    /// Unregister everything carried by a transport (teardown/rollback).
    pub fn remove_for_transport(&self, transport_id: &TransportId) {
        self.producers
            .retain(|_, producer| producer.transport_id != *transport_id);
        self.consumers
            .retain(|_, consumer| consumer.transport_id != *transport_id);
    }

    #[must_use]
    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }
}
