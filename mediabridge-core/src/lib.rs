//! mediabridge-core
//!
//! Session, transport and producer/consumer lifecycle management for a
//! WebRTC SFU signaling server.
//!
//! ## Architecture
//!
//! - **`capability`**: pure intersection of router/device capability sets
//! - **`transport`**: transport registry and the
//!   `new -> connecting -> connected -> closed` state machine
//! - **`media`**: producer/consumer table with cascade-on-close rules
//! - **`session`**: the coordinator driving the offer protocol with
//!   compensating cleanup
//! - **`engine`**: the seam to the external ICE/DTLS/SRTP media stack
//!
//! The crate performs no packet forwarding and no cryptography; it owns
//! the negotiation bookkeeping only.

pub mod capability;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod media;
pub mod models;
pub mod session;
pub mod transport;

pub use config::Config;
pub use engine::{LocalMediaEngine, MediaEngine};
pub use error::{Error, Result};
pub use session::{OfferRequest, OfferResponse, SessionEvent, SignalingService};
