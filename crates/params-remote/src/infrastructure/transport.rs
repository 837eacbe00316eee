//! The transport boundary: an opaque byte pipe with peer identity tags.
//!
//! The session and sync layers treat the proximity transport purely through
//! this trait. A transport:
//!
//! - publishes a discoverable record for the local endpoint (`advertise`),
//! - reports peers appearing and disappearing while browsing (`browse`),
//! - establishes connections via a bounded-wait invitation (`invite`),
//! - moves raw payload bytes to connected peers (`send`).
//!
//! All asynchronous happenings — discovery, connection state changes,
//! inbound payloads — arrive on a single [`TransportEvent`] channel that
//! the concrete transport hands out exactly once. Delivery is best-effort:
//! nothing here retries, queues, or resequences.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::peer::{PeerId, SessionState};

/// Delivery mode requested for a payload.
///
/// The default parameter push uses [`Unreliable`](Reliability::Unreliable);
/// a transport without a reliable path may serve both modes the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    Reliable,
    Unreliable,
}

/// Errors surfaced by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A socket operation failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The invited peer did not accept within the bounded wait.
    #[error("peer {peer} did not accept the invitation within {seconds}s")]
    InviteTimeout { peer: PeerId, seconds: u64 },

    /// The named peer is not known to the transport (never discovered, or
    /// its discovery record has expired).
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// The payload exceeds what the transport can carry in one message.
    #[error("payload of {size} bytes exceeds the transport limit of {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// The transport's internal event channel is gone; the endpoint has
    /// shut down.
    #[error("transport channel closed")]
    ChannelClosed,
}

/// Events emitted by a transport on its single event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// An advertising peer came into range while browsing.
    PeerFound { peer: PeerId, label: String },
    /// A previously found peer went out of range.
    PeerLost { peer: PeerId },
    /// The connection state of a peer changed.
    StateChanged { peer: PeerId, state: SessionState },
    /// Raw payload bytes arrived from a peer, exactly as sent.
    Payload { peer: PeerId, bytes: Vec<u8> },
}

/// Capacity of the event channel between a transport and the session pump.
pub const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Convenience alias for the sending half of a transport event channel.
pub type TransportEventSender = mpsc::Sender<TransportEvent>;

/// The byte-pipe boundary the application layer programs against.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publishes a discoverable record for the local endpoint under
    /// `service_tag`, carrying `label` as the human-readable name.
    /// Idempotent while already advertising.
    async fn advertise(&self, label: String, service_tag: String) -> Result<(), TransportError>;

    /// Withdraws the discovery record. A no-op when not advertising.
    async fn stop_advertising(&self) -> Result<(), TransportError>;

    /// Starts watching for peers advertising under `service_tag`.
    /// Add/remove events arrive on the transport event channel.
    async fn browse(&self, service_tag: String) -> Result<(), TransportError>;

    /// Invites `peer` to a session, waiting at most `timeout` for the
    /// peer to accept. Connection state changes arrive on the event
    /// channel.
    async fn invite(&self, peer: PeerId, timeout: Duration) -> Result<(), TransportError>;

    /// Sends `payload` to every peer in `targets`. Best-effort: an error
    /// reports failure, success does not guarantee delivery.
    async fn send(
        &self,
        payload: Vec<u8>,
        targets: Vec<PeerId>,
        reliability: Reliability,
    ) -> Result<(), TransportError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
