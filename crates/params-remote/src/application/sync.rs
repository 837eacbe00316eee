//! The sync coordinator: one registry push per new connection, and
//! decode-and-merge of everything that arrives.
//!
//! The coordinator runs a single task over the session event stream, so
//! every registry mutation happens on one serialized context. Encoding
//! and decoding are pure and run outside the registry lock; only the
//! clone-for-encode and the merge itself hold it.
//!
//! Nothing is pushed except on the connect trigger (after a short settle
//! delay that lets the transport finish its handshake bookkeeping).
//! Edits made after that point do not propagate on their own — an
//! embedding app that wants a manual refresh calls
//! [`SyncCoordinator::push_now`].

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time;
use tracing::{debug, info, warn};

use params_core::{decode_set, encode_set, CodecError, ParameterSet};

use crate::application::session::{Session, SessionError, SessionEvent};
use crate::domain::peer::{PeerId, SessionState};
use crate::infrastructure::transport::{Reliability, EVENT_CHANNEL_CAPACITY};

/// Errors surfaced by an explicit registry push.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The registry could not be encoded.
    #[error("failed to encode registry: {0}")]
    Encode(#[from] CodecError),

    /// The session refused or the transport failed the send.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Notifications for subscribers of the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A remote set was decoded and merged; one event per applied payload.
    RegistryUpdated {
        /// Provenance tag of the set that was applied.
        source: String,
        /// Number of parameters updated or added.
        applied: usize,
    },
    /// An inbound payload failed to decode and was dropped whole.
    ApplyFailed { peer: PeerId, error: CodecError },
    /// The on-connect push (or an explicit one) failed. Not retried.
    PushFailed { peer: PeerId, error: String },
}

/// Pushes the registry on connect and applies inbound parameter sets.
pub struct SyncCoordinator {
    registry: Arc<Mutex<ParameterSet>>,
    session: Arc<Session>,
    settle_delay: Duration,
}

impl SyncCoordinator {
    pub fn new(
        registry: Arc<Mutex<ParameterSet>>,
        session: Arc<Session>,
        settle_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            session,
            settle_delay,
        })
    }

    /// Shared handle to the registry this coordinator maintains.
    pub fn registry(&self) -> Arc<Mutex<ParameterSet>> {
        Arc::clone(&self.registry)
    }

    /// Starts the coordination task over the session event stream and
    /// returns the subscriber channel. Call once.
    pub fn start(
        self: &Arc<Self>,
        mut session_events: mpsc::Receiver<SessionEvent>,
    ) -> mpsc::Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = session_events.recv().await {
                match event {
                    SessionEvent::StateChanged {
                        peer,
                        state: SessionState::Connected,
                    } => {
                        info!("{peer} connected; scheduling registry push");
                        let this = Arc::clone(&this);
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            time::sleep(this.settle_delay).await;
                            if let Err(error) = this.push_now().await {
                                warn!("registry push after {peer} connected failed: {error}");
                                let _ = tx
                                    .send(SyncEvent::PushFailed {
                                        peer,
                                        error: error.to_string(),
                                    })
                                    .await;
                            }
                        });
                    }
                    SessionEvent::PayloadReceived { peer, bytes } => {
                        this.apply_payload(peer, &bytes, &tx).await;
                    }
                    SessionEvent::StateChanged { peer, state } => {
                        debug!("{peer} is now {state}");
                    }
                    SessionEvent::PeerDiscovered { peer } => {
                        debug!("discovered {} ({})", peer.id, peer.label);
                    }
                    SessionEvent::PeerLost { peer } => {
                        debug!("lost {peer}");
                    }
                }
            }
            debug!("session event channel closed; sync coordinator exiting");
        });
        rx
    }

    /// Encodes the current registry and sends it to every connected peer,
    /// unreliable. This is the one send path; the on-connect trigger runs
    /// it after the settle delay.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] for encode failures, for
    /// [`SessionError::NoConnectedPeers`], and for transport failures.
    /// Never retries.
    pub async fn push_now(&self) -> Result<(), SyncError> {
        let snapshot = {
            let registry = self.registry.lock().await;
            registry.clone()
        };
        let bytes = encode_set(&snapshot)?;
        debug!("pushing registry ({} bytes) to connected peers", bytes.len());
        self.session
            .send_to_connected(bytes, Reliability::Unreliable)
            .await?;
        Ok(())
    }

    /// Decodes one inbound payload and merges it into the registry.
    /// A decode failure drops the payload whole — the registry is not
    /// touched — and reports the error.
    async fn apply_payload(&self, peer: PeerId, bytes: &[u8], tx: &mpsc::Sender<SyncEvent>) {
        match decode_set(bytes) {
            Ok(remote) => {
                let (source, applied) = {
                    let mut registry = self.registry.lock().await;
                    let applied = registry.merge_from(remote);
                    (registry.source.clone(), applied)
                };
                info!("applied {applied} parameters from {peer} (source {source:?})");
                let _ = tx.send(SyncEvent::RegistryUpdated { source, applied }).await;
            }
            Err(error) => {
                warn!("dropping undecodable payload from {peer}: {error}");
                let _ = tx.send(SyncEvent::ApplyFailed { peer, error }).await;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
