//! Per-peer session state machine.
//!
//! Transport callbacks arrive from whatever concurrency the transport
//! uses internally. All of them are funneled through one pump task here,
//! so state transitions and payload delivery are serialized before anyone
//! downstream (the sync coordinator, the embedding app) sees them.
//!
//! The session is deliberately dumb about delivery: payloads are surfaced
//! exactly as received, in arrival order, and a failed send is reported,
//! never retried or queued.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::peer::{PeerId, RemotePeer, SessionState};
use crate::infrastructure::transport::{
    Reliability, Transport, TransportError, TransportEvent, EVENT_CHANNEL_CAPACITY,
};

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A send named a peer that is not in the Connected state. The check
    /// runs before the transport is touched, so nothing is partially sent.
    #[error("peer {0} is not connected")]
    NotConnected(PeerId),

    /// A broadcast was attempted with no peer in the Connected state.
    #[error("no connected peers")]
    NoConnectedPeers,

    /// The transport reported a failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Events emitted by the session pump, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// An advertising peer appeared while browsing.
    PeerDiscovered { peer: RemotePeer },
    /// A previously discovered peer went away.
    PeerLost { peer: PeerId },
    /// A peer's connection state changed.
    StateChanged { peer: PeerId, state: SessionState },
    /// A payload arrived from a connected peer, exactly as sent.
    PayloadReceived { peer: PeerId, bytes: Vec<u8> },
}

/// Connection hub for the local endpoint: tracks the state of every peer
/// and owns the transport event pump.
pub struct Session {
    local: PeerId,
    transport: Arc<dyn Transport>,
    states: Mutex<HashMap<PeerId, SessionState>>,
}

impl Session {
    pub fn new(local: PeerId, transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            local,
            transport,
            states: Mutex::new(HashMap::new()),
        })
    }

    /// The identity this session presents to peers.
    pub fn local_peer(&self) -> &PeerId {
        &self.local
    }

    /// Starts the event pump over the transport's event channel and
    /// returns the session event receiver. Call once.
    pub fn start(
        self: &Arc<Self>,
        mut transport_events: mpsc::Receiver<TransportEvent>,
    ) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = transport_events.recv().await {
                if let Some(forward) = this.apply(event) {
                    if tx.send(forward).await.is_err() {
                        break; // consumer gone
                    }
                }
            }
            debug!("transport event channel closed; session pump exiting");
        });
        rx
    }

    /// Applies one transport event to the state machine. Runs only on the
    /// pump task, so all mutation is serialized.
    fn apply(&self, event: TransportEvent) -> Option<SessionEvent> {
        match event {
            TransportEvent::PeerFound { peer, label } => {
                let label = if label.is_empty() { None } else { Some(label.as_str()) };
                Some(SessionEvent::PeerDiscovered {
                    peer: RemotePeer::new(peer, label),
                })
            }
            TransportEvent::PeerLost { peer } => Some(SessionEvent::PeerLost { peer }),
            TransportEvent::StateChanged { peer, state } => {
                let previous = {
                    let mut states = self.states.lock().expect("session state lock poisoned");
                    states
                        .insert(peer.clone(), state)
                        .unwrap_or(SessionState::Disconnected)
                };
                match (previous, state) {
                    (SessionState::Disconnected, SessionState::Connecting)
                    | (SessionState::Connecting, SessionState::Connected)
                    | (_, SessionState::Disconnected) => {}
                    // Peers can appear mid-handshake or repeat a state
                    // after a radio hiccup. Record it, note it, move on.
                    (from, to) => debug!("unexpected transition for {peer}: {from} -> {to}"),
                }
                Some(SessionEvent::StateChanged { peer, state })
            }
            TransportEvent::Payload { peer, bytes } => {
                if !self.state_of(&peer).can_transfer() {
                    warn!("dropping payload from non-connected peer {peer}");
                    return None;
                }
                Some(SessionEvent::PayloadReceived { peer, bytes })
            }
        }
    }

    /// Invites a discovered peer, waiting at most `timeout` for the
    /// accept. State transitions arrive as [`SessionEvent::StateChanged`].
    ///
    /// # Errors
    ///
    /// Propagates the transport error; a timed-out or unreachable peer
    /// ends up `Disconnected`.
    pub async fn invite(&self, peer: &PeerId, timeout: Duration) -> Result<(), SessionError> {
        self.transport.invite(peer.clone(), timeout).await?;
        Ok(())
    }

    /// Sends `payload` to the named peers.
    ///
    /// # Errors
    ///
    /// Fails fast with [`SessionError::NotConnected`] if any target is not
    /// Connected — the transport is not touched in that case. Transport
    /// failures are reported as-is; the session never retries.
    pub async fn send_to(
        &self,
        targets: &[PeerId],
        payload: Vec<u8>,
        reliability: Reliability,
    ) -> Result<(), SessionError> {
        {
            let states = self.states.lock().expect("session state lock poisoned");
            for target in targets {
                let connected = states
                    .get(target)
                    .map(|s| s.can_transfer())
                    .unwrap_or(false);
                if !connected {
                    return Err(SessionError::NotConnected(target.clone()));
                }
            }
        }
        self.transport
            .send(payload, targets.to_vec(), reliability)
            .await?;
        Ok(())
    }

    /// Sends `payload` to every currently connected peer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoConnectedPeers`] when nothing is
    /// connected; transport failures are reported without retry.
    pub async fn send_to_connected(
        &self,
        payload: Vec<u8>,
        reliability: Reliability,
    ) -> Result<(), SessionError> {
        let targets = self.connected_peers();
        if targets.is_empty() {
            return Err(SessionError::NoConnectedPeers);
        }
        self.transport.send(payload, targets, reliability).await?;
        Ok(())
    }

    /// Snapshot of all peers currently in the Connected state.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        let states = self.states.lock().expect("session state lock poisoned");
        states
            .iter()
            .filter(|(_, state)| state.can_transfer())
            .map(|(peer, _)| peer.clone())
            .collect()
    }

    /// Current state of `peer`; unknown peers are Disconnected.
    pub fn state_of(&self, peer: &PeerId) -> SessionState {
        let states = self.states.lock().expect("session state lock poisoned");
        states
            .get(peer)
            .copied()
            .unwrap_or(SessionState::Disconnected)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::transport::MockTransport;

    fn connected_event(name: &str) -> TransportEvent {
        TransportEvent::StateChanged {
            peer: PeerId::new(name),
            state: SessionState::Connected,
        }
    }

    fn session_with_mock(mock: MockTransport) -> Arc<Session> {
        Session::new(PeerId::new("local"), Arc::new(mock))
    }

    #[tokio::test]
    async fn test_state_machine_follows_transport_events() {
        let session = session_with_mock(MockTransport::new());
        let (tx, rx) = mpsc::channel(16);
        let mut events = session.start(rx);

        let peer = PeerId::new("iPad");
        tx.send(TransportEvent::StateChanged {
            peer: peer.clone(),
            state: SessionState::Connecting,
        })
        .await
        .unwrap();
        tx.send(TransportEvent::StateChanged {
            peer: peer.clone(),
            state: SessionState::Connected,
        })
        .await
        .unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::StateChanged {
                peer: peer.clone(),
                state: SessionState::Connecting,
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::StateChanged {
                peer: peer.clone(),
                state: SessionState::Connected,
            }
        );
        assert_eq!(session.state_of(&peer), SessionState::Connected);
        assert_eq!(session.connected_peers(), vec![peer]);
    }

    #[tokio::test]
    async fn test_unknown_peer_is_disconnected() {
        let session = session_with_mock(MockTransport::new());
        assert_eq!(
            session.state_of(&PeerId::new("stranger")),
            SessionState::Disconnected
        );
    }

    #[tokio::test]
    async fn test_payload_from_connected_peer_is_surfaced_verbatim() {
        let session = session_with_mock(MockTransport::new());
        let (tx, rx) = mpsc::channel(16);
        let mut events = session.start(rx);

        tx.send(connected_event("iPad")).await.unwrap();
        tx.send(TransportEvent::Payload {
            peer: PeerId::new("iPad"),
            bytes: vec![9, 8, 7],
        })
        .await
        .unwrap();

        let _state = events.recv().await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::PayloadReceived {
                peer: PeerId::new("iPad"),
                bytes: vec![9, 8, 7],
            }
        );
    }

    #[tokio::test]
    async fn test_payload_from_non_connected_peer_is_dropped() {
        let session = session_with_mock(MockTransport::new());
        let (tx, rx) = mpsc::channel(16);
        let mut events = session.start(rx);

        tx.send(TransportEvent::Payload {
            peer: PeerId::new("stranger"),
            bytes: vec![1],
        })
        .await
        .unwrap();
        tx.send(connected_event("iPad")).await.unwrap();

        // The stranger's payload never surfaces; the next event is the
        // state change.
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::StateChanged {
                peer: PeerId::new("iPad"),
                state: SessionState::Connected,
            }
        );
    }

    #[tokio::test]
    async fn test_send_to_disconnected_peer_fails_fast_without_touching_transport() {
        // No expectations set: any call on the mock transport panics.
        let session = session_with_mock(MockTransport::new());

        let err = session
            .send_to(
                &[PeerId::new("iPad")],
                vec![1, 2, 3],
                Reliability::Unreliable,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotConnected(peer) if peer == PeerId::new("iPad")));
    }

    #[tokio::test]
    async fn test_send_to_connected_with_no_peers_fails_fast() {
        let session = session_with_mock(MockTransport::new());
        let err = session
            .send_to_connected(vec![1], Reliability::Unreliable)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NoConnectedPeers));
    }

    #[tokio::test]
    async fn test_send_to_connected_peer_forwards_to_transport() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|payload, targets, _| {
                payload.as_slice() == [42]
                    && targets.len() == 1
                    && targets[0] == PeerId::new("iPad")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let session = session_with_mock(mock);

        let (tx, rx) = mpsc::channel(16);
        let mut events = session.start(rx);
        tx.send(connected_event("iPad")).await.unwrap();
        let _ = events.recv().await;

        session
            .send_to(&[PeerId::new("iPad")], vec![42], Reliability::Unreliable)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transport_send_failure_is_reported_not_retried() {
        let mut mock = MockTransport::new();
        mock.expect_send().times(1).returning(|_, _, _| {
            Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "radio gone",
            )))
        });
        let session = session_with_mock(mock);

        let (tx, rx) = mpsc::channel(16);
        let mut events = session.start(rx);
        tx.send(connected_event("iPad")).await.unwrap();
        let _ = events.recv().await;

        let err = session
            .send_to(&[PeerId::new("iPad")], vec![1], Reliability::Unreliable)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
    }

    #[tokio::test]
    async fn test_invite_forwards_peer_and_timeout() {
        let mut mock = MockTransport::new();
        mock.expect_invite()
            .withf(|peer, timeout| {
                *peer == PeerId::new("iPad") && *timeout == Duration::from_secs(10)
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let session = session_with_mock(mock);

        session
            .invite(&PeerId::new("iPad"), Duration::from_secs(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_event_removes_peer_from_connected_set() {
        let session = session_with_mock(MockTransport::new());
        let (tx, rx) = mpsc::channel(16);
        let mut events = session.start(rx);

        tx.send(connected_event("iPad")).await.unwrap();
        tx.send(TransportEvent::StateChanged {
            peer: PeerId::new("iPad"),
            state: SessionState::Disconnected,
        })
        .await
        .unwrap();

        let _ = events.recv().await;
        let _ = events.recv().await;
        assert!(session.connected_peers().is_empty());
    }

    #[tokio::test]
    async fn test_discovery_events_are_forwarded_with_label_fallback() {
        let session = session_with_mock(MockTransport::new());
        let (tx, rx) = mpsc::channel(16);
        let mut events = session.start(rx);

        tx.send(TransportEvent::PeerFound {
            peer: PeerId::new("Studio on iPhone"),
            label: String::new(),
        })
        .await
        .unwrap();

        match events.recv().await.unwrap() {
            SessionEvent::PeerDiscovered { peer } => {
                assert_eq!(peer.label, "Studio on iPhone");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
