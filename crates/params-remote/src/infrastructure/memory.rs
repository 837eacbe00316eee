//! In-process mesh transport for deterministic tests.
//!
//! [`MemoryMesh`] plays the role of the radio: endpoints registered on the
//! same mesh can discover each other, connect, and exchange payloads
//! without any sockets. Advertising endpoints auto-accept invitations,
//! matching the behavior of the real host side.
//!
//! The mesh is not cfg-gated: embedding applications use it to test their
//! own sync wiring without a network.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::peer::{PeerId, SessionState};
use crate::infrastructure::transport::{
    Reliability, Transport, TransportError, TransportEvent, EVENT_CHANNEL_CAPACITY,
};

#[derive(Default)]
struct EndpointState {
    events: Option<mpsc::Sender<TransportEvent>>,
    /// `(service_tag, label)` while advertising.
    advertising: Option<(String, String)>,
    /// Service tag while browsing.
    browsing: Option<String>,
    connections: HashSet<PeerId>,
}

#[derive(Default)]
struct MeshState {
    endpoints: HashMap<PeerId, EndpointState>,
}

/// The shared in-process radio all [`MemoryTransport`] endpoints hang off.
#[derive(Clone, Default)]
pub struct MemoryMesh {
    state: Arc<Mutex<MeshState>>,
}

impl MemoryMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an endpoint on the mesh and returns its transport handle
    /// together with the event channel receiver.
    pub fn endpoint(&self, name: &str) -> (MemoryTransport, mpsc::Receiver<TransportEvent>) {
        let peer = PeerId::new(name);
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        {
            let mut state = self.state.lock().expect("mesh lock poisoned");
            let endpoint = state.endpoints.entry(peer.clone()).or_default();
            endpoint.events = Some(tx);
        }
        (
            MemoryTransport {
                state: Arc::clone(&self.state),
                local: peer,
            },
            rx,
        )
    }

    /// Severs the link between two connected endpoints, as if the radio
    /// dropped. Both sides observe `Disconnected`.
    pub fn drop_link(&self, a: &PeerId, b: &PeerId) {
        let mut deliveries = Vec::new();
        {
            let mut state = self.state.lock().expect("mesh lock poisoned");
            for (this, other) in [(a, b), (b, a)] {
                if let Some(endpoint) = state.endpoints.get_mut(this) {
                    if endpoint.connections.remove(other) {
                        if let Some(tx) = endpoint.events.clone() {
                            deliveries.push((
                                tx,
                                TransportEvent::StateChanged {
                                    peer: other.clone(),
                                    state: SessionState::Disconnected,
                                },
                            ));
                        }
                    }
                }
            }
        }
        deliver(deliveries);
    }

    /// Removes an endpoint entirely: its links drop and browsers lose it.
    pub fn remove_endpoint(&self, name: &str) {
        let peer = PeerId::new(name);
        let mut deliveries = Vec::new();
        {
            let mut state = self.state.lock().expect("mesh lock poisoned");
            let was_advertising = state
                .endpoints
                .get(&peer)
                .and_then(|e| e.advertising.clone());
            state.endpoints.remove(&peer);

            for endpoint in state.endpoints.values_mut() {
                let Some(tx) = endpoint.events.clone() else {
                    continue;
                };
                if endpoint.connections.remove(&peer) {
                    deliveries.push((
                        tx.clone(),
                        TransportEvent::StateChanged {
                            peer: peer.clone(),
                            state: SessionState::Disconnected,
                        },
                    ));
                }
                if let Some((tag, _)) = &was_advertising {
                    if endpoint.browsing.as_deref() == Some(tag.as_str()) {
                        deliveries.push((tx, TransportEvent::PeerLost { peer: peer.clone() }));
                    }
                }
            }
        }
        deliver(deliveries);
    }
}

/// One endpoint's view of the [`MemoryMesh`].
pub struct MemoryTransport {
    state: Arc<Mutex<MeshState>>,
    local: PeerId,
}

impl MemoryTransport {
    pub fn local_peer(&self) -> &PeerId {
        &self.local
    }
}

/// Best-effort event delivery: a full or closed channel drops the event,
/// exactly like a radio dropping a datagram.
fn deliver(deliveries: Vec<(mpsc::Sender<TransportEvent>, TransportEvent)>) {
    for (tx, event) in deliveries {
        if let Err(e) = tx.try_send(event) {
            warn!("memory mesh dropped event: {e}");
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn advertise(&self, label: String, service_tag: String) -> Result<(), TransportError> {
        let mut deliveries = Vec::new();
        {
            let mut state = self.state.lock().expect("mesh lock poisoned");
            let endpoint = state
                .endpoints
                .get_mut(&self.local)
                .ok_or(TransportError::ChannelClosed)?;
            endpoint.advertising = Some((service_tag.clone(), label.clone()));

            // Everyone already browsing this tag sees the endpoint appear.
            for (peer, other) in &state.endpoints {
                if *peer == self.local {
                    continue;
                }
                if other.browsing.as_deref() == Some(service_tag.as_str()) {
                    if let Some(tx) = other.events.clone() {
                        deliveries.push((
                            tx,
                            TransportEvent::PeerFound {
                                peer: self.local.clone(),
                                label: label.clone(),
                            },
                        ));
                    }
                }
            }
        }
        deliver(deliveries);
        Ok(())
    }

    async fn stop_advertising(&self) -> Result<(), TransportError> {
        let mut deliveries = Vec::new();
        {
            let mut state = self.state.lock().expect("mesh lock poisoned");
            let Some(endpoint) = state.endpoints.get_mut(&self.local) else {
                return Ok(());
            };
            let Some((tag, _)) = endpoint.advertising.take() else {
                return Ok(());
            };
            for (peer, other) in &state.endpoints {
                if *peer == self.local {
                    continue;
                }
                if other.browsing.as_deref() == Some(tag.as_str()) {
                    if let Some(tx) = other.events.clone() {
                        deliveries.push((
                            tx,
                            TransportEvent::PeerLost {
                                peer: self.local.clone(),
                            },
                        ));
                    }
                }
            }
        }
        deliver(deliveries);
        Ok(())
    }

    async fn browse(&self, service_tag: String) -> Result<(), TransportError> {
        let mut deliveries = Vec::new();
        {
            let mut state = self.state.lock().expect("mesh lock poisoned");
            let local_tx = state
                .endpoints
                .get(&self.local)
                .and_then(|e| e.events.clone())
                .ok_or(TransportError::ChannelClosed)?;

            if let Some(endpoint) = state.endpoints.get_mut(&self.local) {
                endpoint.browsing = Some(service_tag.clone());
            }

            // Report every endpoint already advertising this tag.
            for (peer, other) in &state.endpoints {
                if *peer == self.local {
                    continue;
                }
                if let Some((tag, label)) = &other.advertising {
                    if *tag == service_tag {
                        deliveries.push((
                            local_tx.clone(),
                            TransportEvent::PeerFound {
                                peer: peer.clone(),
                                label: label.clone(),
                            },
                        ));
                    }
                }
            }
        }
        deliver(deliveries);
        Ok(())
    }

    async fn invite(&self, peer: PeerId, timeout: Duration) -> Result<(), TransportError> {
        let mut deliveries = Vec::new();
        let result = {
            let mut state = self.state.lock().expect("mesh lock poisoned");
            let local_tx = state
                .endpoints
                .get(&self.local)
                .and_then(|e| e.events.clone())
                .ok_or(TransportError::ChannelClosed)?;

            let Some(remote) = state.endpoints.get(&peer) else {
                return Err(TransportError::UnknownPeer(peer));
            };
            let remote_tx = remote.events.clone();
            let accepts = remote.advertising.is_some();

            deliveries.push((
                local_tx.clone(),
                TransportEvent::StateChanged {
                    peer: peer.clone(),
                    state: SessionState::Connecting,
                },
            ));

            if accepts {
                // Advertisers auto-accept, so the handshake completes
                // immediately on both sides.
                state
                    .endpoints
                    .get_mut(&self.local)
                    .expect("local endpoint present")
                    .connections
                    .insert(peer.clone());
                state
                    .endpoints
                    .get_mut(&peer)
                    .expect("remote endpoint present")
                    .connections
                    .insert(self.local.clone());

                if let Some(remote_tx) = remote_tx {
                    deliveries.push((
                        remote_tx.clone(),
                        TransportEvent::StateChanged {
                            peer: self.local.clone(),
                            state: SessionState::Connecting,
                        },
                    ));
                    deliveries.push((
                        remote_tx,
                        TransportEvent::StateChanged {
                            peer: self.local.clone(),
                            state: SessionState::Connected,
                        },
                    ));
                }
                deliveries.push((
                    local_tx,
                    TransportEvent::StateChanged {
                        peer: peer.clone(),
                        state: SessionState::Connected,
                    },
                ));
                Ok(())
            } else {
                debug!("peer {peer} is not advertising; invitation goes unanswered");
                deliveries.push((
                    local_tx,
                    TransportEvent::StateChanged {
                        peer: peer.clone(),
                        state: SessionState::Disconnected,
                    },
                ));
                Err(TransportError::InviteTimeout {
                    peer,
                    seconds: timeout.as_secs(),
                })
            }
        };
        deliver(deliveries);
        result
    }

    async fn send(
        &self,
        payload: Vec<u8>,
        targets: Vec<PeerId>,
        _reliability: Reliability,
    ) -> Result<(), TransportError> {
        let mut deliveries = Vec::new();
        {
            let state = self.state.lock().expect("mesh lock poisoned");
            let local = state
                .endpoints
                .get(&self.local)
                .ok_or(TransportError::ChannelClosed)?;

            for target in &targets {
                if !local.connections.contains(target) {
                    return Err(TransportError::UnknownPeer(target.clone()));
                }
                if let Some(tx) = state.endpoints.get(target).and_then(|e| e.events.clone()) {
                    deliveries.push((
                        tx,
                        TransportEvent::Payload {
                            peer: self.local.clone(),
                            bytes: payload.clone(),
                        },
                    ));
                }
            }
        }
        deliver(deliveries);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_browser_sees_existing_advertiser() {
        let mesh = MemoryMesh::new();
        let (host, _host_rx) = mesh.endpoint("host");
        let (remote, mut remote_rx) = mesh.endpoint("remote");

        host.advertise("Studio".into(), "param-tune".into())
            .await
            .unwrap();
        remote.browse("param-tune".into()).await.unwrap();

        let event = remote_rx.recv().await.unwrap();
        assert_eq!(
            event,
            TransportEvent::PeerFound {
                peer: PeerId::new("host"),
                label: "Studio".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_advertiser_appearing_later_reaches_browser() {
        let mesh = MemoryMesh::new();
        let (host, _host_rx) = mesh.endpoint("host");
        let (remote, mut remote_rx) = mesh.endpoint("remote");

        remote.browse("param-tune".into()).await.unwrap();
        host.advertise("Studio".into(), "param-tune".into())
            .await
            .unwrap();

        let event = remote_rx.recv().await.unwrap();
        assert!(matches!(event, TransportEvent::PeerFound { .. }));
    }

    #[tokio::test]
    async fn test_browse_ignores_other_service_tags() {
        let mesh = MemoryMesh::new();
        let (host, _host_rx) = mesh.endpoint("host");
        let (remote, mut remote_rx) = mesh.endpoint("remote");

        host.advertise("Studio".into(), "other-service".into())
            .await
            .unwrap();
        remote.browse("param-tune".into()).await.unwrap();

        assert!(remote_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invite_of_advertiser_connects_both_sides() {
        let mesh = MemoryMesh::new();
        let (host, mut host_rx) = mesh.endpoint("host");
        let (remote, mut remote_rx) = mesh.endpoint("remote");

        host.advertise("Studio".into(), "param-tune".into())
            .await
            .unwrap();
        remote.browse("param-tune".into()).await.unwrap();
        let _found = remote_rx.recv().await.unwrap();

        remote
            .invite(PeerId::new("host"), Duration::from_secs(10))
            .await
            .unwrap();

        // Remote side: Connecting then Connected.
        assert_eq!(
            remote_rx.recv().await.unwrap(),
            TransportEvent::StateChanged {
                peer: PeerId::new("host"),
                state: SessionState::Connecting,
            }
        );
        assert_eq!(
            remote_rx.recv().await.unwrap(),
            TransportEvent::StateChanged {
                peer: PeerId::new("host"),
                state: SessionState::Connected,
            }
        );

        // Host side mirrors the transition for the inviter.
        assert_eq!(
            host_rx.recv().await.unwrap(),
            TransportEvent::StateChanged {
                peer: PeerId::new("remote"),
                state: SessionState::Connecting,
            }
        );
        assert_eq!(
            host_rx.recv().await.unwrap(),
            TransportEvent::StateChanged {
                peer: PeerId::new("remote"),
                state: SessionState::Connected,
            }
        );
    }

    #[tokio::test]
    async fn test_invite_of_silent_peer_times_out() {
        let mesh = MemoryMesh::new();
        let (_host, _host_rx) = mesh.endpoint("host");
        let (remote, _remote_rx) = mesh.endpoint("remote");

        let err = remote
            .invite(PeerId::new("host"), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InviteTimeout { .. }));
    }

    #[tokio::test]
    async fn test_invite_of_unknown_peer_fails() {
        let mesh = MemoryMesh::new();
        let (remote, _rx) = mesh.endpoint("remote");
        let err = remote
            .invite(PeerId::new("ghost"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownPeer(_)));
    }

    #[tokio::test]
    async fn test_send_reaches_connected_peer_verbatim() {
        let mesh = MemoryMesh::new();
        let (host, mut host_rx) = mesh.endpoint("host");
        let (remote, mut remote_rx) = mesh.endpoint("remote");

        host.advertise("Studio".into(), "param-tune".into())
            .await
            .unwrap();
        remote.browse("param-tune".into()).await.unwrap();
        remote
            .invite(PeerId::new("host"), Duration::from_secs(10))
            .await
            .unwrap();
        // Drain the state events on both sides.
        while let Ok(event) = remote_rx.try_recv() {
            let _ = event;
        }
        while let Ok(event) = host_rx.try_recv() {
            let _ = event;
        }

        host.send(
            vec![1, 2, 3],
            vec![PeerId::new("remote")],
            Reliability::Unreliable,
        )
        .await
        .unwrap();

        assert_eq!(
            remote_rx.recv().await.unwrap(),
            TransportEvent::Payload {
                peer: PeerId::new("host"),
                bytes: vec![1, 2, 3],
            }
        );
    }

    #[tokio::test]
    async fn test_send_to_unconnected_peer_fails() {
        let mesh = MemoryMesh::new();
        let (host, _host_rx) = mesh.endpoint("host");
        let (_remote, _remote_rx) = mesh.endpoint("remote");

        let err = host
            .send(vec![1], vec![PeerId::new("remote")], Reliability::Unreliable)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownPeer(_)));
    }

    #[tokio::test]
    async fn test_drop_link_disconnects_both_sides() {
        let mesh = MemoryMesh::new();
        let (host, mut host_rx) = mesh.endpoint("host");
        let (remote, mut remote_rx) = mesh.endpoint("remote");

        host.advertise("Studio".into(), "param-tune".into())
            .await
            .unwrap();
        remote.browse("param-tune".into()).await.unwrap();
        remote
            .invite(PeerId::new("host"), Duration::from_secs(10))
            .await
            .unwrap();
        while remote_rx.try_recv().is_ok() {}
        while host_rx.try_recv().is_ok() {}

        mesh.drop_link(&PeerId::new("host"), &PeerId::new("remote"));

        assert_eq!(
            remote_rx.recv().await.unwrap(),
            TransportEvent::StateChanged {
                peer: PeerId::new("host"),
                state: SessionState::Disconnected,
            }
        );
        assert_eq!(
            host_rx.recv().await.unwrap(),
            TransportEvent::StateChanged {
                peer: PeerId::new("remote"),
                state: SessionState::Disconnected,
            }
        );
    }
}
