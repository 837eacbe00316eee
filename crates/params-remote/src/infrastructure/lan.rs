//! UDP LAN implementation of the transport boundary.
//!
//! Discovery uses broadcast datagrams on a fixed port: an advertising
//! endpoint periodically broadcasts an announce record (instance id,
//! service tag, label, data port) and a browsing endpoint tracks
//! announcers, aging them out after three missed intervals. Sessions ride
//! on a second, ephemeral data socket: `invite`/`accept` datagrams perform
//! the handshake and payloads travel as single datagrams.
//!
//! Delivery is datagram best-effort end to end. `Reliability::Reliable`
//! is accepted at the boundary but this transport has only the one path.
//!
//! One endpoint per host: the discovery port is bound exclusively, so a
//! second endpoint on the same machine needs a different
//! `discovery_port` in its transport configuration.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::config::TransportConfig;
use crate::domain::peer::{PeerId, SessionState};
use crate::infrastructure::transport::{
    Reliability, Transport, TransportError, TransportEvent, EVENT_CHANNEL_CAPACITY,
};

/// Largest payload accepted for a single datagram, leaving headroom for
/// the packet framing inside a 64 KiB UDP datagram.
pub const MAX_PAYLOAD_BYTES: usize = 60 * 1024;

/// Receive buffer size for both sockets.
const RECV_BUFFER_BYTES: usize = 64 * 1024;

/// A peer is lost after this many announce intervals without a record.
const LOST_AFTER_INTERVALS: u32 = 3;

// ── Wire packets ──────────────────────────────────────────────────────────────

/// Framing packets exchanged between LAN endpoints. The payload bytes
/// inside [`LanPacket::Payload`] are opaque to this layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
enum LanPacket {
    /// Broadcast on the discovery port while advertising.
    Announce {
        instance: Uuid,
        service_tag: String,
        display_name: String,
        label: String,
        data_port: u16,
    },
    /// Sent to an advertiser's data socket to request a session.
    Invite { display_name: String },
    /// Advertiser's reply completing the handshake.
    Accept { display_name: String },
    /// Graceful disconnect notice.
    Bye { display_name: String },
    /// Application payload, delivered verbatim.
    Payload { display_name: String, bytes: Vec<u8> },
}

fn encode_packet(packet: &LanPacket) -> Result<Vec<u8>, TransportError> {
    bincode::serialize(packet).map_err(|e| {
        TransportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

// ── Endpoint state ────────────────────────────────────────────────────────────

/// Discovery record for a peer seen on the network.
#[derive(Debug, Clone)]
struct PeerRecord {
    id: PeerId,
    label: String,
    data_addr: SocketAddr,
    last_seen: Instant,
}

#[derive(Default)]
struct LanState {
    /// `(service_tag, label)` while advertising.
    advertising: Option<(String, String)>,
    /// Service tag while browsing.
    browsing: Option<String>,
    /// Discovered announcers, keyed by their instance id.
    discovered: HashMap<Uuid, PeerRecord>,
    /// Data addresses of peers with an established session.
    connected: HashMap<PeerId, SocketAddr>,
    /// Invitations awaiting an `Accept`.
    pending_invites: HashMap<PeerId, oneshot::Sender<()>>,
}

/// UDP implementation of [`Transport`].
pub struct LanTransport {
    instance: Uuid,
    local: PeerId,
    config: TransportConfig,
    discovery_socket: Arc<UdpSocket>,
    data_socket: Arc<UdpSocket>,
    state: Arc<Mutex<LanState>>,
    events: mpsc::Sender<TransportEvent>,
}

impl LanTransport {
    /// Binds the discovery and data sockets and spawns the receive,
    /// announce, and expiry tasks. Returns the transport together with
    /// the event channel receiver.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] when either socket cannot be bound.
    pub async fn bind(
        local_name: &str,
        config: TransportConfig,
    ) -> Result<(Arc<Self>, mpsc::Receiver<TransportEvent>), TransportError> {
        let discovery_addr: SocketAddr =
            (Ipv4Addr::UNSPECIFIED, config.discovery_port).into();
        let discovery_socket = UdpSocket::bind(discovery_addr).await?;
        discovery_socket.set_broadcast(true)?;

        let data_socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        let data_port = data_socket.local_addr()?.port();

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let transport = Arc::new(Self {
            instance: Uuid::new_v4(),
            local: PeerId::new(local_name),
            config,
            discovery_socket: Arc::new(discovery_socket),
            data_socket: Arc::new(data_socket),
            state: Arc::new(Mutex::new(LanState::default())),
            events: events_tx,
        });

        transport.spawn_announce_task(data_port);
        transport.spawn_discovery_task();
        transport.spawn_data_task();
        transport.spawn_expiry_task();

        info!(
            "LAN transport bound: discovery on UDP {}, data on UDP {data_port}",
            transport.config.discovery_port
        );
        Ok((transport, events_rx))
    }

    /// The identity this endpoint presents to peers.
    pub fn local_peer(&self) -> &PeerId {
        &self.local
    }

    /// Sends a `Bye` to every connected peer and forgets the sessions.
    /// Used on shutdown; peers observe `Disconnected`.
    pub async fn disconnect_all(&self) {
        let targets: Vec<(PeerId, SocketAddr)> = {
            let mut state = self.state.lock().expect("lan state lock poisoned");
            state.connected.drain().collect()
        };
        let packet = LanPacket::Bye {
            display_name: self.local.display_name().to_string(),
        };
        let Ok(bytes) = encode_packet(&packet) else {
            return;
        };
        for (peer, addr) in targets {
            if let Err(e) = self.data_socket.send_to(&bytes, addr).await {
                warn!("failed to send Bye to {peer}: {e}");
            }
            let _ = self
                .events
                .send(TransportEvent::StateChanged {
                    peer,
                    state: SessionState::Disconnected,
                })
                .await;
        }
    }

    // ── Background tasks ──────────────────────────────────────────────────────

    /// Periodically broadcasts an announce record while advertising.
    fn spawn_announce_task(self: &Arc<Self>, data_port: u16) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let broadcast: SocketAddr =
                (Ipv4Addr::BROADCAST, this.config.discovery_port).into();
            let mut ticker = time::interval(this.config.announce_interval());
            loop {
                ticker.tick().await;
                let advertising = {
                    let state = this.state.lock().expect("lan state lock poisoned");
                    state.advertising.clone()
                };
                let Some((service_tag, label)) = advertising else {
                    continue;
                };
                let packet = LanPacket::Announce {
                    instance: this.instance,
                    service_tag,
                    display_name: this.local.display_name().to_string(),
                    label,
                    data_port,
                };
                match encode_packet(&packet) {
                    Ok(bytes) => {
                        if let Err(e) = this.discovery_socket.send_to(&bytes, broadcast).await {
                            warn!("announce broadcast failed: {e}");
                        }
                    }
                    Err(e) => warn!("failed to encode announce packet: {e}"),
                }
            }
        });
    }

    /// Receives announce broadcasts and maintains the discovered-peer table.
    fn spawn_discovery_task(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut buf = vec![0u8; RECV_BUFFER_BYTES];
            loop {
                let (len, src) = match this.discovery_socket.recv_from(&mut buf).await {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("discovery recv error: {e}");
                        continue;
                    }
                };
                let packet: LanPacket = match bincode::deserialize(&buf[..len]) {
                    Ok(p) => p,
                    Err(e) => {
                        debug!("undecodable discovery datagram from {src}: {e}");
                        continue;
                    }
                };
                let LanPacket::Announce {
                    instance,
                    service_tag,
                    display_name,
                    label,
                    data_port,
                } = packet
                else {
                    debug!("unexpected packet on discovery port from {src}");
                    continue;
                };
                if instance == this.instance {
                    continue; // our own broadcast
                }

                let newly_found = {
                    let mut state = this.state.lock().expect("lan state lock poisoned");
                    if state.browsing.as_deref() != Some(service_tag.as_str()) {
                        continue;
                    }
                    let record = PeerRecord {
                        id: PeerId::new(&display_name),
                        label: label.clone(),
                        data_addr: SocketAddr::new(src.ip(), data_port),
                        last_seen: Instant::now(),
                    };
                    state.discovered.insert(instance, record).is_none()
                };

                if newly_found {
                    debug!("found peer {display_name} ({label}) at {src}");
                    let event = TransportEvent::PeerFound {
                        peer: PeerId::new(&display_name),
                        label,
                    };
                    if this.events.send(event).await.is_err() {
                        break; // endpoint dropped
                    }
                }
            }
        });
    }

    /// Receives handshake and payload datagrams on the data socket.
    fn spawn_data_task(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut buf = vec![0u8; RECV_BUFFER_BYTES];
            loop {
                let (len, src) = match this.data_socket.recv_from(&mut buf).await {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("data recv error: {e}");
                        continue;
                    }
                };
                let packet: LanPacket = match bincode::deserialize(&buf[..len]) {
                    Ok(p) => p,
                    Err(e) => {
                        debug!("undecodable data datagram from {src}: {e}");
                        continue;
                    }
                };
                if this.handle_data_packet(packet, src).await.is_err() {
                    break; // event channel closed, endpoint dropped
                }
            }
        });
    }

    /// Applies one inbound data packet. Returns `Err` only when the event
    /// channel is closed.
    async fn handle_data_packet(&self, packet: LanPacket, src: SocketAddr) -> Result<(), ()> {
        match packet {
            LanPacket::Invite { display_name } => {
                let peer = PeerId::new(&display_name);
                let accepting = {
                    let mut state = self.state.lock().expect("lan state lock poisoned");
                    if state.advertising.is_some() {
                        state.connected.insert(peer.clone(), src);
                        true
                    } else {
                        false
                    }
                };
                if !accepting {
                    debug!("ignoring invite from {peer}: not advertising");
                    return Ok(());
                }
                info!("accepting invitation from {peer}");
                let reply = LanPacket::Accept {
                    display_name: self.local.display_name().to_string(),
                };
                match encode_packet(&reply) {
                    Ok(bytes) => {
                        if let Err(e) = self.data_socket.send_to(&bytes, src).await {
                            warn!("failed to send Accept to {peer}: {e}");
                        }
                    }
                    Err(e) => warn!("failed to encode Accept packet: {e}"),
                }
                self.emit_state(peer.clone(), SessionState::Connecting).await?;
                self.emit_state(peer, SessionState::Connected).await
            }
            LanPacket::Accept { display_name } => {
                let peer = PeerId::new(&display_name);
                let completion = {
                    let mut state = self.state.lock().expect("lan state lock poisoned");
                    let completion = state.pending_invites.remove(&peer);
                    if completion.is_some() {
                        state.connected.insert(peer.clone(), src);
                    }
                    completion
                };
                let Some(completion) = completion else {
                    debug!("unsolicited Accept from {peer}; ignoring");
                    return Ok(());
                };
                let _ = completion.send(());
                self.emit_state(peer, SessionState::Connected).await
            }
            LanPacket::Bye { display_name } => {
                let peer = PeerId::new(&display_name);
                let was_connected = {
                    let mut state = self.state.lock().expect("lan state lock poisoned");
                    state.connected.remove(&peer).is_some()
                };
                if was_connected {
                    self.emit_state(peer, SessionState::Disconnected).await?;
                }
                Ok(())
            }
            LanPacket::Payload { display_name, bytes } => {
                let peer = PeerId::new(&display_name);
                self.events
                    .send(TransportEvent::Payload { peer, bytes })
                    .await
                    .map_err(|_| ())
            }
            LanPacket::Announce { .. } => {
                debug!("announce packet on data port from {src}; ignoring");
                Ok(())
            }
        }
    }

    /// Ages out discovered peers that stopped announcing.
    fn spawn_expiry_task(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let interval = this.config.announce_interval();
            let lost_after = interval * LOST_AFTER_INTERVALS;
            let mut ticker = time::interval(interval);
            loop {
                ticker.tick().await;
                let lost: Vec<PeerId> = {
                    let mut state = this.state.lock().expect("lan state lock poisoned");
                    let now = Instant::now();
                    let expired: Vec<Uuid> = state
                        .discovered
                        .iter()
                        .filter(|(_, record)| now.duration_since(record.last_seen) > lost_after)
                        .map(|(instance, _)| *instance)
                        .collect();
                    expired
                        .into_iter()
                        .filter_map(|instance| state.discovered.remove(&instance))
                        .map(|record| record.id)
                        .collect()
                };
                for peer in lost {
                    debug!("peer {peer} stopped announcing; marking lost");
                    if this
                        .events
                        .send(TransportEvent::PeerLost { peer })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    async fn emit_state(&self, peer: PeerId, state: SessionState) -> Result<(), ()> {
        self.events
            .send(TransportEvent::StateChanged { peer, state })
            .await
            .map_err(|_| ())
    }

    /// Resolves the data address of a discovered peer.
    fn discovered_addr(&self, peer: &PeerId) -> Option<SocketAddr> {
        let state = self.state.lock().expect("lan state lock poisoned");
        state
            .discovered
            .values()
            .find(|record| record.id == *peer)
            .map(|record| record.data_addr)
    }
}

#[async_trait]
impl Transport for LanTransport {
    async fn advertise(&self, label: String, service_tag: String) -> Result<(), TransportError> {
        let mut state = self.state.lock().expect("lan state lock poisoned");
        state.advertising = Some((service_tag, label));
        Ok(())
    }

    async fn stop_advertising(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().expect("lan state lock poisoned");
        state.advertising = None;
        Ok(())
    }

    async fn browse(&self, service_tag: String) -> Result<(), TransportError> {
        let mut state = self.state.lock().expect("lan state lock poisoned");
        state.browsing = Some(service_tag);
        Ok(())
    }

    async fn invite(&self, peer: PeerId, timeout: Duration) -> Result<(), TransportError> {
        let addr = self
            .discovered_addr(&peer)
            .ok_or_else(|| TransportError::UnknownPeer(peer.clone()))?;

        let (accept_tx, accept_rx) = oneshot::channel();
        {
            let mut state = self.state.lock().expect("lan state lock poisoned");
            state.pending_invites.insert(peer.clone(), accept_tx);
        }

        let _ = self
            .events
            .send(TransportEvent::StateChanged {
                peer: peer.clone(),
                state: SessionState::Connecting,
            })
            .await;

        let packet = LanPacket::Invite {
            display_name: self.local.display_name().to_string(),
        };
        let bytes = encode_packet(&packet)?;
        self.data_socket.send_to(&bytes, addr).await?;

        match time::timeout(timeout, accept_rx).await {
            Ok(Ok(())) => Ok(()),
            _ => {
                {
                    let mut state = self.state.lock().expect("lan state lock poisoned");
                    state.pending_invites.remove(&peer);
                }
                let _ = self
                    .events
                    .send(TransportEvent::StateChanged {
                        peer: peer.clone(),
                        state: SessionState::Disconnected,
                    })
                    .await;
                Err(TransportError::InviteTimeout {
                    peer,
                    seconds: timeout.as_secs(),
                })
            }
        }
    }

    async fn send(
        &self,
        payload: Vec<u8>,
        targets: Vec<PeerId>,
        reliability: Reliability,
    ) -> Result<(), TransportError> {
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_BYTES,
            });
        }
        if reliability == Reliability::Reliable {
            debug!("reliable delivery requested; this transport has a single datagram path");
        }

        let packet = LanPacket::Payload {
            display_name: self.local.display_name().to_string(),
            bytes: payload,
        };
        let bytes = encode_packet(&packet)?;

        for target in targets {
            let addr = {
                let state = self.state.lock().expect("lan state lock poisoned");
                state.connected.get(&target).copied()
            };
            let addr = addr.ok_or(TransportError::UnknownPeer(target))?;
            self.data_socket.send_to(&bytes, addr).await?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lan_packet_round_trips_through_bincode() {
        let packet = LanPacket::Announce {
            instance: Uuid::new_v4(),
            service_tag: "param-tune".into(),
            display_name: "Studio on Pixel".into(),
            label: "Studio".into(),
            data_port: 40123,
        };
        let bytes = bincode::serialize(&packet).unwrap();
        let decoded: LanPacket = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_payload_packet_keeps_bytes_verbatim() {
        let packet = LanPacket::Payload {
            display_name: "Studio".into(),
            bytes: vec![0, 1, 2, 0xFF],
        };
        let bytes = bincode::serialize(&packet).unwrap();
        match bincode::deserialize(&bytes).unwrap() {
            LanPacket::Payload { bytes, .. } => assert_eq!(bytes, vec![0, 1, 2, 0xFF]),
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[test]
    fn test_garbage_bytes_do_not_decode() {
        assert!(bincode::deserialize::<LanPacket>(&[0xFF; 16]).is_err());
    }

    #[tokio::test]
    async fn test_bind_on_ephemeral_ports_succeeds() {
        // Port 0 lets the OS choose, so parallel test runs don't collide.
        let config = TransportConfig {
            discovery_port: 0,
            announce_interval_ms: 50,
        };
        let (transport, _events) = LanTransport::bind("test-endpoint", config)
            .await
            .expect("bind must succeed");
        assert_eq!(transport.local_peer(), &PeerId::new("test-endpoint"));
    }

    #[tokio::test]
    async fn test_send_to_unconnected_peer_is_unknown_peer() {
        let config = TransportConfig {
            discovery_port: 0,
            announce_interval_ms: 1000,
        };
        let (transport, _events) = LanTransport::bind("sender", config).await.unwrap();

        let err = transport
            .send(
                vec![1, 2, 3],
                vec![PeerId::new("nobody")],
                Reliability::Unreliable,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownPeer(_)));
    }

    #[tokio::test]
    async fn test_oversized_payload_is_rejected_before_any_socket_io() {
        let config = TransportConfig {
            discovery_port: 0,
            announce_interval_ms: 1000,
        };
        let (transport, _events) = LanTransport::bind("sender", config).await.unwrap();

        let err = transport
            .send(
                vec![0u8; MAX_PAYLOAD_BYTES + 1],
                vec![PeerId::new("nobody")],
                Reliability::Unreliable,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_invite_of_undiscovered_peer_is_unknown_peer() {
        let config = TransportConfig {
            discovery_port: 0,
            announce_interval_ms: 1000,
        };
        let (transport, _events) = LanTransport::bind("remote", config).await.unwrap();

        let err = transport
            .invite(PeerId::new("ghost"), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownPeer(_)));
    }
}
