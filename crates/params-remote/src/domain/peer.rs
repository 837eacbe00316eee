//! Peer identity and session state.
//!
//! A peer is identified by its display name. Network addresses are a
//! transport concern and may change while a session is alive, so equality
//! and hashing deliberately ignore them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identity of a local or remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(display_name: &str) -> Self {
        Self(display_name.to_string())
    }

    /// The human-readable display name this identity is built from.
    pub fn display_name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A discovered advertising endpoint: its identity plus the human-readable
/// label from its discovery record (falls back to the display name when
/// the record carries none).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePeer {
    pub id: PeerId,
    pub label: String,
}

impl RemotePeer {
    pub fn new(id: PeerId, label: Option<&str>) -> Self {
        let label = label
            .map(str::to_string)
            .unwrap_or_else(|| id.display_name().to_string());
        Self { id, label }
    }
}

/// Connection state of one peer, as seen by the session.
///
/// Transitions: `Disconnected → Connecting` (invite sent or accepted),
/// `Connecting → Connected` (handshake complete), any state →
/// `Disconnected` (either side leaves or the link drops).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl SessionState {
    /// Whether payload traffic is allowed in this state.
    pub fn can_transfer(self) -> bool {
        matches!(self, SessionState::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
