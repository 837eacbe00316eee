//! Advertise and browse facades over the transport.
//!
//! The host side advertises its presence and auto-accepts invitations
//! (that part lives inside the transport). The remote-control side
//! browses and invites. Peer appeared/lost events arrive through the
//! session event stream; these facades only issue the commands.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::application::session::{Session, SessionError};
use crate::domain::peer::PeerId;
use crate::infrastructure::transport::{Transport, TransportError};

/// Publishes the local endpoint's discovery record.
pub struct Advertiser {
    transport: Arc<dyn Transport>,
    label: String,
    service_tag: String,
}

impl Advertiser {
    pub fn new(transport: Arc<dyn Transport>, label: &str, service_tag: &str) -> Self {
        Self {
            transport,
            label: label.to_string(),
            service_tag: service_tag.to_string(),
        }
    }

    /// Starts advertising. Idempotent while already advertising.
    pub async fn start(&self) -> Result<(), TransportError> {
        info!(
            "advertising {:?} under service tag {:?}",
            self.label, self.service_tag
        );
        self.transport
            .advertise(self.label.clone(), self.service_tag.clone())
            .await
    }

    /// Withdraws the discovery record.
    pub async fn stop(&self) -> Result<(), TransportError> {
        info!("stopped advertising {:?}", self.label);
        self.transport.stop_advertising().await
    }
}

/// Watches for advertising hosts and invites them into a session.
pub struct Browser {
    transport: Arc<dyn Transport>,
    service_tag: String,
    invite_timeout: Duration,
}

impl Browser {
    pub fn new(transport: Arc<dyn Transport>, service_tag: &str, invite_timeout: Duration) -> Self {
        Self {
            transport,
            service_tag: service_tag.to_string(),
            invite_timeout,
        }
    }

    /// Starts browsing. Peer appeared/lost events surface as
    /// [`SessionEvent`](crate::application::session::SessionEvent)s.
    pub async fn start_browsing(&self) -> Result<(), TransportError> {
        info!("browsing for service tag {:?}", self.service_tag);
        self.transport.browse(self.service_tag.clone()).await
    }

    /// Invites a discovered peer into `session`, waiting at most the
    /// configured invite timeout for the accept.
    pub async fn invite(&self, session: &Session, peer: &PeerId) -> Result<(), SessionError> {
        info!("inviting {peer}");
        session.invite(peer, self.invite_timeout).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
