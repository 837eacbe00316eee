//! Remote Parameters headless remote-control entry point.
//!
//! Browses the local network for an advertising host, connects to the
//! first one found, and prints a summary line every time a parameter set
//! arrives. Useful for inspecting a device's tunables from a laptop
//! without the on-screen UI.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()          -- TOML config with serde defaults
//!  └─ LanTransport::bind()   -- discovery + data sockets, background tasks
//!  └─ Session::start()       -- event pump (single serialized context)
//!  └─ SyncCoordinator::start() -- applies inbound parameter sets
//!  └─ event loop             -- invite first host, print updates
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use params_core::ParameterSet;
use params_remote::application::discovery::Browser;
use params_remote::application::session::{Session, SessionEvent};
use params_remote::application::sync::{SyncCoordinator, SyncEvent};
use params_remote::domain::config::{load_config, RemoteConfig};
use params_remote::domain::peer::PeerId;
use params_remote::infrastructure::lan::LanTransport;
use params_remote::infrastructure::transport::Transport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().unwrap_or_else(|e| {
        eprintln!("could not load config ({e}); using defaults");
        RemoteConfig::default()
    });

    // Initialise structured logging. `RUST_LOG` overrides the config file.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.service.log_level.clone())),
        )
        .init();

    let display_name = if config.service.display_name.is_empty() {
        format!("remote on {}", hostname())
    } else {
        config.service.display_name.clone()
    };
    info!("Remote Parameters control starting as {display_name:?}");

    // ── Transport, session, coordinator ───────────────────────────────────────
    let (transport, transport_events) =
        LanTransport::bind(&display_name, config.transport.clone()).await?;
    let transport_dyn: Arc<dyn Transport> = transport.clone();

    let session = Session::new(PeerId::new(&display_name), Arc::clone(&transport_dyn));
    let session_events = session.start(transport_events);

    let registry = Arc::new(Mutex::new(ParameterSet::new("1.0", &display_name)));
    let coordinator = SyncCoordinator::new(
        Arc::clone(&registry),
        Arc::clone(&session),
        config.session.settle_delay(),
    );

    // The coordinator consumes the session events; it hands discovery
    // events onward through its own channel, so the CLI taps the session
    // stream first and forwards everything.
    let (tap_tx, tap_rx) = mpsc::channel(128);
    let sync_events = coordinator.start(tap_rx);

    let browser = Browser::new(
        Arc::clone(&transport_dyn),
        &config.service.service_tag,
        config.session.invite_timeout(),
    );
    browser.start_browsing().await?;
    info!(
        "browsing for hosts under service tag {:?}",
        config.service.service_tag
    );

    // ── Session event tap: invite the first host we see ───────────────────────
    {
        let session = Arc::clone(&session);
        let browser_timeout = config.session.invite_timeout();
        let mut session_events = session_events;
        tokio::spawn(async move {
            let mut invited = false;
            while let Some(event) = session_events.recv().await {
                if let SessionEvent::PeerDiscovered { peer } = &event {
                    info!("found host {} ({})", peer.id, peer.label);
                    if !invited {
                        invited = true;
                        let session = Arc::clone(&session);
                        let peer_id = peer.id.clone();
                        tokio::spawn(async move {
                            if let Err(e) = session.invite(&peer_id, browser_timeout).await {
                                error!("invitation to {peer_id} failed: {e}");
                            }
                        });
                    }
                }
                if tap_tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }

    // ── Registry update printer ───────────────────────────────────────────────
    {
        let registry = Arc::clone(&registry);
        let mut sync_events = sync_events;
        tokio::spawn(async move {
            while let Some(event) = sync_events.recv().await {
                match event {
                    SyncEvent::RegistryUpdated { source, applied } => {
                        let registry = registry.lock().await;
                        println!(
                            "registry from {source:?}: {applied} applied, {} total across {} categories",
                            registry.len(),
                            registry.categories.len()
                        );
                        for category in &registry.categories {
                            for parameter in &category.entries {
                                println!("  {:40} {:?}", parameter.uuid(), parameter.value());
                            }
                        }
                    }
                    SyncEvent::ApplyFailed { peer, error } => {
                        warn!("payload from {peer} dropped: {error}");
                    }
                    SyncEvent::PushFailed { peer, error } => {
                        warn!("push triggered by {peer} failed: {error}");
                    }
                }
            }
        });
    }

    info!("ready; press Ctrl-C to exit");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    transport.disconnect_all().await;
    // Give the Bye datagrams a moment to leave the socket.
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!("Remote Parameters control stopped");
    Ok(())
}

/// Best-effort hostname for the default display name.
fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "this device".to_string())
}
