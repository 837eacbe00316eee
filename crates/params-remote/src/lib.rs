//! params-remote library crate.
//!
//! This crate moves encoded parameter sets between a device and a nearby
//! remote control: it advertises the local endpoint, browses for peers,
//! drives the per-peer session state machine, and runs the sync
//! coordinator that pushes the registry on connect and applies inbound
//! sets.
//!
//! # Architecture
//!
//! ```text
//! embedding app / CLI
//!         ↕
//! [params-remote]
//!   ├── domain/           Pure types: peer identity, session state, config
//!   ├── application/      Session state machine, discovery facades,
//!   │                     sync coordinator
//!   └── infrastructure/
//!         ├── transport/  The opaque byte-pipe boundary (trait + events)
//!         ├── lan/        UDP LAN implementation (announce + datagrams)
//!         └── memory/     In-process mesh for deterministic tests
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain`, `params-core`, and the transport
//!   *trait* only — never on a concrete transport.
//! - `infrastructure` depends on everything plus `tokio`.

/// Domain layer: peer identity, session state, configuration schema.
pub mod domain;

/// Application layer: session, discovery, and the sync coordinator.
pub mod application;

/// Infrastructure layer: transport boundary and concrete transports.
pub mod infrastructure;

pub use application::discovery::{Advertiser, Browser};
pub use application::session::{Session, SessionError, SessionEvent};
pub use application::sync::{SyncCoordinator, SyncError, SyncEvent};
pub use domain::config::RemoteConfig;
pub use domain::peer::{PeerId, RemotePeer, SessionState};
pub use infrastructure::transport::{Reliability, Transport, TransportError, TransportEvent};
