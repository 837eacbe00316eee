//! Domain layer: pure types with no I/O dependencies.
//!
//! - **`peer`** – Peer identity (by display name, not address) and the
//!   per-peer session state.
//! - **`config`** – The TOML configuration schema and its file store.

pub mod config;
pub mod peer;
