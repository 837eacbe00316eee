//! Infrastructure layer: concrete transports behind the byte-pipe boundary.
//!
//! Contains the [`transport`](crate::infrastructure::transport) trait that
//! the application layer programs against, plus two implementations: the
//! UDP [`lan`](crate::infrastructure::lan) transport for real devices and
//! the in-process [`memory`](crate::infrastructure::memory) mesh for tests.
//!
//! **Dependency rule**: this layer may depend on `domain` and
//! `params-core`, but the application layer only ever sees `dyn Transport`.

pub mod lan;
pub mod memory;
pub mod transport;
