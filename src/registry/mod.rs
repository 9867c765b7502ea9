//! Session registry
//!
//! Maps identities to connections and tracks every session's role and
//! metadata. The registry is the only shared mutable state in the relay.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<SessionRegistry>
//!                 ┌─────────────────────────────┐
//!                 │ RwLock<                     │
//!                 │   sessions:   ConnId → Slot │
//!                 │   identities: name → ConnId │
//!                 │ >                           │
//!                 └──────────────┬──────────────┘
//!                                │ clones of ConnectionHandle
//!          ┌─────────────────────┼─────────────────────┐
//!          ▼                     ▼                     ▼
//!     [Connection]          [Connection]          [Connection]
//!     outbound queue        outbound queue        outbound queue
//! ```
//!
//! # Duplicate identities
//!
//! Declaring an identity that is already held is not an error. The newest
//! declaration wins; the previous holder stays connected but undeclared.

pub mod config;
pub mod store;

pub use config::{RegistryConfig, DEFAULT_MONITOR_PREFIX};
pub use store::{DirectoryView, Registration, RegistryCounts, SessionRegistry};
