//! Idempotent entity operations for a remote advertising-inventory API.
//!
//! Each supported entity kind (ad units, advertisers, line items, creatives,
//! custom-targeting keys/values, orders) is described by a static descriptor
//! row naming its remote listing and creation methods. On top of that table,
//! [`EntityOp`] implements a create-or-reuse protocol: fetch what already
//! exists by name, create only what is missing, and verify that every
//! requested name is present afterward. A [`RunMode::DryRun`] mode simulates
//! creation with deterministic placeholder identifiers instead of touching
//! the remote side.

mod entity;
mod error;
mod ops;
mod record;
mod transport;

pub use entity::{EntityDef, EntityKind};
pub use error::{OpsError, Result, TransportError};
pub use ops::{EntityOp, RunMode};
pub use record::Record;
pub use transport::{GamTransport, RestTransport};
