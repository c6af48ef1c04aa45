//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Delivery Model
//! - Events are opaque byte payloads keyed by a partition key
//! - Delivery is at-least-once: a write may be retried, so duplicates are possible

mod config;
mod destination;
mod error;
mod event;

pub use config::*;
pub use destination::{Destination, LocalDestination};
pub use error::*;
pub use event::*;
