//! Roon MPRIS bridge
//!
//! Exposes one Roon zone as an MPRIS media player on the desktop session bus.
//!
//! This library provides:
//! - The zone synchronizer (registry, selection, projection, position, artwork)
//! - Roon Core adapter (discovery, zone subscription, transport and image calls)
//! - MPRIS control surface over D-Bus

// Deny truly dangerous patterns (these will fail the build)
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod error;
pub mod sync;
pub mod zone;

pub use error::{SyncError, SyncResult};
pub use sync::{PositionHandle, SyncEvent, Synchronizer};
