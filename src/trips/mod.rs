//! Trips and their membership.
//!
//! Any member may read a trip. Owners and organizers manage it; only the
//! owner deletes it, changes roles or removes other members.

mod access;
pub mod handlers;

pub use access::{require_manager, require_member, TripAccess};
