//! Email invitations to join a trip.
//!
//! Each invitation carries a random token shown once to the inviter; only its
//! SHA-256 digest is stored. Pending invitations past their expiry are moved
//! to `expired` by the sweep, or lazily when someone tries to answer them.

pub mod handlers;
mod token;

pub use token::{generate_token, hash_token, InvitationToken};
