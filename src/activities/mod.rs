//! Things to do on a trip. Any member may add one; its creator or a trip
//! manager may change or remove it.

pub mod handlers;

pub use handlers::{fill_coordinates, validate_activity};
