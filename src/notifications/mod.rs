//! Per-user notification inbox, fed by trip events and the expiry sweep.

pub mod handlers;
mod service;

pub use service::{NotificationDraft, Notifier};
