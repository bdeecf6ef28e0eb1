//! Single-choice votes among a fixed set of options. One ballot per member,
//! replaced when they vote again.

pub mod handlers;
mod tally;

pub use tally::{tally, OptionCount, Tally};
