//! Test helpers shared across membank crates.

mod bank;
mod extract;

pub use bank::InMemoryBank;
