//! Core domain and application logic for the Telegram channel relay.
//!
//! Framework-agnostic: the Telegram client lives behind the reader/sender
//! ports in [`messaging::port`] and is implemented in an adapter crate.

pub mod chats;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod errors;
pub mod filter;
pub mod formatting;
pub mod forwarder;
pub mod logging;
pub mod messaging;
pub mod profile;

#[cfg(test)]
pub mod testing;

pub use errors::{Error, Result};
