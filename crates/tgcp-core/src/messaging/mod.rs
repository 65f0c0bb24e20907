//! Chat backend abstractions: the reader and sender roles a client can play.

pub mod port;
pub mod throttled;
