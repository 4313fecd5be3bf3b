//! Byte-level channel between two contexts.
//!
//! # Architecture
//!
//! - **frame**: Wire frames (Request/Reply) with per-call correlation ids
//! - **codec**: JSON framing codec for AsyncRead/AsyncWrite
//! - **channel**: `Transport` implementation with a pending-call table

pub mod channel;
pub mod codec;
pub mod frame;

pub use channel::{Channel, channel_pair};
