#![forbid(unsafe_code)]

//! Service adapter for the Glossa workbench.
//!
//! Sits between the evaluation engine and the host's WebSocket connection:
//! per-program conversion batches are encoded as JSON frames onto an
//! outbound queue the host drains, inbound frames are decoded and conversion
//! results routed into the engine, and [`drive`] supplies the fixed-cadence
//! flush the batching discipline depends on. Connection lifecycle (dialing,
//! reconnecting) stays with the host.

pub mod client;
pub mod driver;
pub mod frame;

pub use client::{Client, OutboundHandle};
pub use driver::{drive, DEFAULT_FLUSH_PERIOD};
pub use frame::{decode_response, encode_request, FrameError};
