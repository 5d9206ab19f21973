//! Text-frame encoding for the service connection.
//!
//! Each WebSocket text frame carries exactly one JSON-encoded protocol
//! message; the socket itself is owned by the host.

use glossa_model::{WorkbenchRequest, WorkbenchResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("could not encode request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("could not decode response frame: {0}")]
    Decode(#[source] serde_json::Error),
}

pub fn encode_request(request: &WorkbenchRequest) -> Result<String, FrameError> {
    serde_json::to_string(request).map_err(FrameError::Encode)
}

pub fn decode_response(frame: &str) -> Result<WorkbenchResponse, FrameError> {
    serde_json::from_str(frame).map_err(FrameError::Decode)
}
