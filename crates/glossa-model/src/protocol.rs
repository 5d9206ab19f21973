//! JSON wire protocol spoken with the sound-change service.
//!
//! Messages are externally tagged enums; `Result` fields use serde's
//! standard `{"Ok": ..}` / `{"Err": ..}` encoding. The tag names are part of
//! the service's wire contract and are pinned with `serde(rename)` where the
//! Rust name differs.

use serde::{Deserialize, Serialize};

use crate::conversion::ConversionError;

/// One conversion item, used in both directions.
///
/// Outbound, `data` carries the input word in the `Ok` side; inbound, it
/// carries the converted word or the per-word failure. The `id` correlates a
/// response item back to its request regardless of arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub id: u32,
    pub data: Result<String, ConversionError>,
}

impl Conversion {
    /// An outbound request item for `word`.
    pub fn request(id: u32, word: impl Into<String>) -> Self {
        Self {
            id,
            data: Ok(word.into()),
        }
    }
}

/// A program compilation failure reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileFailure {
    pub error_message: String,
    pub line_contents: String,
    pub line_number: Option<u32>,
}

/// Client → service messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkbenchRequest {
    /// Compile `contents` and install it under `name`, replacing any program
    /// previously loaded with that name.
    LoadProgram { name: String, contents: String },
    /// Compile without installing; used by editor diagnostics.
    TryCompile { program: String },
    /// Run one named program over a batch of words.
    #[serde(rename = "RunSC")]
    RunProgram {
        program_name: String,
        to_convert: Vec<Conversion>,
    },
}

/// Service → client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkbenchResponse {
    Success,
    Error { message: String },
    #[serde(rename = "RunSCResult")]
    RunResult { to_convert: Vec<Conversion> },
    CompilationResult { result: Option<CompileFailure> },
}
