use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One cached sound-change result: the converted word, or the service's
/// structured failure for that input.
pub type ConversionOutcome = Result<String, ConversionError>;

/// A failure applying a sound-change program to a single word.
///
/// The wire names are fixed by the conversion service's JSON encoding and
/// must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ConversionError {
    /// The input word could not be read into the program's phoneme inventory.
    #[serde(rename = "IntoConversionError")]
    #[error("input word not representable: {0}")]
    IntoConversion(String),
    /// The converted word could not be rendered back to text.
    #[serde(rename = "OutofConversionError")]
    #[error("output word not representable: {0}")]
    OutOfConversion(String),
    /// The service failed internally while applying the program.
    #[serde(rename = "InternalError")]
    #[error("internal service error: {0}")]
    Internal(String),
    /// Client-side synthetic failure: the request was abandoned before a
    /// response arrived. Never produced by the service itself.
    #[serde(rename = "TimedOut")]
    #[error("no response from the conversion service")]
    TimedOut,
}
