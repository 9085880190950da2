//! Error types for data parsing in polaris-types.

use thiserror::Error;

/// Errors that can occur when parsing measurement data.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The network type label is not one of `LTE`, `WCDMA` or `GSM`.
    #[error("Unknown network type: {0}")]
    UnknownNetworkType(String),
}

/// Result type alias using polaris-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
