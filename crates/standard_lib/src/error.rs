//! Error types shared across the engine.
//!
//! Contract violations on the bus (publish after stop, unknown subscription
//! id) are deliberately *not* errors; they return `false` or no-op per the
//! bus contract. Errors here cover resources (files) and parsing.

use thiserror::Error;

/// Failure to decode one line of the event log format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer than four comma-separated fields.
    #[error("malformed event line: expected `seq,ts_ns,topic,payload`")]
    Malformed,

    /// `seq` or `ts_ns` failed to parse as u64.
    #[error("bad event header field: {0}")]
    BadHeader(String),

    /// Topic token not in the closed topic set.
    #[error("unknown topic token: {0}")]
    UnknownTopic(String),
}

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}
