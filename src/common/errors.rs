use thiserror::Error;

use crate::common::types::Intent;

/// Malformed queue operation arguments. Rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("index {index} out of range for queue of length {len}")]
    OutOfRange { index: usize, len: usize },
    #[error("invalid selection: {reason}")]
    InvalidSelection { reason: String },
}

/// Failure of an outbound command call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered {status}")]
    Status { status: u16 },
    #[error("malformed response body: {0}")]
    Body(String),
}

/// What a caller of the command gateway gets back when an intent
/// cannot take effect.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The intent was rejected locally; no command was issued.
    #[error("{0}")]
    Rejected(#[from] QueueError),
    /// The outbound call failed; the optimistic delta was rolled back.
    #[error("command {intent} failed: {source}")]
    Failed {
        intent: Intent,
        #[source]
        source: TransportError,
    },
}

/// Push-channel failures. None of these are fatal; they drive the
/// connection manager into its reconnect path.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("channel closed by remote")]
    Closed,
    #[error("resnapshot failed: {0}")]
    Resnapshot(#[from] TransportError),
}
