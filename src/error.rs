//! Error taxonomy for the sync engine.
//!
//! Request/response failures are `TransportError` and surface to the caller;
//! malformed push traffic is `ProtocolError`, logged and dropped. Events for a
//! non-active conversation are not errors at all -- the scope guard silently
//! filters them.

use thiserror::Error;

/// Network/timeout failure of a request/response operation. Recoverable;
/// never corrupts in-memory sync state.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
}

/// Malformed or unrecognized push event. Logged and dropped, never fatal.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unrecognized frame: {0}")]
    UnknownFrame(String),

    #[error("unknown push event '{0}'")]
    UnknownEvent(String),

    #[error("event missing payload")]
    MissingPayload,

    #[error("bad event payload: {0}")]
    Payload(#[from] serde_json::Error),
}
