//! Workspace-wide error taxonomy.

use thiserror::Error;

/// Errors surfaced at the JSON-RPC boundary (§4.1, §7).
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("parse error")]
    Parse,
    #[error("invalid request")]
    InvalidRequest,
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("task not cancelable: {0}")]
    NotCancelable(String),
    #[error("queue full")]
    QueueFull,
}

impl ProtocolError {
    /// The JSON-RPC 2.0 error code for this variant (spec.md §4.1).
    pub fn code(&self) -> i64 {
        match self {
            Self::Parse => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound(_) => -32601,
            Self::InvalidParams(_) => -32602,
            Self::Internal(_) => -32603,
            Self::TaskNotFound(_) => -32001,
            Self::NotCancelable(_) => -32002,
            Self::QueueFull => -32003,
        }
    }
}

/// Errors from the Agent Bridge (§4.3, §7).
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("authentication rejected by inner agent")]
    Auth,
    #[error("inner agent error: {0}")]
    Agent(String),
    #[error("inner agent request timed out")]
    Timeout,
}

/// Errors from the entity resolution pipeline (§4.10, §7). Per-record; the
/// batch as a whole always succeeds.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("candidate {0} missing required fields")]
    MissingFields(String),
    #[error("malformed candidate record: {0}")]
    Malformed(String),
}

/// Background-loop internal error (classification, maintenance, ontology
/// extraction). Always logged at `tracing::warn!` and swallowed — the
/// memory layer's motto is "never break the agent over storage failure".
#[derive(Debug, Error)]
pub enum InternalError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
