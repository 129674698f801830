use std::fmt;

use crate::protocol::Status;

/// Failure kinds surfaced through the endpoint protocol.
#[derive(Debug)]
pub enum RelayError {
    /// Missing or non-string `set_state` payload.
    BadRequest(String),
    /// Invalid JSON or any failure while processing a payload.
    Parse(String),
    /// No handler registered for the requested endpoint id.
    UnknownEndpoint(String),
}

impl RelayError {
    /// Response status this error maps to. `UnknownEndpoint` never becomes an
    /// envelope (the router returns no handler instead), but the mapping is
    /// kept total.
    pub fn status(&self) -> Status {
        match self {
            RelayError::BadRequest(_) => Status::BadRequest,
            RelayError::Parse(_) | RelayError::UnknownEndpoint(_) => Status::ServerError,
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Bare messages: these become response bodies verbatim.
            RelayError::BadRequest(msg) => write!(f, "{}", msg),
            RelayError::Parse(msg) => write!(f, "{}", msg),
            RelayError::UnknownEndpoint(id) => write!(f, "unknown endpoint: {}", id),
        }
    }
}

impl std::error::Error for RelayError {}
