//! Error types for starting the sidecar.
//!
//! Per-request errors live next to their handlers and convert directly into
//! HTTP responses; these errors end the process.

use std::fmt;
use std::net::SocketAddr;

/// Errors that prevent the server from starting or keep it from serving.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration is missing or invalid.
    Configuration,
    /// The default provider could not be resolved.
    Provider { name: String },
    /// The listener could not be bound.
    Bind { addr: SocketAddr, details: String },
    /// The server stopped with an I/O error.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "invalid configuration"),
            Self::Provider { name } => write!(f, "provider '{name}' is unavailable"),
            Self::Bind { addr, details } => write!(f, "failed to bind {addr}: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for StartupError {}
