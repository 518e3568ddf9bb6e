// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the messaging layer.
//!
//! Construction-time failures (bind, unreachable hub) are hard failures: a
//! misconfigured endpoint cannot usefully run degraded. Steady-state
//! failures (a rejected send, a lost stream) are reported per call and the
//! endpoint keeps operating.

use std::io;
use std::path::PathBuf;

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    /// Directory (hub) registration failed.
    Registration(RegistrationError),

    /// Could not bind the data-plane endpoint at construction.
    Bind { path: PathBuf, source: io::Error },

    /// Data-plane send/connect/receive failure.
    Transport(TransportError),

    /// Malformed payload; the message is dropped, caches untouched.
    Serialization(String),
}

/// Directory registration failures.
///
/// `Unreachable` is a deployment error (the hub daemon is not running) and
/// is surfaced distinctly so the operator gets an actionable diagnostic
/// instead of a generic failure.
#[derive(Debug)]
pub enum RegistrationError {
    /// The hub socket could not be reached at all.
    Unreachable(String),

    /// The hub was reachable but rejected the request.
    Rejected { code: u32, message: String },
}

/// Data-plane transport failures.
#[derive(Debug)]
pub enum TransportError {
    /// The hub connection or data endpoint is gone.
    Closed,

    /// Underlying socket error.
    Io(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registration(e) => write!(f, "Registration error: {}", e),
            Self::Bind { path, source } => {
                write!(f, "Unable to bind data socket {}: {}", path.display(), source)
            }
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Serialization(s) => write!(f, "Serialization error: {}", s),
        }
    }
}

impl std::fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable(s) => write!(
                f,
                "hub unreachable: {} (is fieldlink-hub running?)",
                s
            ),
            Self::Rejected { code, message } => {
                write!(f, "hub rejected request ({}): {}", code, message)
            }
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "endpoint closed"),
            Self::Io(s) => write!(f, "I/O error: {}", s),
        }
    }
}

impl std::error::Error for Error {}
impl std::error::Error for RegistrationError {}
impl std::error::Error for TransportError {}

impl From<RegistrationError> for Error {
    fn from(e: RegistrationError) -> Self {
        Self::Registration(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Transport(TransportError::Io(e.to_string()))
    }
}
