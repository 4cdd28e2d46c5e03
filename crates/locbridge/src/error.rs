// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types returned to the host.
//!
//! Transport failures are split in two: a plain failure code is surfaced as
//! [`Error::Transport`], while a failure that signals a modem subsystem
//! restart is converted into a deferred recovery action and surfaced as
//! [`Error::ModemRestart`].

use crate::config::ConfigError;
use crate::transport::TransportError;
use thiserror::Error;

/// Engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Host call made before `init` (or after `cleanup`).
    #[error("Location engine not initialized")]
    NotReady,

    /// The transport reported a modem restart; recovery has been queued.
    #[error("Modem restart in progress, recovery queued")]
    ModemRestart,

    /// Transport call failed with a generic error.
    #[error("Transport error: {0}")]
    Transport(TransportError),

    /// Server URL does not fit the transport's address field.
    #[error("Server URL too long ({len} bytes)")]
    UrlTooLong { len: usize },

    /// Hostname could not be resolved to an IPv4 address.
    #[error("Cannot resolve host '{0}'")]
    UnresolvedHost(String),

    /// Deferred-action worker thread could not be spawned.
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ModemRestart => Error::ModemRestart,
            other => Error::Transport(other),
        }
    }
}

/// Convenient alias for engine results.
pub type Result<T> = std::result::Result<T, Error>;
