// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime configuration.
//!
//! Everything is path layout: where the hub daemon's socket lives and where
//! per-signal data sockets are created. Resolved once from the environment;
//! tests point it at a temporary directory instead.

use std::path::{Path, PathBuf};

/// Environment variable overriding the runtime directory.
pub const RUNTIME_DIR_ENV: &str = "FIELDLINK_RUNTIME_DIR";

/// Environment variable overriding the hub socket path.
pub const HUB_SOCKET_ENV: &str = "FIELDLINK_HUB_SOCKET";

/// Default runtime directory when no override is set.
pub const DEFAULT_RUNTIME_DIR: &str = "/run/fieldlink";

/// File name of the hub daemon's control socket inside the runtime dir.
pub const HUB_SOCKET_NAME: &str = "hub.sock";

/// Resolved path layout for one process.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Directory holding the hub socket and all data-plane sockets.
    pub runtime_dir: PathBuf,

    /// The hub daemon's control socket.
    pub hub_socket: PathBuf,
}

impl RuntimeConfig {
    /// Resolve from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let runtime_dir = std::env::var_os(RUNTIME_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RUNTIME_DIR));

        let hub_socket = std::env::var_os(HUB_SOCKET_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| runtime_dir.join(HUB_SOCKET_NAME));

        Self {
            runtime_dir,
            hub_socket,
        }
    }

    /// Layout rooted at an explicit directory (tests, embedded deployments).
    pub fn with_runtime_dir(dir: impl Into<PathBuf>) -> Self {
        let runtime_dir = dir.into();
        let hub_socket = runtime_dir.join(HUB_SOCKET_NAME);
        Self {
            runtime_dir,
            hub_socket,
        }
    }

    /// Data-plane socket path for a signal's full name.
    ///
    /// Deterministic: every process derives the same path from the same
    /// full name, so a slot can connect without asking the hub for an
    /// address. Path separators in logical names are flattened.
    pub fn data_socket_path(&self, full_name: &str) -> PathBuf {
        let sanitized: String = full_name
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.runtime_dir.join(format!("{}.sock", sanitized))
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Ensure the runtime directory exists.
pub fn ensure_runtime_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}
