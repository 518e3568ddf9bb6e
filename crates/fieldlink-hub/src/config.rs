// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hub daemon configuration.

use fieldlink::config::HUB_SOCKET_NAME;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hub daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Directory holding the control socket and all data-plane sockets.
    #[serde(default = "default_runtime_dir")]
    pub runtime_dir: PathBuf,

    /// Explicit control socket path, overriding the runtime-dir layout.
    #[serde(default)]
    pub socket_path: Option<PathBuf>,

    /// Where to persist the wiring table so it survives hub restarts.
    /// No file means wiring is lost on restart.
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Maximum number of simultaneously connected clients.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
}

fn default_runtime_dir() -> PathBuf {
    PathBuf::from(fieldlink::config::DEFAULT_RUNTIME_DIR)
}

fn default_max_clients() -> usize {
    1000
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            runtime_dir: default_runtime_dir(),
            socket_path: None,
            state_file: None,
            max_clients: default_max_clients(),
        }
    }
}

impl HubConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// The control socket path clients connect to.
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path
            .clone()
            .unwrap_or_else(|| self.runtime_dir.join(HUB_SOCKET_NAME))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::InvalidValue("max_clients cannot be 0".into()));
        }
        if self.runtime_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue(
                "runtime_dir cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, Clone)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(s) => write!(f, "I/O error: {}", s),
            Self::ParseError(s) => write!(f, "Parse error: {}", s),
            Self::SerializeError(s) => write!(f, "Serialize error: {}", s),
            Self::InvalidValue(s) => write!(f, "Invalid value: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}
