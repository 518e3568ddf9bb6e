// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hub wire protocol.
//!
//! Length-prefixed JSON frames over a local stream socket:
//!
//! ```text
//! +----------------+-------------------+
//! | Length (4B BE) | JSON payload      |
//! +----------------+-------------------+
//! ```
//!
//! The same framing carries data-plane values between signals and slots;
//! there the payload is the self-describing [`Value`](crate::types::Value)
//! form instead of a protocol message.

use crate::types::{TypeTag, Value};
use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame. Values and directory records are small;
/// anything larger is a protocol violation.
pub const MAX_FRAME: usize = 4 * 1024 * 1024;

/// Endpoint role in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Signal,
    Slot,
}

/// One directory registration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub full_name: String,
    pub description: String,
    pub type_tag: TypeTag,
    pub role: Role,
}

/// One administrative slot-to-signal mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub slot: String,
    pub signal: String,
}

/// Messages sent by a client to the hub.
///
/// Requests carry a `seq` correlation id echoed back in the reply;
/// `publish_value` is fire-and-forget and has none.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    RegisterSignal {
        seq: u64,
        full_name: String,
        description: String,
        type_tag: TypeTag,
    },

    RegisterSlot {
        seq: u64,
        full_name: String,
        description: String,
        type_tag: TypeTag,
    },

    /// Subscribe to connection changes for a slot's full name.
    WatchConnections { seq: u64, slot: String },

    /// Administrative rewire: point `slot` at `signal` (`None` clears).
    Connect {
        seq: u64,
        slot: String,
        signal: Option<String>,
    },

    /// Mirror the last accepted value for an endpoint. Fire-and-forget.
    PublishValue { full_name: String, value: Value },

    /// Poll the mirrored value of an endpoint.
    GetValue { seq: u64, full_name: String },

    /// Subscribe to mirrored-value change events for an endpoint.
    WatchValue { seq: u64, full_name: String },

    ListEndpoints { seq: u64 },

    ListConnections { seq: u64 },
}

/// Messages sent by the hub to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ack { seq: u64 },

    Error { seq: u64, code: u32, message: String },

    /// The directory rewired a watched slot. `signal: None` means unbound.
    ConnectionChanged {
        slot: String,
        signal: Option<String>,
    },

    /// A watched mirrored value changed.
    ValueChanged { full_name: String, value: Value },

    ValueReport {
        seq: u64,
        full_name: String,
        value: Option<Value>,
    },

    Endpoints {
        seq: u64,
        endpoints: Vec<EndpointRecord>,
    },

    Connections {
        seq: u64,
        connections: Vec<ConnectionRecord>,
    },
}

/// Machine-readable rejection reasons.
pub mod error_code {
    /// Re-registration with a conflicting type.
    pub const TYPE_CONFLICT: u32 = 1;
    /// Connect refers to an unregistered slot.
    pub const UNKNOWN_SLOT: u32 = 2;
    /// Connect refers to an unregistered signal.
    pub const UNKNOWN_SIGNAL: u32 = 3;
    /// Connect would pair endpoints of different types.
    pub const TYPE_MISMATCH: u32 = 4;
    /// Malformed or out-of-order request.
    pub const BAD_REQUEST: u32 = 5;
}

/// Read one length-prefixed frame.
///
/// Returns `Ok(None)` on a clean EOF at a frame boundary.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 || len > MAX_FRAME {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid frame length: {}", len),
        ));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

/// Write one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.is_empty() || payload.len() > MAX_FRAME {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid frame length: {}", payload.len()),
        ));
    }

    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Prepend the length prefix to an already-serialized payload.
///
/// Used by the data plane for single-syscall non-blocking writes.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}
