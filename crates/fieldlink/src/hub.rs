// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hub (directory service) client.
//!
//! A process-local proxy to the fieldlink-hub daemon: registers local
//! signals and slots, subscribes to connection changes, and carries the
//! observability mirror. One Unix-socket connection per client; a reader
//! task dispatches replies and push events, a writer task drains outbound
//! messages so no caller ever blocks on the hub.

use crate::config::RuntimeConfig;
use crate::error::{Error, RegistrationError, Result, TransportError};
use crate::protocol::{
    read_frame, write_frame, ClientMessage, ConnectionRecord, EndpointRecord, ServerMessage,
};
use crate::types::{TypeTag, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};

/// Reply payloads correlated back to a pending request.
#[derive(Debug)]
enum Reply {
    Ack,
    Rejected { code: u32, message: String },
    Value(Option<Value>),
    Endpoints(Vec<EndpointRecord>),
    Connections(Vec<ConnectionRecord>),
}

/// Why a request produced no usable reply.
enum RequestFailure {
    /// Hub connection is gone (writer or reader task exited).
    Closed,
    /// The hub answered with an error.
    Rejected { code: u32, message: String },
}

struct Shared {
    seq: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    connection_watchers: Mutex<HashMap<String, mpsc::UnboundedSender<Option<String>>>>,
    value_watchers: Mutex<HashMap<String, mpsc::UnboundedSender<Value>>>,
}

/// Client handle to the hub daemon. Cheap to clone; all clones share one
/// connection.
#[derive(Clone)]
pub struct HubClient {
    config: RuntimeConfig,
    tx: mpsc::UnboundedSender<ClientMessage>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient")
            .field("hub_socket", &self.config.hub_socket)
            .finish_non_exhaustive()
    }
}

impl HubClient {
    /// Connect to the hub at the configured socket path.
    ///
    /// An absent daemon is a deployment error and surfaces as
    /// [`RegistrationError::Unreachable`]; this layer does not retry.
    pub async fn connect(config: RuntimeConfig) -> Result<Self> {
        let stream = UnixStream::connect(&config.hub_socket).await.map_err(|e| {
            RegistrationError::Unreachable(format!(
                "{}: {}",
                config.hub_socket.display(),
                e
            ))
        })?;

        let (mut read_half, mut write_half) = stream.into_split();

        let shared = Arc::new(Shared {
            seq: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            connection_watchers: Mutex::new(HashMap::new()),
            value_watchers: Mutex::new(HashMap::new()),
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<ClientMessage>();

        // Writer: drains outbound messages. Exits when all client handles
        // are dropped or the socket dies.
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let payload = match serde_json::to_vec(&msg) {
                    Ok(p) => p,
                    Err(e) => {
                        log::warn!("hub: failed to serialize message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = write_frame(&mut write_half, &payload).await {
                    log::warn!("hub: write failed, closing connection: {}", e);
                    break;
                }
            }
        });

        // Reader: dispatches replies to pending requests and push events to
        // watcher channels.
        let reader_shared = shared.clone();
        tokio::spawn(async move {
            loop {
                let frame = match read_frame(&mut read_half).await {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        log::info!("hub: connection closed");
                        break;
                    }
                    Err(e) => {
                        log::warn!("hub: read failed: {}", e);
                        break;
                    }
                };

                let msg: ServerMessage = match serde_json::from_slice(&frame) {
                    Ok(msg) => msg,
                    Err(e) => {
                        log::warn!("hub: dropping malformed message: {}", e);
                        continue;
                    }
                };

                dispatch(&reader_shared, msg);
            }

            // Pending waiters observe the closed connection through their
            // dropped reply senders.
            reader_shared.pending.lock().clear();
            reader_shared.connection_watchers.lock().clear();
            reader_shared.value_watchers.lock().clear();
        });

        Ok(Self { config, tx, shared })
    }

    /// The path layout this client (and its endpoints) operate under.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Declare a signal endpoint. Idempotent for an unchanged type.
    pub async fn register_signal(
        &self,
        full_name: &str,
        description: &str,
        type_tag: TypeTag,
    ) -> Result<()> {
        let reply = self
            .request(|seq| ClientMessage::RegisterSignal {
                seq,
                full_name: full_name.to_string(),
                description: description.to_string(),
                type_tag,
            })
            .await;
        Self::expect_ack(reply)
    }

    /// Declare a slot endpoint. Idempotent for an unchanged type.
    pub async fn register_slot(
        &self,
        full_name: &str,
        description: &str,
        type_tag: TypeTag,
    ) -> Result<()> {
        let reply = self
            .request(|seq| ClientMessage::RegisterSlot {
                seq,
                full_name: full_name.to_string(),
                description: description.to_string(),
                type_tag,
            })
            .await;
        Self::expect_ack(reply)
    }

    /// Subscribe to connection changes for a slot.
    ///
    /// If a connection already exists at subscription time the hub delivers
    /// it immediately. The subscription ends when the receiver is dropped.
    pub async fn watch_connections(
        &self,
        slot_full_name: &str,
    ) -> Result<mpsc::UnboundedReceiver<Option<String>>> {
        let (watch_tx, watch_rx) = mpsc::unbounded_channel();
        self.shared
            .connection_watchers
            .lock()
            .insert(slot_full_name.to_string(), watch_tx);

        let reply = self
            .request(|seq| ClientMessage::WatchConnections {
                seq,
                slot: slot_full_name.to_string(),
            })
            .await;
        Self::expect_ack(reply)?;
        Ok(watch_rx)
    }

    /// Administrative rewire: make `signal` the source of `slot`.
    ///
    /// `None` clears the mapping. The hub rejects pairs whose types differ.
    pub async fn connect_endpoints(
        &self,
        slot_full_name: &str,
        signal_full_name: Option<&str>,
    ) -> Result<()> {
        let reply = self
            .request(|seq| ClientMessage::Connect {
                seq,
                slot: slot_full_name.to_string(),
                signal: signal_full_name.map(str::to_string),
            })
            .await;
        Self::expect_ack(reply)
    }

    /// Mirror the last accepted value for an endpoint.
    ///
    /// Fire-and-forget: never blocks, never fails the caller. A dead hub
    /// connection is logged and the update dropped.
    pub fn publish_value(&self, full_name: &str, value: Value) {
        let msg = ClientMessage::PublishValue {
            full_name: full_name.to_string(),
            value,
        };
        if self.tx.send(msg).is_err() {
            log::warn!("hub: mirror update for '{}' dropped, connection closed", full_name);
        }
    }

    /// Poll the mirrored value of an endpoint.
    pub async fn get_value(&self, full_name: &str) -> Result<Option<Value>> {
        let reply = self
            .request(|seq| ClientMessage::GetValue {
                seq,
                full_name: full_name.to_string(),
            })
            .await;
        match reply {
            Ok(Reply::Value(value)) => Ok(value),
            Ok(_) => Err(TransportError::Closed.into()),
            Err(failure) => Err(Self::transport_error(failure)),
        }
    }

    /// Subscribe to mirrored-value changes for an endpoint.
    pub async fn watch_value(
        &self,
        full_name: &str,
    ) -> Result<mpsc::UnboundedReceiver<Value>> {
        let (watch_tx, watch_rx) = mpsc::unbounded_channel();
        self.shared
            .value_watchers
            .lock()
            .insert(full_name.to_string(), watch_tx);

        let reply = self
            .request(|seq| ClientMessage::WatchValue {
                seq,
                full_name: full_name.to_string(),
            })
            .await;
        Self::expect_ack(reply)?;
        Ok(watch_rx)
    }

    /// List every registered endpoint.
    pub async fn list_endpoints(&self) -> Result<Vec<EndpointRecord>> {
        let reply = self.request(|seq| ClientMessage::ListEndpoints { seq }).await;
        match reply {
            Ok(Reply::Endpoints(endpoints)) => Ok(endpoints),
            Ok(_) => Err(TransportError::Closed.into()),
            Err(failure) => Err(Self::transport_error(failure)),
        }
    }

    /// List the current slot-to-signal mappings.
    pub async fn list_connections(&self) -> Result<Vec<ConnectionRecord>> {
        let reply = self
            .request(|seq| ClientMessage::ListConnections { seq })
            .await;
        match reply {
            Ok(Reply::Connections(connections)) => Ok(connections),
            Ok(_) => Err(TransportError::Closed.into()),
            Err(failure) => Err(Self::transport_error(failure)),
        }
    }

    async fn request(
        &self,
        make: impl FnOnce(u64) -> ClientMessage,
    ) -> std::result::Result<Reply, RequestFailure> {
        let seq = self.shared.seq.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.shared.pending.lock().insert(seq, reply_tx);

        if self.tx.send(make(seq)).is_err() {
            self.shared.pending.lock().remove(&seq);
            return Err(RequestFailure::Closed);
        }

        match reply_rx.await {
            Ok(Reply::Rejected { code, message }) => {
                Err(RequestFailure::Rejected { code, message })
            }
            Ok(reply) => Ok(reply),
            Err(_) => Err(RequestFailure::Closed),
        }
    }

    fn expect_ack(reply: std::result::Result<Reply, RequestFailure>) -> Result<()> {
        match reply {
            Ok(Reply::Ack) => Ok(()),
            Ok(_) => Err(TransportError::Closed.into()),
            Err(RequestFailure::Closed) => Err(RegistrationError::Unreachable(
                "hub connection closed".into(),
            )
            .into()),
            Err(RequestFailure::Rejected { code, message }) => {
                Err(RegistrationError::Rejected { code, message }.into())
            }
        }
    }

    fn transport_error(failure: RequestFailure) -> Error {
        match failure {
            RequestFailure::Closed => TransportError::Closed.into(),
            RequestFailure::Rejected { code, message } => {
                Error::Registration(RegistrationError::Rejected { code, message })
            }
        }
    }
}

/// Route one server message to its waiter or watcher.
fn dispatch(shared: &Shared, msg: ServerMessage) {
    match msg {
        ServerMessage::Ack { seq } => complete(shared, seq, Reply::Ack),

        ServerMessage::Error { seq, code, message } => {
            complete(shared, seq, Reply::Rejected { code, message })
        }

        ServerMessage::ValueReport { seq, value, .. } => {
            complete(shared, seq, Reply::Value(value))
        }

        ServerMessage::Endpoints { seq, endpoints } => {
            complete(shared, seq, Reply::Endpoints(endpoints))
        }

        ServerMessage::Connections { seq, connections } => {
            complete(shared, seq, Reply::Connections(connections))
        }

        ServerMessage::ConnectionChanged { slot, signal } => {
            let mut watchers = shared.connection_watchers.lock();
            if let Some(watcher) = watchers.get(&slot) {
                if watcher.send(signal).is_err() {
                    // Owner is gone; drop the subscription.
                    watchers.remove(&slot);
                }
            }
        }

        ServerMessage::ValueChanged { full_name, value } => {
            let mut watchers = shared.value_watchers.lock();
            if let Some(watcher) = watchers.get(&full_name) {
                if watcher.send(value).is_err() {
                    watchers.remove(&full_name);
                }
            }
        }
    }
}

fn complete(shared: &Shared, seq: u64, reply: Reply) {
    match shared.pending.lock().remove(&seq) {
        Some(reply_tx) => {
            // A dropped waiter means the caller gave up; nothing to do.
            let _ = reply_tx.send(reply);
        }
        None => log::warn!("hub: unsolicited reply for seq {}", seq),
    }
}
