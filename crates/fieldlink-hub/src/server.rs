// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hub server core implementation.

use crate::config::HubConfig;
use fieldlink::protocol::{read_frame, write_frame, ClientMessage, Role, ServerMessage};
use fieldlink::protocol::EndpointRecord;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Notify, RwLock};
use tracing::{debug, error, info, warn};

pub mod registry;

pub use registry::{ClientId, Registry};

/// Hub server: directory, wiring authority and mirror store in one daemon.
#[derive(Clone)]
pub struct HubServer {
    config: Arc<HubConfig>,
    registry: Arc<RwLock<Registry>>,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
    next_client: Arc<AtomicU64>,
    active_clients: Arc<AtomicUsize>,
}

impl HubServer {
    /// Create a new hub server.
    pub fn new(config: HubConfig) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let registry = Registry::new(config.state_file.clone());

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(RwLock::new(registry)),
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
            next_client: Arc::new(AtomicU64::new(1)),
            active_clients: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Run the hub server until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        fieldlink::config::ensure_runtime_dir(&self.config.runtime_dir)
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        let socket_path = self.config.socket_path();
        // A previous instance may have left its socket file behind.
        match std::fs::remove_file(&socket_path) {
            Ok(()) => debug!("removed stale socket {:?}", socket_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ServerError::Bind(e.to_string())),
        }

        let listener =
            UnixListener::bind(&socket_path).map_err(|e| ServerError::Bind(e.to_string()))?;

        info!("hub listening on {:?}", socket_path);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            if self.active_clients.load(Ordering::SeqCst) >= self.config.max_clients {
                                warn!("client limit reached, refusing connection");
                                drop(stream);
                                continue;
                            }

                            let client_id = self.next_client.fetch_add(1, Ordering::Relaxed);
                            debug!(client = client_id, "client connected");
                            self.active_clients.fetch_add(1, Ordering::SeqCst);

                            let registry = self.registry.clone();
                            let shutdown = self.shutdown.clone();
                            let active = self.active_clients.clone();

                            tokio::spawn(async move {
                                if let Err(e) =
                                    handle_connection(stream, client_id, &registry, shutdown).await
                                {
                                    warn!(client = client_id, "connection error: {}", e);
                                }
                                registry.write().await.client_disconnected(client_id);
                                active.fetch_sub(1, Ordering::SeqCst);
                                debug!(client = client_id, "client disconnected");
                            });
                        }
                        Err(e) => {
                            error!("accept error: {}", e);
                        }
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        // Leave the wiring table (state file) in place; remove our socket.
        if let Err(e) = std::fs::remove_file(&socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("could not remove socket {:?}: {}", socket_path, e);
            }
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Signal the server to shut down.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// Check if the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of currently registered endpoints.
    pub async fn endpoint_count(&self) -> usize {
        self.registry.read().await.endpoint_count()
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.active_clients.load(Ordering::SeqCst)
    }
}

/// Serve one client connection.
///
/// A writer task drains the outbound channel; the read loop processes
/// requests in arrival order. Push events (connection and value changes)
/// enter the same outbound channel, so a client observes its ack before
/// any event caused by a later request.
async fn handle_connection(
    stream: UnixStream,
    client_id: ClientId,
    registry: &Arc<RwLock<Registry>>,
    shutdown: Arc<Notify>,
) -> Result<(), ServerError> {
    let (mut read_half, mut write_half) = stream.into_split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let payload = match serde_json::to_vec(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("failed to serialize reply: {}", e);
                    continue;
                }
            };
            if write_frame(&mut write_half, &payload).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            result = read_frame(&mut read_half) => {
                match result {
                    Ok(Some(frame)) => {
                        let msg: ClientMessage = match serde_json::from_slice(&frame) {
                            Ok(msg) => msg,
                            Err(e) => {
                                warn!(client = client_id, "dropping malformed request: {}", e);
                                continue;
                            }
                        };
                        process_message(client_id, msg, registry, &out_tx).await;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(client = client_id, "read error: {}", e);
                        break;
                    }
                }
            }
            _ = shutdown.notified() => {
                debug!(client = client_id, "connection handler shutting down");
                break;
            }
        }
    }

    drop(out_tx);
    writer.abort();
    Ok(())
}

/// Process one request and queue its reply.
async fn process_message(
    client_id: ClientId,
    msg: ClientMessage,
    registry: &Arc<RwLock<Registry>>,
    out_tx: &mpsc::UnboundedSender<ServerMessage>,
) {
    match msg {
        ClientMessage::RegisterSignal {
            seq,
            full_name,
            description,
            type_tag,
        } => {
            let record = EndpointRecord {
                full_name,
                description,
                type_tag,
                role: Role::Signal,
            };
            let result = registry.write().await.register(record, client_id);
            reply(out_tx, seq, result);
        }

        ClientMessage::RegisterSlot {
            seq,
            full_name,
            description,
            type_tag,
        } => {
            let record = EndpointRecord {
                full_name,
                description,
                type_tag,
                role: Role::Slot,
            };
            let result = registry.write().await.register(record, client_id);
            reply(out_tx, seq, result);
        }

        ClientMessage::WatchConnections { seq, slot } => {
            // Ack first so the current mapping, if any, follows it.
            let _ = out_tx.send(ServerMessage::Ack { seq });
            registry
                .write()
                .await
                .watch_connections(&slot, client_id, out_tx.clone());
        }

        ClientMessage::Connect { seq, slot, signal } => {
            let result = registry
                .write()
                .await
                .connect(&slot, signal.as_deref());
            reply(out_tx, seq, result);
        }

        ClientMessage::PublishValue { full_name, value } => {
            registry.write().await.publish_value(&full_name, value);
        }

        ClientMessage::GetValue { seq, full_name } => {
            let value = registry.read().await.value(&full_name);
            let _ = out_tx.send(ServerMessage::ValueReport {
                seq,
                full_name,
                value,
            });
        }

        ClientMessage::WatchValue { seq, full_name } => {
            // Register before acking so no change published right after the
            // ack can be missed.
            registry
                .write()
                .await
                .watch_value(&full_name, client_id, out_tx.clone());
            let _ = out_tx.send(ServerMessage::Ack { seq });
        }

        ClientMessage::ListEndpoints { seq } => {
            let endpoints = registry.read().await.endpoints();
            let _ = out_tx.send(ServerMessage::Endpoints { seq, endpoints });
        }

        ClientMessage::ListConnections { seq } => {
            let connections = registry.read().await.connections();
            let _ = out_tx.send(ServerMessage::Connections { seq, connections });
        }
    }
}

fn reply(
    out_tx: &mpsc::UnboundedSender<ServerMessage>,
    seq: u64,
    result: Result<(), registry::Rejection>,
) {
    let msg = match result {
        Ok(()) => ServerMessage::Ack { seq },
        Err((code, message)) => ServerMessage::Error { seq, code, message },
    };
    let _ = out_tx.send(msg);
}

/// Server error types.
#[derive(Debug)]
pub enum ServerError {
    Config(String),
    Bind(String),
    AlreadyRunning,
    Io(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(s) => write!(f, "Configuration error: {}", s),
            Self::Bind(s) => write!(f, "Bind error: {}", s),
            Self::AlreadyRunning => write!(f, "Server already running"),
            Self::Io(s) => write!(f, "I/O error: {}", s),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
