// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Slot: the receiving end of a fieldlink connection.
//!
//! A slot starts with no source. The hub eventually delivers a
//! connection-change event naming a signal; the slot then connects its
//! receive endpoint to that signal's data socket and values flow
//! point-to-point, outside the hub. Rewiring tears the old link down
//! before the new one is established, so a received value is never
//! attributed to the wrong source.
//!
//! All slot state transitions happen on one owning task; the public handle
//! only reads the last-value cache and the state snapshot.

use crate::error::Result;
use crate::hub::HubClient;
use crate::protocol::read_frame;
use crate::shadow::Shadow;
use crate::types::{self, Typed, Value};
use parking_lot::Mutex;
use std::io;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Connection state of a slot, observable for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    /// No source assigned.
    Unbound,
    /// Transient: tearing down the old link, establishing the new one.
    Rebinding,
    /// Receiving from the named signal.
    Bound(String),
}

struct SlotInner {
    name: String,
    full_name: String,
    last: Mutex<Option<Value>>,
    state: Mutex<SlotState>,
}

impl SlotInner {
    fn set_state(&self, state: SlotState) {
        *self.state.lock() = state;
    }
}

/// A named data-plane consumer endpoint bound to at most one signal.
pub struct Slot<T: Typed> {
    inner: Arc<SlotInner>,
    task: JoinHandle<()>,
    _marker: PhantomData<T>,
}

impl<T: Typed> Slot<T> {
    /// Register with the hub and start the receive loop.
    ///
    /// `callback` is invoked once per received value, in transport order.
    /// It must not panic; a panicking callback is a programming error and
    /// tears down the slot's task.
    pub async fn bind(
        client: &HubClient,
        name: &str,
        description: &str,
        callback: impl FnMut(T) + Send + 'static,
    ) -> Result<Self> {
        let full_name = types::full_name(name, T::TAG);

        client
            .register_slot(&full_name, description, T::TAG)
            .await?;
        let changes = client.watch_connections(&full_name).await?;

        let inner = Arc::new(SlotInner {
            name: name.to_string(),
            full_name,
            last: Mutex::new(None),
            state: Mutex::new(SlotState::Unbound),
        });

        let task = tokio::spawn(run_loop::<T>(
            client.clone(),
            inner.clone(),
            changes,
            Box::new(callback),
        ));

        Ok(Self {
            inner,
            task,
            _marker: PhantomData,
        })
    }

    /// The last received value, if any.
    pub fn value(&self) -> Option<T> {
        self.inner.last.lock().clone().and_then(T::from_value)
    }

    /// Current connection state.
    pub fn state(&self) -> SlotState {
        self.inner.state.lock().clone()
    }

    /// Logical name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Mangled `name@type` identity.
    pub fn full_name(&self) -> &str {
        &self.inner.full_name
    }
}

impl<T: Typed> std::fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("full_name", &self.inner.full_name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<T: Typed> Drop for Slot<T> {
    fn drop(&mut self) {
        // Cancels any outstanding connect/receive; cancellation never
        // reaches the user callback.
        self.task.abort();
    }
}

async fn run_loop<T: Typed>(
    client: HubClient,
    inner: Arc<SlotInner>,
    mut changes: mpsc::UnboundedReceiver<Option<String>>,
    mut callback: Box<dyn FnMut(T) + Send>,
) {
    let shadow = Shadow::new(client.clone(), inner.full_name.clone());
    let mut stream: Option<UnixStream> = None;
    let mut changes_open = true;

    loop {
        if !changes_open && stream.is_none() {
            log::warn!(
                "slot '{}': hub connection lost while unbound, detaching",
                inner.full_name
            );
            break;
        }

        tokio::select! {
            change = changes.recv(), if changes_open => {
                match change {
                    Some(new_source) => {
                        rebind(&client, &inner, &mut stream, new_source).await;
                    }
                    None => {
                        // Control plane gone. Keep the data plane alive; no
                        // further rewires can arrive.
                        log::warn!(
                            "slot '{}': hub connection lost, keeping current source",
                            inner.full_name
                        );
                        changes_open = false;
                    }
                }
            }

            result = read_from(&mut stream) => {
                match result {
                    Ok(Some(payload)) => {
                        deliver::<T>(&inner, &shadow, &mut callback, &payload);
                    }
                    Ok(None) => {
                        log::info!("slot '{}': source closed", inner.full_name);
                        stream = None;
                        inner.set_state(SlotState::Unbound);
                    }
                    Err(e) => {
                        log::warn!("slot '{}': receive failed: {}", inner.full_name, e);
                        stream = None;
                        inner.set_state(SlotState::Unbound);
                    }
                }
            }
        }
    }
}

/// Tear down the current link, then connect to the newly designated source.
///
/// Dropping the old stream first discards any frames still buffered from
/// the previous source; a connect failure is reported and leaves the slot
/// unbound awaiting a corrected notification.
async fn rebind(
    client: &HubClient,
    inner: &SlotInner,
    stream: &mut Option<UnixStream>,
    new_source: Option<String>,
) {
    inner.set_state(SlotState::Rebinding);
    *stream = None;

    let source = match new_source {
        Some(name) if !name.is_empty() => name,
        _ => {
            log::info!("slot '{}': disconnected by directory", inner.full_name);
            inner.set_state(SlotState::Unbound);
            return;
        }
    };

    let path = client.config().data_socket_path(&source);
    match UnixStream::connect(&path).await {
        Ok(new_stream) => {
            log::info!("slot '{}': bound to '{}'", inner.full_name, source);
            *stream = Some(new_stream);
            inner.set_state(SlotState::Bound(source));
        }
        Err(e) => {
            log::warn!(
                "slot '{}': cannot reach signal '{}': {}",
                inner.full_name,
                source,
                e
            );
            inner.set_state(SlotState::Unbound);
        }
    }
}

/// Decode and hand one data-plane frame to the user.
///
/// Malformed payloads are dropped and reported without touching the cache
/// or invoking the callback.
fn deliver<T: Typed>(
    inner: &SlotInner,
    shadow: &Shadow,
    callback: &mut Box<dyn FnMut(T) + Send>,
    payload: &[u8],
) {
    let value = match Value::decode(payload) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("slot '{}': dropping malformed payload: {}", inner.full_name, e);
            return;
        }
    };

    let typed = match T::from_value(value.clone()) {
        Some(typed) => typed,
        None => {
            log::warn!(
                "slot '{}': dropping value of unexpected type '{}'",
                inner.full_name,
                value.tag()
            );
            return;
        }
    };

    *inner.last.lock() = Some(value.clone());
    callback(typed);
    shadow.emit_value(value);
}

/// Read one frame from the bound source, or park forever while unbound.
async fn read_from(stream: &mut Option<UnixStream>) -> io::Result<Option<Vec<u8>>> {
    match stream.as_mut() {
        Some(s) => read_frame(s).await,
        None => std::future::pending().await,
    }
}
