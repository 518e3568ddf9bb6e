// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Signal: the sending end of a fieldlink connection.
//!
//! A signal owns a Unix listener at an address derived from its full name.
//! Slots that the directory points at this signal connect to that address;
//! each send fans out to every connected slot. A late joiner first receives
//! the retained last value, so a freshly rewired slot does not wait for the
//! next production cycle to see state.

use crate::config::ensure_runtime_dir;
use crate::error::{Error, Result};
use crate::hub::HubClient;
use crate::protocol::frame;
use crate::shadow::Shadow;
use crate::types::{self, Typed};
use parking_lot::Mutex;
use std::io;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

struct SignalInner {
    name: String,
    full_name: String,
    socket_path: PathBuf,
    /// Connected consumers. The accept task adds; send paths evict.
    conns: Mutex<Vec<UnixStream>>,
    /// Retained last value, served to late joiners.
    last: Mutex<Option<types::Value>>,
}

/// A named data-plane producer endpoint.
pub struct Signal<T: Typed> {
    inner: Arc<SignalInner>,
    shadow: Shadow,
    accept_task: JoinHandle<()>,
    _marker: PhantomData<T>,
}

impl<T: Typed> Signal<T> {
    /// Bind the data-plane endpoint and register with the hub.
    ///
    /// Fails with [`Error::Bind`] if the derived socket address is already
    /// in use, and with a registration error if the hub rejects the
    /// declaration. Both are construction-fatal.
    pub async fn bind(client: &HubClient, name: &str, description: &str) -> Result<Self> {
        let full_name = types::full_name(name, T::TAG);
        let socket_path = client.config().data_socket_path(&full_name);

        ensure_runtime_dir(&client.config().runtime_dir).map_err(|e| Error::Bind {
            path: socket_path.clone(),
            source: e,
        })?;

        let listener = UnixListener::bind(&socket_path).map_err(|e| Error::Bind {
            path: socket_path.clone(),
            source: e,
        })?;

        let inner = Arc::new(SignalInner {
            name: name.to_string(),
            full_name: full_name.clone(),
            socket_path,
            conns: Mutex::new(Vec::new()),
            last: Mutex::new(None),
        });

        let accept_task = tokio::spawn(accept_loop(listener, inner.clone()));

        let signal = Self {
            inner,
            shadow: Shadow::new(client.clone(), full_name.clone()),
            accept_task,
            _marker: PhantomData,
        };

        // Registration failure drops `signal`, which tears down the
        // listener and removes the socket file.
        client
            .register_signal(&full_name, description, T::TAG)
            .await?;

        Ok(signal)
    }

    /// Synchronous best-effort send.
    ///
    /// Fans the framed value out to every connected slot with non-blocking
    /// writes. A consumer whose socket has no space (or has died) is
    /// evicted and the eviction logged; the publisher never blocks on a
    /// slow consumer. Zero connected slots is not an error. A value that
    /// cannot survive the wire encoding (a non-finite double) is refused
    /// before touching the cache or any consumer.
    pub fn send(&self, value: T) -> Result<()> {
        let value = value.into_value();
        value.check_wire_safe()?;
        let framed = frame(&value.encode());

        *self.inner.last.lock() = Some(value.clone());

        let full_name = &self.inner.full_name;
        self.inner.conns.lock().retain(|conn| {
            match conn.try_write(&framed) {
                Ok(n) if n == framed.len() => true,
                Ok(n) => {
                    log::warn!(
                        "signal '{}': evicting slow consumer (partial write {}/{})",
                        full_name,
                        n,
                        framed.len()
                    );
                    false
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    log::warn!("signal '{}': evicting slow consumer (no buffer space)", full_name);
                    false
                }
                Err(e) => {
                    log::debug!("signal '{}': consumer gone: {}", full_name, e);
                    false
                }
            }
        });

        // Mirror strictly after the data-plane attempt; it cannot block or
        // fail the send.
        self.shadow.emit_value(value);
        Ok(())
    }

    /// Awaited send. Resolves exactly once with the total number of bytes
    /// written across consumers.
    pub async fn async_send(&self, value: T) -> Result<usize> {
        let value = value.into_value();
        value.check_wire_safe()?;
        let framed = frame(&value.encode());

        *self.inner.last.lock() = Some(value.clone());

        // Take the connections out so the lock is not held across awaits;
        // the accept task may add newcomers meanwhile, which keep both.
        let conns = std::mem::take(&mut *self.inner.conns.lock());
        let mut written = 0usize;
        let mut survivors = Vec::with_capacity(conns.len());

        for mut conn in conns {
            match conn.write_all(&framed).await {
                Ok(()) => {
                    written += framed.len();
                    survivors.push(conn);
                }
                Err(e) => {
                    log::debug!("signal '{}': consumer gone: {}", self.inner.full_name, e);
                }
            }
        }

        self.inner.conns.lock().append(&mut survivors);

        self.shadow.emit_value(value);
        Ok(written)
    }

    /// The retained last-sent value, if any send has happened.
    pub fn value(&self) -> Option<T> {
        self.inner.last.lock().clone().and_then(T::from_value)
    }

    /// Logical name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Mangled `name@type` identity.
    pub fn full_name(&self) -> &str {
        &self.inner.full_name
    }

    /// Number of currently connected consumers.
    pub fn consumer_count(&self) -> usize {
        self.inner.conns.lock().len()
    }
}

impl<T: Typed> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("full_name", &self.inner.full_name)
            .finish_non_exhaustive()
    }
}

impl<T: Typed> Drop for Signal<T> {
    fn drop(&mut self) {
        self.accept_task.abort();
        if let Err(e) = std::fs::remove_file(&self.inner.socket_path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::debug!(
                    "signal '{}': could not remove socket file: {}",
                    self.inner.full_name,
                    e
                );
            }
        }
    }
}

async fn accept_loop(listener: UnixListener, inner: Arc<SignalInner>) {
    loop {
        match listener.accept().await {
            Ok((mut stream, _)) => {
                let retained = inner.last.lock().clone();
                if let Some(value) = retained {
                    let framed = frame(&value.encode());
                    if let Err(e) = stream.write_all(&framed).await {
                        log::debug!(
                            "signal '{}': consumer left during catch-up: {}",
                            inner.full_name,
                            e
                        );
                        continue;
                    }
                }
                log::debug!("signal '{}': consumer connected", inner.full_name);
                inner.conns.lock().push(stream);
            }
            Err(e) => {
                log::warn!("signal '{}': accept failed: {}", inner.full_name, e);
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}
