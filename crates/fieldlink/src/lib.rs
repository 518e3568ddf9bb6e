// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! fieldlink: typed signal/slot messaging between processes on one machine.
//!
//! Producers expose [`Signal`]s and consumers expose [`Slot`]s, both named
//! and typed. Neither side addresses the other directly: the `fieldlink-hub`
//! daemon holds the authoritative slot-to-signal wiring, and rewiring it at
//! runtime redirects live traffic without restarting either process. Values
//! flow point-to-point over Unix sockets; the hub only carries directory
//! state and the observability mirror.
//!
//! ```no_run
//! use fieldlink::{HubClient, RuntimeConfig, Signal, Slot};
//!
//! # async fn demo() -> fieldlink::Result<()> {
//! let client = HubClient::connect(RuntimeConfig::from_env()).await?;
//!
//! let signal = Signal::<f64>::bind(&client, "sensor_1", "boiler outlet").await?;
//! let slot = Slot::<f64>::bind(&client, "display", "panel readout", |v| {
//!     println!("temperature: {v}");
//! })
//! .await?;
//!
//! client.connect_endpoints(slot.full_name(), Some(signal.full_name())).await?;
//! signal.send(21.5)?;
//! # Ok(())
//! # }
//! ```

pub mod any;
pub mod config;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod shadow;
pub mod signal;
pub mod slot;
pub mod types;

pub use any::{make_any_signal, make_any_slot, AnySignal, AnySlot};
pub use config::RuntimeConfig;
pub use error::{Error, RegistrationError, Result, TransportError};
pub use hub::HubClient;
pub use shadow::Shadow;
pub use signal::Signal;
pub use slot::{Slot, SlotState};
pub use types::{full_name, split_full_name, TypeTag, Typed, Value};

/// Library version, from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
