// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime-typed endpoints.
//!
//! Configuration-driven tooling learns an endpoint's type as a string at
//! runtime, not at compile time. [`make_any_signal`] and [`make_any_slot`]
//! dispatch such a [`TypeTag`] to the matching statically typed endpoint
//! and wrap it in a one-of-many handle. An unrecognized tag yields the
//! unset variant: no registration, no socket, no traffic.

use crate::error::{Error, Result};
use crate::hub::HubClient;
use crate::signal::Signal;
use crate::slot::{Slot, SlotState};
use crate::types::{TypeTag, Value};

/// A signal whose value type was chosen at runtime.
pub enum AnySignal {
    /// Unrecognized type tag; inert.
    Unset,
    Bool(Signal<bool>),
    Int(Signal<i64>),
    Uint(Signal<u64>),
    Double(Signal<f64>),
    String(Signal<String>),
    Json(Signal<serde_json::Value>),
}

/// A slot whose value type was chosen at runtime.
pub enum AnySlot {
    /// Unrecognized type tag; inert.
    Unset,
    Bool(Slot<bool>),
    Int(Slot<i64>),
    Uint(Slot<u64>),
    Double(Slot<f64>),
    String(Slot<String>),
    Json(Slot<serde_json::Value>),
}

/// Construct a signal for a runtime type tag.
///
/// [`TypeTag::Unknown`] returns [`AnySignal::Unset`] without contacting
/// the hub; any other tag behaves exactly like the typed constructor.
pub async fn make_any_signal(
    tag: TypeTag,
    client: &HubClient,
    name: &str,
    description: &str,
) -> Result<AnySignal> {
    Ok(match tag {
        TypeTag::Unknown => AnySignal::Unset,
        TypeTag::Bool => AnySignal::Bool(Signal::bind(client, name, description).await?),
        TypeTag::Int => AnySignal::Int(Signal::bind(client, name, description).await?),
        TypeTag::Uint => AnySignal::Uint(Signal::bind(client, name, description).await?),
        TypeTag::Double => AnySignal::Double(Signal::bind(client, name, description).await?),
        TypeTag::String => AnySignal::String(Signal::bind(client, name, description).await?),
        TypeTag::Json => AnySignal::Json(Signal::bind(client, name, description).await?),
    })
}

/// Construct a slot for a runtime type tag.
///
/// `on_value` receives each delivered value in its self-describing form,
/// whatever the underlying type. [`TypeTag::Unknown`] returns
/// [`AnySlot::Unset`] without contacting the hub.
pub async fn make_any_slot(
    tag: TypeTag,
    client: &HubClient,
    name: &str,
    description: &str,
    mut on_value: impl FnMut(Value) + Send + 'static,
) -> Result<AnySlot> {
    Ok(match tag {
        TypeTag::Unknown => AnySlot::Unset,
        TypeTag::Bool => AnySlot::Bool(
            Slot::bind(client, name, description, move |v: bool| {
                on_value(Value::Bool(v))
            })
            .await?,
        ),
        TypeTag::Int => AnySlot::Int(
            Slot::bind(client, name, description, move |v: i64| {
                on_value(Value::Int(v))
            })
            .await?,
        ),
        TypeTag::Uint => AnySlot::Uint(
            Slot::bind(client, name, description, move |v: u64| {
                on_value(Value::Uint(v))
            })
            .await?,
        ),
        TypeTag::Double => AnySlot::Double(
            Slot::bind(client, name, description, move |v: f64| {
                on_value(Value::Double(v))
            })
            .await?,
        ),
        TypeTag::String => AnySlot::String(
            Slot::bind(client, name, description, move |v: String| {
                on_value(Value::String(v))
            })
            .await?,
        ),
        TypeTag::Json => AnySlot::Json(
            Slot::bind(client, name, description, move |v: serde_json::Value| {
                on_value(Value::Json(v))
            })
            .await?,
        ),
    })
}

impl AnySignal {
    /// The endpoint's type tag ([`TypeTag::Unknown`] when unset).
    pub fn tag(&self) -> TypeTag {
        match self {
            AnySignal::Unset => TypeTag::Unknown,
            AnySignal::Bool(_) => TypeTag::Bool,
            AnySignal::Int(_) => TypeTag::Int,
            AnySignal::Uint(_) => TypeTag::Uint,
            AnySignal::Double(_) => TypeTag::Double,
            AnySignal::String(_) => TypeTag::String,
            AnySignal::Json(_) => TypeTag::Json,
        }
    }

    /// Mangled `name@type` identity, if set.
    pub fn full_name(&self) -> Option<&str> {
        match self {
            AnySignal::Unset => None,
            AnySignal::Bool(s) => Some(s.full_name()),
            AnySignal::Int(s) => Some(s.full_name()),
            AnySignal::Uint(s) => Some(s.full_name()),
            AnySignal::Double(s) => Some(s.full_name()),
            AnySignal::String(s) => Some(s.full_name()),
            AnySignal::Json(s) => Some(s.full_name()),
        }
    }

    /// Send a self-describing value through the underlying signal.
    ///
    /// The value's tag must match the signal's; a mismatch is a
    /// serialization error and nothing is sent. Sending on an unset
    /// signal is also an error.
    pub fn send(&self, value: Value) -> Result<()> {
        match (self, value) {
            (AnySignal::Bool(s), Value::Bool(v)) => s.send(v),
            (AnySignal::Int(s), Value::Int(v)) => s.send(v),
            (AnySignal::Uint(s), Value::Uint(v)) => s.send(v),
            (AnySignal::Double(s), Value::Double(v)) => s.send(v),
            (AnySignal::String(s), Value::String(v)) => s.send(v),
            (AnySignal::Json(s), Value::Json(v)) => s.send(v),
            (AnySignal::Unset, _) => Err(Error::Serialization(
                "send on unset signal".to_string(),
            )),
            (signal, value) => Err(Error::Serialization(format!(
                "value type '{}' does not match signal type '{}'",
                value.tag().type_name(),
                signal.tag().type_name(),
            ))),
        }
    }
}

impl AnySlot {
    /// The endpoint's type tag ([`TypeTag::Unknown`] when unset).
    pub fn tag(&self) -> TypeTag {
        match self {
            AnySlot::Unset => TypeTag::Unknown,
            AnySlot::Bool(_) => TypeTag::Bool,
            AnySlot::Int(_) => TypeTag::Int,
            AnySlot::Uint(_) => TypeTag::Uint,
            AnySlot::Double(_) => TypeTag::Double,
            AnySlot::String(_) => TypeTag::String,
            AnySlot::Json(_) => TypeTag::Json,
        }
    }

    /// Mangled `name@type` identity, if set.
    pub fn full_name(&self) -> Option<&str> {
        match self {
            AnySlot::Unset => None,
            AnySlot::Bool(s) => Some(s.full_name()),
            AnySlot::Int(s) => Some(s.full_name()),
            AnySlot::Uint(s) => Some(s.full_name()),
            AnySlot::Double(s) => Some(s.full_name()),
            AnySlot::String(s) => Some(s.full_name()),
            AnySlot::Json(s) => Some(s.full_name()),
        }
    }

    /// Last received value in self-describing form, if any.
    pub fn value(&self) -> Option<Value> {
        match self {
            AnySlot::Unset => None,
            AnySlot::Bool(s) => s.value().map(Value::Bool),
            AnySlot::Int(s) => s.value().map(Value::Int),
            AnySlot::Uint(s) => s.value().map(Value::Uint),
            AnySlot::Double(s) => s.value().map(Value::Double),
            AnySlot::String(s) => s.value().map(Value::String),
            AnySlot::Json(s) => s.value().map(Value::Json),
        }
    }

    /// Connection state ([`SlotState::Unbound`] when unset).
    pub fn state(&self) -> SlotState {
        match self {
            AnySlot::Unset => SlotState::Unbound,
            AnySlot::Bool(s) => s.state(),
            AnySlot::Int(s) => s.state(),
            AnySlot::Uint(s) => s.state(),
            AnySlot::Double(s) => s.state(),
            AnySlot::String(s) => s.state(),
            AnySlot::Json(s) => s.state(),
        }
    }
}
