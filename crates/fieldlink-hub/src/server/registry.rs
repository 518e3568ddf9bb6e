// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint registry, wiring table and mirrored-value store.
//!
//! The registry is the hub's single source of truth. Endpoints live as long
//! as the client connection that registered them; the wiring table and the
//! mirrored values outlive client connections, and the wiring table can
//! also outlive the hub itself through the optional state file.

use fieldlink::protocol::{error_code, ConnectionRecord, EndpointRecord, Role, ServerMessage};
use fieldlink::types::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Identifies one client connection for ownership and cleanup.
pub type ClientId = u64;

/// A rejection the client receives as an error reply.
pub type Rejection = (u32, String);

struct Subscriber {
    client: ClientId,
    sender: mpsc::UnboundedSender<ServerMessage>,
}

struct EndpointEntry {
    record: EndpointRecord,
    owner: ClientId,
}

/// Registry of endpoints, connections and mirrored values.
pub struct Registry {
    endpoints: HashMap<String, EndpointEntry>,

    /// Slot full name to signal full name. Persists across client
    /// disconnects: wiring is configuration, not session state.
    connections: HashMap<String, String>,

    /// Retained last mirrored value per endpoint.
    values: HashMap<String, Value>,

    connection_watchers: HashMap<String, Vec<Subscriber>>,
    value_watchers: HashMap<String, Vec<Subscriber>>,

    state_file: Option<PathBuf>,
}

impl Registry {
    /// Create a registry, restoring the wiring table from the state file
    /// when one is configured and present.
    pub fn new(state_file: Option<PathBuf>) -> Self {
        let mut registry = Self {
            endpoints: HashMap::new(),
            connections: HashMap::new(),
            values: HashMap::new(),
            connection_watchers: HashMap::new(),
            value_watchers: HashMap::new(),
            state_file,
        };
        registry.load_state();
        registry
    }

    /// Register an endpoint, or refresh an existing registration.
    ///
    /// Re-registration with the same type and role is idempotent (the usual
    /// process-restart case); a conflicting one is rejected. When a signal
    /// re-registers, every watcher of a slot wired to it is re-notified so
    /// consumers reconnect to the restarted producer.
    pub fn register(
        &mut self,
        record: EndpointRecord,
        owner: ClientId,
    ) -> Result<(), Rejection> {
        if let Some(existing) = self.endpoints.get(&record.full_name) {
            if existing.record.type_tag != record.type_tag || existing.record.role != record.role {
                return Err((
                    error_code::TYPE_CONFLICT,
                    format!(
                        "'{}' is already registered as a {:?} of type '{}'",
                        record.full_name,
                        existing.record.role,
                        existing.record.type_tag.type_name()
                    ),
                ));
            }
        }

        info!(full_name = %record.full_name, role = ?record.role, "registered endpoint");
        let full_name = record.full_name.clone();
        let role = record.role;
        self.endpoints.insert(
            full_name.clone(),
            EndpointEntry { record, owner },
        );

        if role == Role::Signal {
            let rewired: Vec<String> = self
                .connections
                .iter()
                .filter(|(_, signal)| **signal == full_name)
                .map(|(slot, _)| slot.clone())
                .collect();
            for slot in rewired {
                debug!(slot = %slot, signal = %full_name, "re-announcing restarted signal");
                self.notify_connection(&slot);
            }
        }

        Ok(())
    }

    /// Subscribe a client to connection changes for a slot.
    ///
    /// An already-established mapping is delivered immediately so a
    /// restarting consumer does not wait for the next rewire.
    pub fn watch_connections(
        &mut self,
        slot: &str,
        client: ClientId,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) {
        if let Some(signal) = self.connections.get(slot) {
            let _ = sender.send(ServerMessage::ConnectionChanged {
                slot: slot.to_string(),
                signal: Some(signal.clone()),
            });
        }
        self.connection_watchers
            .entry(slot.to_string())
            .or_default()
            .push(Subscriber { client, sender });
    }

    /// Subscribe a client to mirrored-value changes for an endpoint.
    pub fn watch_value(
        &mut self,
        full_name: &str,
        client: ClientId,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) {
        self.value_watchers
            .entry(full_name.to_string())
            .or_default()
            .push(Subscriber { client, sender });
    }

    /// Administrative rewire: point `slot` at `signal`, or clear with `None`.
    ///
    /// Both endpoints must be registered and carry the same type. The new
    /// mapping replaces any previous one and is pushed to the slot's
    /// watchers.
    pub fn connect(&mut self, slot: &str, signal: Option<&str>) -> Result<(), Rejection> {
        let slot_entry = self.endpoints.get(slot).ok_or_else(|| {
            (
                error_code::UNKNOWN_SLOT,
                format!("unknown slot '{}'", slot),
            )
        })?;
        if slot_entry.record.role != Role::Slot {
            return Err((
                error_code::BAD_REQUEST,
                format!("'{}' is a signal, not a slot", slot),
            ));
        }
        let slot_tag = slot_entry.record.type_tag;

        match signal {
            Some(signal) => {
                let signal_entry = self.endpoints.get(signal).ok_or_else(|| {
                    (
                        error_code::UNKNOWN_SIGNAL,
                        format!("unknown signal '{}'", signal),
                    )
                })?;
                if signal_entry.record.role != Role::Signal {
                    return Err((
                        error_code::BAD_REQUEST,
                        format!("'{}' is a slot, not a signal", signal),
                    ));
                }
                if signal_entry.record.type_tag != slot_tag {
                    return Err((
                        error_code::TYPE_MISMATCH,
                        format!(
                            "cannot wire '{}' ({}) to '{}' ({})",
                            slot,
                            slot_tag.type_name(),
                            signal,
                            signal_entry.record.type_tag.type_name()
                        ),
                    ));
                }

                info!(slot = %slot, signal = %signal, "wired");
                self.connections.insert(slot.to_string(), signal.to_string());
            }
            None => {
                info!(slot = %slot, "unwired");
                self.connections.remove(slot);
            }
        }

        self.notify_connection(slot);
        self.save_state();
        Ok(())
    }

    /// Store a mirrored value and fan it out to value watchers.
    pub fn publish_value(&mut self, full_name: &str, value: Value) {
        self.values.insert(full_name.to_string(), value.clone());

        if let Some(watchers) = self.value_watchers.get_mut(full_name) {
            watchers.retain(|w| {
                w.sender
                    .send(ServerMessage::ValueChanged {
                        full_name: full_name.to_string(),
                        value: value.clone(),
                    })
                    .is_ok()
            });
        }
    }

    /// The retained mirrored value for an endpoint.
    pub fn value(&self, full_name: &str) -> Option<Value> {
        self.values.get(full_name).cloned()
    }

    /// All registered endpoints, sorted by full name.
    pub fn endpoints(&self) -> Vec<EndpointRecord> {
        let mut records: Vec<EndpointRecord> = self
            .endpoints
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        records.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        records
    }

    /// The current wiring table, sorted by slot name.
    pub fn connections(&self) -> Vec<ConnectionRecord> {
        let mut records: Vec<ConnectionRecord> = self
            .connections
            .iter()
            .map(|(slot, signal)| ConnectionRecord {
                slot: slot.clone(),
                signal: signal.clone(),
            })
            .collect();
        records.sort_by(|a, b| a.slot.cmp(&b.slot));
        records
    }

    /// Drop everything owned by a departed client: its endpoint
    /// registrations and its subscriptions. Wiring and mirrored values
    /// stay.
    pub fn client_disconnected(&mut self, client: ClientId) {
        let departed: Vec<String> = self
            .endpoints
            .iter()
            .filter(|(_, entry)| entry.owner == client)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &departed {
            info!(full_name = %name, "endpoint departed with client");
            self.endpoints.remove(name);
        }

        for watchers in self.connection_watchers.values_mut() {
            watchers.retain(|w| w.client != client);
        }
        self.connection_watchers.retain(|_, w| !w.is_empty());
        for watchers in self.value_watchers.values_mut() {
            watchers.retain(|w| w.client != client);
        }
        self.value_watchers.retain(|_, w| !w.is_empty());
    }

    /// Number of registered endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    fn notify_connection(&mut self, slot: &str) {
        let signal = self.connections.get(slot).cloned();
        if let Some(watchers) = self.connection_watchers.get_mut(slot) {
            watchers.retain(|w| {
                w.sender
                    .send(ServerMessage::ConnectionChanged {
                        slot: slot.to_string(),
                        signal: signal.clone(),
                    })
                    .is_ok()
            });
        }
    }

    fn save_state(&self) {
        let Some(path) = &self.state_file else {
            return;
        };
        match serde_json::to_string_pretty(&self.connections) {
            Ok(content) => {
                if let Err(e) = std::fs::write(path, content) {
                    warn!("failed to persist wiring table to {:?}: {}", path, e);
                }
            }
            Err(e) => warn!("failed to serialize wiring table: {}", e),
        }
    }

    fn load_state(&mut self) {
        let Some(path) = &self.state_file else {
            return;
        };
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!("failed to read wiring table from {:?}: {}", path, e);
                return;
            }
        };
        match serde_json::from_str::<HashMap<String, String>>(&content) {
            Ok(connections) => {
                info!("restored {} wiring entries from {:?}", connections.len(), path);
                self.connections = connections;
            }
            Err(e) => warn!("ignoring corrupt wiring table {:?}: {}", path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlink::types::TypeTag;

    fn record(full_name: &str, tag: TypeTag, role: Role) -> EndpointRecord {
        EndpointRecord {
            full_name: full_name.to_string(),
            description: String::new(),
            type_tag: tag,
            role,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_register_idempotent_and_conflicting() {
        let mut reg = Registry::new(None);
        let signal = record("a@double", TypeTag::Double, Role::Signal);

        assert!(reg.register(signal.clone(), 1).is_ok());
        assert!(reg.register(signal, 2).is_ok());
        assert_eq!(reg.endpoint_count(), 1);

        let err = reg
            .register(record("a@double", TypeTag::Double, Role::Slot), 3)
            .unwrap_err();
        assert_eq!(err.0, error_code::TYPE_CONFLICT);
    }

    #[test]
    fn test_connect_validations() {
        let mut reg = Registry::new(None);
        reg.register(record("src@double", TypeTag::Double, Role::Signal), 1)
            .unwrap();
        reg.register(record("dst@double", TypeTag::Double, Role::Slot), 1)
            .unwrap();
        reg.register(record("dst@int", TypeTag::Int, Role::Slot), 1)
            .unwrap();

        let err = reg.connect("missing@double", Some("src@double")).unwrap_err();
        assert_eq!(err.0, error_code::UNKNOWN_SLOT);

        let err = reg.connect("dst@double", Some("missing@double")).unwrap_err();
        assert_eq!(err.0, error_code::UNKNOWN_SIGNAL);

        let err = reg.connect("dst@int", Some("src@double")).unwrap_err();
        assert_eq!(err.0, error_code::TYPE_MISMATCH);

        let err = reg.connect("src@double", Some("src@double")).unwrap_err();
        assert_eq!(err.0, error_code::BAD_REQUEST);

        assert!(reg.connect("dst@double", Some("src@double")).is_ok());
        assert_eq!(reg.connections().len(), 1);
    }

    #[test]
    fn test_watcher_gets_current_mapping_immediately() {
        let mut reg = Registry::new(None);
        reg.register(record("src@bool", TypeTag::Bool, Role::Signal), 1)
            .unwrap();
        reg.register(record("dst@bool", TypeTag::Bool, Role::Slot), 2)
            .unwrap();
        reg.connect("dst@bool", Some("src@bool")).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        reg.watch_connections("dst@bool", 2, tx);

        let msgs = drain(&mut rx);
        assert!(matches!(
            msgs.as_slice(),
            [ServerMessage::ConnectionChanged { slot, signal: Some(signal) }]
                if slot == "dst@bool" && signal == "src@bool"
        ));
    }

    #[test]
    fn test_rewire_notifies_watchers() {
        let mut reg = Registry::new(None);
        reg.register(record("a@double", TypeTag::Double, Role::Signal), 1)
            .unwrap();
        reg.register(record("b@double", TypeTag::Double, Role::Signal), 1)
            .unwrap();
        reg.register(record("dst@double", TypeTag::Double, Role::Slot), 2)
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        reg.watch_connections("dst@double", 2, tx);

        reg.connect("dst@double", Some("a@double")).unwrap();
        reg.connect("dst@double", Some("b@double")).unwrap();
        reg.connect("dst@double", None).unwrap();

        let targets: Vec<Option<String>> = drain(&mut rx)
            .into_iter()
            .map(|msg| match msg {
                ServerMessage::ConnectionChanged { signal, .. } => signal,
                other => panic!("unexpected message: {:?}", other),
            })
            .collect();
        assert_eq!(
            targets,
            vec![
                Some("a@double".to_string()),
                Some("b@double".to_string()),
                None
            ]
        );
    }

    #[test]
    fn test_signal_reregistration_reannounces() {
        let mut reg = Registry::new(None);
        reg.register(record("src@double", TypeTag::Double, Role::Signal), 1)
            .unwrap();
        reg.register(record("dst@double", TypeTag::Double, Role::Slot), 2)
            .unwrap();
        reg.connect("dst@double", Some("src@double")).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        reg.watch_connections("dst@double", 2, tx);
        drain(&mut rx);

        // Producer restarts: its endpoint departs and comes back.
        reg.client_disconnected(1);
        reg.register(record("src@double", TypeTag::Double, Role::Signal), 3)
            .unwrap();

        let msgs = drain(&mut rx);
        assert!(matches!(
            msgs.as_slice(),
            [ServerMessage::ConnectionChanged { signal: Some(signal), .. }]
                if signal == "src@double"
        ));
    }

    #[test]
    fn test_values_survive_client_departure() {
        let mut reg = Registry::new(None);
        reg.register(record("src@int", TypeTag::Int, Role::Signal), 1)
            .unwrap();
        reg.publish_value("src@int", Value::Int(7));

        reg.client_disconnected(1);
        assert_eq!(reg.endpoint_count(), 0);
        assert_eq!(reg.value("src@int"), Some(Value::Int(7)));
    }

    #[test]
    fn test_value_watchers_receive_changes() {
        let mut reg = Registry::new(None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        reg.watch_value("src@string", 1, tx);

        reg.publish_value("src@string", Value::String("box_a".into()));
        reg.publish_value("src@string", Value::String("box_b".into()));

        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 2);
        assert!(matches!(
            &msgs[1],
            ServerMessage::ValueChanged { value: Value::String(s), .. } if s == "box_b"
        ));
    }

    #[test]
    fn test_wiring_persists_to_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("wiring.json");

        {
            let mut reg = Registry::new(Some(state.clone()));
            reg.register(record("src@double", TypeTag::Double, Role::Signal), 1)
                .unwrap();
            reg.register(record("dst@double", TypeTag::Double, Role::Slot), 1)
                .unwrap();
            reg.connect("dst@double", Some("src@double")).unwrap();
        }

        let restored = Registry::new(Some(state));
        let connections = restored.connections();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].slot, "dst@double");
        assert_eq!(connections[0].signal, "src@double");
    }

    #[test]
    fn test_corrupt_state_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("wiring.json");
        std::fs::write(&state, "{{nonsense").unwrap();

        let reg = Registry::new(Some(state));
        assert!(reg.connections().is_empty());
    }
}
