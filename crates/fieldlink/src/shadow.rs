// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Observability shadow.
//!
//! Mirrors an endpoint's last accepted data-plane value onto the hub as a
//! retained property plus a change event, on a channel independent of the
//! data plane. Tooling polls it with [`HubClient::get_value`] or subscribes
//! with [`HubClient::watch_value`].
//!
//! [`HubClient::get_value`]: crate::hub::HubClient::get_value
//! [`HubClient::watch_value`]: crate::hub::HubClient::watch_value

use crate::hub::HubClient;
use crate::types::Value;

/// Mirror handle for one endpoint.
pub struct Shadow {
    client: HubClient,
    full_name: String,
}

impl Shadow {
    pub fn new(client: HubClient, full_name: String) -> Self {
        Self { client, full_name }
    }

    /// Mirror a newly accepted value.
    ///
    /// Fire-and-forget from the data path's perspective: this never blocks
    /// and never fails the send/receive that triggered it. Mirror-path
    /// failures are logged inside the hub client.
    pub fn emit_value(&self, value: Value) {
        self.client.publish_value(&self.full_name, value);
    }

    /// The mirrored endpoint's full name (also the property name on the bus).
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}
