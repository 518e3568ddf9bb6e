// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! fieldlink-hub: the directory and observability daemon for fieldlink.
//!
//! One hub instance per machine owns the authoritative slot-to-signal
//! wiring, validates registrations, pushes connection changes to
//! subscribed slots, and retains the mirrored last value of every
//! endpoint for tooling.

pub mod config;
pub mod server;

pub use config::{ConfigError, HubConfig};
pub use server::{HubServer, ServerError};
