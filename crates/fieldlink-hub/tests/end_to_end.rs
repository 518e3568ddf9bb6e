// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end scenarios: real hub, real endpoints, real sockets.

use fieldlink::{
    Error, HubClient, RegistrationError, RuntimeConfig, Signal, Slot, SlotState, TypeTag, Value,
};
use fieldlink_hub::{HubConfig, HubServer};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

struct TestHub {
    _dir: tempfile::TempDir,
    server: HubServer,
    config: RuntimeConfig,
}

impl TestHub {
    async fn start() -> TestHub {
        let dir = tempfile::tempdir().unwrap();
        TestHub::start_in(dir, None).await
    }

    async fn start_in(dir: tempfile::TempDir, state_file: Option<&Path>) -> TestHub {
        let hub_config = HubConfig {
            runtime_dir: dir.path().to_path_buf(),
            socket_path: None,
            state_file: state_file.map(Path::to_path_buf),
            max_clients: 64,
        };
        let server = HubServer::new(hub_config).unwrap();

        let runner = server.clone();
        tokio::spawn(async move {
            runner.run().await.unwrap();
        });

        let config = RuntimeConfig::with_runtime_dir(dir.path());
        wait_until(|| config.hub_socket.exists()).await;

        TestHub {
            _dir: dir,
            server,
            config,
        }
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn test_temperature_reading_reaches_display() {
    let hub = TestHub::start().await;
    let client = HubClient::connect(hub.config.clone()).await.unwrap();

    let sensor = Signal::<f64>::bind(&client, "temperature_reading", "boiler outlet")
        .await
        .unwrap();

    let readings = Arc::new(Mutex::new(Vec::new()));
    let sink = readings.clone();
    let display = Slot::<f64>::bind(&client, "display", "operator panel", move |v| {
        sink.lock().unwrap().push(v);
    })
    .await
    .unwrap();

    client
        .connect_endpoints(display.full_name(), Some(sensor.full_name()))
        .await
        .unwrap();
    wait_until(|| display.state() == SlotState::Bound(sensor.full_name().to_string())).await;

    sensor.send(21.5).unwrap();
    wait_until(|| display.value() == Some(21.5)).await;
    assert_eq!(*readings.lock().unwrap(), vec![21.5]);

    // Both endpoints are observable through the mirror without touching
    // the data plane.
    wait_until_async(|| async {
        client
            .get_value("temperature_reading@double")
            .await
            .unwrap()
            == Some(Value::Double(21.5))
    })
    .await;
    wait_until_async(|| async {
        client.get_value("display@double").await.unwrap() == Some(Value::Double(21.5))
    })
    .await;
}

async fn wait_until_async<F, Fut>(mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if cond().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn test_rewire_discards_old_source() {
    let hub = TestHub::start().await;
    let client = HubClient::connect(hub.config.clone()).await.unwrap();

    let sensor_1 = Signal::<f64>::bind(&client, "sensor_1", "line a").await.unwrap();
    let sensor_2 = Signal::<f64>::bind(&client, "sensor_2", "line b").await.unwrap();

    let readings = Arc::new(Mutex::new(Vec::new()));
    let sink = readings.clone();
    let display = Slot::<f64>::bind(&client, "display", "operator panel", move |v| {
        sink.lock().unwrap().push(v);
    })
    .await
    .unwrap();

    client
        .connect_endpoints(display.full_name(), Some(sensor_1.full_name()))
        .await
        .unwrap();
    wait_until(|| sensor_1.consumer_count() == 1).await;
    sensor_1.send(21.5).unwrap();
    wait_until(|| display.value() == Some(21.5)).await;

    client
        .connect_endpoints(display.full_name(), Some(sensor_2.full_name()))
        .await
        .unwrap();
    wait_until(|| display.state() == SlotState::Bound("sensor_2@double".to_string())).await;
    wait_until(|| sensor_1.consumer_count() == 0).await;

    // The old source keeps producing; none of it may arrive.
    sensor_1.send(99.9).unwrap();
    sensor_2.send(42.0).unwrap();
    wait_until(|| display.value() == Some(42.0)).await;

    assert_eq!(*readings.lock().unwrap(), vec![21.5, 42.0]);
}

#[tokio::test]
async fn test_connect_validations_are_enforced() {
    let hub = TestHub::start().await;
    let client = HubClient::connect(hub.config.clone()).await.unwrap();

    let sensor = Signal::<f64>::bind(&client, "sensor", "source").await.unwrap();
    let counter = Slot::<i64>::bind(&client, "counter", "int consumer", |_| {})
        .await
        .unwrap();

    // Type mismatch: double signal into int slot.
    let err = client
        .connect_endpoints(counter.full_name(), Some(sensor.full_name()))
        .await
        .unwrap_err();
    match err {
        Error::Registration(RegistrationError::Rejected { code, .. }) => assert_eq!(code, 4),
        other => panic!("expected type-mismatch rejection, got {other}"),
    }

    // Unknown slot.
    let err = client
        .connect_endpoints("ghost@double", Some(sensor.full_name()))
        .await
        .unwrap_err();
    match err {
        Error::Registration(RegistrationError::Rejected { code, .. }) => assert_eq!(code, 2),
        other => panic!("expected unknown-slot rejection, got {other}"),
    }
}

#[tokio::test]
async fn test_conflicting_registration_rejected() {
    let hub = TestHub::start().await;
    let client = HubClient::connect(hub.config.clone()).await.unwrap();

    // Same full name cannot serve as both signal and slot.
    let _signal = Signal::<bool>::bind(&client, "estop", "emergency stop")
        .await
        .unwrap();
    let err = Slot::<bool>::bind(&client, "estop", "emergency stop", |_| {})
        .await
        .unwrap_err();
    match err {
        Error::Registration(RegistrationError::Rejected { code, .. }) => assert_eq!(code, 1),
        other => panic!("expected conflict rejection, got {other}"),
    }
}

#[tokio::test]
async fn test_wiring_survives_consumer_restart() {
    let hub = TestHub::start().await;
    let client = HubClient::connect(hub.config.clone()).await.unwrap();

    let sensor = Signal::<u64>::bind(&client, "ticks", "tick source").await.unwrap();

    {
        let slot = Slot::<u64>::bind(&client, "readout", "consumer", |_| {})
            .await
            .unwrap();
        client
            .connect_endpoints(slot.full_name(), Some(sensor.full_name()))
            .await
            .unwrap();
        wait_until(|| slot.state() == SlotState::Bound("ticks@uint".to_string())).await;
    }

    // The consumer restarts with a fresh hub connection. The retained
    // wiring binds it again without an administrative connect.
    let client_2 = HubClient::connect(hub.config.clone()).await.unwrap();
    let slot = Slot::<u64>::bind(&client_2, "readout", "consumer", |_| {})
        .await
        .unwrap();
    wait_until(|| slot.state() == SlotState::Bound("ticks@uint".to_string())).await;

    sensor.send(7).unwrap();
    wait_until(|| slot.value() == Some(7)).await;
}

#[tokio::test]
async fn test_producer_restart_rebinds_consumer() {
    let hub = TestHub::start().await;
    let client = HubClient::connect(hub.config.clone()).await.unwrap();

    let slot = Slot::<f64>::bind(&client, "display", "consumer", |_| {})
        .await
        .unwrap();

    let producer_client = HubClient::connect(hub.config.clone()).await.unwrap();
    let sensor = Signal::<f64>::bind(&producer_client, "sensor", "source")
        .await
        .unwrap();
    client
        .connect_endpoints(slot.full_name(), Some(sensor.full_name()))
        .await
        .unwrap();
    wait_until(|| slot.state() == SlotState::Bound("sensor@double".to_string())).await;

    sensor.send(1.25).unwrap();
    wait_until(|| slot.value() == Some(1.25)).await;

    // Producer process dies; the slot falls back to unbound.
    drop(sensor);
    drop(producer_client);
    wait_until(|| slot.state() == SlotState::Unbound).await;

    // The mirrored property does not regress while the producer is away.
    assert_eq!(
        client.get_value("sensor@double").await.unwrap(),
        Some(Value::Double(1.25))
    );

    // It comes back; the hub re-announces the retained wiring and the
    // slot rebinds on its own.
    let producer_client = HubClient::connect(hub.config.clone()).await.unwrap();
    let sensor = Signal::<f64>::bind(&producer_client, "sensor", "source")
        .await
        .unwrap();
    wait_until(|| slot.state() == SlotState::Bound("sensor@double".to_string())).await;

    sensor.send(3.5).unwrap();
    wait_until(|| slot.value() == Some(3.5)).await;
}

#[tokio::test]
async fn test_value_watch_streams_changes() {
    let hub = TestHub::start().await;
    let client = HubClient::connect(hub.config.clone()).await.unwrap();

    let sensor = Signal::<i64>::bind(&client, "counter", "cycle count").await.unwrap();

    let watcher_client = HubClient::connect(hub.config.clone()).await.unwrap();
    let mut changes = watcher_client.watch_value("counter@int").await.unwrap();

    sensor.send(1).unwrap();
    sensor.send(2).unwrap();

    let first = tokio::time::timeout(Duration::from_secs(2), changes.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(2), changes.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, Value::Int(1));
    assert_eq!(second, Value::Int(2));
}

#[tokio::test]
async fn test_directory_listings() {
    let hub = TestHub::start().await;
    let client = HubClient::connect(hub.config.clone()).await.unwrap();

    let sensor = Signal::<f64>::bind(&client, "sensor", "source").await.unwrap();
    let display = Slot::<f64>::bind(&client, "display", "consumer", |_| {})
        .await
        .unwrap();
    client
        .connect_endpoints(display.full_name(), Some(sensor.full_name()))
        .await
        .unwrap();

    let endpoints = client.list_endpoints().await.unwrap();
    let names: Vec<&str> = endpoints.iter().map(|e| e.full_name.as_str()).collect();
    assert_eq!(names, vec!["display@double", "sensor@double"]);
    assert!(endpoints.iter().all(|e| e.type_tag == TypeTag::Double));

    let connections = client.list_connections().await.unwrap();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].slot, "display@double");
    assert_eq!(connections[0].signal, "sensor@double");
}

#[tokio::test]
async fn test_wiring_survives_hub_restart() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("wiring.json");
    let hub_config = HubConfig {
        runtime_dir: dir.path().to_path_buf(),
        socket_path: None,
        state_file: Some(state_file),
        max_clients: 64,
    };
    let config = RuntimeConfig::with_runtime_dir(dir.path());

    let start = |hub_config: HubConfig| {
        let server = HubServer::new(hub_config).unwrap();
        let runner = server.clone();
        tokio::spawn(async move {
            runner.run().await.unwrap();
        });
        server
    };

    let first = start(hub_config.clone());
    wait_until(|| config.hub_socket.exists()).await;
    {
        let client = HubClient::connect(config.clone()).await.unwrap();
        let sensor = Signal::<f64>::bind(&client, "sensor", "source").await.unwrap();
        let display = Slot::<f64>::bind(&client, "display", "consumer", |_| {})
            .await
            .unwrap();
        client
            .connect_endpoints(display.full_name(), Some(sensor.full_name()))
            .await
            .unwrap();
    }
    first.shutdown();
    wait_until(|| !first.is_running()).await;

    let second = start(hub_config);
    wait_until(|| config.hub_socket.exists()).await;

    let client = HubClient::connect(config).await.unwrap();
    let connections = client.list_connections().await.unwrap();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].slot, "display@double");
    assert_eq!(connections[0].signal, "sensor@double");

    second.shutdown();
}
