// src/service.rs
//
// Bridge runtime: one tokio task multiplexes the MQTT event loop, frames
// from the CAN worker and the shutdown signal.

use rumqttc::{AsyncClient, Event, Packet, QoS};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;

use crate::bridge::{Bridge, BridgeError, StateMessage};
use crate::io::mqtt::{self, MqttConfig};
use crate::io::socketcan::{self, device_label};
use crate::io::{CanEvent, CanMessage, IoError, TransmitRequest, TransmitSender};
use crate::settings::BridgeSettings;
use crate::table::ConversionTable;
use crate::tlog;
use crate::topic::{classify, TopicKind};

/// Frames buffered between the CAN worker and the bridge loop
const CAN_EVENT_QUEUE: usize = 256;
/// Wait between MQTT reconnect attempts
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// How long a command waits for the CAN worker to confirm the write
const TRANSMIT_TIMEOUT: Duration = Duration::from_millis(500);

pub async fn run(settings: BridgeSettings) -> Result<(), BridgeError> {
    settings.validate()?;

    let table = Arc::new(ConversionTable::load(&settings.table_path)?);
    let bridge = Bridge::new(table.clone(), settings.can.tunnel);
    let qos = mqtt::qos_from_u8(settings.mqtt.qos)?;

    let (event_tx, mut event_rx) = mpsc::channel::<CanEvent>(CAN_EVENT_QUEUE);
    let worker = socketcan::spawn_worker(&settings.can, event_tx)?;
    let transmit = worker.transmitter();
    let can_device = device_label(&settings.can.interface);

    let (client, mut eventloop) = mqtt::connect(&settings.mqtt);

    tlog!(
        "Setup OK (table={}, if={}, mqtt={}, tunnel={})",
        settings.table_path.display(),
        settings.can.interface,
        settings.mqtt.device_label(),
        if settings.can.tunnel { "on" } else { "off" }
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut outcome: Result<(), BridgeError> = Ok(());
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tlog!("Shutdown requested");
                break;
            }
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    tlog!("[mqtt] Connected ({:?})", ack.code);
                    if let Err(e) = mqtt::subscribe_table(&client, &table, &settings.mqtt, qos) {
                        tlog!(error: "{}", e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    forward_command(&bridge, &publish.topic, &publish.payload, &transmit).await;
                }
                Ok(_) => {}
                Err(e) => {
                    tlog!(warn: "[mqtt] {}: {}; retrying in {}s", settings.mqtt.device_label(), e, RECONNECT_DELAY.as_secs());
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            },
            event = event_rx.recv() => match event {
                Some(CanEvent::Frame(frame)) => {
                    if let Some(state) = bridge.translate_frame(&frame) {
                        publish_state(&client, &settings.mqtt, qos, &frame, &state);
                    }
                }
                Some(CanEvent::Error(e)) => {
                    tlog!(error: "{}", e);
                    outcome = Err(e.into());
                    break;
                }
                Some(CanEvent::Ended(reason)) => {
                    tlog!(warn: "[socketcan] {} ended: {}", can_device, reason);
                    break;
                }
                None => {
                    outcome = Err(IoError::read(&can_device, "worker exited").into());
                    break;
                }
            },
        }
    }

    // Unblocks a worker parked on a full event queue.
    drop(event_rx);
    worker.stop().await;
    if let Err(e) = client.try_disconnect() {
        tlog!(warn: "[mqtt] disconnect: {}", e);
    }
    tlog!("Shutdown OK");
    outcome
}

/// MQTT -> CAN for one publish. Failures are logged, never fatal.
async fn forward_command(bridge: &Bridge, topic: &str, payload: &[u8], transmit: &TransmitSender) {
    let frame = match bridge.translate_command(topic, payload) {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            if classify(topic) != TopicKind::State {
                tlog!(warn: "unknown topic: {}", topic);
            }
            return;
        }
        Err(e) => {
            tlog!(warn: "{}", e);
            return;
        }
    };

    match transmit_frame(transmit, frame.clone()).await {
        Ok(()) => tlog!(
            "MQTT->CAN OK topic={} id=0x{:X} data={}",
            topic,
            frame.id,
            frame.hex_data()
        ),
        Err(e) => tlog!(error: "MQTT->CAN failed topic={}: {}", topic, e),
    }
}

/// Queue a frame on the worker and wait for the write result.
pub async fn transmit_frame(transmit: &TransmitSender, frame: CanMessage) -> Result<(), IoError> {
    let (result_tx, result_rx) = oneshot::channel();
    transmit
        .try_send(TransmitRequest { frame, result_tx })
        .map_err(|e| IoError::write("socketcan", format!("failed to queue transmit request: {}", e)))?;

    match tokio::time::timeout(TRANSMIT_TIMEOUT, result_rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(IoError::write("socketcan", "worker dropped the request")),
        Err(_) => Err(IoError::timeout("socketcan", "no transmit confirmation")),
    }
}

fn publish_state(
    client: &AsyncClient,
    config: &MqttConfig,
    qos: QoS,
    frame: &CanMessage,
    state: &StateMessage,
) {
    match client.try_publish(state.topic.as_str(), qos, false, state.payload.clone().into_bytes()) {
        Ok(()) => tlog!(
            "CAN->MQTT OK id=0x{:X} topic={} payload={}",
            frame.id,
            state.topic,
            state.payload
        ),
        Err(e) => tlog!(warn: "[mqtt] {}: publish to {} failed: {}", config.device_label(), state.topic, e),
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tlog!(warn: "Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
