// tools/mqtt_sender/main.rs
//
// Publishes one random, valid JSON command per table entry per period on
// <topic>/cmd. With the bridge running, each publish becomes a CAN frame.

use clap::Parser;
use rumqttc::{Event, Packet};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use mqtt_can_bridge_lib::io::mqtt::{self, MqttConfig};
use mqtt_can_bridge_lib::service::shutdown_signal;
use mqtt_can_bridge_lib::sim::{build_payload, parse_period};
use mqtt_can_bridge_lib::table::ConversionTable;
use mqtt_can_bridge_lib::tlog;
use mqtt_can_bridge_lib::topic::command_topic;

/// Publish simulated commands to the bridge
#[derive(Parser, Debug)]
#[command(name = "mqtt_sender", version, about, long_about = None)]
struct Args {
    /// Conversion table (JSON)
    #[arg(long, default_value = "config/conversion.json")]
    table: PathBuf,

    /// MQTT broker host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// MQTT broker port
    #[arg(long, default_value_t = 1883)]
    port: u16,

    /// QoS for publishes (0, 1 or 2)
    #[arg(long, default_value_t = 1)]
    qos: u8,

    /// Seconds between publishes
    #[arg(long, default_value = "1.0", value_parser = parse_period)]
    period: Duration,
}

/// How long to wait for the broker before giving up
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let table = match ConversionTable::load(&args.table) {
        Ok(table) => table,
        Err(e) => {
            tlog!(error: "{}", e);
            return ExitCode::FAILURE;
        }
    };

    let qos = match mqtt::qos_from_u8(args.qos) {
        Ok(qos) => qos,
        Err(e) => {
            tlog!(error: "{}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = MqttConfig {
        host: args.host.clone(),
        port: args.port,
        client_id: format!("mqtt-sender-{}", std::process::id()),
        ..MqttConfig::default()
    };
    let (client, mut eventloop) = mqtt::connect(&config);
    let device = config.device_label();

    if let Err(e) = mqtt::wait_for_connack(&mut eventloop, &device, CONNECT_TIMEOUT).await {
        tlog!(error: "{}", e);
        return ExitCode::FAILURE;
    }

    // The event loop must be polled for publishes to leave the client.
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => tlog!("[mqtt] Reconnected to {} ({:?})", device, ack.code),
                Ok(_) => {}
                Err(e) => {
                    tlog!(warn: "[mqtt] {}: {}; retrying in 1s", device, e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    let period = args.period;
    tlog!(
        "{} topic(s). Publishing every {:.1}s on '<topic>/cmd'. Ctrl-C to stop.",
        table.len(),
        period.as_secs_f64()
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut rng = rand::thread_rng();

    loop {
        for entry in table.entries() {
            let topic = command_topic(&entry.topic);
            let payload = serde_json::Value::Object(build_payload(entry, &mut rng)).to_string();

            // Queue full while the broker is away: drop this one
            match client.try_publish(topic.as_str(), qos, false, payload.clone().into_bytes()) {
                Ok(()) => tlog!("[MQTT] {}  {}", topic, payload),
                Err(e) => tlog!(error: "publish to {} failed: {}", topic, e),
            }

            tokio::select! {
                _ = &mut shutdown => {
                    let _ = client.try_disconnect();
                    tlog!("Stopped");
                    return ExitCode::SUCCESS;
                }
                _ = tokio::time::sleep(period) => {}
            }
        }
    }
}
