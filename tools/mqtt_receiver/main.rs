// tools/mqtt_receiver/main.rs
//
// Subscribes to every topic on the broker and prints each message,
// classified as BASE, CMD or STATE.

use clap::Parser;
use rumqttc::{Event, Packet, QoS};
use std::process::ExitCode;
use std::time::Duration;

use mqtt_can_bridge_lib::io::mqtt::{self, MqttConfig};
use mqtt_can_bridge_lib::service::shutdown_signal;
use mqtt_can_bridge_lib::tlog;
use mqtt_can_bridge_lib::topic::classify;

/// Print all MQTT traffic on a broker
#[derive(Parser, Debug)]
#[command(name = "mqtt_receiver", version, about, long_about = None)]
struct Args {
    /// MQTT broker host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// MQTT broker port
    #[arg(long, default_value_t = 1883)]
    port: u16,
}

/// How long to wait for the broker before giving up
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn format_message(topic: &str, payload: &[u8]) -> String {
    format!(
        "[{}] [{}] {}  {}",
        chrono::Local::now().format("%H:%M:%S"),
        classify(topic),
        topic,
        String::from_utf8_lossy(payload)
    )
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = MqttConfig {
        host: args.host,
        port: args.port,
        client_id: format!("mqtt-receiver-{}", std::process::id()),
        ..MqttConfig::default()
    };
    let (client, mut eventloop) = mqtt::connect(&config);
    let device = config.device_label();

    if let Err(e) = mqtt::wait_for_connack(&mut eventloop, &device, CONNECT_TIMEOUT).await {
        tlog!(error: "{}", e);
        return ExitCode::FAILURE;
    }
    if let Err(e) = client.try_subscribe("#", QoS::AtLeastOnce) {
        tlog!(error: "subscribe failed: {}", e);
        return ExitCode::FAILURE;
    }

    tlog!("Listening on {} (Ctrl-C to stop)", device);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = eventloop.poll() => match event {
                // Clean session: subscriptions are lost on reconnect
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    tlog!("[mqtt] Reconnected ({:?}), subscribing to '#'", ack.code);
                    if let Err(e) = client.try_subscribe("#", QoS::AtLeastOnce) {
                        tlog!(error: "subscribe failed: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    println!("{}", format_message(&publish.topic, &publish.payload));
                }
                Ok(_) => {}
                Err(e) => {
                    tlog!(warn: "[mqtt] {}: {}; retrying in 1s", device, e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            },
        }
    }

    let _ = client.try_disconnect();
    tlog!("Stopped");
    ExitCode::SUCCESS
}
