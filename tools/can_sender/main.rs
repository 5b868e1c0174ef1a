// tools/can_sender/main.rs
//
// Sends one random, valid frame per table entry per period on a CAN
// interface. Pair with the bridge to watch <topic>/state updates appear.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use mqtt_can_bridge_lib::io::socketcan::SocketCanPort;
use mqtt_can_bridge_lib::io::CanMessage;
use mqtt_can_bridge_lib::pack::pack_payload;
use mqtt_can_bridge_lib::service::shutdown_signal;
use mqtt_can_bridge_lib::sim::{build_payload, parse_period};
use mqtt_can_bridge_lib::table::{ConversionTable, Entry, PAYLOAD_LEN};
use mqtt_can_bridge_lib::tlog;

/// Send simulated device frames on a CAN interface
#[derive(Parser, Debug)]
#[command(name = "can_sender", version, about, long_about = None)]
struct Args {
    /// Conversion table (JSON)
    #[arg(long, default_value = "config/conversion.json")]
    table: PathBuf,

    /// CAN interface
    #[arg(short, long, default_value = "can0")]
    interface: String,

    /// Seconds between frames
    #[arg(long, default_value = "1.0", value_parser = parse_period)]
    period: Duration,
}

/// Random payload for an entry; a second draw if the first does not pack.
fn random_frame(entry: &Entry, rng: &mut impl rand::Rng) -> Option<[u8; PAYLOAD_LEN]> {
    (0..2).find_map(|_| {
        let payload = serde_json::Value::Object(build_payload(entry, rng));
        pack_payload(entry, &payload).ok()
    })
}

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

    let port = match SocketCanPort::open(&args.interface, Duration::from_millis(100)) {
        Ok(port) => port,
        Err(e) => {
            tlog!(error: "{} (is the interface up? ip link set {} up type can bitrate 500000)", e, args.interface);
            return ExitCode::FAILURE;
        }
    };

    let period = args.period;
    tlog!(
        "{} entr(y/ies). Sending one frame per {:.1}s on {}. Ctrl-C to stop.",
        table.len(),
        period.as_secs_f64(),
        args.interface
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut rng = rand::thread_rng();

    loop {
        for entry in table.entries() {
            match random_frame(entry, &mut rng) {
                Some(data) => {
                    let frame = CanMessage::new(entry.can_id, &data);
                    match port.send(&frame) {
                        Ok(()) => tlog!(
                            "[CAN ] id=0x{:X} topic={} data={}",
                            entry.can_id,
                            entry.topic,
                            frame.hex_data()
                        ),
                        Err(e) => tlog!(error: "CAN send failed id=0x{:X}: {}", entry.can_id, e),
                    }
                }
                None => tlog!(warn: "invalid payload skipped for id=0x{:X} topic={}", entry.can_id, entry.topic),
            }

            tokio::select! {
                _ = &mut shutdown => {
                    tlog!("Stopped");
                    return ExitCode::SUCCESS;
                }
                _ = tokio::time::sleep(period) => {}
            }
        }
    }
}
