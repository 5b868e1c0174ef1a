// src/cli.rs
//
// Command line of the bridge daemon. Flags override bridge.toml.

use clap::Parser;
use std::path::PathBuf;

use crate::settings::BridgeSettings;

/// Table-driven MQTT <-> SocketCAN bridge
#[derive(Parser, Debug)]
#[command(name = "mqtt-can-bridge", version, about, long_about = None)]
pub struct Cli {
    /// Conversion table (JSON)
    pub table: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// CAN interface
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Reconfigure the CAN interface to this bitrate at startup
    #[arg(long)]
    pub bitrate: Option<u32>,

    /// MQTT broker host
    #[arg(long)]
    pub host: Option<String>,

    /// MQTT broker port
    #[arg(long)]
    pub port: Option<u16>,

    /// MQTT QoS (0, 1 or 2)
    #[arg(long)]
    pub qos: Option<u8>,

    /// Do not decode tunnelled frames
    #[arg(long)]
    pub no_tunnel: bool,

    /// Also write logs to this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    pub fn apply(&self, settings: &mut BridgeSettings) {
        if let Some(table) = &self.table {
            settings.table_path = table.clone();
        }
        if let Some(interface) = &self.interface {
            settings.can.interface = interface.clone();
        }
        if let Some(bitrate) = self.bitrate {
            settings.can.bitrate = Some(bitrate);
        }
        if let Some(host) = &self.host {
            settings.mqtt.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.mqtt.port = port;
        }
        if let Some(qos) = self.qos {
            settings.mqtt.qos = qos;
        }
        if self.no_tunnel {
            settings.can.tunnel = false;
        }
        if let Some(dir) = &self.log_dir {
            settings.log_dir = Some(dir.clone());
        }
    }
}
