// src/io/socketcan/mod.rs
//
// SocketCAN driver for Linux native CAN interfaces (can0, vcan0, ...).
//
// The interface is normally brought up by the system:
//   sudo ip link set can0 up type can bitrate 500000
// When a bitrate is configured the bridge does this itself, which needs
// CAP_NET_ADMIN.
//
// This module is only fully functional on Linux.

mod reader;
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
mod worker;

use serde::{Deserialize, Serialize};

pub use reader::{configure_interface, spawn_worker, CanWorker, SocketCanPort};

/// SocketCAN configuration, the `[can]` table of bridge.toml
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketCanConfig {
    /// CAN interface name (e.g., "can0", "vcan0")
    pub interface: String,
    /// If set, the interface is reconfigured to this bitrate at startup.
    /// If None, the interface is used as already configured by the system.
    pub bitrate: Option<u32>,
    /// Socket read timeout; also bounds transmit latency in the worker loop
    pub read_timeout_ms: u64,
    /// Decode frames with an unknown ID as tunnelled (inner ID in bytes 0..2)
    pub tunnel: bool,
}

impl Default for SocketCanConfig {
    fn default() -> Self {
        Self {
            interface: "can0".to_string(),
            bitrate: None,
            read_timeout_ms: 20,
            tunnel: true,
        }
    }
}

/// Device label used in errors and logs
pub fn device_label(interface: &str) -> String {
    format!("socketcan({})", interface)
}

/// Interface names go into an `ip link` command line, so only allow the
/// characters the kernel accepts in practice.
pub fn is_valid_interface_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() < 16
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
