// src/io/mqtt/mod.rs
//
// MQTT client side of the bridge: broker options, QoS mapping and the
// per-table subscription set.

mod client;

use serde::{Deserialize, Serialize};

pub use client::{connect, qos_from_u8, subscribe_table, subscription_topics, wait_for_connack};

// ============================================================================
// Configuration
// ============================================================================

/// MQTT configuration, the `[mqtt]` table of bridge.toml
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname
    pub host: String,
    /// MQTT broker port
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// QoS for subscriptions and state publishes (0, 1 or 2)
    pub qos: u8,
    /// Username for authentication (optional)
    pub username: Option<String>,
    /// Password for authentication (optional). Read from the file but never
    /// written back out.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Subscribe to `#` instead of the table's command topics
    pub subscribe_all: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "cobien-bridge".to_string(),
            keep_alive_secs: 60,
            qos: 1,
            username: None,
            password: None,
            subscribe_all: false,
        }
    }
}

impl MqttConfig {
    /// Device label used in errors and logs
    pub fn device_label(&self) -> String {
        format!("mqtt://{}:{}", self.host, self.port)
    }
}
