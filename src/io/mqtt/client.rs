// src/io/mqtt/client.rs
//
// rumqttc wiring. The event loop is owned and polled by the caller; the
// helpers here never await on the request channel, so they are safe to call
// from inside that poll loop.

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeFilter};
use tokio::time::Duration;

use super::MqttConfig;
use crate::io::IoError;
use crate::table::ConversionTable;
use crate::tlog;
use crate::topic::command_topic;

/// Requests buffered between the client handle and the event loop
const REQUEST_CAPACITY: usize = 100;

pub fn qos_from_u8(level: u8) -> Result<QoS, IoError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(IoError::configuration(
            "mqtt",
            format!("invalid QoS {} (expected 0, 1 or 2)", other),
        )),
    }
}

/// Build the client and its event loop. Nothing is sent until the loop is polled.
pub fn connect(config: &MqttConfig) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    // Set credentials if provided
    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.clone().unwrap_or_default());
    }

    tlog!("[mqtt] Connecting to {} as {}", config.device_label(), config.client_id);
    AsyncClient::new(options, REQUEST_CAPACITY)
}

/// Poll until the broker accepts the connection. Any error before the first
/// ConnAck is returned instead of retried, so a wrong host or port fails fast.
pub async fn wait_for_connack(
    eventloop: &mut EventLoop,
    device: &str,
    limit: Duration,
) -> Result<(), IoError> {
    let first_ack = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    tlog!("[mqtt] Connected ({:?})", ack.code);
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => return Err(IoError::connection(device, e.to_string())),
            }
        }
    };

    match tokio::time::timeout(limit, first_ack).await {
        Ok(result) => result,
        Err(_) => Err(IoError::timeout(
            device,
            format!("no ConnAck within {}ms", limit.as_millis()),
        )),
    }
}

/// Topics the bridge listens on: `<topic>` and `<topic>/cmd` per entry, or `#`.
pub fn subscription_topics(table: &ConversionTable, subscribe_all: bool) -> Vec<String> {
    if subscribe_all {
        return vec!["#".to_string()];
    }
    table
        .entries()
        .iter()
        .flat_map(|entry| [entry.topic.clone(), command_topic(&entry.topic)])
        .collect()
}

/// (Re)subscribe after a ConnAck, as a single SUBSCRIBE packet.
pub fn subscribe_table(
    client: &AsyncClient,
    table: &ConversionTable,
    config: &MqttConfig,
    qos: QoS,
) -> Result<(), IoError> {
    let topics = subscription_topics(table, config.subscribe_all);
    let count = topics.len();
    let filters: Vec<SubscribeFilter> = topics
        .into_iter()
        .map(|topic| SubscribeFilter::new(topic, qos))
        .collect();

    client
        .try_subscribe_many(filters)
        .map_err(|e| IoError::protocol(&config.device_label(), format!("subscribe failed: {}", e)))?;

    tlog!("[mqtt] Subscribed to {} topic(s) with {:?}", count, qos);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::IoErrorKind;
    use crate::test_support::reference_table;
    use std::net::TcpListener;

    fn local_config(port: u16) -> MqttConfig {
        MqttConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..MqttConfig::default()
        }
    }

    #[test]
    fn test_qos_mapping() {
        assert_eq!(qos_from_u8(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(qos_from_u8(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(qos_from_u8(2).unwrap(), QoS::ExactlyOnce);
        assert!(qos_from_u8(3).is_err());
    }

    #[test]
    fn test_subscription_topics_cover_base_and_cmd() {
        let table = reference_table();
        let topics = subscription_topics(&table, false);
        assert_eq!(topics.len(), table.len() * 2);
        assert!(topics.contains(&"led/config".to_string()));
        assert!(topics.contains(&"led/config/cmd".to_string()));
        assert!(topics.contains(&"proximity/config/cmd".to_string()));
        assert!(!topics.iter().any(|t| t.ends_with("/state")));
    }

    #[test]
    fn test_subscribe_all_uses_wildcard() {
        let table = reference_table();
        assert_eq!(subscription_topics(&table, true), vec!["#".to_string()]);
    }

    #[tokio::test]
    async fn test_refused_connection_fails_without_retry() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = local_config(port);
        let (_client, mut eventloop) = connect(&config);

        let err = wait_for_connack(&mut eventloop, &config.device_label(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind, IoErrorKind::Connection);
        assert_eq!(err.device, format!("mqtt://127.0.0.1:{}", port));
    }

    #[tokio::test]
    async fn test_silent_broker_times_out() {
        // Accepts TCP but never answers CONNECT
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = local_config(listener.local_addr().unwrap().port());
        let (_client, mut eventloop) = connect(&config);

        let err = wait_for_connack(&mut eventloop, &config.device_label(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.kind, IoErrorKind::Timeout);
        drop(listener);
    }
}
