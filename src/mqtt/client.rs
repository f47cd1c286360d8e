use crate::config::MqttConfig;
use crate::error::{AppError, Result};
use rumqttc::Transport;
use std::time::Duration;
use uuid::Uuid;

// Re-export types so the rest of the code can use these names
pub type MqttOptions = rumqttc::MqttOptions;
pub type AsyncClient = rumqttc::AsyncClient;
pub type EventLoop = rumqttc::EventLoop;

/// Broker URL with a client id query appended, in the form `MqttOptions::parse_url` expects.
fn with_client_id(url: &str, client_id: &str) -> String {
    let url = url.trim();
    let url = if url.contains("://") {
        url.to_string()
    } else {
        format!("mqtt://{}", url)
    };
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}client_id={}", url, separator, client_id)
}

fn is_websocket(url: &str) -> bool {
    let scheme = url.trim().split("://").next().unwrap_or_default();
    scheme.eq_ignore_ascii_case("ws") || scheme.eq_ignore_ascii_case("wss")
}

pub fn build_options(config: &MqttConfig) -> Result<MqttOptions> {
    let client_id = format!("solar-relay-{}", Uuid::new_v4());
    let parsed = MqttOptions::parse_url(with_client_id(&config.url, &client_id)).map_err(|e| {
        AppError::Config(format!("Invalid MQTT_URL {}: {}", config.url, e))
    })?;

    // Websocket transports dial the full URL, not the bare host.
    let mut opts = if is_websocket(&config.url) {
        let (_, port) = parsed.broker_address();
        let mut ws = MqttOptions::new(client_id, config.url.trim(), port);
        let secure = config.url.trim().to_ascii_lowercase().starts_with("wss");
        ws.set_transport(if secure {
            Transport::wss_with_default_config()
        } else {
            Transport::Ws
        });
        ws
    } else {
        parsed
    };

    opts.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    opts.set_clean_session(true);

    if let Some(username) = &config.username {
        opts.set_credentials(username.clone(), config.password.clone().unwrap_or_default());
    }

    Ok(opts)
}

pub fn new(options: MqttOptions) -> (AsyncClient, EventLoop) {
    AsyncClient::new(options, 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mqtt_config(url: &str) -> MqttConfig {
        MqttConfig {
            url: url.to_string(),
            username: Some("meter".to_string()),
            password: None,
            keep_alive_secs: 20,
            reconnect_delay_ms: 1000,
        }
    }

    #[test]
    fn test_plain_mqtt_url() {
        let opts = build_options(&mqtt_config("mqtt://broker.local:1884")).unwrap();
        assert_eq!(opts.broker_address(), ("broker.local".to_string(), 1884));
        assert!(matches!(opts.transport(), Transport::Tcp));
    }

    #[test]
    fn test_default_ports_and_bare_host() {
        let opts = build_options(&mqtt_config("mqtt://broker")).unwrap();
        assert_eq!(opts.broker_address().1, 1883);

        let opts = build_options(&mqtt_config("mqtts://broker")).unwrap();
        assert_eq!(opts.broker_address().1, 8883);
        assert!(matches!(opts.transport(), Transport::Tls(_)));

        let opts = build_options(&mqtt_config("broker")).unwrap();
        assert_eq!(opts.broker_address(), ("broker".to_string(), 1883));
    }

    #[test]
    fn test_websocket_url_is_dialled_whole() {
        let opts = build_options(&mqtt_config("ws://broker:9001/mqtt")).unwrap();
        assert_eq!(opts.broker_address().0, "ws://broker:9001/mqtt");
        assert!(matches!(opts.transport(), Transport::Ws));

        let opts = build_options(&mqtt_config("wss://broker/mqtt")).unwrap();
        assert_eq!(opts.broker_address().0, "wss://broker/mqtt");
        assert!(matches!(opts.transport(), Transport::Wss(_)));
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(build_options(&mqtt_config("http://broker")).is_err());
        assert!(build_options(&mqtt_config("mqtt://broker:notaport")).is_err());
        // IPv6 hosts must be bracketed
        assert!(build_options(&mqtt_config("mqtt://::1:1883")).is_err());
    }

    #[test]
    fn test_build_options() {
        let opts = build_options(&mqtt_config("mqtt://broker:1883")).unwrap();
        assert_eq!(opts.broker_address(), ("broker".to_string(), 1883));
        assert_eq!(opts.keep_alive(), Duration::from_secs(20));
        assert!(opts.client_id().starts_with("solar-relay-"));
        assert!(opts.credentials().is_some());
    }
}
