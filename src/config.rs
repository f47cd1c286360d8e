use crate::dashboard::appliances::{default_catalogue, Appliance, ApplianceSpec};
use crate::error::{AppError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub mqtt: MqttConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub relay_url: String,
    pub reconnect_delay_ms: u64,
    pub heartbeat_secs: u64,
    pub appliances: Vec<Appliance>,
}

impl RelayConfig {
    /// Load the relay configuration from the process environment (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("MQTT_URL")
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AppError::Config("MQTT_URL must be set".to_string()))?;

        let config = RelayConfig {
            mqtt: MqttConfig {
                url,
                username: lookup("MQTT_USERNAME").filter(|u| !u.is_empty()),
                password: lookup("MQTT_PASSWORD"),
                keep_alive_secs: parse_or(&lookup, "MQTT_KEEP_ALIVE_SECS", 20)?,
                reconnect_delay_ms: parse_or(&lookup, "MQTT_RECONNECT_MS", 1000)?,
            },
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "PORT", 3000)?,
                max_connections: parse_or(&lookup, "MAX_CONNECTIONS", 1000)?,
                static_dir: lookup("STATIC_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("frontend")),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config("Server port cannot be 0".to_string()));
        }

        if self.server.max_connections == 0 {
            return Err(AppError::Config(
                "MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }

        if self.mqtt.keep_alive_secs == 0 {
            return Err(AppError::Config(
                "MQTT_KEEP_ALIVE_SECS must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

impl WatchConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let appliances = match lookup("APPLIANCES_PATH") {
            Some(path) => load_appliances(path)?,
            None => default_catalogue(),
        };

        let heartbeat_secs = parse_or(&lookup, "RELAY_HEARTBEAT_SECS", 25)?;
        if heartbeat_secs == 0 {
            return Err(AppError::Config(
                "RELAY_HEARTBEAT_SECS must be at least 1".to_string(),
            ));
        }

        Ok(WatchConfig {
            relay_url: lookup("RELAY_URL").unwrap_or_else(|| "ws://localhost:3000/ws".to_string()),
            reconnect_delay_ms: parse_or(&lookup, "RELAY_RECONNECT_MS", 1000)?,
            heartbeat_secs,
            appliances,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApplianceCatalogue {
    appliances: Vec<ApplianceSpec>,
}

/// Load an appliance catalogue from YAML, expanding `$(VAR)` placeholders first.
pub fn load_appliances<P: AsRef<Path>>(path: P) -> Result<Vec<Appliance>> {
    let content = std::fs::read_to_string(path)?;
    parse_appliances(&content)
}

pub fn parse_appliances(content: &str) -> Result<Vec<Appliance>> {
    let expanded = expand_env_vars(content);
    let catalogue: ApplianceCatalogue = serde_yaml::from_str(&expanded)?;

    catalogue
        .appliances
        .into_iter()
        .map(|spec| Appliance::try_from(spec).map_err(AppError::Config))
        .collect()
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid value for {}: {} ({})", key, raw, e))),
        None => Ok(default),
    }
}

/// Expand environment variables in the format $(VAR_NAME)
fn expand_env_vars(content: &str) -> String {
    let re = regex::Regex::new(r"\$\(([A-Z_][A-Z0-9_]*)\)").expect("placeholder pattern is valid");

    re.replace_all(content, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
