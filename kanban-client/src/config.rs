/// Client configuration shared by the REST client and the push-update
/// listener.
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// REST base URL, e.g. `http://localhost:8080/api`.
    pub base_url: String,
    /// WebSocket base URL, e.g. `ws://localhost:8080/api/ws`.
    pub ws_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Fixed delay before reconnecting a dropped push channel.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Outgoing heartbeat interval on the push channel.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_heartbeat_interval_ms() -> u64 {
    4000
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ws_url: ws_url.into(),
            auth_token: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}
