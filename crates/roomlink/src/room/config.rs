use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::{
    DEFAULT_LATENCY_WINDOW, DEFAULT_MAX_ACCUMULATION_MS, DEFAULT_PING_DELAY_MS, DEFAULT_TICK_RATE,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Generated when not set.
    pub room_id: Option<String>,
    /// Ticks per second; 0 disables the tick loop.
    pub tick_rate: u32,
    pub max_accumulation_ms: u64,
    /// `None` means unbounded.
    pub max_clients: Option<usize>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            room_id: None,
            tick_rate: DEFAULT_TICK_RATE,
            max_accumulation_ms: DEFAULT_MAX_ACCUMULATION_MS,
            max_clients: None,
        }
    }
}

impl RoomConfig {
    pub fn max_accumulation(&self) -> Duration {
        Duration::from_millis(self.max_accumulation_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Sent in the init frame and handed to the server's auth hook.
    pub credential: String,
    /// Delay between a ping reply and the next ping; 0 stops the cycle after
    /// the first round trip.
    pub ping_delay_ms: u64,
    pub latency_window: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            credential: String::new(),
            ping_delay_ms: DEFAULT_PING_DELAY_MS,
            latency_window: DEFAULT_LATENCY_WINDOW,
        }
    }
}

impl ClientConfig {
    pub fn ping_delay(&self) -> Option<Duration> {
        (self.ping_delay_ms > 0).then(|| Duration::from_millis(self.ping_delay_ms))
    }
}
