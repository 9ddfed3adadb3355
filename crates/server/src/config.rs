use roomlink::RoomConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub room: RoomConfig,
    /// Clients must present this credential when set.
    pub password: Option<String>,
    /// Broadcast a heartbeat every this many ticks; 0 disables it.
    pub heartbeat_ticks: u64,
    pub welcome: String,
}
