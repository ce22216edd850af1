use std::net::SocketAddr;

/// Push channel settings.
///
/// The aggregator runs a STOMP broker; `url` must point at its raw WebSocket
/// endpoint (for a SockJS-enabled `/ws` mount that is `/ws/websocket`).
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: String,
    /// Destination carrying JSON arrays of job records
    pub jobs_topic: String,
    /// Destination carrying scanner progress text
    pub status_topic: String,
    /// Pause between reconnect attempts after the link drops
    pub reconnect_delay_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws/websocket".to_string(),
            jobs_topic: "/topic/jobs".to_string(),
            status_topic: "/topic/status".to_string(),
            reconnect_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Base URL of the aggregator's REST API
    pub backend_url: String,
    pub request_timeout_ms: u64,
    pub channel: ChannelConfig,
    /// Where to serve the JSON dashboard, if at all
    pub dashboard_addr: Option<SocketAddr>,
    /// Capacity of the session's event queues
    pub event_buffer: usize,
    /// Program used to open posting urls; `None` only logs them
    pub open_command: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_ms: 30_000,
            channel: ChannelConfig::default(),
            dashboard_addr: None,
            event_buffer: 256,
            open_command: Some(default_open_command().to_string()),
        }
    }
}

impl FeedConfig {
    pub fn new(backend_url: &str) -> Self {
        Self {
            backend_url: backend_url.to_string(),
            ..Default::default()
        }
    }

    pub fn with_channel_url(mut self, url: &str) -> Self {
        self.channel.url = url.to_string();
        self
    }

    pub fn with_dashboard(mut self, addr: SocketAddr) -> Self {
        self.dashboard_addr = Some(addr);
        self
    }

    pub fn with_open_command(mut self, command: Option<String>) -> Self {
        self.open_command = command;
        self
    }

    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.channel.reconnect_delay_ms = delay_ms;
        self
    }
}

fn default_open_command() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    }
}
