use crate::logging::Facade;

use log::Log;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

const DISCOVER_IP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const DISCOVER_PORT: u16 = 3702;
const DEVICE_SERVICE_PATH: &str = "/onvif/device_service";

/// Knobs shared by discovery and device sessions.
#[derive(Clone)]
pub struct Config {
    /// Per request timeout on the HTTP client
    pub http_timeout: Duration,
    /// How long discovery collects probe matches
    pub probe_window: Duration,
    /// Number of times the probe is multicast, replies are deduplicated
    pub probe_sends: u32,
    pub multicast_addr: SocketAddrV4,
    /// Path of the bootstrap device service
    pub device_service_path: String,
    pub logger: Arc<dyn Log>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            http_timeout: Duration::from_secs(10),
            probe_window: Duration::from_secs(2),
            probe_sends: 2,
            multicast_addr: SocketAddrV4::new(DISCOVER_IP, DISCOVER_PORT),
            device_service_path: DEVICE_SERVICE_PATH.to_string(),
            logger: Facade::shared(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("http_timeout", &self.http_timeout)
            .field("probe_window", &self.probe_window)
            .field("probe_sends", &self.probe_sends)
            .field("multicast_addr", &self.multicast_addr)
            .field("device_service_path", &self.device_service_path)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Defaults overlaid with `ONVIF_HTTP_TIMEOUT_MS` and `ONVIF_PROBE_WINDOW_MS`.
    /// Values that don't parse as milliseconds are ignored.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Some(ms) = env_millis("ONVIF_HTTP_TIMEOUT_MS") {
            config.http_timeout = ms;
        }
        if let Some(ms) = env_millis("ONVIF_PROBE_WINDOW_MS") {
            config.probe_window = ms;
        }

        config
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_probe_window(mut self, window: Duration) -> Self {
        self.probe_window = window;
        self
    }

    pub fn with_probe_sends(mut self, sends: u32) -> Self {
        self.probe_sends = sends.max(1);
        self
    }

    pub fn with_multicast_addr(mut self, addr: SocketAddrV4) -> Self {
        self.multicast_addr = addr;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Log>) -> Self {
        self.logger = logger;
        self
    }

    /// `http://<address><device_service_path>`
    pub fn device_service_url(&self, address: &str) -> String {
        format!("http://{}{}", address, self.device_service_path)
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}
