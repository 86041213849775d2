use std::time::Duration;

/// Environment keys read once by [`EngineIoConfig::from_env`].
pub const ENV_PING_INTERVAL: &str = "SIO_ENGINEIO_PING_INTERVAL_MS";
pub const ENV_PING_TIMEOUT: &str = "SIO_ENGINEIO_PING_TIMEOUT_MS";
pub const ENV_MAX_PAYLOAD: &str = "SIO_ENGINEIO_MAX_PAYLOAD_BYTES";

/// Global Engine.IO configuration.
///
/// It is built once at engine start and handed by value to every component,
/// nothing re-reads it afterwards.
#[derive(Debug, Clone)]
pub struct EngineIoConfig {
    /// The path to listen for engine.io requests on.
    /// Defaults to "/socket.io".
    pub req_path: String,

    /// The interval at which the server will send a ping packet to the client.
    /// Defaults to 25 seconds.
    pub ping_interval: Duration,

    /// The amount of time the server will wait for a pong from the client
    /// after a ping before closing the connection.
    /// Defaults to 20 seconds.
    pub ping_timeout: Duration,

    /// The maximum number of packets that can be buffered per session before
    /// `emit()` returns an error.
    /// Defaults to 128 packets.
    pub max_buffer_size: usize,

    /// The maximum number of bytes per polling payload, for both directions.
    /// Defaults to 1MB.
    pub max_payload: u64,
}

impl Default for EngineIoConfig {
    fn default() -> Self {
        Self {
            req_path: "/socket.io".to_string(),
            ping_interval: Duration::from_millis(25000),
            ping_timeout: Duration::from_millis(20000),
            max_buffer_size: 128,
            max_payload: 1e6 as u64,
        }
    }
}

impl EngineIoConfig {
    pub fn builder() -> EngineIoConfigBuilder {
        EngineIoConfigBuilder::new()
    }

    /// Build a config from the `SIO_ENGINEIO_*` environment variables,
    /// falling back to the defaults for missing or unparsable values.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_u64(ENV_PING_INTERVAL) {
            config.ping_interval = Duration::from_millis(v);
        }
        if let Some(v) = env_u64(ENV_PING_TIMEOUT) {
            config.ping_timeout = Duration::from_millis(v);
        }
        if let Some(v) = env_u64(ENV_MAX_PAYLOAD) {
            config.max_payload = v;
        }
        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

pub struct EngineIoConfigBuilder {
    config: EngineIoConfig,
}

impl EngineIoConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineIoConfig::from_env(),
        }
    }

    /// The path to listen for engine.io requests on.
    pub fn req_path(mut self, req_path: String) -> Self {
        self.config.req_path = req_path;
        self
    }

    /// The interval at which the server will send a ping packet to the client.
    pub fn ping_interval(mut self, ping_interval: Duration) -> Self {
        self.config.ping_interval = ping_interval;
        self
    }

    /// The grace period for a pong after a ping before closing the connection.
    pub fn ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.config.ping_timeout = ping_timeout;
        self
    }

    /// The maximum number of packets buffered per session.
    pub fn max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.config.max_buffer_size = max_buffer_size;
        self
    }

    /// The maximum number of bytes per polling payload.
    pub fn max_payload(mut self, max_payload: u64) -> Self {
        self.config.max_payload = max_payload;
        self
    }

    pub fn build(self) -> EngineIoConfig {
        self.config
    }
}

impl Default for EngineIoConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
