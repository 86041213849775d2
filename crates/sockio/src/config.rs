use std::time::Duration;

use engio::config::EngineIoConfig;

/// Configuration for Socket.IO and the underlying Engine.IO.
#[derive(Debug, Clone)]
pub struct SocketIoConfig {
    /// The inner Engine.IO config
    pub(crate) engine_config: EngineIoConfig,

    /// How long the server waits for an acknowledgement from the client.
    /// Defaults to 5 seconds.
    pub(crate) ack_timeout: Duration,
}

impl Default for SocketIoConfig {
    fn default() -> Self {
        Self {
            engine_config: EngineIoConfig::default(),
            ack_timeout: Duration::from_secs(5),
        }
    }
}
