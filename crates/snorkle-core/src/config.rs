//! Configuration for the Snorkle bridge
//!
//! Each concern has its own struct with a `Default` and a few presets;
//! `SnorkleConfig` bundles them and validates the combination.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::chain::ChainEndpoint;

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the frame channels between bridge and executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for request frames (bridge → executor)
    pub request_buffer_size: usize,
    /// Buffer size for response frames (executor → bridge)
    pub response_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            request_buffer_size: 64,
            response_buffer_size: 128,
        }
    }
}

impl ChannelConfig {
    /// Create configuration for low-memory environments
    pub fn low_memory() -> Self {
        Self {
            request_buffer_size: 8,
            response_buffer_size: 16,
        }
    }

    /// Create configuration for many concurrent callers
    pub fn high_throughput() -> Self {
        Self {
            request_buffer_size: 512,
            response_buffer_size: 512,
        }
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            request_buffer_size: 32,
            response_buffer_size: 32,
        }
    }
}

// ----------------------------------------------------------------------------
// Executor Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Requests held while the SDK initializes; overflow is rejected
    pub pre_ready_buffer: usize,
    /// Handlers polled concurrently
    pub max_in_flight: usize,
    /// Requests held in arrival order while every handler slot is busy;
    /// overflow is rejected as overloaded
    pub max_queued: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            pre_ready_buffer: 64,
            max_in_flight: 16,
            max_queued: 256,
        }
    }
}

impl ExecutorConfig {
    pub fn low_memory() -> Self {
        Self {
            pre_ready_buffer: 8,
            max_in_flight: 2,
            max_queued: 16,
        }
    }

    pub fn high_throughput() -> Self {
        Self {
            pre_ready_buffer: 256,
            max_in_flight: 64,
            max_queued: 1024,
        }
    }

    pub fn testing() -> Self {
        Self {
            pre_ready_buffer: 4,
            max_in_flight: 8,
            max_queued: 32,
        }
    }
}

// ----------------------------------------------------------------------------
// Bridge Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Timeout applied by `ClientBridge::call`; `None` waits indefinitely
    pub default_timeout: Option<Duration>,
    /// How long `wait_ready` waits for the executor to come up
    pub ready_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_timeout: None,
            ready_timeout: Duration::from_secs(120),
        }
    }
}

impl BridgeConfig {
    pub fn testing() -> Self {
        Self {
            default_timeout: Some(Duration::from_secs(5)),
            ready_timeout: Duration::from_secs(5),
        }
    }
}

// ----------------------------------------------------------------------------
// Network Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Endpoint used when a request carries no override
    pub endpoint: ChainEndpoint,
    /// Timeout for a single REST request
    pub request_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoint: ChainEndpoint::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

// ----------------------------------------------------------------------------
// Master Configuration
// ----------------------------------------------------------------------------

/// All bridge settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SnorkleConfig {
    pub channels: ChannelConfig,
    pub executor: ExecutorConfig,
    pub bridge: BridgeConfig,
    pub network: NetworkConfig,
}

impl SnorkleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small buffers and few concurrent handlers
    pub fn low_memory() -> Self {
        Self {
            channels: ChannelConfig::low_memory(),
            executor: ExecutorConfig::low_memory(),
            ..Self::default()
        }
    }

    /// Large buffers for many concurrent callers
    pub fn high_throughput() -> Self {
        Self {
            channels: ChannelConfig::high_throughput(),
            executor: ExecutorConfig::high_throughput(),
            ..Self::default()
        }
    }

    /// Short timeouts and a small pre-ready buffer so overflow is easy to reach
    pub fn testing() -> Self {
        Self {
            channels: ChannelConfig::testing(),
            executor: ExecutorConfig::testing(),
            bridge: BridgeConfig::testing(),
            network: NetworkConfig {
                endpoint: ChainEndpoint::devnet(Default::default()),
                request_timeout: Duration::from_secs(2),
            },
        }
    }

    pub fn with_channels(mut self, channels: ChannelConfig) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.bridge.default_timeout = timeout;
        self
    }

    pub fn with_endpoint(mut self, endpoint: ChainEndpoint) -> Self {
        self.network.endpoint = endpoint;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.channels.request_buffer_size == 0 {
            return Err("Request buffer size cannot be zero".into());
        }
        if self.channels.response_buffer_size == 0 {
            return Err("Response buffer size cannot be zero".into());
        }
        if self.executor.max_in_flight == 0 {
            return Err("Max in-flight operations cannot be zero".into());
        }
        if self.bridge.default_timeout == Some(Duration::ZERO) {
            return Err("Default call timeout cannot be zero".into());
        }
        if self.bridge.ready_timeout.is_zero() {
            return Err("Ready timeout cannot be zero".into());
        }
        if self.network.request_timeout.is_zero() {
            return Err("Network request timeout cannot be zero".into());
        }
        ChainEndpoint::new(self.network.endpoint.base_url.clone(), self.network.endpoint.network)
            .map_err(|e| e.to_string())?;

        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(SnorkleConfig::default().validate().is_ok());
        assert!(SnorkleConfig::low_memory().validate().is_ok());
        assert!(SnorkleConfig::high_throughput().validate().is_ok());
        assert!(SnorkleConfig::testing().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = SnorkleConfig::default();
        config.channels.request_buffer_size = 0;
        assert!(config.validate().is_err());

        let config = SnorkleConfig::default().with_default_timeout(Some(Duration::ZERO));
        assert!(config.validate().is_err());

        let mut config = SnorkleConfig::default();
        config.executor.max_in_flight = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_endpoint() {
        let mut config = SnorkleConfig::default();
        config.network.endpoint.base_url = "localhost:3030".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_waits_forever() {
        assert_eq!(SnorkleConfig::default().bridge.default_timeout, None);
    }
}
