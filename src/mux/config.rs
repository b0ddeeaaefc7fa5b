//! Adapter configuration

use super::{Error, Result};
use crate::http::Version;
use std::time::Duration;

/// Default idle deadline for blocking body reads
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(30);

/// Default response accumulation capacity (one default-sized frame)
pub const DEFAULT_RESPONSE_BUFFER_SIZE: usize = 16384;

/// Settings shared by every stream adapter of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Deadline for a worker blocked waiting for body bytes
    pub max_idle: Duration,
    /// Bytes the response generator accumulates before flushing on its own
    pub response_buffer_size: usize,
    /// Value of the `version` field in reply frames
    pub reply_version: Version,
    /// Derive a `host` field from absolute request targets
    pub synthesize_host: bool,
}

impl AdapterConfig {
    pub fn builder() -> AdapterConfigBuilder {
        AdapterConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_idle.is_zero() {
            return Err(Error::InvalidConfig("max_idle must be non-zero".to_string()));
        }
        if self.response_buffer_size == 0 {
            return Err(Error::InvalidConfig(
                "response_buffer_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfig {
            max_idle: DEFAULT_MAX_IDLE,
            response_buffer_size: DEFAULT_RESPONSE_BUFFER_SIZE,
            reply_version: Version::Http11,
            synthesize_host: true,
        }
    }
}

/// Builder for [`AdapterConfig`]
pub struct AdapterConfigBuilder {
    config: AdapterConfig,
}

impl AdapterConfigBuilder {
    pub fn new() -> Self {
        AdapterConfigBuilder {
            config: AdapterConfig::default(),
        }
    }

    pub fn max_idle(mut self, max_idle: Duration) -> Self {
        self.config.max_idle = max_idle;
        self
    }

    pub fn response_buffer_size(mut self, size: usize) -> Self {
        self.config.response_buffer_size = size;
        self
    }

    pub fn reply_version(mut self, version: Version) -> Self {
        self.config.reply_version = version;
        self
    }

    pub fn synthesize_host(mut self, enable: bool) -> Self {
        self.config.synthesize_host = enable;
        self
    }

    /// Build and validate
    pub fn build(self) -> Result<AdapterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for AdapterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
