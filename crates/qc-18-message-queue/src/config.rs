//! Configuration for the outbound message queue

use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::domain::MessageCode;
use crate::error::ConfigError;
use crate::ports::QueuePolicy;

/// Default ceiling for each outbound queue
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 4096;

/// Default scheduler period in milliseconds
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1;

/// Default bound on the disconnect flush, in milliseconds
pub const DEFAULT_DISCONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default size of the shared scheduler pool
pub const DEFAULT_SCHEDULER_WORKERS: usize = 2;

/// Runtime configuration for peer message queues
///
/// ```toml
/// max_queue_size = 4096
/// prioritized_messages = ["BFT_NEW_HEIGHT", "BFT_NEW_VIEW", "BFT_PROPOSAL", "BFT_VOTE"]
/// tick_interval_ms = 1
/// disconnect_timeout_ms = 10000
/// scheduler_workers = 2
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MessageQueueConfig {
    /// Maximum length of each of the three queues
    pub max_queue_size: usize,

    /// Fire-and-forget message codes sent ahead of normal traffic
    pub prioritized_messages: HashSet<MessageCode>,

    /// Scheduler tick period (ms), applied by [`TickScheduler::from_config`]
    /// and [`TickScheduler::init_shared`]
    ///
    /// [`TickScheduler::from_config`]: crate::TickScheduler::from_config
    /// [`TickScheduler::init_shared`]: crate::TickScheduler::init_shared
    pub tick_interval_ms: u64,

    /// How long a disconnect waits for the reason code to flush (ms)
    pub disconnect_timeout_ms: u64,

    /// Worker threads of a scheduler built from this config
    pub scheduler_workers: usize,
}

impl Default for MessageQueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            prioritized_messages: [
                MessageCode::BftNewHeight,
                MessageCode::BftNewView,
                MessageCode::BftProposal,
                MessageCode::BftVote,
            ]
            .into_iter()
            .collect(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            disconnect_timeout_ms: DEFAULT_DISCONNECT_TIMEOUT_MS,
            scheduler_workers: DEFAULT_SCHEDULER_WORKERS,
        }
    }
}

impl MessageQueueConfig {
    /// Small queues and a short flush timeout for tests.
    pub fn for_testing() -> Self {
        Self {
            max_queue_size: 16,
            disconnect_timeout_ms: 100,
            ..Default::default()
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_size == 0 {
            return Err(ConfigError::Invalid(
                "max_queue_size must be at least 1".into(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be at least 1".into(),
            ));
        }
        if self.scheduler_workers == 0 {
            return Err(ConfigError::Invalid(
                "scheduler_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }

    /// Builder method: set the queue ceiling.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Builder method: replace the prioritized codes.
    pub fn with_prioritized<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = MessageCode>,
    {
        self.prioritized_messages = codes.into_iter().collect();
        self
    }
}

impl QueuePolicy for MessageQueueConfig {
    fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    fn is_prioritized(&self, code: MessageCode) -> bool {
        self.prioritized_messages.contains(&code)
    }
}
