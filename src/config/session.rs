// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;

/// `session.queue.overflow` policy (spec §4.6, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    DropNewest,
    DropOldest,
    Disconnect,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self::DropNewest
    }
}

/// `session.*` config (spec §9): per-session backpressure threshold,
/// overflow policy, and the non-clean session retention window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_queue_max")]
    pub queue_max: usize,

    #[serde(default)]
    pub queue_overflow: OverflowPolicy,

    #[serde(default = "SessionConfig::default_expiry_default_secs")]
    pub expiry_default_secs: u64,

    #[serde(default = "SessionConfig::default_high_watermark")]
    pub high_watermark: usize,

    #[serde(default = "SessionConfig::default_retry_max")]
    pub retry_max: u32,
}

impl SessionConfig {
    #[must_use]
    pub const fn default_queue_max() -> usize {
        1000
    }

    #[must_use]
    pub const fn default_expiry_default_secs() -> u64 {
        3600
    }

    #[must_use]
    pub const fn default_high_watermark() -> usize {
        800
    }

    #[must_use]
    pub const fn default_retry_max() -> u32 {
        5
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_max: Self::default_queue_max(),
            queue_overflow: OverflowPolicy::default(),
            expiry_default_secs: Self::default_expiry_default_secs(),
            high_watermark: Self::default_high_watermark(),
            retry_max: Self::default_retry_max(),
        }
    }
}
