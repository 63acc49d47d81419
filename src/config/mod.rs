// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Routing core configuration: the options enumerated in spec §9, expressed
//! as typed config assembled from nested `serde::Deserialize` structs per
//! concern, the way the teacher's `config/` directory is laid out.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, ErrorKind, Result};

mod acl;
mod retained;
mod routing;
mod session;
mod shared_subscription;

pub use acl::AclCacheConfig;
pub use retained::{RetainedConfig, RetainedStorage};
pub use routing::RoutingConfig;
pub use session::{OverflowPolicy, SessionConfig};
pub use shared_subscription::{SharedSubscriptionConfig, SharedSubscriptionPolicy};

pub use crate::route::LockMode;

/// Top-level config for the routing core (spec §9).
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub shared_subscription: SharedSubscriptionConfig,

    #[serde(default)]
    pub acl: AclCacheConfig,

    #[serde(default)]
    pub retained: RetainedConfig,
}

impl Config {
    /// Loads and validates config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::Io` if the file cannot be read, `ErrorKind::Config`
    /// if the TOML is malformed or fails `validate()`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects impossible combinations: zero worker pool, zero queue depth,
    /// or a negative/zero ACL TTL where staleness bounding was requested.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.routing.worker_pool_size == 0 {
            return Err(Error::new(
                ErrorKind::Config,
                "routing.worker_pool_size must be positive",
            ));
        }
        if self.session.queue_max == 0 {
            return Err(Error::new(
                ErrorKind::Config,
                "session.queue.max must be positive",
            ));
        }
        if self.acl.max_size == 0 {
            return Err(Error::new(
                ErrorKind::Config,
                "acl.cache.max_size must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_worker_pool_rejected() {
        let mut config = Config::default();
        config.routing.worker_pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_full_toml() {
        let toml = r#"
            [routing]
            lock_mode = "tab"
            worker_pool_size = 16

            [session]
            queue_max = 500
            queue_overflow = "drop_oldest"
            expiry_default_secs = 7200

            [shared_subscription]
            policy = "hash_clientid"

            [acl]
            max_size = 256
            ttl_secs = 60

            [retained]
            storage = "durable"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.routing.worker_pool_size, 16);
        assert_eq!(config.routing.lock_mode, LockMode::Tab);
        assert_eq!(config.session.queue_max, 500);
        assert!(matches!(
            config.shared_subscription.policy,
            SharedSubscriptionPolicy::HashClientId
        ));
        assert_eq!(config.acl.ttl_secs, Some(60));
        assert!(matches!(config.retained.storage, RetainedStorage::Durable));
    }
}
