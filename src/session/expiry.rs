// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Session expiry as a first-class type (SPEC_FULL §3): spec.md §3 mentions
//! an expiry deadline field; this converts `session.expiry.default` plus a
//! disconnect timestamp into a concrete reap time, applied identically
//! whether the disconnect was clean or not.

use std::time::{Duration, Instant};

/// Either "never reaps while disconnected" (an infinite non-clean session
/// would only be reaped by an administrative purge, which this type does
/// not model) or a concrete instant.
#[derive(Debug, Clone, Copy)]
pub enum ExpiryDeadline {
    /// `clean_start=true`: reaped immediately on disconnect (spec §4.6).
    Immediate,
    /// Non-clean session: reaped `duration` after `disconnected_at`.
    At { disconnected_at: Instant, duration: Duration },
}

impl ExpiryDeadline {
    #[must_use]
    pub fn for_disconnect(clean_start: bool, default_expiry: Duration, requested: Option<u32>) -> Self {
        if clean_start {
            return Self::Immediate;
        }
        let duration = requested
            .map(|secs| Duration::from_secs(u64::from(secs)))
            .unwrap_or(default_expiry);
        Self::At {
            disconnected_at: Instant::now(),
            duration,
        }
    }

    #[must_use]
    pub fn has_elapsed(&self) -> bool {
        match self {
            Self::Immediate => true,
            Self::At {
                disconnected_at,
                duration,
            } => disconnected_at.elapsed() >= *duration,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        match self {
            Self::Immediate => Duration::ZERO,
            Self::At {
                disconnected_at,
                duration,
            } => duration.saturating_sub(disconnected_at.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_start_expires_immediately() {
        let deadline = ExpiryDeadline::for_disconnect(true, Duration::from_secs(3600), None);
        assert!(deadline.has_elapsed());
    }

    #[test]
    fn non_clean_session_waits_for_duration() {
        let deadline = ExpiryDeadline::for_disconnect(false, Duration::from_secs(3600), None);
        assert!(!deadline.has_elapsed());
        assert!(deadline.remaining() <= Duration::from_secs(3600));
    }

    #[test]
    fn requested_expiry_overrides_default() {
        let deadline = ExpiryDeadline::for_disconnect(false, Duration::from_secs(3600), Some(0));
        assert!(deadline.has_elapsed());
    }
}
