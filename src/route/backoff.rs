// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Bounded exponential backoff for retrying a conflicting KV transaction
//! (spec §4.4, §7: "retry with bounded backoff; after N retries, surface to
//! caller as `RouteUnavailable`").

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    attempt: u32,
    max_attempts: u32,
    base: Duration,
    cap: Duration,
}

impl Backoff {
    #[must_use]
    pub const fn new(max_attempts: u32, base: Duration, cap: Duration) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            base,
            cap,
        }
    }

    /// Returns the delay for the next retry, or `None` once `max_attempts`
    /// has been exhausted (the caller should surface `RouteUnavailable`).
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let exp = 2u32.saturating_pow(self.attempt).min(u32::MAX / 2);
        let delay = self.base.saturating_mul(exp).min(self.cap);
        self.attempt += 1;
        Some(delay)
    }

    #[must_use]
    pub const fn attempts_made(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub const fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_after_max_attempts() {
        let mut backoff = Backoff::new(3, Duration::from_millis(10), Duration::from_secs(1));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert!(backoff.exhausted());
    }

    #[test]
    fn delay_is_capped() {
        let mut backoff = Backoff::new(10, Duration::from_millis(100), Duration::from_millis(250));
        let mut last = Duration::ZERO;
        while let Some(delay) = backoff.next_delay() {
            assert!(delay <= Duration::from_millis(250));
            last = delay;
        }
        assert_eq!(last, Duration::from_millis(250));
    }
}
