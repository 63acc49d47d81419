// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Ordered hook chain (spec §4.9): callbacks keyed by hookpoint, invoked at
//! lifecycle points, with fold semantics allowing mutation. `HookOutcome<T>`
//! makes the three outcomes described in the spec (`ok`, `{ok, value'}`,
//! `stop`) an exhaustively matched enum rather than a stringly-typed result.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;

/// Named extension points a callback may register against (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hookpoint {
    ClientConnect,
    ClientAuthenticate,
    ClientCheckAcl,
    MessagePublish,
    SessionSubscribed,
}

/// The outcome of one hook callback folded over an accumulator of type `T`.
#[derive(Debug)]
pub enum HookOutcome<T> {
    /// Continue the chain, accumulator unchanged.
    Ok,
    /// Continue the chain with a replaced accumulator.
    OkWith(T),
    /// Short-circuit: no further callback in the chain runs.
    Stop,
}

/// A registered callback (spec §4.9): `(hookpoint, target, filter, priority)`.
/// `target` identifies the plugin/module that registered it, for admin
/// introspection and error attribution; it plays no role in ordering or
/// matching.
#[async_trait]
pub trait Hook<T>: Send + Sync {
    fn target(&self) -> &str;

    /// Optional filter restricting which invocations this callback sees
    /// (e.g. a topic prefix for `message.publish`). `None` matches every
    /// invocation at this hookpoint.
    fn filter(&self) -> Option<&str> {
        None
    }

    async fn call(&self, value: &T) -> HookOutcome<T>;
}

struct Registration<T> {
    hookpoint: Hookpoint,
    priority: i32,
    hook: Arc<dyn Hook<T>>,
}

/// An ordered chain of callbacks for a single accumulator type `T`, keyed by
/// hookpoint. Lower `priority` runs earlier (spec §4.9).
pub struct HookChain<T> {
    registrations: Vec<Registration<T>>,
}

impl<T> Default for HookChain<T> {
    fn default() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }
}

impl<T> std::fmt::Debug for HookChain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("registered", &self.registrations.len())
            .finish()
    }
}

impl<T> HookChain<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback at `hookpoint` with the given `priority`
    /// (lower runs earlier); ties are broken by registration order, which
    /// keeps the chain deterministic without requiring callers to pick
    /// globally unique priorities.
    pub fn register(&mut self, hookpoint: Hookpoint, priority: i32, hook: Arc<dyn Hook<T>>) {
        self.registrations.push(Registration {
            hookpoint,
            priority,
            hook,
        });
        self.registrations
            .sort_by(|a, b| a.priority.cmp(&b.priority).then(Ordering::Equal));
    }

    pub fn unregister(&mut self, hookpoint: Hookpoint, target: &str) {
        self.registrations
            .retain(|r| !(r.hookpoint == hookpoint && r.hook.target() == target));
    }

    /// Invokes every callback registered at `hookpoint`, in priority order,
    /// threading `value` through the fold. A `Stop` short-circuits; a
    /// backend failure is isolated to the current packet per spec §7's
    /// propagation policy and is the caller's responsibility to interpret
    /// (auth-path callers fail closed, observability callers fail open).
    pub async fn run(&self, hookpoint: Hookpoint, topic: Option<&str>, mut value: T) -> (T, bool) {
        for reg in self
            .registrations
            .iter()
            .filter(|r| r.hookpoint == hookpoint)
        {
            if let Some(restrict) = reg.hook.filter() {
                if topic.is_some_and(|t| t != restrict) {
                    continue;
                }
            }
            match reg.hook.call(&value).await {
                HookOutcome::Ok => {}
                HookOutcome::OkWith(next) => value = next,
                HookOutcome::Stop => return (value, true),
            }
        }
        (value, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DoubleHook;

    #[async_trait]
    impl Hook<i32> for DoubleHook {
        fn target(&self) -> &str {
            "double"
        }

        async fn call(&self, value: &i32) -> HookOutcome<i32> {
            HookOutcome::OkWith(value * 2)
        }
    }

    struct StopHook;

    #[async_trait]
    impl Hook<i32> for StopHook {
        fn target(&self) -> &str {
            "stop"
        }

        async fn call(&self, _value: &i32) -> HookOutcome<i32> {
            HookOutcome::Stop
        }
    }

    #[tokio::test]
    async fn lower_priority_runs_first_and_folds() {
        let mut chain: HookChain<i32> = HookChain::new();
        chain.register(Hookpoint::MessagePublish, 10, Arc::new(DoubleHook));
        chain.register(Hookpoint::MessagePublish, 5, Arc::new(DoubleHook));
        let (value, stopped) = chain.run(Hookpoint::MessagePublish, None, 1).await;
        assert_eq!(value, 4);
        assert!(!stopped);
    }

    #[tokio::test]
    async fn stop_short_circuits_chain() {
        let mut chain: HookChain<i32> = HookChain::new();
        chain.register(Hookpoint::ClientAuthenticate, 0, Arc::new(StopHook));
        chain.register(Hookpoint::ClientAuthenticate, 1, Arc::new(DoubleHook));
        let (value, stopped) = chain.run(Hookpoint::ClientAuthenticate, None, 7).await;
        assert_eq!(value, 7);
        assert!(stopped);
    }

    #[tokio::test]
    async fn unregister_removes_by_target() {
        let mut chain: HookChain<i32> = HookChain::new();
        chain.register(Hookpoint::MessagePublish, 0, Arc::new(DoubleHook));
        chain.unregister(Hookpoint::MessagePublish, "double");
        let (value, _) = chain.run(Hookpoint::MessagePublish, None, 5).await;
        assert_eq!(value, 5);
    }
}
