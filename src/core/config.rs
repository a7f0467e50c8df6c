//! # Session configuration.
//!
//! Provides [`Config`], the settings a [`Session`](crate::Session) hands to its
//! registry, gate and scheduler.
//!
//! ## Sentinel values
//! - `delay = 0s` → no interval; every value is released
//! - `limit = 0s` → no first-value ceiling
//! - `debounce = 0s` → the default abort fires on the next tick

use std::time::Duration;

use crate::lifecycle::GateConfig;
use crate::registry::RegistryConfig;

/// Settings for one session.
///
/// ## Field semantics
/// - `warning`: report emits nobody awaited
/// - `delay`: scheduler release period (`0s` = release every value)
/// - `limit`: scheduler first-value ceiling (`0s` = none)
/// - `debounce`: gate delay before the default abort (`0s` = next tick)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct Config {
    /// Publish `TriggerUnclaimed` when an emit finds nobody awaiting.
    pub warning: bool,

    /// Minimum time between two releases.
    pub delay: Duration,

    /// Ceiling on the wait for the very first value.
    ///
    /// Hitting it yields a timeout so the consumer can show fallback content.
    pub limit: Duration,

    /// Delay between an unmount and the abort it schedules.
    pub debounce: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers lagging more than `bus_capacity` messages skip older items.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the first-value ceiling as an `Option`.
    #[inline]
    pub fn first_value_limit(&self) -> Option<Duration> {
        if self.limit.is_zero() {
            None
        } else {
            Some(self.limit)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            warning: self.warning,
        }
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            debounce: self.debounce,
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `warning = false`
    /// - `delay = 0s` (release every value)
    /// - `limit = 0s` (no first-value ceiling)
    /// - `debounce = 0s` (abort on the next tick)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            warning: false,
            delay: Duration::ZERO,
            limit: Duration::ZERO,
            debounce: Duration::ZERO,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_map_to_none() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.first_value_limit(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);

        let cfg = Config {
            limit: Duration::from_millis(300),
            debounce: Duration::from_millis(20),
            warning: true,
            ..Config::default()
        };
        assert_eq!(cfg.first_value_limit(), Some(Duration::from_millis(300)));
        assert!(cfg.registry_config().warning);
        assert_eq!(cfg.gate_config().debounce, Duration::from_millis(20));
    }
}
