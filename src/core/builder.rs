use std::sync::Arc;

use crate::{
    core::Config,
    events::Bus,
    lifecycle::LifecycleGate,
    registry::{Registry, Value},
    subscribers::{Subscribe, SubscriberSet},
};

use super::session::Session;

/// Builder for a [`Session`].
pub struct SessionBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SessionBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive registry, scheduler and lifecycle events through
    /// dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the session: one bus, one gate, one registry observing the gate's token.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build<T: Value>(self) -> Session<T> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));

        let gate = LifecycleGate::with_bus(self.cfg.gate_config(), bus.clone());
        let registry = Registry::with_bus(self.cfg.registry_config(), gate.token(), bus.clone());

        Session::new_internal(self.cfg, bus, subs, gate, registry)
    }
}
