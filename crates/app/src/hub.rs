//! The hub: one value owning every core component.
//!
//! There is no global instance: build a [`Hub`], hand references (or clones
//! of the component `Arc`s) to whatever needs them, and drop it when done.

use std::sync::Arc;
use std::time::Duration;

use homecore_domain::config::HubConfig;
use homecore_domain::error::HubError;
use homecore_domain::event::{EVENT_HUB_START, EVENT_HUB_STOP, EventData};

use crate::event_bus::EventBus;
use crate::service_registry::ServiceRegistry;
use crate::state_store::StateStore;
use crate::timer::Timer;
use crate::worker_pool::WorkerPool;

/// Runtime tuning of the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubOptions {
    /// Number of worker threads.
    pub workers: usize,
    /// Period of `time_changed` events.
    pub timer_interval: Duration,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            timer_interval: Duration::from_secs(1),
        }
    }
}

/// Event bus, state store, service registry, worker pool and timer of one
/// hub instance.
pub struct Hub {
    config: Arc<HubConfig>,
    bus: Arc<EventBus>,
    states: Arc<StateStore>,
    services: Arc<ServiceRegistry>,
    pool: Arc<WorkerPool>,
    timer: Timer,
}

impl Hub {
    /// Wire the components together. Nothing runs until [`start`](Self::start).
    #[must_use]
    pub fn new(config: HubConfig, options: &HubOptions) -> Self {
        let bus = Arc::new(EventBus::new());
        let pool = Arc::new(WorkerPool::new("hub", options.workers));
        Self {
            config: Arc::new(config),
            states: Arc::new(StateStore::new(Arc::clone(&bus))),
            services: Arc::new(ServiceRegistry::new(Arc::clone(&bus), Arc::clone(&pool))),
            timer: Timer::new(Arc::clone(&bus), options.timer_interval),
            bus,
            pool,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Arc<HubConfig> {
        &self.config
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    #[must_use]
    pub fn states(&self) -> &Arc<StateStore> {
        &self.states
    }

    #[must_use]
    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Start the workers and the timer, then fire `hub_start`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Spawn`] if a thread cannot be created.
    pub fn start(&self) -> Result<(), HubError> {
        self.pool.start()?;
        self.timer.start()?;
        tracing::info!(
            location = %self.config.location_name,
            workers = self.pool.workers(),
            "hub started"
        );
        self.bus.fire(EVENT_HUB_START, EventData::empty());
        Ok(())
    }

    /// Fire `hub_stop`, stop the timer, drain outstanding work and stop the
    /// workers.
    pub fn stop(&self) {
        self.bus.fire(EVENT_HUB_STOP, EventData::empty());
        self.timer.stop();
        self.pool.block_till_done();
        self.pool.stop();
        tracing::info!(stats = ?self.pool.stats(), "hub stopped");
    }

    /// Wait until the worker pool is quiescent.
    pub fn block_till_done(&self) {
        self.pool.block_till_done();
    }
}
