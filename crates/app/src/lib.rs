//! # homecore-app
//!
//! Hub runtime core: in-process coordination of states, events, services
//! and background work.
//!
//! ## Responsibilities
//! - `EventBus`: synchronous publish/subscribe keyed by event type
//! - `StateStore`: canonical entity states; every effective write fires `state_changed`
//! - `ServiceRegistry`: `domain.service` handlers, fire-and-forget or blocking calls
//! - `WorkerPool`: priority-ordered background jobs with per-job failure isolation
//! - `Timer`: periodic `time_changed` events
//! - `Hub`: owns one instance of each and drives their lifecycle
//! - Define the **`Integration` port** adapters implement
//!
//! ## Concurrency
//! Bus dispatch, state writes and registry lookups run on the caller's
//! thread. Only the worker pool and the timer own threads. No component
//! holds its lock while calling out to listeners, handlers or jobs.
//!
//! ## Dependency rule
//! Depends on `homecore-domain` only (plus `parking_lot` for locks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod hub;
pub mod ports;
pub mod service_registry;
pub mod state_store;
pub mod timer;
pub mod tracking;
pub mod worker_pool;
