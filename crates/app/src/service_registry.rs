//! Service registry: routes `domain.service` calls to their handlers.
//!
//! Handlers run on the [`WorkerPool`] at [`JobPriority::Service`]. A caller
//! either returns as soon as the handler is queued or waits for it up to a
//! timeout. A timed-out handler is not cancelled; it still runs exactly
//! once.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use homecore_domain::event::{EVENT_CALL_SERVICE, EVENT_SERVICE_EXECUTED, EVENT_SERVICE_REGISTERED};
use homecore_domain::service::{ServiceCall, ServiceData, ServiceDescriptor};
use parking_lot::Mutex;
use serde_json::json;

use crate::event_bus::EventBus;
use crate::worker_pool::{Job, JobPriority, WorkerPool};

/// Default time a blocking call waits for its handler.
pub const SERVICE_CALL_LIMIT: Duration = Duration::from_secs(10);

/// Callback invoked for each call of a service.
pub type Handler = Arc<dyn Fn(&ServiceCall) + Send + Sync>;

/// How [`ServiceRegistry::call`] waits for the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// Return once the handler is queued.
    FireAndForget,
    /// Wait for the handler to finish, at most this long.
    Blocking(Duration),
}

impl CallMode {
    /// Blocking with [`SERVICE_CALL_LIMIT`].
    #[must_use]
    pub fn blocking() -> Self {
        Self::Blocking(SERVICE_CALL_LIMIT)
    }
}

/// Owner of every registered service handler.
pub struct ServiceRegistry {
    handlers: Mutex<HashMap<String, HashMap<String, Handler>>>,
    bus: Arc<EventBus>,
    pool: Arc<WorkerPool>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new(bus: Arc<EventBus>, pool: Arc<WorkerPool>) -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            bus,
            pool,
        }
    }

    /// Register `handler` for `domain.service`, replacing any previous one.
    pub fn register(
        &self,
        domain: &str,
        service: &str,
        handler: impl Fn(&ServiceCall) + Send + Sync + 'static,
    ) {
        let domain = domain.to_lowercase();
        let service = service.to_lowercase();
        let replaced = self
            .handlers
            .lock()
            .entry(domain.clone())
            .or_default()
            .insert(service.clone(), Arc::new(handler))
            .is_some();

        tracing::debug!(%domain, %service, replaced, "service registered");
        self.bus.fire(
            EVENT_SERVICE_REGISTERED,
            json!({ "domain": domain, "service": service }),
        );
    }

    #[must_use]
    pub fn has_service(&self, domain: &str, service: &str) -> bool {
        self.handler(&domain.to_lowercase(), &service.to_lowercase())
            .is_some()
    }

    /// Registered services grouped by domain.
    #[must_use]
    pub fn services(&self) -> BTreeMap<String, BTreeMap<String, ServiceDescriptor>> {
        self.handlers
            .lock()
            .iter()
            .map(|(domain, services)| {
                let descriptors = services
                    .keys()
                    .map(|service| {
                        (
                            service.clone(),
                            ServiceDescriptor {
                                domain: domain.clone(),
                                service: service.clone(),
                            },
                        )
                    })
                    .collect();
                (domain.clone(), descriptors)
            })
            .collect()
    }

    /// Invoke `domain.service` with `data`.
    ///
    /// Returns `false` without invoking anything when the service is
    /// unknown or the pool refuses the job. In blocking mode, also returns
    /// `false` when the handler does not finish within the timeout or
    /// panics.
    pub fn call(&self, domain: &str, service: &str, data: ServiceData, mode: CallMode) -> bool {
        let call = ServiceCall::new(domain, service, data);
        let Some(handler) = self.handler(call.domain(), call.service()) else {
            tracing::error!(domain = call.domain(), service = call.service(), "service not found");
            return false;
        };

        self.bus.fire(
            EVENT_CALL_SERVICE,
            json!({
                "domain": call.domain(),
                "service": call.service(),
                "service_data": call.data(),
            }),
        );

        let label = format!("service {}.{}", call.domain(), call.service());
        let bus = Arc::clone(&self.bus);
        match mode {
            CallMode::FireAndForget => self.pool.add_job(
                JobPriority::Service,
                Job::new(label, move || execute(&bus, handler.as_ref(), &call)),
            ),
            CallMode::Blocking(timeout) => {
                let target = format!("{}.{}", call.domain(), call.service());
                let (done_tx, done_rx) = mpsc::channel();
                let queued = self.pool.add_job(
                    JobPriority::Service,
                    Job::new(label, move || {
                        execute(&bus, handler.as_ref(), &call);
                        if done_tx.send(()).is_err() {
                            tracing::trace!("caller stopped waiting for service");
                        }
                    }),
                );
                if !queued {
                    return false;
                }
                match done_rx.recv_timeout(timeout) {
                    Ok(()) => true,
                    Err(RecvTimeoutError::Timeout) => {
                        tracing::warn!(
                            service = %target,
                            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                            "timed out waiting for service"
                        );
                        false
                    }
                    // The handler panicked and the job was dropped.
                    Err(RecvTimeoutError::Disconnected) => false,
                }
            }
        }
    }

    fn handler(&self, domain: &str, service: &str) -> Option<Handler> {
        self.handlers
            .lock()
            .get(domain)
            .and_then(|services| services.get(service))
            .cloned()
    }
}

fn execute(bus: &EventBus, handler: &(dyn Fn(&ServiceCall) + Send + Sync), call: &ServiceCall) {
    handler(call);
    bus.fire(
        EVENT_SERVICE_EXECUTED,
        json!({ "domain": call.domain(), "service": call.service() }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn registry() -> (ServiceRegistry, Arc<WorkerPool>, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        let pool = Arc::new(WorkerPool::new("test", 2));
        pool.start().unwrap();
        (
            ServiceRegistry::new(Arc::clone(&bus), Arc::clone(&pool)),
            pool,
            bus,
        )
    }

    fn counting(registry: &ServiceRegistry, domain: &str, service: &str) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        registry.register(domain, service, move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn should_return_false_when_service_unknown() {
        let (registry, pool, _) = registry();
        let count = counting(&registry, "light", "turn_on");

        assert!(!registry.call("light", "turn_off", ServiceData::new(), CallMode::blocking()));
        assert!(!registry.call("switch", "turn_on", ServiceData::new(), CallMode::FireAndForget));
        pool.block_till_done();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(pool.stats().submitted, 0);
    }

    #[test]
    fn should_invoke_handler_once_when_called_blocking() {
        let (registry, _, _) = registry();
        let count = counting(&registry, "light", "turn_on");

        assert!(registry.call("light", "turn_on", ServiceData::new(), CallMode::blocking()));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_schedule_handler_when_fire_and_forget() {
        let (registry, pool, _) = registry();
        let count = counting(&registry, "light", "turn_on");

        assert!(registry.call("light", "turn_on", ServiceData::new(), CallMode::FireAndForget));
        pool.block_till_done();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_match_services_case_insensitively() {
        let (registry, _, _) = registry();
        let count = counting(&registry, "Light", "Turn_On");

        assert!(registry.has_service("LIGHT", "turn_on"));
        assert!(registry.call("light", "TURN_ON", ServiceData::new(), CallMode::blocking()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_replace_handler_when_registering_twice() {
        let (registry, _, _) = registry();
        let first = counting(&registry, "light", "turn_on");
        let second = counting(&registry, "light", "turn_on");

        registry.call("light", "turn_on", ServiceData::new(), CallMode::blocking());

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(registry.services()["light"].len(), 1);
    }

    #[test]
    fn should_return_false_on_timeout_while_handler_completes() {
        let (registry, pool, _) = registry();
        let finished = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&finished);
        registry.register("slow", "work", move |_| {
            thread::sleep(Duration::from_millis(150));
            inner.fetch_add(1, Ordering::SeqCst);
        });

        let ok = registry.call(
            "slow",
            "work",
            ServiceData::new(),
            CallMode::Blocking(Duration::from_millis(20)),
        );
        assert!(!ok);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        pool.block_till_done();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn should_log_canonical_service_name_on_timeout() {
        let (registry, pool, _) = registry();
        registry.register("light", "turn_on", |_| {
            thread::sleep(Duration::from_millis(100));
        });
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let answered = tracing::subscriber::with_default(subscriber, || {
            registry.call(
                "LIGHT",
                "Turn_On",
                ServiceData::new(),
                CallMode::Blocking(Duration::from_millis(10)),
            )
        });
        pool.block_till_done();

        assert!(!answered);
        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(output.contains("timed out waiting for service"));
        assert!(output.contains("service=light.turn_on"));
        assert!(!output.contains("LIGHT"));
    }

    #[test]
    fn should_return_false_when_blocking_handler_panics() {
        let (registry, pool, _) = registry();
        registry.register("broken", "explode", |_| panic!("handler failure"));

        assert!(!registry.call("broken", "explode", ServiceData::new(), CallMode::blocking()));
        pool.block_till_done();
        assert_eq!(pool.stats().failed, 1);
    }

    #[test]
    fn should_pass_call_data_to_handler() {
        let (registry, _, _) = registry();
        let seen = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&seen);
        registry.register("light", "turn_on", move |call| {
            *inner.lock() = Some(call.clone());
        });

        let mut data = ServiceData::new();
        data.insert("brightness".into(), json!(50));
        registry.call("light", "turn_on", data, CallMode::blocking());

        let call = seen.lock().clone().unwrap();
        assert_eq!(call.domain(), "light");
        assert_eq!(call.data().get("brightness"), Some(&json!(50)));
    }

    #[test]
    fn should_group_services_by_domain() {
        let (registry, _, _) = registry();
        counting(&registry, "light", "turn_on");
        counting(&registry, "light", "turn_off");
        counting(&registry, "switch", "toggle");

        let services = registry.services();
        assert_eq!(services.len(), 2);
        assert_eq!(
            services["light"].keys().collect::<Vec<_>>(),
            vec!["turn_off", "turn_on"]
        );
        assert_eq!(services["switch"]["toggle"].domain, "switch");
    }

    #[test]
    fn should_fire_lifecycle_events() {
        let (registry, pool, bus) = registry();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for event_type in [EVENT_SERVICE_REGISTERED, EVENT_CALL_SERVICE, EVENT_SERVICE_EXECUTED] {
            let sink = Arc::clone(&seen);
            bus.listen(event_type, move |event| {
                sink.lock().push(event.event_type().to_string());
            });
        }

        counting(&registry, "light", "turn_on");
        registry.call("light", "turn_on", ServiceData::new(), CallMode::blocking());
        pool.block_till_done();

        assert_eq!(
            *seen.lock(),
            vec![EVENT_SERVICE_REGISTERED, EVENT_CALL_SERVICE, EVENT_SERVICE_EXECUTED]
        );
    }
}
