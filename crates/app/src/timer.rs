//! Background clock firing `time_changed` at a fixed interval.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use homecore_domain::event::EVENT_TIME_CHANGED;
use homecore_domain::time::now;
use parking_lot::{Condvar, Mutex};
use serde_json::json;

use crate::event_bus::EventBus;

#[derive(Default)]
struct Signal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Fires `time_changed` with `{"now": <timestamp>}` every `interval` on its
/// own thread until stopped.
pub struct Timer {
    interval: Duration,
    bus: Arc<EventBus>,
    signal: Arc<Signal>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Timer {
    #[must_use]
    pub fn new(bus: Arc<EventBus>, interval: Duration) -> Self {
        Self {
            interval,
            bus,
            signal: Arc::new(Signal::default()),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the timer thread. Does nothing if it is already running.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn start(&self) -> std::io::Result<()> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Ok(());
        }
        *self.signal.stopped.lock() = false;

        let bus = Arc::clone(&self.bus);
        let signal = Arc::clone(&self.signal);
        let interval = self.interval;
        *handle = Some(
            thread::Builder::new()
                .name("timer".to_string())
                .spawn(move || tick_loop(&bus, &signal, interval))?,
        );
        tracing::debug!(
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "timer started"
        );
        Ok(())
    }

    /// Stop the timer and wait for its thread to exit.
    pub fn stop(&self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            tracing::error!("timer thread panicked");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn tick_loop(bus: &EventBus, signal: &Signal, interval: Duration) {
    loop {
        bus.fire(EVENT_TIME_CHANGED, json!({ "now": now() }));

        let deadline = Instant::now() + interval;
        let mut stopped = signal.stopped.lock();
        while !*stopped {
            if signal.wake.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        if *stopped {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn should_fire_time_changed_until_stopped() {
        let bus = Arc::new(EventBus::new());
        let ticks = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&ticks);
        bus.listen(EVENT_TIME_CHANGED, move |event| {
            assert!(event.data().get("now").is_some());
            inner.fetch_add(1, Ordering::SeqCst);
        });

        let timer = Timer::new(Arc::clone(&bus), Duration::from_millis(10));
        timer.start().unwrap();
        thread::sleep(Duration::from_millis(60));
        timer.stop();
        let after_stop = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));

        assert!(after_stop >= 2);
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
        assert!(!timer.is_running());
    }

    #[test]
    fn should_stop_promptly_with_long_interval() {
        let bus = Arc::new(EventBus::new());
        let timer = Timer::new(bus, Duration::from_secs(3600));
        timer.start().unwrap();

        let started = Instant::now();
        timer.stop();

        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn should_ignore_second_start() {
        let bus = Arc::new(EventBus::new());
        let timer = Timer::new(bus, Duration::from_millis(50));
        timer.start().unwrap();
        timer.start().unwrap();
        assert!(timer.is_running());
        timer.stop();
    }
}
