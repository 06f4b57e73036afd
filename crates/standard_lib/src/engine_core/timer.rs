use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::engine_core::event_bus::EventBus;
use crate::market_data::base_data::Event;

/// Periodic callback on a dedicated thread.
///
/// Fires `f` once per interval until `stop()` or drop. Stop latency is at
/// most one interval.
pub struct SimpleTimer {
    run: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SimpleTimer {
    pub fn start(interval: Duration, mut f: impl FnMut() + Send + 'static) -> Self {
        let run = Arc::new(AtomicBool::new(true));
        let flag = run.clone();
        let handle = std::thread::Builder::new()
            .name("simple-timer".into())
            .spawn(move || {
                while flag.load(Ordering::Relaxed) {
                    f();
                    std::thread::sleep(interval);
                }
            })
            .ok();
        if handle.is_none() {
            tracing::error!("failed to spawn timer thread");
        }
        Self { run, handle }
    }

    pub fn stop(&mut self) {
        self.run.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SimpleTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Publish a HEARTBEAT event every `interval` until the timer is stopped.
/// Publishing on a stopped bus is a no-op, so the timer may outlive the bus
/// shutdown harmlessly.
pub fn spawn_heartbeat(bus: Arc<EventBus>, interval: Duration) -> SimpleTimer {
    SimpleTimer::start(interval, move || {
        bus.publish(Event::heartbeat());
    })
}
