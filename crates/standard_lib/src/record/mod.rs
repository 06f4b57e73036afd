//! Event-log recorder: one serialized line per observed event.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine_core::event_bus::{EventBus, SubId};
use crate::error::EngineError;
use crate::market_data::base_data::Event;
use crate::market_data::event_io::serialize_event;

/// Appends one codec line per event to a file opened with truncation.
///
/// `on_event` is safe to call from any number of subscription workers; the
/// writer is guarded by a mutex. `flush` and `close` are idempotent and
/// `close` runs on drop.
pub struct EventRecorder {
    path: PathBuf,
    out: Mutex<Option<BufWriter<File>>>,
}

impl EventRecorder {
    /// Open (truncate) the target file, creating parent directories.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "failed to open recording file");
            e
        })?;
        tracing::info!(path = %path.display(), "recording events");
        Ok(Self { path, out: Mutex::new(Some(BufWriter::new(file))) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event. No-op after `close`. Write failures are logged,
    /// not propagated; recording must never take the bus down.
    pub fn on_event(&self, e: &Event) {
        let mut out = self.out.lock();
        if let Some(writer) = out.as_mut() {
            if let Err(err) = writeln!(writer, "{}", serialize_event(e)) {
                tracing::error!(error = %err, "failed to write event record");
            }
        }
    }

    pub fn flush(&self) {
        if let Some(writer) = self.out.lock().as_mut() {
            let _ = writer.flush();
        }
    }

    pub fn close(&self) {
        if let Some(mut writer) = self.out.lock().take() {
            let _ = writer.flush();
            tracing::info!(path = %self.path.display(), "recording closed");
        }
    }

    /// Attach to a bus, recording every routed event. The caller owns the
    /// returned subscription id.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> SubId {
        let recorder = self.clone();
        bus.subscribe_all(Box::new(move |e| recorder.on_event(e)))
    }
}

impl Drop for EventRecorder {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::base_data::{Payload, Topic};
    use crate::market_data::event_io::parse_event;

    #[test]
    fn records_lines_that_parse_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("md_events.log");
        let recorder = EventRecorder::create(&path).unwrap();

        let bus = Arc::new(EventBus::with_capacity(256, 256));
        let recorder = Arc::new(recorder);
        let sub = recorder.subscribe(&bus);

        bus.publish(Event::tick("NIFTY", 22500.0, 100));
        bus.publish(Event::log_text("session open"));
        bus.unsubscribe(sub);
        recorder.close();

        let contents = fs::read_to_string(&path).unwrap();
        let events: Vec<Event> =
            contents.lines().map(|l| parse_event(l).unwrap()).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].header.topic, Topic::MdTick);
        assert!(matches!(&events[1].payload, Payload::LogText(t) if t == "session open"));
        bus.stop();
    }

    #[test]
    fn flush_and_close_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let recorder = EventRecorder::create(&path).unwrap();
        recorder.on_event(&Event::heartbeat());
        recorder.flush();
        recorder.flush();
        recorder.close();
        recorder.close();
        // Writes after close are dropped silently.
        recorder.on_event(&Event::heartbeat());
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn create_fails_on_unwritable_path() {
        assert!(EventRecorder::create("/proc/definitely/not/writable.log").is_err());
    }
}
