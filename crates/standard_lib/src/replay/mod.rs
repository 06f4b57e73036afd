//! Timed file-to-bus replay.
//!
//! Reads an event log (one codec line per event) and republishes it through
//! a bus, either as fast as possible or reproducing the recorded timestamp
//! spacing at a configurable speed. Pacing uses absolute scheduling against
//! the first passing event (`publish_at = wall_start + (ts - first_ts) /
//! speed`) so sleep overshoot does not accumulate as drift.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::engine_core::event_bus::EventBus;
use crate::error::EngineError;
use crate::market_data::base_data::{Event, Payload, Topic};
use crate::market_data::event_io::parse_event;

/// Optional predicates ANDed together. An unset clause passes everything.
#[derive(Clone, Debug, Default)]
pub struct ReplayFilter {
    /// Keep only events on this topic.
    pub topic: Option<Topic>,
    /// Keep only ticks for this symbol; non-tick payloads are rejected
    /// while this clause is active.
    pub symbol: Option<String>,
    /// Keep only events with `ts_ns >= ts_min`.
    pub ts_min: Option<u64>,
    /// Keep only events with `ts_ns <= ts_max`.
    pub ts_max: Option<u64>,
}

impl ReplayFilter {
    pub fn passes(&self, e: &Event) -> bool {
        if let Some(topic) = self.topic {
            if e.header.topic != topic {
                return false;
            }
        }
        if let Some(symbol) = &self.symbol {
            match &e.payload {
                Payload::Tick(t) if t.symbol == *symbol => {}
                _ => return false,
            }
        }
        if let Some(min) = self.ts_min {
            if e.header.ts_ns < min {
                return false;
            }
        }
        if let Some(max) = self.ts_max {
            if e.header.ts_ns > max {
                return false;
            }
        }
        true
    }
}

/// What one replay run did.
#[derive(Clone, Debug, Default)]
pub struct ReplayStats {
    /// Non-empty lines considered.
    pub lines_read: u64,
    /// Lines rejected by the codec.
    pub parse_errors: u64,
    /// Lines with the reserved `ts_ns == 0` sentinel stamp.
    pub skipped_sentinels: u64,
    /// Events rejected by the filter.
    pub filtered_out: u64,
    /// Events accepted by the bus.
    pub published: u64,
}

#[derive(Clone, Copy)]
enum Pace {
    Fast,
    Scaled(f64),
}

/// File-backed event replayer. The file is opened lazily at replay time;
/// one instance can be replayed repeatedly with different settings.
pub struct EventReplay {
    path: PathBuf,
    filter: Option<ReplayFilter>,
    max_events: Option<u64>,
    step_mode: bool,
}

impl EventReplay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), filter: None, max_events: None, step_mode: false }
    }

    pub fn set_filter(&mut self, filter: ReplayFilter) {
        self.filter = Some(filter);
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    /// Stop after publishing `n` events.
    pub fn set_max_events(&mut self, n: u64) {
        self.max_events = Some(n);
    }

    pub fn clear_max_events(&mut self) {
        self.max_events = None;
    }

    /// When enabled, each passing event waits for one line on stdin before
    /// publishing.
    pub fn enable_step_mode(&mut self, on: bool) {
        self.step_mode = on;
    }

    /// Publish every passing event as fast as possible.
    pub fn replay_fast(&self, bus: &EventBus) -> Result<ReplayStats, EngineError> {
        tracing::info!(path = %self.path.display(), "starting fast replay");
        self.run(bus, Pace::Fast)
    }

    /// Reproduce the recorded timestamp spacing 1:1.
    pub fn replay_realtime(&self, bus: &EventBus) -> Result<ReplayStats, EngineError> {
        self.replay_speed(bus, 1.0)
    }

    /// Reproduce the recorded spacing divided by `speed` (2.0 = twice as
    /// fast). Non-positive speeds are clamped to 1.0 with a warning.
    pub fn replay_speed(&self, bus: &EventBus, speed: f64) -> Result<ReplayStats, EngineError> {
        let speed = if speed <= 0.0 {
            tracing::warn!(speed, "invalid replay speed, using 1.0");
            1.0
        } else {
            speed
        };
        tracing::info!(path = %self.path.display(), speed, "starting timed replay");
        self.run(bus, Pace::Scaled(speed))
    }

    fn run(&self, bus: &EventBus, pace: Pace) -> Result<ReplayStats, EngineError> {
        let file = File::open(&self.path).map_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "failed to open replay file");
            e
        })?;
        let reader = BufReader::new(file);

        let mut stats = ReplayStats::default();
        // Wall-clock anchor and recorded timestamp of the first paced event.
        let mut origin: Option<(Instant, u64)> = None;

        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            stats.lines_read += 1;

            let event = match parse_event(&line) {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!(error = %err, line, "skipping unparseable line");
                    stats.parse_errors += 1;
                    continue;
                }
            };

            if event.header.ts_ns == 0 {
                tracing::debug!(seq = event.header.seq, "skipping sentinel-stamped event");
                stats.skipped_sentinels += 1;
                continue;
            }

            if let Some(filter) = &self.filter {
                if !filter.passes(&event) {
                    stats.filtered_out += 1;
                    continue;
                }
            }

            if let Some(max) = self.max_events {
                if stats.published >= max {
                    tracing::info!(max, "replay event cap reached");
                    break;
                }
            }

            if let Pace::Scaled(speed) = pace {
                let ts = event.header.ts_ns;
                match origin {
                    None => origin = Some((Instant::now(), ts)),
                    Some((wall_start, first_ts)) => {
                        let offset_ns = ts.saturating_sub(first_ts) as f64 / speed;
                        let target = wall_start + Duration::from_nanos(offset_ns as u64);
                        let now = Instant::now();
                        if target > now {
                            std::thread::sleep(target - now);
                        }
                    }
                }
            }

            if self.step_mode {
                wait_for_advance()?;
            }

            if !bus.publish(event) {
                tracing::warn!("bus rejected publish (stopped); aborting replay");
                break;
            }
            stats.published += 1;
        }

        tracing::info!(
            published = stats.published,
            parse_errors = stats.parse_errors,
            filtered_out = stats.filtered_out,
            "replay finished"
        );
        Ok(stats)
    }
}

/// Step-mode gate: one stdin line advances one event.
fn wait_for_advance() -> std::io::Result<()> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(())
}
