use crate::market_data::base_data::{Bar, Event, Tick};
use crate::strategy::{SharedStrategy, Strategy, StrategyMode};

struct StrategyEntry {
    strategy: SharedStrategy,
    mode: StrategyMode,
}

/// Fan-in over several strategies behind one runner.
///
/// Implements [`Strategy`] itself: ticks skip `BarOnly` entries, bars skip
/// `TickOnly` entries, logs and heartbeats reach everyone. Entries are
/// shared handles, so callers keep access to their concrete strategies
/// (e.g. for a final close-out) after the run. Attach the container to a
/// [`StrategyRunner`](crate::strategy::runner::StrategyRunner) in `Mixed`
/// mode so both feeds are available to gate.
#[derive(Default)]
pub struct MultiStrategy {
    entries: Vec<StrategyEntry>,
}

impl MultiStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_strategy(&mut self, strategy: SharedStrategy, mode: StrategyMode) {
        self.entries.push(StrategyEntry { strategy, mode });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Strategy for MultiStrategy {
    fn on_tick(&mut self, tick: &Tick, event: &Event) {
        for entry in &self.entries {
            if entry.mode == StrategyMode::BarOnly {
                continue;
            }
            entry.strategy.lock().on_tick(tick, event);
        }
    }

    fn on_bar(&mut self, bar: &Bar, event: &Event) {
        for entry in &self.entries {
            if entry.mode == StrategyMode::TickOnly {
                continue;
            }
            entry.strategy.lock().on_bar(bar, event);
        }
    }

    fn on_log(&mut self, text: &str, event: &Event) {
        for entry in &self.entries {
            entry.strategy.lock().on_log(text, event);
        }
    }

    fn on_heartbeat(&mut self, event: &Event) {
        for entry in &self.entries {
            entry.strategy.lock().on_heartbeat(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::shared;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Counts {
        ticks: usize,
        bars: usize,
        logs: usize,
        heartbeats: usize,
    }

    struct Probe {
        counts: Arc<Mutex<Counts>>,
    }

    impl Strategy for Probe {
        fn on_tick(&mut self, _t: &Tick, _e: &Event) {
            self.counts.lock().ticks += 1;
        }
        fn on_bar(&mut self, _b: &Bar, _e: &Event) {
            self.counts.lock().bars += 1;
        }
        fn on_log(&mut self, _m: &str, _e: &Event) {
            self.counts.lock().logs += 1;
        }
        fn on_heartbeat(&mut self, _e: &Event) {
            self.counts.lock().heartbeats += 1;
        }
    }

    #[test]
    fn modes_gate_market_data_but_not_logs() {
        let tick_counts = Arc::new(Mutex::new(Counts::default()));
        let bar_counts = Arc::new(Mutex::new(Counts::default()));

        let mut multi = MultiStrategy::new();
        multi.add_strategy(shared(Probe { counts: tick_counts.clone() }), StrategyMode::TickOnly);
        multi.add_strategy(shared(Probe { counts: bar_counts.clone() }), StrategyMode::BarOnly);
        assert_eq!(multi.len(), 2);

        let event = Event::default();
        multi.on_tick(&Tick::default(), &event);
        multi.on_bar(&Bar::default(), &event);
        multi.on_log("note", &event);
        multi.on_heartbeat(&event);

        let ticks = tick_counts.lock();
        assert_eq!((ticks.ticks, ticks.bars, ticks.logs, ticks.heartbeats), (1, 0, 1, 1));
        let bars = bar_counts.lock();
        assert_eq!((bars.ticks, bars.bars, bars.logs, bars.heartbeats), (0, 1, 1, 1));
    }
}
