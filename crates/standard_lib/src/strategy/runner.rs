use std::sync::Arc;

use crate::engine_core::event_bus::{EventBus, SubId};
use crate::market_data::base_data::{Payload, Topic};
use crate::strategy::{SharedStrategy, StrategyMode};

/// Bridges the bus and a [`Strategy`](crate::strategy::Strategy).
///
/// Subscribes to LOG and HEARTBEAT plus the market-data topics selected by
/// the mode, dispatching payload-matching events into the strategy
/// callbacks. Each topic is its own subscription (own worker thread); the
/// strategy mutex serializes the callbacks.
///
/// Unsubscribes on drop; the bus must still be live at that point.
pub struct StrategyRunner {
    bus: Arc<EventBus>,
    subs: Vec<SubId>,
}

impl StrategyRunner {
    pub fn new(bus: Arc<EventBus>, strategy: SharedStrategy, mode: StrategyMode) -> Self {
        let mut subs = Vec::with_capacity(4);

        if mode != StrategyMode::BarOnly {
            let strat = strategy.clone();
            subs.push(bus.subscribe(
                Topic::MdTick,
                Box::new(move |e| {
                    if let Payload::Tick(t) = &e.payload {
                        strat.lock().on_tick(t, e);
                    } else {
                        tracing::warn!(seq = e.header.seq, "MD_TICK event without tick payload");
                    }
                }),
            ));
        }

        if mode != StrategyMode::TickOnly {
            let strat = strategy.clone();
            subs.push(bus.subscribe(
                Topic::Bar1s,
                Box::new(move |e| {
                    if let Payload::Bar(b) = &e.payload {
                        strat.lock().on_bar(b, e);
                    }
                }),
            ));
        }

        let strat = strategy.clone();
        subs.push(bus.subscribe(
            Topic::Log,
            Box::new(move |e| {
                if let Payload::LogText(text) = &e.payload {
                    strat.lock().on_log(text, e);
                }
            }),
        ));

        let strat = strategy;
        subs.push(bus.subscribe(
            Topic::Heartbeat,
            Box::new(move |e| {
                strat.lock().on_heartbeat(e);
            }),
        ));

        Self { bus, subs }
    }
}

impl Drop for StrategyRunner {
    fn drop(&mut self) {
        for id in self.subs.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}
