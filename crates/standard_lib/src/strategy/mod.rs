//! Strategy framework: the callback contract, a bus bridge, and a
//! fan-in container for running several strategies off one subscription
//! set.

pub mod accounting;
pub mod bar_window;
pub mod momentum;
pub mod multi;
pub mod runner;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::market_data::base_data::{Bar, Event, Tick};

/// Reacts to events delivered by a [`runner::StrategyRunner`].
///
/// `on_tick` is the one required hook; the rest default to no-ops.
/// Callbacks take `&mut self`: strategies are stateful and the runner
/// serializes access across its subscriptions.
pub trait Strategy: Send {
    fn on_tick(&mut self, tick: &Tick, event: &Event);

    fn on_bar(&mut self, _bar: &Bar, _event: &Event) {}

    fn on_log(&mut self, _text: &str, _event: &Event) {}

    fn on_heartbeat(&mut self, _event: &Event) {}
}

/// Which feed a strategy wants from its runner.
///
/// Logs and heartbeats are always delivered; the mode gates the market-data
/// topics: `TickOnly` skips bars, `BarOnly` skips ticks, `Mixed` takes
/// both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyMode {
    TickOnly,
    BarOnly,
    Mixed,
}

/// A strategy shared between the runner's subscription workers.
pub type SharedStrategy = Arc<Mutex<dyn Strategy>>;

/// Wrap a strategy for use with [`runner::StrategyRunner`].
pub fn shared<S: Strategy + 'static>(strategy: S) -> SharedStrategy {
    Arc::new(Mutex::new(strategy))
}
