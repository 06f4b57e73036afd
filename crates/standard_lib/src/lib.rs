//! tick-bus: in-process market-data event bus and replay harness.
//!
//! The engine fans heterogeneous market-data events out from any number of
//! publishers to per-subscriber worker threads without the publisher ever
//! running user code. Around that core sit the pieces that make it usable
//! for backtesting: a tick-to-bar consolidator, a timed file replayer, an
//! event recorder and a small strategy framework with accounting.
//!
//! Everything is plain OS threads and bounded queues: publishers block when
//! ingress is full, the reactor blocks when a subscriber queue is full.
//! Slow consumers slow the whole bus down rather than losing events.

pub mod engine_core;
pub mod error;
pub mod logging;
pub mod market_data;
pub mod record;
pub mod replay;
pub mod strategy;

pub use engine_core::config::{BusConfig, OverflowPolicy};
pub use engine_core::event_bus::{BusStats, EventBus, SubId, INVALID_SUB_ID};
pub use error::{CodecError, EngineError};
pub use market_data::base_data::{Bar, Event, Header, Payload, Tick, Topic};
