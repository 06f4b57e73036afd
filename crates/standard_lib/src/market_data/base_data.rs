use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumCount, EnumIter, EnumString};

/// Logical channel an event is published on.
///
/// The bus routes on this closed set; subscribers either pick one topic or
/// receive everything. No ordering is implied between topics.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter, EnumCount, Serialize,
    Deserialize,
)]
pub enum Topic {
    /// Free-text log lines travelling through the bus.
    #[strum(serialize = "LOG")]
    Log,
    /// Raw trade prints.
    #[strum(serialize = "MD_TICK")]
    MdTick,
    /// Periodic liveness pulses from timers.
    #[strum(serialize = "HEARTBEAT")]
    Heartbeat,
    /// One-second consolidated bars.
    #[strum(serialize = "BAR_1S")]
    Bar1s,
    /// One-minute consolidated bars.
    #[strum(serialize = "BAR_1M")]
    Bar1m,
}

/// Attached to every event at publish time.
///
/// `seq` is strictly increasing in ingress order; `ts_ns` is nanoseconds
/// since the process monotonic epoch, non-decreasing across events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub seq: u64,
    pub topic: Topic,
    pub ts_ns: u64,
}

impl Default for Header {
    fn default() -> Self {
        Self { seq: 0, topic: Topic::MdTick, ts_ns: 0 }
    }
}

/// A single executed trade print.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Symbol identifier (e.g. `"NIFTY"`).
    pub symbol: String,
    /// Trade price.
    pub pq: f64,
    /// Trade quantity.
    pub qty: u32,
}

/// OHLCV summary of the ticks inside one time bucket.
///
/// Invariants: `low <= open, close <= high`, `start_ts_ns <= end_ts_ns`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Bucket start, inclusive (`bucket_id * bucket_ns`).
    pub start_ts_ns: u64,
    /// Last contributing tick time, or the bucket edge once finalized.
    pub end_ts_ns: u64,
}

/// Event payload. Exactly one variant is active per event; the set is
/// closed so routing and the codec stay exhaustive-match-checked.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// No payload. Reserved for header-only events such as heartbeats.
    #[default]
    Empty,
    Tick(Tick),
    LogText(String),
    Bar(Bar),
}

/// Header plus payload. Created by `EventBus::publish`, which stamps the
/// header; never mutated afterwards.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub header: Header,
    pub payload: Payload,
}

impl Event {
    /// A tick event on `Topic::MdTick`. Header fields are stamped at publish.
    pub fn tick(symbol: impl Into<String>, pq: f64, qty: u32) -> Self {
        Self {
            header: Header { topic: Topic::MdTick, ..Default::default() },
            payload: Payload::Tick(Tick { symbol: symbol.into(), pq, qty }),
        }
    }

    /// A free-text event on `Topic::Log`.
    pub fn log_text(text: impl Into<String>) -> Self {
        Self {
            header: Header { topic: Topic::Log, ..Default::default() },
            payload: Payload::LogText(text.into()),
        }
    }

    /// A header-only heartbeat pulse.
    pub fn heartbeat() -> Self {
        Self {
            header: Header { topic: Topic::Heartbeat, ..Default::default() },
            payload: Payload::Empty,
        }
    }

    /// A consolidated bar on the given bar topic.
    pub fn bar(bar: Bar, topic: Topic) -> Self {
        Self { header: Header { topic, ..Default::default() }, payload: Payload::Bar(bar) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::EnumCount;

    #[test]
    fn topic_tokens_round_trip() {
        for (topic, token) in [
            (Topic::Log, "LOG"),
            (Topic::MdTick, "MD_TICK"),
            (Topic::Heartbeat, "HEARTBEAT"),
            (Topic::Bar1s, "BAR_1S"),
            (Topic::Bar1m, "BAR_1M"),
        ] {
            assert_eq!(topic.to_string(), token);
            assert_eq!(Topic::from_str(token).unwrap(), topic);
        }
        assert!(Topic::from_str("MD_TRADE").is_err());
        assert_eq!(Topic::COUNT, 5);
    }

    #[test]
    fn constructors_pick_topics() {
        assert_eq!(Event::tick("NIFTY", 22500.0, 100).header.topic, Topic::MdTick);
        assert_eq!(Event::log_text("hi").header.topic, Topic::Log);
        assert_eq!(Event::heartbeat().header.topic, Topic::Heartbeat);
        assert_eq!(Event::bar(Bar::default(), Topic::Bar1m).header.topic, Topic::Bar1m);
    }
}
