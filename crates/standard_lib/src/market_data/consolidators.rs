use std::sync::Arc;

use dashmap::DashMap;

use crate::engine_core::event_bus::{EventBus, SubId};
use crate::market_data::base_data::{Bar, Event, Payload, Topic};

pub const NS_PER_SEC: u64 = 1_000_000_000;

#[derive(Default)]
struct BarState {
    active: bool,
    bucket_id: u64,
    bar: Bar,
}

/// Tick-to-bar consolidator.
///
/// Subscribes to MD_TICK on construction and folds each symbol's ticks into
/// time-bucket OHLCV bars. Buckets are half-open intervals
/// `[k * bucket_ns, (k+1) * bucket_ns)` of the event header timestamp. A
/// tick landing in a new bucket finalizes the previous bar at the bucket
/// edge (`(k+1) * bucket_ns - 1`) and publishes it back through the bus;
/// `flush_all` publishes open bars with their last tick time instead.
///
/// Ticks run on the subscription's worker thread while `flush_all` may be
/// called from anywhere, so per-symbol state lives in a `DashMap`.
pub struct BarBuilder {
    bus: Arc<EventBus>,
    bucket_ns: u64,
    out_topic: Topic,
    sub_id: SubId,
    state: Arc<DashMap<String, BarState>>,
}

impl BarBuilder {
    /// One-second bars on `Topic::Bar1s`.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_bucket(bus, NS_PER_SEC)
    }

    /// Custom bucket width, publishing on `Topic::Bar1s`.
    pub fn with_bucket(bus: Arc<EventBus>, bucket_ns: u64) -> Self {
        Self::with_output_topic(bus, bucket_ns, Topic::Bar1s)
    }

    /// Custom bucket width and output topic (e.g. 60 s buckets on
    /// `Topic::Bar1m`).
    pub fn with_output_topic(bus: Arc<EventBus>, bucket_ns: u64, out_topic: Topic) -> Self {
        let state: Arc<DashMap<String, BarState>> = Arc::new(DashMap::new());
        let cb_state = state.clone();
        let cb_bus = bus.clone();
        let sub_id = bus.subscribe(
            Topic::MdTick,
            Box::new(move |e| handle_tick(&cb_bus, &cb_state, bucket_ns, out_topic, e)),
        );
        tracing::info!(bucket_ns, topic = %out_topic, "bar builder subscribed to MD_TICK");
        Self { bus, bucket_ns, out_topic, sub_id, state }
    }

    /// Feed one event. This is the same entry point the MD_TICK
    /// subscription uses; non-tick payloads and zero timestamps are
    /// ignored.
    pub fn on_event(&self, e: &Event) {
        handle_tick(&self.bus, &self.state, self.bucket_ns, self.out_topic, e);
    }

    /// Publish every open bar with its current end timestamp (the last
    /// contributing tick time, not the bucket edge) and deactivate it.
    /// Idempotent.
    pub fn flush_all(&self) {
        for mut entry in self.state.iter_mut() {
            let st = entry.value_mut();
            if !st.active {
                continue;
            }
            publish_bar(&self.bus, self.out_topic, st.bar.clone());
            st.active = false;
        }
    }
}

impl Drop for BarBuilder {
    fn drop(&mut self) {
        self.flush_all();
        self.bus.unsubscribe(self.sub_id);
        tracing::info!("bar builder flushed and unsubscribed");
    }
}

fn handle_tick(
    bus: &EventBus,
    state: &DashMap<String, BarState>,
    bucket_ns: u64,
    out_topic: Topic,
    e: &Event,
) {
    let Payload::Tick(t) = &e.payload else { return };
    let ts = e.header.ts_ns;
    if ts == 0 {
        return;
    }
    let bucket_id = ts / bucket_ns;

    let mut entry = state.entry(t.symbol.clone()).or_default();
    let st = entry.value_mut();

    if !st.active {
        st.active = true;
        st.bucket_id = bucket_id;
        st.bar = open_bar(t.symbol.clone(), t.pq, t.qty, bucket_id, bucket_ns, ts);
        return;
    }

    if bucket_id != st.bucket_id {
        // Bucket rollover: finalize at the edge, publish, start fresh.
        st.bar.end_ts_ns = (st.bucket_id + 1) * bucket_ns - 1;
        publish_bar(bus, out_topic, st.bar.clone());
        st.bucket_id = bucket_id;
        st.bar = open_bar(t.symbol.clone(), t.pq, t.qty, bucket_id, bucket_ns, ts);
        return;
    }

    if t.pq > st.bar.high {
        st.bar.high = t.pq;
    }
    if t.pq < st.bar.low {
        st.bar.low = t.pq;
    }
    st.bar.close = t.pq;
    st.bar.volume += u64::from(t.qty);
    st.bar.end_ts_ns = ts;
}

fn open_bar(symbol: String, pq: f64, qty: u32, bucket_id: u64, bucket_ns: u64, ts: u64) -> Bar {
    Bar {
        symbol,
        open: pq,
        high: pq,
        low: pq,
        close: pq,
        volume: u64::from(qty),
        start_ts_ns: bucket_id * bucket_ns,
        end_ts_ns: ts,
    }
}

fn publish_bar(bus: &EventBus, topic: Topic, bar: Bar) {
    tracing::debug!(
        symbol = %bar.symbol,
        open = bar.open,
        high = bar.high,
        low = bar.low,
        close = bar.close,
        volume = bar.volume,
        "publishing consolidated bar"
    );
    bus.publish(Event::bar(bar, topic));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::base_data::{Header, Tick};
    use parking_lot::Mutex;

    fn tick_at(ts_ns: u64, symbol: &str, pq: f64, qty: u32) -> Event {
        Event {
            header: Header { seq: 0, topic: Topic::MdTick, ts_ns },
            payload: Payload::Tick(Tick { symbol: symbol.into(), pq, qty }),
        }
    }

    /// Collects Bar payloads published on a topic; unsubscribing drains.
    fn bar_sink(bus: &Arc<EventBus>, topic: Topic) -> (Arc<Mutex<Vec<Bar>>>, SubId) {
        let bars: Arc<Mutex<Vec<Bar>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = bars.clone();
        let sub = bus.subscribe(
            topic,
            Box::new(move |e| {
                if let Payload::Bar(b) = &e.payload {
                    sink.lock().push(b.clone());
                }
            }),
        );
        (bars, sub)
    }

    #[test]
    fn bucket_rollover_and_flush() {
        let bus = Arc::new(EventBus::with_capacity(256, 256));
        let (bars, sub) = bar_sink(&bus, Topic::Bar1s);
        let builder = BarBuilder::new(bus.clone());

        builder.on_event(&tick_at(500_000_000, "X", 10.0, 1));
        builder.on_event(&tick_at(700_000_000, "X", 12.0, 2));
        builder.on_event(&tick_at(1_200_000_000, "X", 11.0, 3));
        builder.flush_all();

        bus.unsubscribe(sub);
        let bars = bars.lock();
        assert_eq!(bars.len(), 2);

        let first = &bars[0];
        assert_eq!(first.open, 10.0);
        assert_eq!(first.high, 12.0);
        assert_eq!(first.low, 10.0);
        assert_eq!(first.close, 12.0);
        assert_eq!(first.volume, 3);
        assert_eq!(first.start_ts_ns, 0);
        assert_eq!(first.end_ts_ns, 999_999_999);

        let second = &bars[1];
        assert_eq!(second.open, 11.0);
        assert_eq!(second.high, 11.0);
        assert_eq!(second.low, 11.0);
        assert_eq!(second.close, 11.0);
        assert_eq!(second.volume, 3);
        assert_eq!(second.start_ts_ns, 1_000_000_000);
        assert_eq!(second.end_ts_ns, 1_200_000_000);

        drop(builder);
        bus.stop();
    }

    #[test]
    fn flush_is_idempotent() {
        let bus = Arc::new(EventBus::with_capacity(256, 256));
        let (bars, sub) = bar_sink(&bus, Topic::Bar1s);
        let builder = BarBuilder::new(bus.clone());

        builder.on_event(&tick_at(100, "X", 5.0, 1));
        builder.flush_all();
        builder.flush_all();

        bus.unsubscribe(sub);
        assert_eq!(bars.lock().len(), 1);
        drop(builder);
        bus.stop();
    }

    #[test]
    fn ohlc_law_holds_per_bar() {
        let bus = Arc::new(EventBus::with_capacity(1024, 1024));
        let (bars, sub) = bar_sink(&bus, Topic::Bar1s);
        let builder = BarBuilder::new(bus.clone());

        let prices = [10.0, 14.0, 9.0, 11.0, 13.0, 8.0, 12.0];
        for (i, pq) in prices.iter().enumerate() {
            builder.on_event(&tick_at(1 + i as u64 * 300_000_000, "X", *pq, 1));
        }
        builder.flush_all();

        bus.unsubscribe(sub);
        let bars = bars.lock();
        assert!(!bars.is_empty());
        for b in bars.iter() {
            assert!(b.low <= b.open.min(b.close));
            assert!(b.open.max(b.close) <= b.high);
            assert!(b.start_ts_ns <= b.end_ts_ns);
        }
        let total: u64 = bars.iter().map(|b| b.volume).sum();
        assert_eq!(total, prices.len() as u64);
        drop(builder);
        bus.stop();
    }

    #[test]
    fn symbols_roll_independently() {
        let bus = Arc::new(EventBus::with_capacity(256, 256));
        let (bars, sub) = bar_sink(&bus, Topic::Bar1s);
        let builder = BarBuilder::new(bus.clone());

        builder.on_event(&tick_at(100, "A", 1.0, 1));
        builder.on_event(&tick_at(200, "B", 2.0, 1));
        // Only A rolls over.
        builder.on_event(&tick_at(1_500_000_000, "A", 1.5, 1));
        builder.flush_all();

        bus.unsubscribe(sub);
        let bars = bars.lock();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars.iter().filter(|b| b.symbol == "A").count(), 2);
        assert_eq!(bars.iter().filter(|b| b.symbol == "B").count(), 1);
        drop(builder);
        bus.stop();
    }

    #[test]
    fn ignores_sentinels_and_non_ticks() {
        let bus = Arc::new(EventBus::with_capacity(256, 256));
        let (bars, sub) = bar_sink(&bus, Topic::Bar1s);
        let builder = BarBuilder::new(bus.clone());

        builder.on_event(&tick_at(0, "X", 10.0, 1)); // reserved sentinel ts
        builder.on_event(&Event {
            header: Header { seq: 0, topic: Topic::MdTick, ts_ns: 77 },
            payload: Payload::LogText("not a tick".into()),
        });
        builder.flush_all();

        bus.unsubscribe(sub);
        assert!(bars.lock().is_empty());
        drop(builder);
        bus.stop();
    }
}
