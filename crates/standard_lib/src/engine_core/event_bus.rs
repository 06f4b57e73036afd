use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use ahash::AHashMap;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use strum::{EnumCount, IntoEnumIterator};

use crate::engine_core::clock::now_ns;
use crate::engine_core::config::{BusConfig, OverflowPolicy};
use crate::market_data::base_data::{Event, Topic};

/// Process-unique subscription identifier, allocated monotonically from 1.
pub type SubId = u64;

/// Returned by `subscribe` / `subscribe_all` on a stopped bus.
pub const INVALID_SUB_ID: SubId = 0;

/// User callback. Invoked on the subscription's worker thread; calls within
/// one subscription are serialized, calls across subscriptions run in
/// parallel.
pub type Callback = Box<dyn FnMut(&Event) + Send>;

/// Messages on the publisher -> reactor queue. Control messages share the
/// queue with events so they are ordered against them.
enum IngressMsg {
    Event(Event),
    /// Retire a subscription after everything already in ingress has been
    /// routed to it. The removed slot is handed back for joining.
    Unsubscribe { id: SubId, reply: Sender<Option<SubSlot>> },
    Shutdown,
}

/// Messages on a subscriber queue. `Shutdown` is the internal wake-up
/// sentinel; it never reaches the user callback.
enum Delivery {
    Event(Event),
    Shutdown,
}

struct SubSlot {
    /// `None` for all-events subscribers.
    topic: Option<Topic>,
    tx: Sender<Delivery>,
    worker: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Registry {
    by_topic: AHashMap<SubId, SubSlot>,
    all: AHashMap<SubId, SubSlot>,
}

impl Registry {
    fn remove(&mut self, id: SubId) -> Option<SubSlot> {
        self.by_topic.remove(&id).or_else(|| self.all.remove(&id))
    }
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    ingress_popped: AtomicU64,
    dropped: AtomicU64,
    routed: [AtomicU64; Topic::COUNT],
}

/// Snapshot of the bus counters.
#[derive(Clone, Debug)]
pub struct BusStats {
    /// Events accepted by `publish`.
    pub published: u64,
    /// Events the reactor has popped off ingress.
    pub ingress_popped: u64,
    /// Deliveries dropped under `OverflowPolicy::DropNewest`.
    pub dropped: u64,
    /// Events routed, per topic.
    pub routed: Vec<(Topic, u64)>,
}

/// In-process market-data event bus.
///
/// One *reactor* thread owns routing: publishers push stamped events onto a
/// bounded ingress queue, the reactor pops them one at a time and fans each
/// out to the queue of every matching subscription. Every subscription has
/// its own worker thread popping that queue and invoking the user callback,
/// so callbacks never run on the publisher or the reactor.
///
/// Guarantees:
/// - each subscriber observes its events in publish order (per-sub FIFO);
/// - `header.seq` is strictly increasing in ingress order, `header.ts_ns`
///   is non-decreasing;
/// - with the default `OverflowPolicy::Block`, delivery is at-least-once
///   with no drops: a full subscriber queue stalls the reactor and
///   eventually the publishers (the slowest subscriber paces the bus);
/// - `unsubscribe` returns only after the callback has observed every event
///   published before the call;
/// - `stop()` is idempotent, drains ingress, and joins every thread.
///
/// All public methods are callable from any thread.
pub struct EventBus {
    cfg: BusConfig,
    ingress_tx: Sender<IngressMsg>,
    reactor: Mutex<Option<JoinHandle<()>>>,
    run: Arc<AtomicBool>,
    registry: Arc<Mutex<Registry>>,
    counters: Arc<Counters>,
    seq: AtomicU64,
    next_id: AtomicU64,
    /// Serializes seq/ts stamping with the ingress enqueue so the reactor
    /// observes strictly increasing sequence numbers even with concurrent
    /// publishers.
    publish_lock: Mutex<()>,
    /// Serializes routed unsubscribes against shutdown. While an
    /// unsubscribe holds this, stop() cannot join the reactor, so the
    /// control message is guaranteed a reply.
    lifecycle: Mutex<()>,
}

impl EventBus {
    /// Bus with default capacities (65 536 / 65 536) and blocking overflow.
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Bus with explicit ingress / per-subscriber capacities.
    pub fn with_capacity(ingress_capacity: usize, per_sub_capacity: usize) -> Self {
        Self::with_config(BusConfig { ingress_capacity, per_sub_capacity, ..Default::default() })
    }

    pub fn with_config(cfg: BusConfig) -> Self {
        let (ingress_tx, ingress_rx) = bounded(cfg.ingress_capacity);
        let run = Arc::new(AtomicBool::new(true));
        let registry = Arc::new(Mutex::new(Registry::default()));
        let counters = Arc::new(Counters::default());

        tracing::info!(
            ingress_cap = cfg.ingress_capacity,
            per_sub_cap = cfg.per_sub_capacity,
            overflow = ?cfg.overflow,
            "event bus starting"
        );

        let reactor = {
            let registry = registry.clone();
            let counters = counters.clone();
            let overflow = cfg.overflow;
            std::thread::Builder::new()
                .name("bus-reactor".into())
                .spawn(move || reactor_loop(ingress_rx, registry, counters, overflow))
                .expect("failed to spawn bus reactor thread")
        };

        Self {
            cfg,
            ingress_tx,
            reactor: Mutex::new(Some(reactor)),
            run,
            registry,
            counters,
            seq: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            publish_lock: Mutex::new(()),
            lifecycle: Mutex::new(()),
        }
    }

    /// Register a subscriber for one topic. Returns `INVALID_SUB_ID` if the
    /// bus is stopped.
    pub fn subscribe(&self, topic: Topic, cb: Callback) -> SubId {
        self.subscribe_inner(Some(topic), cb)
    }

    /// Register a subscriber that receives every routed event.
    pub fn subscribe_all(&self, cb: Callback) -> SubId {
        self.subscribe_inner(None, cb)
    }

    fn subscribe_inner(&self, topic: Option<Topic>, cb: Callback) -> SubId {
        // Checking the run flag under the registry lock closes the race with
        // stop(), which flips the flag before collecting ids to tear down.
        let mut reg = self.registry.lock();
        if !self.run.load(Ordering::Acquire) {
            tracing::warn!("subscribe rejected: bus is stopped");
            return INVALID_SUB_ID;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(self.cfg.per_sub_capacity);
        let worker = match std::thread::Builder::new()
            .name(format!("bus-sub-{id}"))
            .spawn(move || worker_loop(id, rx, cb))
        {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn subscriber worker");
                return INVALID_SUB_ID;
            }
        };

        let slot = SubSlot { topic, tx, worker: Some(worker) };
        match topic {
            Some(_) => reg.by_topic.insert(id, slot),
            None => reg.all.insert(id, slot),
        };
        id
    }

    /// Remove a subscription, deliver everything already routed to it, and
    /// join its worker. Unknown ids are a no-op.
    ///
    /// On a running bus the removal travels through ingress as a control
    /// message, so every event published before this call is routed to the
    /// subscriber first and has been handed to the callback by the time
    /// this returns.
    pub fn unsubscribe(&self, id: SubId) {
        if id == INVALID_SUB_ID {
            return;
        }
        let slot = {
            let _lifecycle = self.lifecycle.lock();
            if self.run.load(Ordering::Acquire) {
                let (reply_tx, reply_rx) = bounded(1);
                if self.ingress_tx.send(IngressMsg::Unsubscribe { id, reply: reply_tx }).is_ok() {
                    reply_rx.recv().ok().flatten()
                } else {
                    self.remove_direct(id)
                }
            } else {
                self.remove_direct(id)
            }
        };

        let Some(mut slot) = slot else { return };
        if let Some(worker) = slot.worker.take() {
            if worker.join().is_err() {
                tracing::error!(sub_id = id, "subscriber worker terminated abnormally");
            }
        }
    }

    /// Removal path for a stopped bus (reactor already joined).
    fn remove_direct(&self, id: SubId) -> Option<SubSlot> {
        let slot = self.registry.lock().remove(id);
        if let Some(slot) = &slot {
            let _ = slot.tx.send(Delivery::Shutdown);
        }
        slot
    }

    /// Stamp `seq` and `ts_ns` and enqueue onto ingress. Blocks while the
    /// ingress queue is full. Returns `false` on a stopped bus.
    pub fn publish(&self, mut event: Event) -> bool {
        if !self.run.load(Ordering::Acquire) {
            return false;
        }
        let _serial = self.publish_lock.lock();
        event.header.seq = self.seq.fetch_add(1, Ordering::Relaxed);
        event.header.ts_ns = now_ns();
        if self.ingress_tx.send(IngressMsg::Event(event)).is_err() {
            return false;
        }
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Graceful shutdown: wake the reactor, let it drain and route the rest
    /// of ingress, join it, then tear down every subscription. Idempotent;
    /// dropping the bus calls this.
    pub fn stop(&self) {
        {
            let _lifecycle = self.lifecycle.lock();
            if !self.run.swap(false, Ordering::AcqRel) {
                return;
            }
            tracing::info!("event bus stopping");

            let _ = self.ingress_tx.send(IngressMsg::Shutdown);
            if let Some(reactor) = self.reactor.lock().take() {
                if reactor.join().is_err() {
                    tracing::error!("reactor thread terminated abnormally");
                }
            }
        }
        // Tear the subscriptions down outside the lifecycle lock: with the
        // run flag down, unsubscribe takes the direct path.
        let ids: Vec<SubId> = {
            let reg = self.registry.lock();
            reg.by_topic.keys().chain(reg.all.keys()).copied().collect()
        };
        for id in ids {
            self.unsubscribe(id);
        }
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.counters.published.load(Ordering::Relaxed),
            ingress_popped: self.counters.ingress_popped.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            routed: Topic::iter()
                .map(|t| (t, self.counters.routed[t as usize].load(Ordering::Relaxed)))
                .collect(),
        }
    }

    /// Emit the counters through the log.
    pub fn log_stats(&self) {
        let stats = self.stats();
        tracing::info!(
            published = stats.published,
            ingress_popped = stats.ingress_popped,
            dropped = stats.dropped,
            "event bus stats"
        );
        for (topic, count) in &stats.routed {
            tracing::info!(topic = %topic, routed = count, "topic stats");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.stop();
    }
}

fn reactor_loop(
    rx: Receiver<IngressMsg>,
    registry: Arc<Mutex<Registry>>,
    counters: Arc<Counters>,
    overflow: OverflowPolicy,
) {
    loop {
        match rx.recv() {
            Ok(IngressMsg::Event(ev)) => route(&registry, &counters, overflow, &ev),
            Ok(IngressMsg::Unsubscribe { id, reply }) => retire(&registry, id, reply),
            Ok(IngressMsg::Shutdown) | Err(_) => break,
        }
    }
    // Shutdown observed. Anything still in ingress was accepted before (or
    // while) stop() ran; route it rather than lose it.
    while let Ok(msg) = rx.try_recv() {
        match msg {
            IngressMsg::Event(ev) => route(&registry, &counters, overflow, &ev),
            IngressMsg::Unsubscribe { id, reply } => retire(&registry, id, reply),
            IngressMsg::Shutdown => {}
        }
    }
}

fn route(
    registry: &Mutex<Registry>,
    counters: &Counters,
    overflow: OverflowPolicy,
    ev: &Event,
) {
    counters.ingress_popped.fetch_add(1, Ordering::Relaxed);
    counters.routed[ev.header.topic as usize].fetch_add(1, Ordering::Relaxed);

    let reg = registry.lock();
    for slot in reg.by_topic.values() {
        if slot.topic == Some(ev.header.topic) {
            deliver(slot, ev, overflow, counters);
        }
    }
    for slot in reg.all.values() {
        deliver(slot, ev, overflow, counters);
    }
}

fn deliver(slot: &SubSlot, ev: &Event, overflow: OverflowPolicy, counters: &Counters) {
    match overflow {
        OverflowPolicy::Block => {
            let _ = slot.tx.send(Delivery::Event(ev.clone()));
        }
        OverflowPolicy::DropNewest => {
            if let Err(TrySendError::Full(_)) = slot.tx.try_send(Delivery::Event(ev.clone())) {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

fn retire(registry: &Mutex<Registry>, id: SubId, reply: Sender<Option<SubSlot>>) {
    let slot = registry.lock().remove(id);
    if let Some(slot) = &slot {
        // Blocking send: the wake-up must arrive even under DropNewest.
        let _ = slot.tx.send(Delivery::Shutdown);
    }
    let _ = reply.send(slot);
}

fn worker_loop(id: SubId, rx: Receiver<Delivery>, mut cb: Callback) {
    loop {
        match rx.recv() {
            Ok(Delivery::Event(ev)) => invoke(id, &mut cb, &ev),
            Ok(Delivery::Shutdown) | Err(_) => break,
        }
    }
    // Deliver everything routed before the subscription was removed.
    while let Ok(Delivery::Event(ev)) = rx.try_recv() {
        invoke(id, &mut cb, &ev);
    }
}

fn invoke(id: SubId, cb: &mut Callback, ev: &Event) {
    if catch_unwind(AssertUnwindSafe(|| cb(ev))).is_err() {
        tracing::error!(
            sub_id = id,
            seq = ev.header.seq,
            topic = %ev.header.topic,
            "subscriber callback panicked; subscription continues"
        );
    }
}
