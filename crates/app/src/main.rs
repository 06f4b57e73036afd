mod user_strategies;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use standard_lib::engine_core::timer::spawn_heartbeat;
use standard_lib::market_data::consolidators::BarBuilder;
use standard_lib::record::EventRecorder;
use standard_lib::replay::{EventReplay, ReplayFilter};
use standard_lib::strategy::accounting::shared_account;
use standard_lib::strategy::multi::MultiStrategy;
use standard_lib::strategy::runner::StrategyRunner;
use standard_lib::strategy::{shared, StrategyMode};
use standard_lib::{Event, EventBus, Topic};

use user_strategies::mean_reversion::MeanReversionTradingStrategy;
use user_strategies::threshold::TradingThresholdStrategy;

const SESSION_LOG: &str = "logs/md_events.log";

/// ------------------------------
/// main: record a session, replay it through two strategies
/// ------------------------------
fn main() -> anyhow::Result<()> {
    standard_lib::logging::init();

    record_session()?;
    backtest_session()?;
    Ok(())
}

/// Phase 1: publish a synthetic NIFTY session and tape it to disk.
fn record_session() -> anyhow::Result<()> {
    let bus = Arc::new(EventBus::with_capacity(1024, 1024));
    let recorder = Arc::new(EventRecorder::create(SESSION_LOG)?);
    let recorder_sub = recorder.subscribe(&bus);

    let mut heartbeat = spawn_heartbeat(bus.clone(), Duration::from_millis(200));

    // Triangle wave around the threshold strategy's entry level so the
    // backtest has something to trade.
    for i in 0u32..60 {
        let phase = i % 20;
        let delta = if phase < 10 { phase } else { 20 - phase };
        let pq = 22498.0 + f64::from(delta);
        bus.publish(Event::tick("NIFTY", pq, 100 + i % 5));
        if i % 10 == 0 {
            bus.publish(Event::log_text(format!("published {i} ticks")));
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    heartbeat.stop();
    bus.unsubscribe(recorder_sub);
    recorder.flush();
    recorder.close();
    bus.stop();
    bus.log_stats();
    Ok(())
}

/// Phase 2: replay the tape through a bar builder and two tick strategies.
fn backtest_session() -> anyhow::Result<()> {
    let bus = Arc::new(EventBus::with_capacity(1024, 1024));

    let account_threshold = shared_account(0.0);
    let account_mr = shared_account(0.0);

    let threshold = Arc::new(Mutex::new(TradingThresholdStrategy::new(
        account_threshold.clone(),
        22502.0,
        1,
        -20.0,
        40.0,
    )));
    let mean_reversion = Arc::new(Mutex::new(MeanReversionTradingStrategy::new(
        account_mr.clone(),
        5,
        2.0,
        1,
    )));

    let mut multi = MultiStrategy::new();
    multi.add_strategy(threshold.clone(), StrategyMode::TickOnly);
    multi.add_strategy(mean_reversion.clone(), StrategyMode::TickOnly);

    let builder = BarBuilder::new(bus.clone());

    {
        let _runner = StrategyRunner::new(bus.clone(), shared(multi), StrategyMode::Mixed);

        let mut replay = EventReplay::new(SESSION_LOG);
        replay.set_filter(ReplayFilter {
            topic: Some(Topic::MdTick),
            symbol: Some("NIFTY".into()),
            ..Default::default()
        });
        let stats = replay.replay_speed(&bus, 20.0)?;
        tracing::info!(published = stats.published, "replay done");

        std::thread::sleep(Duration::from_millis(200));
    } // runner drops here: strategies have seen every replayed event

    threshold.lock().finalize();
    mean_reversion.lock().finalize();

    println!("\n=== Strategy 1 (Threshold) ===");
    account_threshold.lock().print_summary();
    account_threshold.lock().dump_trades_csv("logs/trades_threshold.csv")?;

    println!("\n=== Strategy 2 (Mean Reversion) ===");
    account_mr.lock().print_summary();
    account_mr.lock().dump_trades_csv("logs/trades_mean_reversion.csv")?;

    drop(builder);
    bus.stop();
    bus.log_stats();
    Ok(())
}
