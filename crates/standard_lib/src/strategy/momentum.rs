use crate::market_data::base_data::{Bar, Event, Tick};
use crate::strategy::accounting::{ExitReason, SharedAccount};
use crate::strategy::bar_window::BarWindow;
use crate::strategy::Strategy;

/// Bar-based momentum strategy for a single symbol.
///
/// Keeps a rolling window of N bars. With no position: enter long when the
/// window momentum exceeds the threshold. With a position: exit once
/// momentum stalls (`<= 0`). Call [`finalize`](Self::finalize) at the end
/// of a run to close out at the last seen close.
pub struct BarMomentumStrategy {
    account: SharedAccount,
    symbol: String,
    window: BarWindow,
    momentum_threshold: f64,
    qty: i64,
    last_close: f64,
    last_ts_ns: u64,
}

impl BarMomentumStrategy {
    pub fn new(
        account: SharedAccount,
        symbol: impl Into<String>,
        window_size: usize,
        momentum_threshold: f64,
        qty: i64,
    ) -> Self {
        Self {
            account,
            symbol: symbol.into(),
            window: BarWindow::new(window_size),
            momentum_threshold,
            qty,
            last_close: 0.0,
            last_ts_ns: 0,
        }
    }

    /// Close any open position at the last observed close.
    pub fn finalize(&mut self) {
        let mut account = self.account.lock();
        if account.has_open_position() && self.last_ts_ns != 0 {
            tracing::info!(
                symbol = %account.position().symbol,
                pq = self.last_close,
                "final close-out"
            );
            account.close_position(self.last_close, self.last_ts_ns, ExitReason::CloseOut);
        }
    }
}

impl Strategy for BarMomentumStrategy {
    // Tick-level data is ignored; this strategy trades off bars.
    fn on_tick(&mut self, _tick: &Tick, _event: &Event) {}

    fn on_bar(&mut self, bar: &Bar, event: &Event) {
        if bar.symbol != self.symbol {
            return;
        }
        self.last_close = bar.close;
        self.last_ts_ns = event.header.ts_ns;
        self.window.push(bar.clone());
        if !self.window.full() {
            return;
        }
        let momentum = self.window.momentum();
        tracing::debug!(
            symbol = %bar.symbol,
            close = bar.close,
            momentum,
            seq = event.header.seq,
            "momentum bar"
        );

        let mut account = self.account.lock();
        if !account.has_open_position() {
            if momentum > self.momentum_threshold {
                account.open_long(self.symbol.clone(), self.qty, bar.close, event.header.ts_ns);
                tracing::info!(
                    symbol = %self.symbol,
                    close = bar.close,
                    momentum,
                    threshold = self.momentum_threshold,
                    "enter long"
                );
            }
            return;
        }

        if momentum <= 0.0 {
            tracing::info!(symbol = %self.symbol, close = bar.close, momentum, "exit long");
            account.close_position(bar.close, event.header.ts_ns, ExitReason::Threshold);
        }
    }
}
