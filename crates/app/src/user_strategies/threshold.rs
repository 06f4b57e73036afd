use standard_lib::market_data::base_data::{Event, Tick};
use standard_lib::strategy::accounting::{ExitReason, SharedAccount};
use standard_lib::strategy::Strategy;

/// Tick-level breakout strategy with bracket exits.
///
/// Enters long when price crosses above the threshold, then exits on stop
/// loss, take profit, or a fall back below the threshold.
pub struct TradingThresholdStrategy {
    account: SharedAccount,
    threshold: f64,
    qty: i64,
    sl_offset: f64,
    tp_offset: f64,
    sl_level: f64,
    tp_level: f64,
    last_pq: f64,
    last_ts_ns: u64,
}

impl TradingThresholdStrategy {
    /// `sl_offset` should be negative, `tp_offset` positive; both are
    /// relative to the entry price.
    pub fn new(
        account: SharedAccount,
        threshold: f64,
        qty: i64,
        sl_offset: f64,
        tp_offset: f64,
    ) -> Self {
        Self {
            account,
            threshold,
            qty,
            sl_offset,
            tp_offset,
            sl_level: 0.0,
            tp_level: 0.0,
            last_pq: 0.0,
            last_ts_ns: 0,
        }
    }

    /// Close any open position at the last seen price.
    pub fn finalize(&mut self) {
        let mut account = self.account.lock();
        if account.has_open_position() && self.last_pq > 0.0 {
            tracing::info!(pq = self.last_pq, "threshold strategy close-out");
            account.close_position(self.last_pq, self.last_ts_ns, ExitReason::CloseOut);
        }
        if self.last_pq > 0.0 {
            account.update_equity(self.last_pq);
        }
    }
}

impl Strategy for TradingThresholdStrategy {
    fn on_tick(&mut self, tick: &Tick, event: &Event) {
        let pq = tick.pq;
        self.last_pq = pq;
        self.last_ts_ns = event.header.ts_ns;

        let mut account = self.account.lock();
        account.update_equity(pq);

        if !account.has_open_position() {
            if pq > self.threshold {
                account.open_long(tick.symbol.clone(), self.qty, pq, event.header.ts_ns);
                self.sl_level = pq + self.sl_offset;
                self.tp_level = pq + self.tp_offset;
                tracing::info!(
                    symbol = %tick.symbol,
                    pq,
                    threshold = self.threshold,
                    sl = self.sl_level,
                    tp = self.tp_level,
                    "threshold entry"
                );
            }
            return;
        }

        if pq <= self.sl_level {
            tracing::info!(pq, sl = self.sl_level, "stop loss exit");
            account.close_position(pq, event.header.ts_ns, ExitReason::StopLoss);
        } else if pq >= self.tp_level {
            tracing::info!(pq, tp = self.tp_level, "take profit exit");
            account.close_position(pq, event.header.ts_ns, ExitReason::TakeProfit);
        } else if pq < self.threshold {
            tracing::info!(pq, threshold = self.threshold, "threshold exit");
            account.close_position(pq, event.header.ts_ns, ExitReason::Threshold);
        }
    }
}
