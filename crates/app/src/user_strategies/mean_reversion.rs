use std::collections::VecDeque;

use standard_lib::market_data::base_data::{Event, Tick};
use standard_lib::strategy::accounting::{ExitReason, SharedAccount};
use standard_lib::strategy::Strategy;

/// Mean-reversion strategy over a rolling price window.
///
/// Enters long when price dips more than `band` below the rolling mean,
/// exits once it reverts to (or above) the mean.
pub struct MeanReversionTradingStrategy {
    account: SharedAccount,
    window: usize,
    band: f64,
    qty: i64,
    prices: VecDeque<f64>,
    last_pq: f64,
    last_ts_ns: u64,
}

impl MeanReversionTradingStrategy {
    pub fn new(account: SharedAccount, window: usize, band: f64, qty: i64) -> Self {
        Self {
            account,
            window,
            band,
            qty,
            prices: VecDeque::with_capacity(window),
            last_pq: 0.0,
            last_ts_ns: 0,
        }
    }

    /// Close any open position at the last seen price.
    pub fn finalize(&mut self) {
        let mut account = self.account.lock();
        if account.has_open_position() && self.last_pq > 0.0 {
            tracing::info!(pq = self.last_pq, "mean-reversion close-out");
            account.close_position(self.last_pq, self.last_ts_ns, ExitReason::CloseOut);
        }
        if self.last_pq > 0.0 {
            account.update_equity(self.last_pq);
        }
    }
}

impl Strategy for MeanReversionTradingStrategy {
    fn on_tick(&mut self, tick: &Tick, event: &Event) {
        let pq = tick.pq;
        self.last_pq = pq;
        self.last_ts_ns = event.header.ts_ns;

        let mut account = self.account.lock();
        account.update_equity(pq);

        self.prices.push_back(pq);
        if self.prices.len() > self.window {
            self.prices.pop_front();
        }
        if self.prices.len() < self.window {
            return;
        }

        let avg: f64 = self.prices.iter().sum::<f64>() / self.prices.len() as f64;
        let diff = pq - avg;

        if !account.has_open_position() {
            if diff < -self.band {
                account.open_long(tick.symbol.clone(), self.qty, pq, event.header.ts_ns);
                tracing::info!(symbol = %tick.symbol, pq, avg, diff, "mean-reversion entry");
            }
            return;
        }

        if diff >= 0.0 {
            tracing::info!(pq, avg, diff, "mean-reversion exit");
            account.close_position(pq, event.header.ts_ns, ExitReason::Threshold);
        }
    }
}
