use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::error::EngineError;

/// Position direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Side {
    #[default]
    #[strum(serialize = "LONG")]
    Long,
    #[strum(serialize = "SHORT")]
    Short,
}

/// Why a position was closed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum ExitReason {
    #[default]
    #[strum(serialize = "NONE")]
    None,
    #[strum(serialize = "THRESHOLD")]
    Threshold,
    #[strum(serialize = "STOPLOSS")]
    StopLoss,
    #[strum(serialize = "TAKEPROFIT")]
    TakeProfit,
    #[strum(serialize = "CLOSEOUT")]
    CloseOut,
}

/// One completed round trip.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub entry_ts_ns: u64,
    pub exit_ts_ns: u64,
    pub exit_reason: ExitReason,
}

/// The single open position (flat when `open` is false).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub open: bool,
    pub side: Side,
    pub qty: i64,
    pub entry_pq: f64,
    pub entry_ts_ns: u64,
}

/// Trade ledger with realized/unrealized PnL, equity and drawdown
/// bookkeeping. Single-position: one open position at a time.
///
/// Not internally synchronized; strategies running callbacks on several
/// worker threads share it as [`SharedAccount`].
#[derive(Clone, Debug)]
pub struct Account {
    starting_cash: f64,
    realized_pnl: f64,
    equity: f64,
    peak_equity: f64,
    max_drawdown: f64,
    pos: Position,
    trades: Vec<Trade>,
}

/// An account shared across strategy callbacks.
pub type SharedAccount = Arc<Mutex<Account>>;

pub fn shared_account(starting_cash: f64) -> SharedAccount {
    Arc::new(Mutex::new(Account::new(starting_cash)))
}

impl Default for Account {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Account {
    pub fn new(starting_cash: f64) -> Self {
        Self {
            starting_cash,
            realized_pnl: 0.0,
            equity: starting_cash,
            peak_equity: starting_cash,
            max_drawdown: 0.0,
            pos: Position::default(),
            trades: Vec::new(),
        }
    }

    pub fn has_open_position(&self) -> bool {
        self.pos.open
    }

    pub fn position(&self) -> &Position {
        &self.pos
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    /// Open a long position. Ignored (with a warning) if one is already
    /// open.
    pub fn open_long(&mut self, symbol: impl Into<String>, qty: i64, pq: f64, ts_ns: u64) {
        if self.pos.open {
            tracing::warn!("open_long: position already open, ignoring");
            return;
        }
        let symbol = symbol.into();
        self.pos = Position {
            symbol: symbol.clone(),
            open: true,
            side: Side::Long,
            qty,
            entry_pq: pq,
            entry_ts_ns: ts_ns,
        };
        tracing::info!(symbol = %symbol, qty, pq, "open LONG");
    }

    /// Close the open position at `pq`, record the trade and refresh
    /// equity at the exit price (so a close at a new extremum is reflected
    /// in peak/drawdown immediately). Ignored if flat.
    pub fn close_position(&mut self, pq: f64, ts_ns: u64, reason: ExitReason) {
        if !self.pos.open {
            tracing::warn!("close_position: no open position, ignoring");
            return;
        }
        let signed_qty = self.pos.qty as f64 * if self.pos.side == Side::Long { 1.0 } else { -1.0 };
        let trade_pnl = signed_qty * (pq - self.pos.entry_pq);

        let trade = Trade {
            symbol: self.pos.symbol.clone(),
            side: self.pos.side,
            qty: self.pos.qty,
            entry_price: self.pos.entry_pq,
            exit_price: pq,
            pnl: trade_pnl,
            entry_ts_ns: self.pos.entry_ts_ns,
            exit_ts_ns: ts_ns,
            exit_reason: reason,
        };
        tracing::info!(
            symbol = %trade.symbol,
            side = %trade.side,
            qty = trade.qty,
            entry = trade.entry_price,
            exit = trade.exit_price,
            pnl = trade.pnl,
            reason = %trade.exit_reason,
            "close position"
        );

        self.realized_pnl += trade_pnl;
        self.trades.push(trade);
        self.pos = Position::default();
        self.update_equity(pq);
    }

    /// Mark-to-market PnL of the open position at `last_pq` (zero when
    /// flat).
    pub fn unrealized_pnl(&self, last_pq: f64) -> f64 {
        if !self.pos.open {
            return 0.0;
        }
        let signed_qty = self.pos.qty as f64 * if self.pos.side == Side::Long { 1.0 } else { -1.0 };
        (last_pq - self.pos.entry_pq) * signed_qty
    }

    /// Refresh equity at `last_pq` and fold it into peak/drawdown.
    pub fn update_equity(&mut self, last_pq: f64) {
        self.equity = self.starting_cash + self.realized_pnl + self.unrealized_pnl(last_pq);
        if self.equity > self.peak_equity {
            self.peak_equity = self.equity;
        } else {
            let dd = self.peak_equity - self.equity;
            if dd > self.max_drawdown {
                self.max_drawdown = dd;
            }
        }
    }

    /// Multi-line human summary with a win/loss breakdown.
    pub fn summary(&self) -> String {
        use std::fmt::Write as _;

        let mut s = String::new();
        let _ = writeln!(s, "==== Account Summary ====");
        let _ = writeln!(s, "  starting_cash    = {}", self.starting_cash);
        let _ = writeln!(s, "  realized_pnl     = {}", self.realized_pnl);
        let _ = writeln!(s, "  equity           = {}", self.equity);
        let _ = writeln!(s, "  max_drawdown     = {}", self.max_drawdown);
        let _ = writeln!(s, "  trades           = {}", self.trades.len());

        if !self.trades.is_empty() {
            let mut wins = 0usize;
            let mut losses = 0usize;
            let mut sum_win = 0.0;
            let mut sum_loss = 0.0;
            let mut best = f64::MIN;
            let mut worst = f64::MAX;
            for trade in &self.trades {
                if trade.pnl > 0.0 {
                    wins += 1;
                    sum_win += trade.pnl;
                } else if trade.pnl < 0.0 {
                    losses += 1;
                    sum_loss += trade.pnl;
                }
                best = best.max(trade.pnl);
                worst = worst.min(trade.pnl);
            }
            let n = self.trades.len();
            let win_rate = wins as f64 / n as f64 * 100.0;
            let avg_win = if wins > 0 { sum_win / wins as f64 } else { 0.0 };
            let avg_loss = if losses > 0 { sum_loss / losses as f64 } else { 0.0 };
            let _ = writeln!(s, "  wins             = {wins} ({win_rate:.2}%)");
            let _ = writeln!(s, "  losses           = {losses}");
            let _ = writeln!(s, "  avg_win          = {avg_win}");
            let _ = writeln!(s, "  avg_loss         = {avg_loss}");
            let _ = writeln!(s, "  best_trade       = {best}");
            let _ = writeln!(s, "  worst_trade      = {worst}");
        }
        let _ = write!(s, "=========================");
        s
    }

    pub fn print_summary(&self) {
        println!("{}", self.summary());
    }

    /// Write the trade ledger as CSV.
    pub fn dump_trades_csv(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "failed to open trades csv");
            e
        })?;
        let mut out = BufWriter::new(file);
        writeln!(
            out,
            "symbol,side,qty,entry_price,exit_price,entry_ts_ns,exit_ts_ns,pnl,exit_reason"
        )?;
        for t in &self.trades {
            writeln!(
                out,
                "{},{},{},{},{},{},{},{},{}",
                t.symbol,
                t.side,
                t.qty,
                t.entry_price,
                t.exit_price,
                t.entry_ts_ns,
                t.exit_ts_ns,
                t.pnl,
                t.exit_reason
            )?;
        }
        out.flush()?;
        tracing::info!(trades = self.trades.len(), path = %path.display(), "dumped trades");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_realizes_pnl() {
        let mut acct = Account::new(1000.0);
        assert!(!acct.has_open_position());

        acct.open_long("NIFTY", 2, 100.0, 10);
        assert!(acct.has_open_position());
        assert_eq!(acct.unrealized_pnl(105.0), 10.0);

        acct.close_position(110.0, 20, ExitReason::TakeProfit);
        assert!(!acct.has_open_position());
        assert_eq!(acct.realized_pnl(), 20.0);
        assert_eq!(acct.equity(), 1020.0);

        let trades = acct.trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].pnl, 20.0);
        assert_eq!(trades[0].exit_reason, ExitReason::TakeProfit);
    }

    #[test]
    fn double_open_and_empty_close_are_ignored() {
        let mut acct = Account::new(0.0);
        acct.close_position(5.0, 1, ExitReason::Threshold);
        assert!(acct.trades().is_empty());

        acct.open_long("X", 1, 10.0, 1);
        acct.open_long("Y", 1, 11.0, 2);
        assert_eq!(acct.position().symbol, "X");
    }

    #[test]
    fn drawdown_reflects_losing_close_without_followup_update() {
        let mut acct = Account::new(100.0);
        acct.open_long("X", 1, 50.0, 1);
        acct.update_equity(60.0); // peak 110
        acct.close_position(40.0, 2, ExitReason::StopLoss); // equity 90
        assert_eq!(acct.max_drawdown(), 20.0);
    }

    #[test]
    fn csv_dump_has_header_and_rows() {
        let mut acct = Account::new(0.0);
        acct.open_long("NIFTY", 1, 100.0, 1);
        acct.close_position(101.0, 2, ExitReason::Threshold);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        acct.dump_trades_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("symbol,side,qty"));
        assert!(lines[1].contains("NIFTY,LONG,1,100,101"));
        assert!(lines[1].ends_with("THRESHOLD"));
    }

    #[test]
    fn summary_mentions_trades() {
        let mut acct = Account::new(0.0);
        acct.open_long("X", 1, 1.0, 1);
        acct.close_position(2.0, 2, ExitReason::CloseOut);
        let summary = acct.summary();
        assert!(summary.contains("trades           = 1"));
        assert!(summary.contains("wins             = 1"));
    }
}
