//! Append-only JSONL trade ledger.

use chrono::NaiveDate;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::LedgerResult;
use crate::event::{EventKind, TradeEvent};

/// Append-only trade record, one JSON object per line.
///
/// There is deliberately no update or delete API. Physical writes are
/// serialized by a mutex and flushed before `record_trade_event`
/// returns, so a caller that has seen `Ok` knows the line is on disk.
pub struct TradeLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TradeLedger {
    pub fn new(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event and flush it to disk.
    pub fn record_trade_event(&self, event: &TradeEvent) -> LedgerResult<()> {
        let line = serde_json::to_string(event)?;
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }

    /// All events in write order. Blank and corrupt lines are skipped
    /// with a warning rather than failing the whole read.
    pub fn read_events(&self) -> LedgerResult<Vec<TradeEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<TradeEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => warn!(line = index + 1, error = %e, "Skipping corrupt ledger line"),
            }
        }
        Ok(events)
    }

    /// Sum of realized P&L locked in on the given day.
    ///
    /// Only `close` events count; trims report running realized P&L
    /// but the close event carries the position's final figure.
    pub fn sum_realized_pnl_for_day(&self, day: NaiveDate) -> LedgerResult<Decimal> {
        let mut total = Decimal::ZERO;
        for event in self.read_events()? {
            if event.event != EventKind::Close {
                continue;
            }
            if event.ts.date_naive() != day {
                continue;
            }
            if let Some(realized) = event.realized_pnl {
                total += realized;
            }
        }
        Ok(total)
    }
}
