//! Rebuild open positions from the trade ledger after a restart.

use chrono::NaiveDate;
use optx_ledger::{CorrelationStore, EventKind, TradeLedger};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

use crate::error::PositionResult;
use crate::position::{Position, PositionStatus};

/// A position reconstructed from the ledger, with the notification
/// message id it was correlated to, when one exists.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredPosition {
    pub position: Position,
    pub message_id: Option<u64>,
}

/// Replay the given day's trade events in write order and return the
/// positions still open at the end.
///
/// Every event carries the position's post-transition state, so
/// replay is a matter of applying each event's snapshot in order.
/// Closed positions are never resurrected. Events for positions whose
/// open predates the replayed day still apply; the snapshot is
/// self-contained.
pub fn recover_positions(
    ledger: &TradeLedger,
    day: NaiveDate,
    correlation: &CorrelationStore,
) -> PositionResult<Vec<RecoveredPosition>> {
    let mut positions: HashMap<String, Position> = HashMap::new();

    for event in ledger.read_events()? {
        if event.ts.date_naive() != day {
            continue;
        }

        let position = positions
            .entry(event.position_id.clone())
            .or_insert_with(|| Position {
                id: event.position_id.clone(),
                contract: event.contract(),
                quantity_open: 0,
                avg_entry: None,
                realized_pnl: Decimal::ZERO,
                status: PositionStatus::Open,
                strategy_tag: event.strategy_tag.clone(),
                opened_at: event.ts,
                order_ids: Vec::new(),
            });

        position.quantity_open = event.quantity_open;
        position.avg_entry = event.avg_entry;
        position.realized_pnl = event.realized_pnl.unwrap_or(Decimal::ZERO);
        position.status = PositionStatus::from_wire(&event.position_status);
        if event.event == EventKind::Open {
            position.opened_at = event.ts;
        }
        if let Some(order_id) = event.order_id {
            position.order_ids.push(order_id);
        }
    }

    let mut recovered: Vec<RecoveredPosition> = positions
        .into_values()
        .filter(|p| !p.is_closed() && p.quantity_open > 0)
        .map(|position| {
            let message_id = correlation.get(&position.id);
            RecoveredPosition {
                position,
                message_id,
            }
        })
        .collect();
    recovered.sort_by(|a, b| a.position.opened_at.cmp(&b.position.opened_at));

    info!(count = recovered.len(), day = %day, "Recovered open positions from ledger");
    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use optx_core::{OptionKind, Price};
    use optx_ledger::TradeEvent;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 6, hour, minute, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 6).unwrap()
    }

    #[allow(clippy::too_many_arguments)]
    fn event(
        ts: DateTime<Utc>,
        kind: EventKind,
        position_id: &str,
        order_id: &str,
        quantity_open: u32,
        avg_entry: Decimal,
        realized: Decimal,
        status: &str,
    ) -> TradeEvent {
        TradeEvent {
            ts,
            event: kind,
            position_id: position_id.to_string(),
            order_id: Some(order_id.to_string()),
            order_status: Some("filled".to_string()),
            symbol: "SPY".to_string(),
            kind: OptionKind::Call,
            strike: Price::new(dec!(520)),
            expiration: day(),
            contract_key: "SPY-call-520-20260106".to_string(),
            strategy_tag: Some("flag_zone".to_string()),
            quantity: Some(1),
            fill_price: Some(Price::new(dec!(1.20))),
            total_value: None,
            avg_entry: Some(Price::new(avg_entry)),
            quantity_open,
            position_status: status.to_string(),
            realized_pnl: Some(realized),
            reason: None,
            timeframe: None,
        }
    }

    fn stores() -> (TempDir, TradeLedger, CorrelationStore) {
        let dir = TempDir::new().unwrap();
        let ledger = TradeLedger::new(dir.path().join("trades.jsonl")).unwrap();
        let correlation = CorrelationStore::load(dir.path().join("message_ids.json"));
        (dir, ledger, correlation)
    }

    #[test]
    fn test_replay_rebuilds_open_position_state() {
        let (_dir, ledger, correlation) = stores();
        correlation.set("pos-a", 42).unwrap();

        ledger
            .record_trade_event(&event(
                ts(14, 0),
                EventKind::Open,
                "pos-a",
                "o1",
                2,
                dec!(1.20),
                Decimal::ZERO,
                "open",
            ))
            .unwrap();
        ledger
            .record_trade_event(&event(
                ts(14, 5),
                EventKind::Add,
                "pos-a",
                "o2",
                3,
                dec!(1.2333),
                Decimal::ZERO,
                "open",
            ))
            .unwrap();
        ledger
            .record_trade_event(&event(
                ts(14, 10),
                EventKind::Trim,
                "pos-a",
                "o3",
                2,
                dec!(1.2333),
                dec!(0.2667),
                "partially_closed",
            ))
            .unwrap();

        let recovered = recover_positions(&ledger, day(), &correlation).unwrap();
        assert_eq!(recovered.len(), 1);

        let entry = &recovered[0];
        assert_eq!(entry.position.id, "pos-a");
        assert_eq!(entry.position.quantity_open, 2);
        assert_eq!(entry.position.avg_entry, Some(Price::new(dec!(1.2333))));
        assert_eq!(entry.position.realized_pnl, dec!(0.2667));
        assert_eq!(entry.position.status, PositionStatus::PartiallyClosed);
        assert_eq!(entry.position.order_ids, vec!["o1", "o2", "o3"]);
        assert_eq!(entry.message_id, Some(42));
    }

    #[test]
    fn test_closed_positions_are_not_resurrected() {
        let (_dir, ledger, correlation) = stores();

        ledger
            .record_trade_event(&event(
                ts(14, 0),
                EventKind::Open,
                "pos-a",
                "o1",
                1,
                dec!(1.20),
                Decimal::ZERO,
                "open",
            ))
            .unwrap();
        ledger
            .record_trade_event(&event(
                ts(15, 0),
                EventKind::Close,
                "pos-a",
                "o2",
                0,
                dec!(1.20),
                dec!(0.30),
                "closed",
            ))
            .unwrap();

        let recovered = recover_positions(&ledger, day(), &correlation).unwrap();
        assert!(recovered.is_empty());
    }

    #[test]
    fn test_other_days_are_ignored() {
        let (_dir, ledger, correlation) = stores();

        let mut stale = event(
            ts(14, 0),
            EventKind::Open,
            "pos-old",
            "o1",
            1,
            dec!(1.20),
            Decimal::ZERO,
            "open",
        );
        stale.ts = Utc.with_ymd_and_hms(2026, 1, 5, 14, 0, 0).unwrap();
        ledger.record_trade_event(&stale).unwrap();
        ledger
            .record_trade_event(&event(
                ts(14, 0),
                EventKind::Open,
                "pos-new",
                "o2",
                1,
                dec!(1.10),
                Decimal::ZERO,
                "open",
            ))
            .unwrap();

        let recovered = recover_positions(&ledger, day(), &correlation).unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].position.id, "pos-new");
        assert_eq!(recovered[0].message_id, None);
    }

    #[test]
    fn test_recovered_ordering_follows_open_time() {
        let (_dir, ledger, correlation) = stores();

        ledger
            .record_trade_event(&event(
                ts(14, 0),
                EventKind::Open,
                "pos-first",
                "o1",
                1,
                dec!(1.20),
                Decimal::ZERO,
                "open",
            ))
            .unwrap();
        ledger
            .record_trade_event(&event(
                ts(14, 30),
                EventKind::Open,
                "pos-second",
                "o2",
                1,
                dec!(1.40),
                Decimal::ZERO,
                "open",
            ))
            .unwrap();

        let recovered = recover_positions(&ledger, day(), &correlation).unwrap();
        let ids: Vec<&str> = recovered.iter().map(|r| r.position.id.as_str()).collect();
        assert_eq!(ids, vec!["pos-first", "pos-second"]);
    }
}
