//! Lifecycle hooks.

use async_trait::async_trait;
use optx_ledger::TradeEvent;

use crate::position::Position;

/// Side effects run after a lifecycle transition is committed to the
/// ledger: notifications, reporting, downstream bookkeeping.
///
/// Hooks run after the ledger write, so the transition is already
/// durable. A hook failure is logged by the manager and never unwinds
/// position state.
#[async_trait]
pub trait PositionHooks: Send + Sync {
    async fn on_position_opened(
        &self,
        position: &Position,
        event: &TradeEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let _ = (position, event);
        Ok(())
    }

    async fn on_position_added(
        &self,
        position: &Position,
        event: &TradeEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let _ = (position, event);
        Ok(())
    }

    async fn on_position_trimmed(
        &self,
        position: &Position,
        event: &TradeEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let _ = (position, event);
        Ok(())
    }

    async fn on_position_closed(
        &self,
        position: &Position,
        event: &TradeEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let _ = (position, event);
        Ok(())
    }
}
