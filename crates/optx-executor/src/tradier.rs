//! Tradier live executor: REST submit and status polling.
//!
//! Fills happen at the broker; this executor never simulates them.

use async_trait::async_trait;
use chrono::NaiveDate;
use optx_core::{OptionKind, OrderId, OrderRequest, Price};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ExecutorError, ExecutorResult};
use crate::executor::{OrderExecutor, OrderStatus, OrderSubmit, StatusReport};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Executor backed by the Tradier brokerage REST API.
pub struct TradierExecutor {
    client: Client,
    base_url: String,
    account_id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct OrderEnvelope {
    order: Option<RawOrder>,
    errors: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    id: Option<Value>,
    status: Option<String>,
    avg_fill_price: Option<Value>,
    quantity: Option<Value>,
}

impl TradierExecutor {
    pub fn new(
        base_url: impl Into<String>,
        account_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> ExecutorResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ExecutorError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            account_id: account_id.into(),
            access_token: access_token.into(),
        })
    }

    fn orders_url(&self) -> String {
        format!("{}/accounts/{}/orders", self.base_url, self.account_id)
    }
}

#[async_trait]
impl OrderExecutor for TradierExecutor {
    async fn submit_option_order(&self, request: &OrderRequest) -> ExecutorResult<OrderSubmit> {
        request.validate()?;

        let option_symbol = occ_symbol(
            &request.symbol,
            request.kind,
            request.strike,
            request.expiration,
        );
        let quantity = request.quantity.to_string();
        let order_type = request.order_type.to_string();
        let mut form: Vec<(&str, &str)> = vec![
            ("class", "option"),
            ("symbol", &request.symbol),
            ("side", request.side.wire()),
            ("quantity", &quantity),
            ("type", &order_type),
            ("duration", "gtc"),
            ("option_symbol", &option_symbol),
        ];
        let limit;
        if let Some(price) = request.limit_price {
            limit = price.to_string();
            form.push(("price", &limit));
        }

        debug!(option_symbol = %option_symbol, side = request.side.wire(), "Submitting Tradier order");
        let response = self
            .client
            .post(self.orders_url())
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Tradier submit failed");
            return Err(ExecutorError::Http(format!(
                "submit failed {}: {}",
                status, body
            )));
        }

        let envelope: OrderEnvelope = response.json().await?;
        let order = envelope.order.ok_or_else(|| {
            ExecutorError::Broker(format!(
                "submit response missing order: {}",
                envelope.errors.unwrap_or(Value::Null)
            ))
        })?;
        let order_id = order
            .id
            .as_ref()
            .map(value_to_string)
            .ok_or_else(|| ExecutorError::Broker("submit response missing order id".into()))?;
        let status = order
            .status
            .as_deref()
            .map(OrderStatus::from_wire)
            .unwrap_or(OrderStatus::Submitted);

        Ok(OrderSubmit {
            order_id: OrderId::from_string(order_id),
            status,
            fill_price: None,
            filled_quantity: None,
            rejection_reason: None,
        })
    }

    async fn get_order_status(&self, order_id: &str) -> ExecutorResult<StatusReport> {
        let url = format!("{}/{}", self.orders_url(), order_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutorError::Http(format!(
                "status failed {}: {}",
                status, body
            )));
        }

        let envelope: OrderEnvelope = response.json().await?;
        let order = envelope
            .order
            .ok_or_else(|| ExecutorError::Broker("status response missing order".into()))?;

        Ok(StatusReport {
            order_id: OrderId::from_string(
                order
                    .id
                    .as_ref()
                    .map(value_to_string)
                    .unwrap_or_else(|| order_id.to_string()),
            ),
            status: order
                .status
                .as_deref()
                .map(OrderStatus::from_wire)
                .unwrap_or(OrderStatus::Submitted),
            avg_fill_price: order.avg_fill_price.as_ref().and_then(value_to_price),
            filled_quantity: order.quantity.as_ref().and_then(value_to_u32),
        })
    }
}

/// OCC option symbol: `{symbol}{yymmdd}{C|P}{strike*1000:08}`, e.g.
/// `SPY260106C00520000`.
pub fn occ_symbol(symbol: &str, kind: OptionKind, strike: Price, expiration: NaiveDate) -> String {
    let flag = match kind {
        OptionKind::Call => 'C',
        OptionKind::Put => 'P',
    };
    let strike_1000 = (strike.inner() * Decimal::from(1000))
        .trunc()
        .to_u64()
        .unwrap_or(0);
    format!(
        "{}{}{}{:08}",
        symbol,
        expiration.format("%y%m%d"),
        flag,
        strike_1000
    )
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_to_price(value: &Value) -> Option<Price> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

fn value_to_u32(value: &Value) -> Option<u32> {
    match value {
        Value::String(s) => s.parse::<f64>().ok().map(|v| v as u32),
        Value::Number(n) => n.as_f64().map(|v| v as u32),
        _ => None,
    }
}
