//! Stock order endpoints
//!
//! Payloads are passed through as given; the server validates them.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use crate::client::RestClient;
use crate::response::ApiResponse;

/// New stock order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockOrderRequest {
    pub portfolio_number: u64,
    pub equity_code: String,
    pub quantity: u64,
    /// Order side as accepted by the API (e.g. `BUY`, `SELL`)
    pub direction: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub order_method: String,
    pub order_duration: String,
    pub market_risk_approval: bool,
}

/// Filter for the stock order list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockOrderListQuery {
    pub portfolio_number: u64,
    pub order_status: i32,
    pub order_direction: i32,
    pub order_method: i32,
    pub order_duration: i32,
    pub equity_code: String,
    pub equity_type: i32,
    pub page_number: u32,
    pub descending_order: bool,
}

/// Filter for stock positions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockPositionsQuery {
    pub portfolio_number: u64,
    pub equity_code: String,
    pub equity_type: i32,
    #[serde(rename = "withOutDepot")]
    pub without_depot: bool,
    #[serde(rename = "withOutT1Qty")]
    pub without_t1_qty: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplaceOrder<'a> {
    portfolio_number: u64,
    order_ref: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    quantity: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderRef<'a> {
    pub portfolio_number: u64,
    pub order_ref: &'a str,
}

/// Stock order endpoints
pub struct StockEndpoints<'a> {
    client: &'a RestClient,
}

impl<'a> StockEndpoints<'a> {
    pub fn new(client: &'a RestClient) -> Self {
        Self { client }
    }

    /// Place a stock order
    #[instrument(skip(self, order), fields(equity = %order.equity_code, direction = %order.direction))]
    pub async fn create_order(&self, order: &StockOrderRequest) -> ApiResponse {
        self.client.post("Stock/StockCreateOrder", order, true).await
    }

    /// Change price and quantity of an open order
    #[instrument(skip(self))]
    pub async fn replace_order(
        &self,
        portfolio_number: u64,
        order_ref: &str,
        price: Decimal,
        quantity: u64,
    ) -> ApiResponse {
        let payload = ReplaceOrder {
            portfolio_number,
            order_ref,
            price,
            quantity,
        };
        self.client.post("Stock/StockReplaceOrder", &payload, true).await
    }

    /// Cancel an open order
    #[instrument(skip(self))]
    pub async fn delete_order(&self, portfolio_number: u64, order_ref: &str) -> ApiResponse {
        let payload = OrderRef {
            portfolio_number,
            order_ref,
        };
        self.client.post("Stock/StockDeleteOrder", &payload, true).await
    }

    /// List orders matching a filter
    #[instrument(skip(self, query))]
    pub async fn order_list(&self, query: &StockOrderListQuery) -> ApiResponse {
        self.client.post("Stock/StockOrderList", query, true).await
    }

    /// List positions matching a filter
    #[instrument(skip(self, query))]
    pub async fn positions(&self, query: &StockPositionsQuery) -> ApiResponse {
        self.client.post("Stock/StockPositions", query, true).await
    }
}
