//! Futures order endpoints

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use crate::client::RestClient;
use crate::endpoints::portfolio::PortfolioRef;
use crate::endpoints::stock::OrderRef;
use crate::response::ApiResponse;

/// New futures order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FutureOrderRequest {
    pub portfolio_number: u64,
    pub contract_code: String,
    pub direction: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u64,
    pub order_method: i32,
    pub order_duration: i32,
    pub after_hour_session_valid: bool,
    /// Expiry date as accepted by the API, empty for none
    pub expiration_date: String,
}

/// Changes to an open futures order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FutureReplaceRequest {
    pub portfolio_number: u64,
    pub order_ref: String,
    pub quantity: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub order_type: i32,
    pub expiration_date: String,
}

/// Filter for the futures order list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FutureOrderListQuery {
    pub portfolio_number: u64,
    pub order_validity_date: String,
    pub contract_code: String,
    pub contract_type: i32,
    pub long_short: i32,
    pub pending_orders: bool,
    pub untransmitted_orders: bool,
    pub partially_executed_orders: bool,
    pub cancelled_orders: bool,
    pub after_hour_session_valid: bool,
}

/// Futures order endpoints
pub struct FutureEndpoints<'a> {
    client: &'a RestClient,
}

impl<'a> FutureEndpoints<'a> {
    pub fn new(client: &'a RestClient) -> Self {
        Self { client }
    }

    /// Place a futures order
    #[instrument(skip(self, order), fields(contract = %order.contract_code))]
    pub async fn create_order(&self, order: &FutureOrderRequest) -> ApiResponse {
        self.client.post("Future/FutureCreateOrder", order, true).await
    }

    /// Modify an open futures order
    #[instrument(skip(self, request), fields(order_ref = %request.order_ref))]
    pub async fn replace_order(&self, request: &FutureReplaceRequest) -> ApiResponse {
        self.client.post("Future/FutureReplaceOrder", request, true).await
    }

    /// Cancel an open futures order
    #[instrument(skip(self))]
    pub async fn delete_order(&self, portfolio_number: u64, order_ref: &str) -> ApiResponse {
        let payload = OrderRef {
            portfolio_number,
            order_ref,
        };
        self.client.post("Future/FutureDeleteOrder", &payload, true).await
    }

    /// List futures orders matching a filter
    #[instrument(skip(self, query))]
    pub async fn order_list(&self, query: &FutureOrderListQuery) -> ApiResponse {
        self.client.post("Future/FutureOrderList", query, true).await
    }

    /// Open futures positions
    #[instrument(skip(self))]
    pub async fn positions(&self, portfolio_number: u64) -> ApiResponse {
        self.client
            .post("Future/FuturePositions", &PortfolioRef { portfolio_number }, true)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_create_order_payload() {
        let order = FutureOrderRequest {
            portfolio_number: 7,
            contract_code: "F_XU0301225".into(),
            direction: 1,
            price: dec!(10250.25),
            quantity: 2,
            order_method: 0,
            order_duration: 0,
            after_hour_session_valid: true,
            expiration_date: String::new(),
        };
        assert_eq!(
            serde_json::to_value(&order).unwrap(),
            json!({
                "portfolioNumber": 7,
                "contractCode": "F_XU0301225",
                "direction": 1,
                "price": 10250.25,
                "quantity": 2,
                "orderMethod": 0,
                "orderDuration": 0,
                "afterHourSessionValid": true,
                "expirationDate": ""
            })
        );
    }

    #[test]
    fn test_order_list_payload_keys() {
        let query = FutureOrderListQuery {
            portfolio_number: 7,
            order_validity_date: "2025-01-31".into(),
            contract_code: String::new(),
            contract_type: 0,
            long_short: 0,
            pending_orders: true,
            untransmitted_orders: false,
            partially_executed_orders: true,
            cancelled_orders: false,
            after_hour_session_valid: false,
        };
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value["orderValidityDate"], json!("2025-01-31"));
        assert_eq!(value["partiallyExecutedOrders"], json!(true));
        assert_eq!(value["longShort"], json!(0));
    }
}
