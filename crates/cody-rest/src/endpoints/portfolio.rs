//! Portfolio endpoints
//!
//! These endpoints require an authenticated session.

use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use crate::client::RestClient;
use crate::response::ApiResponse;

/// Payload shared by the per-portfolio queries
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PortfolioRef {
    pub portfolio_number: u64,
}

/// Portfolio endpoints
pub struct PortfolioEndpoints<'a> {
    client: &'a RestClient,
}

impl<'a> PortfolioEndpoints<'a> {
    pub fn new(client: &'a RestClient) -> Self {
        Self { client }
    }

    /// List sub-accounts (also used as the keep-alive and validation call)
    #[instrument(skip(self))]
    pub async fn sub_accounts(&self) -> ApiResponse {
        self.client.post("Portfolio/SubAccounts", &json!({}), true).await
    }

    /// Account summary for a portfolio
    #[instrument(skip(self))]
    pub async fn account_summary(&self, portfolio_number: u64) -> ApiResponse {
        self.query("Portfolio/AccountSummary", portfolio_number).await
    }

    /// Cash assets for a portfolio
    #[instrument(skip(self))]
    pub async fn cash_assets(&self, portfolio_number: u64) -> ApiResponse {
        self.query("Portfolio/CashAssets", portfolio_number).await
    }

    /// Cash balance for a portfolio
    #[instrument(skip(self))]
    pub async fn cash_balance(&self, portfolio_number: u64) -> ApiResponse {
        self.query("Portfolio/CashBalance", portfolio_number).await
    }

    /// Overall account view for a portfolio
    #[instrument(skip(self))]
    pub async fn account_overall(&self, portfolio_number: u64) -> ApiResponse {
        self.query("Portfolio/AccountOverall", portfolio_number).await
    }

    async fn query(&self, path: &str, portfolio_number: u64) -> ApiResponse {
        self.client
            .post(path, &PortfolioRef { portfolio_number }, true)
            .await
    }
}
