//! API endpoint groups

pub mod future;
pub mod portfolio;
pub mod stock;

pub use future::{FutureEndpoints, FutureOrderListQuery, FutureOrderRequest, FutureReplaceRequest};
pub use portfolio::PortfolioEndpoints;
pub use stock::{StockEndpoints, StockOrderListQuery, StockOrderRequest, StockPositionsQuery};
