//! Order submission, lifecycle tracking, and market metadata needed to price
//! and route orders.

pub mod lifecycle;
pub mod market_cache;
pub mod order_client;

pub use lifecycle::OrderLifecycleStore;
pub use market_cache::{MarketCacheConfig, MarketMetadata, MarketMetadataCache};
pub use order_client::{
    classify_error_code, deterministic_client_order_id, ClobOrderClient, OrderClient,
    OrderClientConfig, PolymarketCredentials,
};
