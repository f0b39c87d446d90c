//! Core domain types for the replica pipeline.
//!
//! ## Event & intent types
//!
//! - [`TradeEvent`] - one observed fill on the watched wallet
//! - [`MarketWindow`] - a time-bucketed "up-or-down" market, parsed from title
//! - [`ExecutionIntent`] - the coalesced, signed decision to place one order
//! - [`Side`] - BUY/SELL
//!
//! ## Risk & execution types
//!
//! - [`RiskSnapshot`] - outcome of a pre-trade risk check
//! - [`OrderSubmission`] - result of attempting to submit an order
//! - [`OrderLifecycle`] - mutable state of a submitted order
//!
//! ## Position types
//!
//! - [`Position`] - per-`(market, outcome)` quantity and average price
//!
//! ## Dedupe types
//!
//! - [`EventKey`] - fields used to derive a [`DedupeKey`]
//! - [`DedupeKey`] - priority-ordered fingerprint for exactly-once intake

mod dedupe;
mod intent;
mod market_window;
mod money;
mod order;
mod position;
mod risk;
mod side;
mod trade_event;

pub use dedupe::{build_dedupe_key, DedupeKey, EventKey};
pub use intent::ExecutionIntent;
pub use market_window::{parse_market_window, MarketWindow};
pub use money::{Price, Usd, Volume};
pub use order::{OrderLifecycle, OrderStatus, OrderSubmission, SubmissionStatus};
pub use position::Position;
pub use risk::RiskSnapshot;
pub use side::Side;
pub use trade_event::{SourcePath, TradeEvent};
