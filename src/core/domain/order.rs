//! Order submission results and post-submission lifecycle state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::Usd;

/// Outcome of a single `submit_marketable_limit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    Acknowledged,
    DryRunAcknowledged,
    Rejected,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Acknowledged => "acknowledged",
            Self::DryRunAcknowledged => "dry_run_acknowledged",
            Self::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// Result of attempting to submit an order.
#[derive(Debug, Clone)]
pub struct OrderSubmission {
    pub client_order_id: String,
    pub endpoint: String,
    pub payload: Value,
    pub accepted: bool,
    pub status: SubmissionStatus,
    pub response: Value,
    pub error: String,
    /// `"min_size"` for the one classified, expected-noise error; empty
    /// otherwise.
    pub error_code: String,
}

impl OrderSubmission {
    #[must_use]
    pub fn is_min_size_reject(&self) -> bool {
        self.error_code == "min_size"
    }
}

/// Post-submission state for one `client_order_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    Created,
    Acknowledged,
    Rejected,
    PartialFill,
    Filled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Acknowledged => "acknowledged",
            Self::Rejected => "rejected",
            Self::PartialFill => "partial_fill",
            Self::Filled => "filled",
        };
        write!(f, "{s}")
    }
}

/// Mutable state of a submitted order.
///
/// Valid transitions: `Created -> {Acknowledged|Rejected}`,
/// `Acknowledged -> PartialFill* -> Filled`. `Rejected` and `Filled` are
/// terminal; there are no backwards transitions.
#[derive(Debug, Clone)]
pub struct OrderLifecycle {
    pub client_order_id: String,
    pub status: OrderStatus,
    pub filled_notional_usd: Usd,
    pub update_ts: DateTime<Utc>,
}

impl OrderLifecycle {
    #[must_use]
    pub fn new(client_order_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            client_order_id: client_order_id.into(),
            status: OrderStatus::Created,
            filled_notional_usd: Usd::ZERO,
            update_ts: now,
        }
    }

    pub fn mark_partial_fill(&mut self, qty: Usd, now: DateTime<Utc>) {
        self.filled_notional_usd += qty;
        self.status = OrderStatus::PartialFill;
        self.update_ts = now;
    }

    pub fn mark_filled(&mut self, qty: Usd, now: DateTime<Utc>) {
        self.filled_notional_usd = qty;
        self.status = OrderStatus::Filled;
        self.update_ts = now;
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OrderStatus::Rejected | OrderStatus::Filled)
    }
}
