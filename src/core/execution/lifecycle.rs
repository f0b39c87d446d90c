//! In-process registry mapping `client_order_id` to its `OrderLifecycle`.

use std::collections::HashMap;

use chrono::Utc;

use crate::core::domain::{OrderLifecycle, OrderStatus, OrderSubmission, Usd};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct OrderLifecycleStore {
    orders: HashMap<String, OrderLifecycle>,
}

impl OrderLifecycleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly submitted order as `acknowledged` or `rejected`
    /// depending on whether the submission was accepted.
    pub fn register(&mut self, submission: &OrderSubmission) -> OrderLifecycle {
        let now = Utc::now();
        let mut lifecycle = OrderLifecycle::new(submission.client_order_id.clone(), now);
        lifecycle.status = if submission.accepted {
            OrderStatus::Acknowledged
        } else {
            OrderStatus::Rejected
        };
        self.orders.insert(submission.client_order_id.clone(), lifecycle.clone());
        lifecycle
    }

    pub fn mark_partial_fill(&mut self, client_order_id: &str, filled_notional_usd: Usd) -> Result<()> {
        let lifecycle = self.orders.get_mut(client_order_id).ok_or_else(|| {
            Error::Execution(format!("unknown client_order_id: {client_order_id}"))
        })?;
        lifecycle.mark_partial_fill(filled_notional_usd, Utc::now());
        Ok(())
    }

    pub fn mark_filled(&mut self, client_order_id: &str, filled_notional_usd: Usd) -> Result<()> {
        let lifecycle = self.orders.get_mut(client_order_id).ok_or_else(|| {
            Error::Execution(format!("unknown client_order_id: {client_order_id}"))
        })?;
        lifecycle.mark_filled(filled_notional_usd, Utc::now());
        Ok(())
    }

    #[must_use]
    pub fn get(&self, client_order_id: &str) -> Option<&OrderLifecycle> {
        self.orders.get(client_order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::SubmissionStatus;
    use rust_decimal_macros::dec;

    fn submission(accepted: bool) -> OrderSubmission {
        OrderSubmission {
            client_order_id: "cb-1".into(),
            endpoint: "/order".into(),
            payload: serde_json::Value::Null,
            accepted,
            status: if accepted {
                SubmissionStatus::Acknowledged
            } else {
                SubmissionStatus::Rejected
            },
            response: serde_json::Value::Null,
            error: String::new(),
            error_code: String::new(),
        }
    }

    #[test]
    fn accepted_submission_registers_as_acknowledged() {
        let mut store = OrderLifecycleStore::new();
        let lifecycle = store.register(&submission(true));
        assert_eq!(lifecycle.status, OrderStatus::Acknowledged);
    }

    #[test]
    fn rejected_submission_registers_as_rejected_and_is_terminal() {
        let mut store = OrderLifecycleStore::new();
        let lifecycle = store.register(&submission(false));
        assert_eq!(lifecycle.status, OrderStatus::Rejected);
        assert!(lifecycle.is_terminal());
    }

    #[test]
    fn partial_fills_accumulate_then_fill_terminates() {
        let mut store = OrderLifecycleStore::new();
        store.register(&submission(true));
        store.mark_partial_fill("cb-1", dec!(2)).unwrap();
        store.mark_partial_fill("cb-1", dec!(3)).unwrap();
        assert_eq!(store.get("cb-1").unwrap().filled_notional_usd, dec!(5));

        store.mark_filled("cb-1", dec!(10)).unwrap();
        let lifecycle = store.get("cb-1").unwrap();
        assert_eq!(lifecycle.status, OrderStatus::Filled);
        assert_eq!(lifecycle.filled_notional_usd, dec!(10));
        assert!(lifecycle.is_terminal());
    }

    #[test]
    fn marking_unknown_order_errors() {
        let mut store = OrderLifecycleStore::new();
        assert!(store.mark_partial_fill("cb-missing", dec!(1)).is_err());
    }
}
