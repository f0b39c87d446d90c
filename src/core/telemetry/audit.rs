//! Append-only JSONL audit log: one row per decision outcome (block, reject,
//! submit-success) with full context.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct CopyAuditRow {
    pub ts: DateTime<Utc>,
    pub correlation_id: String,
    pub market_id: String,
    pub window_id: Option<String>,
    pub source_notional_net_usd: Decimal,
    pub source_notional_abs_usd: Decimal,
    pub copy_delay_ms: f64,
    pub decision_delay_ms: f64,
    pub submit_to_ack_ms: f64,
    pub bot_price: Decimal,
    pub bot_size: Decimal,
    pub target_notional_usd: Decimal,
    pub size_ratio: Decimal,
    pub submit_status: String,
    pub error_code: String,
    pub blocked_reason: String,
}

pub struct CopyAuditLogger {
    path: PathBuf,
}

impl CopyAuditLogger {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn write(&self, row: &CopyAuditRow) -> Result<()> {
        let line = serde_json::to_string(row)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row() -> CopyAuditRow {
        CopyAuditRow {
            ts: Utc::now(),
            correlation_id: "m1:Up:1".into(),
            market_id: "m1".into(),
            window_id: Some("eth:20260101T0900".into()),
            source_notional_net_usd: dec!(16.3),
            source_notional_abs_usd: dec!(16.3),
            copy_delay_ms: 12.0,
            decision_delay_ms: 4.0,
            submit_to_ack_ms: 80.0,
            bot_price: dec!(0.55),
            bot_size: dec!(10),
            target_notional_usd: dec!(16.3),
            size_ratio: dec!(1.0),
            submit_status: "acknowledged".into(),
            error_code: String::new(),
            blocked_reason: String::new(),
        }
    }

    #[test]
    fn writes_one_jsonl_row_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let logger = CopyAuditLogger::new(dir.path().join("copy_audit.jsonl")).unwrap();
        logger.write(&row()).unwrap();
        logger.write(&row()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("copy_audit.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().next().unwrap().starts_with("{\"ts\""));
    }
}
