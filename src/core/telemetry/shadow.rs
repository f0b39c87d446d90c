//! Compact per-decision JSONL log used for shadow-mode auditing.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
struct ShadowDecisionRow {
    ts: String,
    correlation_id: String,
    market_id: String,
    window_id: String,
    target_notional_usd: String,
    blocked_reason: String,
    executed: bool,
}

pub struct ShadowDecisionLogger {
    path: PathBuf,
}

impl ShadowDecisionLogger {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn write(
        &self,
        correlation_id: &str,
        market_id: &str,
        window_id: Option<&str>,
        target_notional_usd: Decimal,
        blocked_reason: &str,
        executed: bool,
    ) -> Result<()> {
        let row = ShadowDecisionRow {
            ts: Utc::now().to_rfc3339(),
            correlation_id: correlation_id.to_string(),
            market_id: market_id.to_string(),
            window_id: window_id.unwrap_or("").to_string(),
            target_notional_usd: target_notional_usd.to_string(),
            blocked_reason: blocked_reason.to_string(),
            executed,
        };
        let line = serde_json::to_string(&row)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn appends_one_row_per_write() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ShadowDecisionLogger::new(dir.path().join("shadow_decisions.jsonl")).unwrap();
        logger.write("cid-1", "m1", Some("eth:20260101T0900"), dec!(16.3), "", true).unwrap();
        logger.write("cid-2", "m1", None, dec!(0), "window_cap_exceeded", false).unwrap();

        let content = std::fs::read_to_string(dir.path().join("shadow_decisions.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
