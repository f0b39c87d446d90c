//! Periodic snapshot writer: one row per snapshot cycle, in both JSONL
//! (for machine consumption) and CSV (for spreadsheets) under a shared
//! output directory.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::Result;

use super::alerts::AlertState;
use super::kill_switch::KillSwitchState;
use super::metrics::DashboardSnapshot;

const FIELDS: &[&str] = &[
    "ts",
    "copy_delay_p50_ms",
    "copy_delay_p95_ms",
    "copy_delay_p99_ms",
    "source_fills",
    "destination_orders",
    "coalescing_efficiency",
    "reject_rate",
    "alert_ws_disconnect",
    "alert_reject_spike",
    "alert_p95_latency",
    "kill_switch_active",
    "kill_switch_reason",
    "realized_pnl_usd",
    "realized_settled_pnl_usd",
    "unrealized_pnl_usd",
    "fees_usd",
    "net_pnl_usd",
];

#[derive(Debug, Clone)]
pub struct PnLFigures {
    pub realized_trading_usd: Decimal,
    pub realized_settled_usd: Decimal,
    pub unrealized_usd: Decimal,
    pub fees_usd: Decimal,
    pub net_usd: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRow {
    pub ts: String,
    pub copy_delay_p50_ms: Option<f64>,
    pub copy_delay_p95_ms: Option<f64>,
    pub copy_delay_p99_ms: Option<f64>,
    pub source_fills: u64,
    pub destination_orders: u64,
    pub coalescing_efficiency: Option<f64>,
    pub reject_rate: f64,
    pub alert_ws_disconnect: bool,
    pub alert_reject_spike: bool,
    pub alert_p95_latency: bool,
    pub kill_switch_active: bool,
    pub kill_switch_reason: String,
    pub realized_pnl_usd: Decimal,
    pub realized_settled_pnl_usd: Decimal,
    pub unrealized_pnl_usd: Decimal,
    pub fees_usd: Decimal,
    pub net_pnl_usd: Decimal,
}

impl SnapshotRow {
    #[must_use]
    pub fn build(dashboard: &DashboardSnapshot, alerts: AlertState, kill_switch: &KillSwitchState, pnl: &PnLFigures) -> Self {
        Self {
            ts: Utc::now().to_rfc3339(),
            copy_delay_p50_ms: dashboard.copy_delay_ms.map(|s| s.p50),
            copy_delay_p95_ms: dashboard.copy_delay_ms.map(|s| s.p95),
            copy_delay_p99_ms: dashboard.copy_delay_ms.map(|s| s.p99),
            source_fills: dashboard.source_fills,
            destination_orders: dashboard.destination_orders,
            coalescing_efficiency: dashboard.coalescing_efficiency,
            reject_rate: dashboard.reject_rate,
            alert_ws_disconnect: alerts.websocket_disconnect_breach,
            alert_reject_spike: alerts.reject_spike_breach,
            alert_p95_latency: alerts.p95_latency_breach,
            kill_switch_active: kill_switch.active,
            kill_switch_reason: kill_switch.reason.clone(),
            realized_pnl_usd: pnl.realized_trading_usd,
            realized_settled_pnl_usd: pnl.realized_settled_usd,
            unrealized_pnl_usd: pnl.unrealized_usd,
            fees_usd: pnl.fees_usd,
            net_pnl_usd: pnl.net_usd,
        }
    }

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.ts.clone(),
            opt_to_string(self.copy_delay_p50_ms),
            opt_to_string(self.copy_delay_p95_ms),
            opt_to_string(self.copy_delay_p99_ms),
            self.source_fills.to_string(),
            self.destination_orders.to_string(),
            opt_to_string(self.coalescing_efficiency),
            self.reject_rate.to_string(),
            bool_to_string(self.alert_ws_disconnect),
            bool_to_string(self.alert_reject_spike),
            bool_to_string(self.alert_p95_latency),
            bool_to_string(self.kill_switch_active),
            self.kill_switch_reason.clone(),
            self.realized_pnl_usd.to_string(),
            self.realized_settled_pnl_usd.to_string(),
            self.unrealized_pnl_usd.to_string(),
            self.fees_usd.to_string(),
            self.net_pnl_usd.to_string(),
        ]
    }
}

fn opt_to_string(value: Option<f64>) -> String {
    value.map_or(String::new(), |v| v.to_string())
}

fn bool_to_string(value: bool) -> String {
    if value { "true".to_string() } else { "false".to_string() }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_row(fields: &[String]) -> String {
    fields.iter().map(|f| csv_escape(f)).collect::<Vec<_>>().join(",")
}

pub struct TelemetryExporter {
    csv_path: PathBuf,
    jsonl_path: PathBuf,
}

impl TelemetryExporter {
    pub fn new(out_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&out_dir)?;
        let csv_path = out_dir.join("snapshots.csv");
        let jsonl_path = out_dir.join("snapshots.jsonl");
        let exporter = Self { csv_path, jsonl_path };
        exporter.ensure_csv_header()?;
        Ok(exporter)
    }

    fn ensure_csv_header(&self) -> Result<()> {
        if self.csv_path.exists() {
            return Ok(());
        }
        let mut file = OpenOptions::new().create(true).write(true).open(&self.csv_path)?;
        writeln!(file, "{}", csv_row(&FIELDS.iter().map(|f| f.to_string()).collect::<Vec<_>>()))?;
        Ok(())
    }

    pub fn write_snapshot(&self, row: &SnapshotRow) -> Result<()> {
        let mut jsonl_file = OpenOptions::new().create(true).append(true).open(&self.jsonl_path)?;
        writeln!(jsonl_file, "{}", serde_json::to_string(row)?)?;

        let mut csv_file = OpenOptions::new().create(true).append(true).open(&self.csv_path)?;
        writeln!(csv_file, "{}", csv_row(&row.csv_fields()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pnl() -> PnLFigures {
        PnLFigures {
            realized_trading_usd: dec!(1.5),
            realized_settled_usd: dec!(0),
            unrealized_usd: dec!(0.2),
            fees_usd: dec!(0.01),
            net_usd: dec!(1.69),
        }
    }

    #[test]
    fn writes_header_once_and_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = TelemetryExporter::new(dir.path().to_path_buf()).unwrap();
        let row = SnapshotRow::build(&DashboardSnapshot::default(), AlertState::default(), &KillSwitchState::default(), &pnl());
        exporter.write_snapshot(&row).unwrap();
        exporter.write_snapshot(&row).unwrap();

        let csv_content = std::fs::read_to_string(dir.path().join("snapshots.csv")).unwrap();
        let mut lines = csv_content.lines();
        assert_eq!(lines.next().unwrap(), FIELDS.join(","));
        assert_eq!(lines.count(), 2);

        let jsonl_content = std::fs::read_to_string(dir.path().join("snapshots.jsonl")).unwrap();
        assert_eq!(jsonl_content.lines().count(), 2);
    }

    #[test]
    fn csv_escapes_commas_in_kill_switch_reason() {
        let mut row = SnapshotRow::build(&DashboardSnapshot::default(), AlertState::default(), &KillSwitchState::default(), &pnl());
        row.kill_switch_reason = "reject, spike".to_string();
        let fields = row.csv_fields();
        assert_eq!(fields[12], "\"reject, spike\"");
    }
}
