//! Observability surface: latency/throughput metrics, the kill switch and its
//! automatic guard, decision and fill audit logs, and the periodic snapshot
//! exporter that ties them together.

pub mod alerts;
pub mod audit;
pub mod exporter;
pub mod kill_switch;
pub mod metrics;
pub mod shadow;

pub use alerts::{AlertEvaluator, AlertState, AlertThresholds};
pub use audit::{CopyAuditLogger, CopyAuditRow};
pub use exporter::{PnLFigures, SnapshotRow, TelemetryExporter};
pub use kill_switch::{AutoKillGuard, AutoKillThresholds, KillSwitch, KillSwitchState};
pub use metrics::{DashboardSnapshot, MetricsCollector, PercentileSummary};
pub use shadow::ShadowDecisionLogger;
