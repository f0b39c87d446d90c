//! Per-`correlation_id` stage timing and the aggregate counters derived from
//! it, in cumulative and resettable-window flavors.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
struct StageTimes {
    event_receive_ts_ms: Option<i64>,
    order_submit_ts_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileSummary {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardSnapshot {
    pub copy_delay_ms: Option<PercentileSummary>,
    pub decision_delay_ms: Option<PercentileSummary>,
    pub submit_to_ack_ms: Option<PercentileSummary>,
    pub source_fills: u64,
    pub destination_orders: u64,
    pub coalescing_efficiency: Option<f64>,
    pub reject_rate: f64,
}

#[derive(Debug, Default)]
struct Accumulators {
    copy_delays: Vec<f64>,
    decision_delays: Vec<f64>,
    submit_to_ack_delays: Vec<f64>,
    source_fills: u64,
    destination_orders: u64,
    submissions: u64,
    rejections: u64,
}

impl Accumulators {
    fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            copy_delay_ms: percentile_summary(&self.copy_delays),
            decision_delay_ms: percentile_summary(&self.decision_delays),
            submit_to_ack_ms: percentile_summary(&self.submit_to_ack_delays),
            source_fills: self.source_fills,
            destination_orders: self.destination_orders,
            coalescing_efficiency: (self.destination_orders > 0)
                .then(|| self.source_fills as f64 / self.destination_orders as f64),
            reject_rate: if self.submissions == 0 {
                0.0
            } else {
                self.rejections as f64 / self.submissions as f64
            },
        }
    }
}

/// Tracks stage timestamps per correlation id and two running aggregates: a
/// cumulative one and a windowed one that resets each time it is read.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    stages: HashMap<String, StageTimes>,
    cumulative: Accumulators,
    window: Accumulators,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event_receive(&mut self, correlation_id: &str, ts_ms: i64) {
        self.stages.entry(correlation_id.to_string()).or_default().event_receive_ts_ms = Some(ts_ms);
        self.cumulative.source_fills += 1;
        self.window.source_fills += 1;
    }

    pub fn record_decision(&mut self, correlation_id: &str, ts_ms: i64) {
        let Some(receive_ts) = self.stages.get(correlation_id).and_then(|s| s.event_receive_ts_ms) else {
            return;
        };
        let delay = (ts_ms - receive_ts) as f64;
        self.cumulative.decision_delays.push(delay);
        self.window.decision_delays.push(delay);
    }

    pub fn record_order_submit(&mut self, correlation_id: &str, ts_ms: i64) {
        self.cumulative.destination_orders += 1;
        self.cumulative.submissions += 1;
        self.window.destination_orders += 1;
        self.window.submissions += 1;

        let stage = self.stages.entry(correlation_id.to_string()).or_default();
        stage.order_submit_ts_ms = Some(ts_ms);
        if let Some(receive_ts) = stage.event_receive_ts_ms {
            let delay = (ts_ms - receive_ts) as f64;
            self.cumulative.copy_delays.push(delay);
            self.window.copy_delays.push(delay);
        }
    }

    /// Records acknowledgement of a submission. `error_code == "min_size"`
    /// is expected noise and is excluded from reject-rate accounting.
    pub fn record_ack(&mut self, correlation_id: &str, ts_ms: i64, accepted: bool, error_code: &str) {
        if let Some(submit_ts) = self.stages.get(correlation_id).and_then(|s| s.order_submit_ts_ms) {
            let delay = (ts_ms - submit_ts) as f64;
            self.cumulative.submit_to_ack_delays.push(delay);
            self.window.submit_to_ack_delays.push(delay);
        }
        if !accepted && error_code != "min_size" {
            self.cumulative.rejections += 1;
            self.window.rejections += 1;
        }
        self.stages.remove(correlation_id);
    }

    /// Drops a correlation id's in-flight stage timing without affecting any
    /// aggregate. For events whose decision never reaches submission (a
    /// policy or risk block), nothing will ever call `record_ack` to clear
    /// the entry `record_event_receive` created.
    pub fn discard(&mut self, correlation_id: &str) {
        self.stages.remove(correlation_id);
    }

    #[must_use]
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.cumulative.snapshot()
    }

    /// Returns a snapshot computed only from events seen since the previous
    /// call to this method, then resets the window.
    pub fn snapshot_window(&mut self) -> DashboardSnapshot {
        let snapshot = self.window.snapshot();
        self.window = Accumulators::default();
        snapshot
    }
}

fn percentile_summary(values: &[f64]) -> Option<PercentileSummary> {
    if values.is_empty() {
        return None;
    }
    let mut ordered = values.to_vec();
    ordered.sort_by(|a, b| a.partial_cmp(b).unwrap());
    Some(PercentileSummary {
        p50: nearest_rank(&ordered, 50.0),
        p95: nearest_rank(&ordered, 95.0),
        p99: nearest_rank(&ordered, 99.0),
    })
}

fn nearest_rank(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.len() == 1 {
        return sorted_values[0];
    }
    let index = ((p / 100.0) * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[index.min(sorted_values.len() - 1)]
}
