//! Threshold evaluation over a dashboard snapshot, producing the boolean
//! breach flags surfaced on the exported snapshot row.

use super::metrics::DashboardSnapshot;

#[derive(Debug, Clone, Copy)]
pub struct AlertThresholds {
    pub p95_copy_delay_ms: f64,
    pub max_reject_rate: f64,
    pub max_ws_disconnect_s: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            p95_copy_delay_ms: 800.0,
            max_reject_rate: 0.1,
            max_ws_disconnect_s: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertState {
    pub websocket_disconnect_breach: bool,
    pub reject_spike_breach: bool,
    pub p95_latency_breach: bool,
}

pub struct AlertEvaluator {
    thresholds: AlertThresholds,
}

impl AlertEvaluator {
    #[must_use]
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn evaluate(&self, snapshot: &DashboardSnapshot, ws_disconnect_s: u64) -> AlertState {
        let p95 = snapshot.copy_delay_ms.map_or(0.0, |s| s.p95);
        AlertState {
            websocket_disconnect_breach: ws_disconnect_s > self.thresholds.max_ws_disconnect_s,
            reject_spike_breach: snapshot.reject_rate > self.thresholds.max_reject_rate,
            p95_latency_breach: p95 > self.thresholds.p95_copy_delay_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_each_breach_independently() {
        let evaluator = AlertEvaluator::new(AlertThresholds::default());
        let snapshot = DashboardSnapshot {
            reject_rate: 0.3,
            ..Default::default()
        };
        let state = evaluator.evaluate(&snapshot, 5);
        assert!(state.reject_spike_breach);
        assert!(!state.websocket_disconnect_breach);
        assert!(!state.p95_latency_breach);
    }

    #[test]
    fn ws_disconnect_breach_trips_on_duration_alone() {
        let evaluator = AlertEvaluator::new(AlertThresholds::default());
        let state = evaluator.evaluate(&DashboardSnapshot::default(), 25);
        assert!(state.websocket_disconnect_breach);
    }

    #[test]
    fn healthy_snapshot_trips_nothing() {
        let evaluator = AlertEvaluator::new(AlertThresholds::default());
        let state = evaluator.evaluate(&DashboardSnapshot::default(), 0);
        assert_eq!(state, AlertState::default());
    }
}
