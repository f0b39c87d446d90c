//! A manual/automatic trading halt, and the threshold evaluator that trips
//! or clears it from telemetry readings.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KillSwitchState {
    pub active: bool,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct KillSwitch {
    state: KillSwitchState,
}

impl KillSwitch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self, reason: impl Into<String>) {
        self.state.active = true;
        self.state.reason = reason.into();
    }

    pub fn deactivate(&mut self) {
        self.state.active = false;
        self.state.reason.clear();
    }

    #[must_use]
    pub fn check(&self) -> KillSwitchState {
        self.state.clone()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AutoKillThresholds {
    pub max_error_rate: f64,
    pub max_p95_latency_ms: f64,
    pub recover_max_error_rate: f64,
    pub recover_max_p95_latency_ms: f64,
    pub recovery_consecutive_snapshots: u32,
}

impl Default for AutoKillThresholds {
    fn default() -> Self {
        Self {
            max_error_rate: 0.2,
            max_p95_latency_ms: 1200.0,
            recover_max_error_rate: 0.1,
            recover_max_p95_latency_ms: 800.0,
            recovery_consecutive_snapshots: 2,
        }
    }
}

/// Evaluates one telemetry reading per snapshot cycle against
/// `AutoKillThresholds`, activating or clearing the guarded kill switch.
/// Recovery requires `recovery_consecutive_snapshots` back-to-back healthy
/// readings; any unhealthy reading in between resets the streak to zero.
pub struct AutoKillGuard {
    thresholds: AutoKillThresholds,
    healthy_streak: u32,
}

impl AutoKillGuard {
    #[must_use]
    pub fn new(thresholds: AutoKillThresholds) -> Self {
        Self {
            thresholds,
            healthy_streak: 0,
        }
    }

    pub fn evaluate(&mut self, kill_switch: &mut KillSwitch, error_rate: f64, p95_latency_ms: f64) -> KillSwitchState {
        if error_rate > self.thresholds.max_error_rate {
            kill_switch.activate("auto_error_rate_threshold");
            self.healthy_streak = 0;
            return kill_switch.check();
        }
        if p95_latency_ms > self.thresholds.max_p95_latency_ms {
            kill_switch.activate("auto_latency_threshold");
            self.healthy_streak = 0;
            return kill_switch.check();
        }

        if kill_switch.check().active {
            let healthy = error_rate <= self.thresholds.recover_max_error_rate
                && p95_latency_ms <= self.thresholds.recover_max_p95_latency_ms;
            if healthy {
                self.healthy_streak += 1;
                if self.healthy_streak >= self.thresholds.recovery_consecutive_snapshots {
                    kill_switch.deactivate();
                    self.healthy_streak = 0;
                }
            } else {
                self.healthy_streak = 0;
            }
        }
        kill_switch.check()
    }
}
