//! Drives the replica pipeline: two intake producers feed a bounded ingress
//! queue; this loop owns every piece of mutable pipeline state (buckets,
//! risk counters, PnL, metrics) on a single task, draining the queue,
//! flushing coalesce buckets, and running each flushed intent through
//! policy, risk, and the order client.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::app::config::Config;
use crate::core::domain::{ExecutionIntent, MarketWindow, Price, Side, SourcePath, TradeEvent};
use crate::core::execution::{
    ClobOrderClient, MarketMetadataCache, OrderClient, OrderLifecycleStore,
};
use crate::core::intake::{ActivityPoller, TradeFeedWatcher};
use crate::core::pipeline::{Coalescer, DecisionResult, IntentPolicy, WindowRiskTracker};
use crate::core::pnl::PnLTracker;
use crate::core::store::{DbPool, SqliteStateStore, StateStore};
use crate::core::telemetry::{
    AlertEvaluator, AutoKillGuard, CopyAuditLogger, CopyAuditRow, KillSwitch, MetricsCollector,
    PnLFigures, ShadowDecisionLogger, SnapshotRow, TelemetryExporter,
};
use crate::error::Result;

const INGRESS_QUEUE_DEPTH: usize = 5000;
const DRAIN_TICK: std::time::Duration = std::time::Duration::from_millis(50);

/// Last-observed context for a `(market_id, outcome)` pair, needed by
/// policy's staleness/near-expiry guards but not carried on the coalesced
/// intent itself.
#[derive(Default, Clone)]
struct EventContext {
    last_executed_ts: Option<DateTime<Utc>>,
    window: Option<MarketWindow>,
    last_price: Option<Price>,
}

pub struct App;

impl App {
    pub async fn run(config: Config) -> Result<()> {
        if let Some(parent) = std::path::Path::new(&config.database_url).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let pool: DbPool = crate::core::store::sqlite::create_pool(&config.database_url)?;
        let state = Arc::new(SqliteStateStore::new(pool));

        let (ingress_tx, mut ingress_rx) = mpsc::channel::<TradeEvent>(INGRESS_QUEUE_DEPTH);
        let (stop_tx, stop_rx) = watch::channel(false);

        let poller = ActivityPoller::new(config.activity_poller.clone(), Arc::clone(&state));
        let poller_sender = ingress_tx.clone();
        let poller_stop = stop_rx.clone();
        let poller_handle = tokio::spawn(async move {
            poller.run_forever(poller_sender, poller_stop).await;
        });

        let watcher = TradeFeedWatcher::new(config.ws_watcher.clone());
        let watcher_sender = ingress_tx.clone();
        let watcher_stop = stop_rx.clone();
        let watcher_handle = tokio::spawn(async move {
            watcher.run_forever(watcher_sender, watcher_stop).await;
        });
        drop(ingress_tx);

        let order_client: Box<dyn OrderClient> = match &config.credentials {
            Some(credentials) => Box::new(ClobOrderClient::new(credentials.clone(), config.order_client.clone())),
            None => Box::new(ClobOrderClient::new(
                crate::core::execution::PolymarketCredentials {
                    clob_url: String::new(),
                    api_key: String::new(),
                    api_secret: String::new(),
                    api_passphrase: String::new(),
                },
                config.order_client.clone(),
            )),
        };

        let mut coalescer = Coalescer::new(crate::core::pipeline::CoalescerConfig {
            coalesce_ms: config.copy.coalesce_ms,
            net_opposite_trades: config.copy.net_opposite_trades,
            max_slippage_bps: config.max_slippage_bps,
        });
        let policy = IntentPolicy::new(config.policy.clone());
        let mut risk = WindowRiskTracker::new(config.risk.clone(), Utc::now());
        let mut lifecycle_store = OrderLifecycleStore::new();
        let market_cache = MarketMetadataCache::new(config.market_cache.clone());
        let mut pnl = PnLTracker::new(config.fee_bps);
        let mut metrics = MetricsCollector::new();
        let mut kill_switch = KillSwitch::new();
        let mut auto_kill = AutoKillGuard::new(config.auto_kill);
        let alerts = AlertEvaluator::new(crate::core::telemetry::AlertThresholds::default());
        let audit = CopyAuditLogger::new(config.telemetry_dir.join("copy_audit.jsonl"))?;
        let shadow = ShadowDecisionLogger::new(config.telemetry_dir.join("shadow_decisions.jsonl"))?;
        let exporter = TelemetryExporter::new(config.telemetry_dir.clone())?;

        let mut contexts: HashMap<(String, String), EventContext> = HashMap::new();
        let mut open_markets: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut last_ws_message = Utc::now();

        let mut drain_tick = tokio::time::interval(DRAIN_TICK);
        let mut snapshot_tick = tokio::time::interval(config.snapshot_interval);
        let mut sigterm = signal(SignalKind::terminate())?;

        info!(source_wallet = %config.copy.source_wallet, dry_run = config.order_client.dry_run, "coinbot starting");

        loop {
            tokio::select! {
                _ = drain_tick.tick() => {
                    Self::drain_and_flush(
                        &mut ingress_rx,
                        &mut coalescer,
                        &mut contexts,
                        &mut open_markets,
                        &mut metrics,
                        &mut pnl,
                        &mut last_ws_message,
                    );

                    let now = Utc::now();
                    let ready = coalescer.flush_ready(now);
                    for intent in ready {
                        Self::process_intent(
                            intent,
                            now,
                            &contexts,
                            &policy,
                            &mut risk,
                            &kill_switch,
                            order_client.as_ref(),
                            &mut lifecycle_store,
                            &mut pnl,
                            &mut metrics,
                            &audit,
                            &shadow,
                        ).await;
                    }
                }
                _ = snapshot_tick.tick() => {
                    Self::reconcile_settlements(&market_cache, &mut open_markets, &mut pnl).await;
                    Self::run_snapshot_cycle(
                        &mut metrics,
                        &alerts,
                        &mut kill_switch,
                        &mut auto_kill,
                        &pnl,
                        &exporter,
                        &last_ws_message,
                    );
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received (ctrl-c)");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("shutdown signal received (sigterm)");
                    break;
                }
            }
        }

        let _ = stop_tx.send(true);
        Self::run_snapshot_cycle(
            &mut metrics,
            &alerts,
            &mut kill_switch,
            &mut auto_kill,
            &pnl,
            &exporter,
            &last_ws_message,
        );
        poller_handle.abort();
        watcher_handle.abort();
        info!("coinbot stopped");
        Ok(())
    }

    fn drain_and_flush(
        ingress_rx: &mut mpsc::Receiver<TradeEvent>,
        coalescer: &mut Coalescer,
        contexts: &mut HashMap<(String, String), EventContext>,
        open_markets: &mut std::collections::HashSet<String>,
        metrics: &mut MetricsCollector,
        pnl: &mut PnLTracker,
        last_ws_message: &mut DateTime<Utc>,
    ) {
        while let Ok(event) = ingress_rx.try_recv() {
            let correlation_id = event.event_id.clone();
            metrics.record_event_receive(&correlation_id, event.received_ts.timestamp_millis());
            pnl.set_mark(&event.market_id, &event.outcome, event.price);
            open_markets.insert(event.market_id.clone());
            if event.source_path == SourcePath::ClobWs {
                *last_ws_message = event.received_ts;
            }

            let key = (event.market_id.clone(), event.outcome.clone());
            let ctx = contexts.entry(key).or_default();
            ctx.last_executed_ts = Some(event.executed_ts);
            ctx.window = event.window.clone();
            ctx.last_price = Some(event.price);

            let now = Utc::now();
            coalescer.push(event, now);
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_intent(
        intent: ExecutionIntent,
        now: DateTime<Utc>,
        contexts: &HashMap<(String, String), EventContext>,
        policy: &IntentPolicy,
        risk: &mut WindowRiskTracker,
        kill_switch: &KillSwitch,
        order_client: &dyn OrderClient,
        lifecycle_store: &mut OrderLifecycleStore,
        pnl: &mut PnLTracker,
        metrics: &mut MetricsCollector,
        audit: &CopyAuditLogger,
        shadow: &ShadowDecisionLogger,
    ) {
        let correlation_id = intent.intent_id.clone();
        // Metrics stages are keyed per source event, not per coalesced intent;
        // the first coalesced event stands in for the whole bucket so the
        // receive-to-decision/submit/ack chain metrics.rs expects stays intact.
        let metrics_id = intent
            .coalesced_event_ids
            .first()
            .cloned()
            .unwrap_or_else(|| correlation_id.clone());
        metrics.record_decision(&metrics_id, now.timestamp_millis());
        let raw_notional = intent.target_notional_usd;

        let switch_state = kill_switch.check();
        if switch_state.active {
            discard_coalesced_stages(metrics, &intent.coalesced_event_ids);
            Self::record_block(&correlation_id, &intent, raw_notional, &switch_state.reason, audit, shadow);
            return;
        }

        let ctx = contexts.get(&(intent.market_id.clone(), intent.outcome.clone())).cloned().unwrap_or_default();
        let last_executed_ts = ctx.last_executed_ts.unwrap_or(intent.created_ts);
        let window_remaining = ctx.window.as_ref().map(|w| w.remaining_seconds(now));

        let decision_delay_ms = ms_between(intent.created_ts, now);
        let copy_delay_ms = ms_between(last_executed_ts, now);

        let sized = match policy.apply(&intent, last_executed_ts, window_remaining, now) {
            DecisionResult::Blocked { reason } => {
                discard_coalesced_stages(metrics, &intent.coalesced_event_ids);
                Self::record_block(&correlation_id, &intent, raw_notional, reason, audit, shadow);
                return;
            }
            DecisionResult::Sized(sized) => sized,
        };

        let risk_snapshot = risk.check_and_apply(
            &sized.market_id,
            sized.window_id.as_deref(),
            sized.target_notional_usd,
            now,
        );
        if risk_snapshot.blocked {
            discard_coalesced_stages(metrics, &sized.coalesced_event_ids);
            Self::record_block(&correlation_id, &sized, raw_notional, &risk_snapshot.blocked_reason, audit, shadow);
            return;
        }

        let reference_price = ctx.last_price.unwrap_or(Decimal::new(5, 1));
        let price = marketable_price(reference_price, sized.side, sized.max_slippage_bps);
        let size = if price.is_zero() { Decimal::ZERO } else { sized.target_notional_usd / price };
        let size_ratio = if sized.target_notional_usd.is_zero() {
            Decimal::ZERO
        } else {
            (size * price) / sized.target_notional_usd
        };

        let submit_started = Utc::now();
        metrics.record_order_submit(&metrics_id, submit_started.timestamp_millis());
        let submission = match order_client.submit_marketable_limit(&sized, price, size).await {
            Ok(submission) => submission,
            Err(err) => {
                warn!(correlation_id = %correlation_id, error = %err, "order_submit_transport_error");
                metrics.record_ack(&metrics_id, Utc::now().timestamp_millis(), false, "");
                discard_coalesced_stages(metrics, &sized.coalesced_event_ids);
                return;
            }
        };
        let submit_to_ack_ms = ms_between(submit_started, Utc::now());

        lifecycle_store.register(&submission);
        metrics.record_ack(
            &metrics_id,
            Utc::now().timestamp_millis(),
            submission.accepted,
            &submission.error_code,
        );
        discard_coalesced_stages(metrics, &sized.coalesced_event_ids);
        if submission.accepted {
            pnl.apply_fill(&sized.market_id, &sized.outcome, sized.side, price, size);
        }

        let _ = audit.write(&CopyAuditRow {
            ts: now,
            correlation_id: correlation_id.clone(),
            market_id: sized.market_id.clone(),
            window_id: sized.window_id.clone(),
            source_notional_net_usd: raw_notional,
            source_notional_abs_usd: raw_notional,
            copy_delay_ms,
            decision_delay_ms,
            submit_to_ack_ms,
            bot_price: price,
            bot_size: size,
            target_notional_usd: sized.target_notional_usd,
            size_ratio,
            submit_status: submission.status.to_string(),
            error_code: submission.error_code.clone(),
            blocked_reason: String::new(),
        });
        let _ = shadow.write(
            &correlation_id,
            &sized.market_id,
            sized.window_id.as_deref(),
            sized.target_notional_usd,
            "",
            submission.accepted,
        );
    }

    fn record_block(
        correlation_id: &str,
        intent: &ExecutionIntent,
        raw_notional: Decimal,
        reason: &str,
        audit: &CopyAuditLogger,
        shadow: &ShadowDecisionLogger,
    ) {
        let _ = audit.write(&CopyAuditRow {
            ts: Utc::now(),
            correlation_id: correlation_id.to_string(),
            market_id: intent.market_id.clone(),
            window_id: intent.window_id.clone(),
            source_notional_net_usd: raw_notional,
            source_notional_abs_usd: raw_notional,
            copy_delay_ms: 0.0,
            decision_delay_ms: 0.0,
            submit_to_ack_ms: 0.0,
            bot_price: Decimal::ZERO,
            bot_size: Decimal::ZERO,
            target_notional_usd: intent.target_notional_usd,
            size_ratio: Decimal::ZERO,
            submit_status: String::new(),
            error_code: String::new(),
            blocked_reason: reason.to_string(),
        });
        let _ = shadow.write(
            correlation_id,
            &intent.market_id,
            intent.window_id.as_deref(),
            intent.target_notional_usd,
            reason,
            false,
        );
    }

    async fn reconcile_settlements(
        market_cache: &MarketMetadataCache,
        open_markets: &mut std::collections::HashSet<String>,
        pnl: &mut PnLTracker,
    ) {
        let markets: Vec<String> = open_markets.iter().cloned().collect();
        for market_id in markets {
            let metadata = match market_cache.get(&market_id).await {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };
            if !metadata.closed {
                continue;
            }
            pnl.settle_market(&market_id, metadata.winning_outcome.as_deref(), &metadata.settle_prices);
            open_markets.remove(&market_id);
        }
    }

    fn run_snapshot_cycle(
        metrics: &mut MetricsCollector,
        alerts: &AlertEvaluator,
        kill_switch: &mut KillSwitch,
        auto_kill: &mut AutoKillGuard,
        pnl: &PnLTracker,
        exporter: &TelemetryExporter,
        last_ws_message: &DateTime<Utc>,
    ) {
        let dashboard = metrics.snapshot_window();
        let p95 = dashboard.copy_delay_ms.map_or(0.0, |s| s.p95);
        let ws_disconnect_s = (Utc::now() - *last_ws_message).num_seconds().max(0) as u64;

        let switch_state = auto_kill.evaluate(kill_switch, dashboard.reject_rate, p95);
        let alert_state = alerts.evaluate(&dashboard, ws_disconnect_s);

        let pnl_snapshot = pnl.snapshot();
        let row = SnapshotRow::build(
            &dashboard,
            alert_state,
            &switch_state,
            &PnLFigures {
                realized_trading_usd: pnl_snapshot.realized_trading_usd,
                realized_settled_usd: pnl_snapshot.realized_settled_usd,
                unrealized_usd: pnl_snapshot.unrealized_usd,
                fees_usd: pnl_snapshot.fees_usd,
                net_usd: pnl_snapshot.net_usd,
            },
        );
        if let Err(err) = exporter.write_snapshot(&row) {
            warn!(error = %err, "telemetry_snapshot_write_failed");
        }
        info!(
            reject_rate = dashboard.reject_rate,
            kill_switch_active = switch_state.active,
            net_pnl_usd = %pnl_snapshot.net_usd,
            "telemetry_snapshot"
        );
    }
}

/// Milliseconds from `start` to `end`, floored at zero (clock skew across
/// async boundaries should never surface as a negative latency).
fn ms_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    ((end - start).num_milliseconds() as f64).max(0.0)
}

/// Drops every coalesced source event's in-flight stage timing. Only the
/// first id stands in for the bucket in `record_decision`/`record_order_submit`/
/// `record_ack`; without this the rest never clear and `stages` grows
/// unbounded for any bucket that coalesced more than one event.
fn discard_coalesced_stages(metrics: &mut MetricsCollector, coalesced_event_ids: &[String]) {
    for event_id in coalesced_event_ids {
        metrics.discard(event_id);
    }
}

/// Converts a reference price into a marketable-limit price by walking it
/// `max_slippage_bps` in the direction that guarantees a fill, clamped to the
/// valid (0, 1) probability range for a binary-outcome market.
fn marketable_price(reference_price: Price, side: Side, max_slippage_bps: u32) -> Price {
    let slippage = Decimal::new(max_slippage_bps.into(), 4);
    let adjusted = match side {
        Side::Buy => reference_price * (Decimal::ONE + slippage),
        Side::Sell => reference_price * (Decimal::ONE - slippage),
    };
    adjusted.clamp(Decimal::new(1, 2), Decimal::new(99, 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn marketable_price_walks_buy_up_and_sell_down() {
        let buy = marketable_price(dec!(0.50), Side::Buy, 100);
        let sell = marketable_price(dec!(0.50), Side::Sell, 100);
        assert!(buy > dec!(0.50));
        assert!(sell < dec!(0.50));
    }

    #[test]
    fn marketable_price_clamps_to_valid_probability_range() {
        let high = marketable_price(dec!(0.999), Side::Buy, 5000);
        let low = marketable_price(dec!(0.001), Side::Sell, 5000);
        assert_eq!(high, dec!(0.99));
        assert_eq!(low, dec!(0.01));
    }
}
