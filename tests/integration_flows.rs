//! End-to-end tests threading a burst of source fills through coalescing,
//! policy sizing, risk checks, order submission, lifecycle tracking, and
//! PnL accounting, the way the orchestrator wires these stages together.

use chrono::{Duration, Utc};
use coinbot::core::domain::{SourcePath, TradeEvent};
use coinbot::core::execution::{
    ClobOrderClient, OrderClient, OrderClientConfig, OrderLifecycleStore, PolymarketCredentials,
};
use coinbot::core::pipeline::{
    Coalescer, CoalescerConfig, DecisionResult, IntentPolicy, PolicyConfig, RiskConfig, SizingMode,
    WindowRiskTracker,
};
use coinbot::core::pnl::PnLTracker;
use coinbot::core::telemetry::MetricsCollector;
use rust_decimal_macros::dec;

fn fill(id: &str, side: coinbot::core::domain::Side, price: rust_decimal::Decimal, shares: rust_decimal::Decimal, ts: chrono::DateTime<Utc>) -> TradeEvent {
    TradeEvent {
        event_id: id.into(),
        source_wallet: "0xwatched".into(),
        market_id: "m1".into(),
        market_slug: "eth-up-or-down".into(),
        outcome: "Up".into(),
        side,
        price,
        shares,
        notional_usd: price * shares,
        executed_ts: ts,
        received_ts: ts,
        window: None,
        source_path: SourcePath::ActivityApi,
        tx_hash: String::new(),
        sequence: String::new(),
        source_exec_to_fetch_ms: 50.0,
        source_fetch_to_emit_ms: 5.0,
        source_poll_cycle_ms: 1000.0,
    }
}

fn policy() -> IntentPolicy {
    IntentPolicy::new(PolicyConfig {
        near_expiry_cutoff_seconds: 30,
        max_source_staleness_ms: 10_000,
        sizing_mode: SizingMode::Proportional,
        fixed_order_notional_usd: dec!(0),
        size_multiplier: dec!(0.5),
        min_order_notional_usd: dec!(1),
        max_notional_per_order_usd: dec!(100),
    })
}

fn risk_config() -> RiskConfig {
    RiskConfig {
        max_total_notional_per_15m_window_usd: dec!(500),
        max_notional_per_market_usd: dec!(200),
        max_daily_traded_volume_usd: dec!(5_000),
    }
}

#[tokio::test]
async fn coalesced_burst_flows_through_to_an_acknowledged_order() {
    let now = Utc::now();
    let mut coalescer = Coalescer::new(CoalescerConfig::default());
    coalescer.push(
        fill("evt-1", coinbot::core::domain::Side::Buy, dec!(0.52), dec!(20), now),
        now,
    );
    coalescer.push(
        fill(
            "evt-2",
            coinbot::core::domain::Side::Buy,
            dec!(0.53),
            dec!(10),
            now + Duration::milliseconds(20),
        ),
        now,
    );

    let intents = coalescer.flush_ready(now + Duration::milliseconds(400));
    assert_eq!(intents.len(), 1);
    let intent = &intents[0];
    // 20*0.52 + 10*0.53 = 15.70
    assert_eq!(intent.target_notional_usd, dec!(15.70));

    let mut metrics = MetricsCollector::new();
    let metrics_id = intent.coalesced_event_ids[0].clone();
    metrics.record_event_receive(&metrics_id, now.timestamp_millis());

    let decision = policy().apply(intent, now, None, now);
    let sized = match decision {
        DecisionResult::Sized(sized) => sized,
        DecisionResult::Blocked { reason } => panic!("unexpected block: {reason}"),
    };
    // proportional sizing at 0.5x: 15.70 * 0.5 = 7.85
    assert_eq!(sized.target_notional_usd, dec!(7.85));
    metrics.record_decision(&metrics_id, now.timestamp_millis() + 5);

    let mut risk = WindowRiskTracker::new(risk_config(), now);
    let risk_snapshot = risk.check_and_apply(
        &sized.market_id,
        sized.window_id.as_deref(),
        sized.target_notional_usd,
        now,
    );
    assert!(!risk_snapshot.blocked);

    let client = ClobOrderClient::new(
        PolymarketCredentials {
            clob_url: "https://clob.invalid".into(),
            api_key: String::new(),
            api_secret: String::new(),
            api_passphrase: String::new(),
        },
        OrderClientConfig {
            dry_run: true,
            ..OrderClientConfig::default()
        },
    );
    let price = dec!(0.53);
    let size = sized.target_notional_usd / price;
    metrics.record_order_submit(&metrics_id, now.timestamp_millis() + 10);
    let submission = client
        .submit_marketable_limit(&sized, price, size)
        .await
        .unwrap();
    assert!(submission.accepted);
    metrics.record_ack(&metrics_id, now.timestamp_millis() + 15, true, "");

    let mut lifecycle_store = OrderLifecycleStore::new();
    let lifecycle = lifecycle_store.register(&submission);
    assert_eq!(
        lifecycle.status,
        coinbot::core::domain::OrderStatus::Acknowledged
    );

    let mut pnl = PnLTracker::new(dec!(0));
    pnl.apply_fill("m1", "Up", sized.side, price, size);
    let position = pnl.position("m1", "Up");
    assert_eq!(position.qty, size);

    let dashboard = metrics.snapshot();
    assert_eq!(dashboard.source_fills, 1);
    assert_eq!(dashboard.destination_orders, 1);
    assert_eq!(dashboard.reject_rate, 0.0);
    assert!(dashboard.copy_delay_ms.is_some());
}

#[tokio::test]
async fn risk_blocked_intent_never_reaches_the_order_client() {
    let now = Utc::now();
    let mut coalescer = Coalescer::new(CoalescerConfig::default());
    coalescer.push(
        fill("evt-1", coinbot::core::domain::Side::Buy, dec!(0.5), dec!(1000), now),
        now,
    );
    let intents = coalescer.flush_ready(now + Duration::milliseconds(400));
    let intent = &intents[0];
    assert_eq!(intent.target_notional_usd, dec!(500));

    let mut metrics = MetricsCollector::new();
    let metrics_id = intent.coalesced_event_ids[0].clone();
    metrics.record_event_receive(&metrics_id, now.timestamp_millis());

    let sized = match policy().apply(intent, now, None, now) {
        DecisionResult::Sized(sized) => sized,
        DecisionResult::Blocked { reason } => panic!("unexpected block: {reason}"),
    };
    // proportional 0.5x of 500 = 250, above the per-market cap of 200.
    let mut risk = WindowRiskTracker::new(risk_config(), now);
    let risk_snapshot = risk.check_and_apply(
        &sized.market_id,
        sized.window_id.as_deref(),
        sized.target_notional_usd,
        now,
    );
    assert!(risk_snapshot.blocked);
    assert_eq!(risk_snapshot.blocked_reason, "market_cap_exceeded");

    // A blocked decision discards its in-flight stage timing instead of
    // waiting forever for an ack that will never come.
    metrics.discard(&metrics_id);
    let dashboard = metrics.snapshot();
    assert_eq!(dashboard.source_fills, 1);
    assert_eq!(dashboard.destination_orders, 0);
}

#[tokio::test]
async fn near_expiry_intent_is_blocked_before_sizing() {
    let now = Utc::now();
    let intent_side = coinbot::core::domain::Side::Buy;
    let mut coalescer = Coalescer::new(CoalescerConfig::default());
    coalescer.push(fill("evt-1", intent_side, dec!(0.5), dec!(10), now), now);
    let intents = coalescer.flush_ready(now + Duration::milliseconds(400));
    let intent = &intents[0];

    let decision = policy().apply(intent, now, Some(5), now);
    assert!(matches!(
        decision,
        DecisionResult::Blocked { reason: "near_expiry_cutoff" }
    ));
}
