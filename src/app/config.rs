//! Application configuration loading and validation.
//!
//! Everything is read from the process environment (optionally pre-loaded
//! from a `.env` file via `dotenvy`) rather than a config file; wallet
//! addresses, API credentials, and risk limits are not the kind of values
//! worth round-tripping through TOML. `Config::load` fails loudly for any
//! constraint breach, matching the fatal-at-startup contract.

use std::time::Duration;

use rust_decimal::Decimal;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::execution::{MarketCacheConfig, OrderClientConfig, PolymarketCredentials};
use crate::core::intake::{ActivityPollerConfig, WsWatcherConfig};
use crate::core::pipeline::{PolicyConfig, RiskConfig, SizingMode};
use crate::core::telemetry::AutoKillThresholds;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct CopyConfig {
    pub source_wallet: String,
    pub coalesce_ms: i64,
    pub net_opposite_trades: bool,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Installs the global tracing subscriber. `level_override` wins over
    /// both `RUST_LOG` and the configured level, for `--log-level`.
    pub fn init(&self, level_override: Option<&str>) {
        let filter = level_override
            .map(EnvFilter::new)
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub copy: CopyConfig,
    pub max_slippage_bps: u32,
    pub policy: PolicyConfig,
    pub risk: RiskConfig,
    pub order_client: OrderClientConfig,
    pub credentials: Option<PolymarketCredentials>,
    pub market_cache: MarketCacheConfig,
    pub activity_poller: ActivityPollerConfig,
    pub ws_watcher: WsWatcherConfig,
    pub auto_kill: AutoKillThresholds,
    pub fee_bps: Decimal,
    pub database_url: String,
    pub telemetry_dir: std::path::PathBuf,
    pub snapshot_interval: Duration,
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads from the environment (after `dotenvy::dotenv()`, which the
    /// caller is expected to have already run) and validates every
    /// constraint named in the external-interfaces section. Any breach is a
    /// fatal `Error::Config`.
    pub fn load() -> Result<Self> {
        let source_wallet = require_env("COPY_SOURCE_WALLET")?;
        if !is_hex_address(&source_wallet) {
            return Err(Error::Config(format!(
                "COPY_SOURCE_WALLET must be a 42-char 0x address, got {source_wallet:?}"
            )));
        }

        let copy_mode = env_or("COPY_MODE", "intent_net");
        if copy_mode != "intent_net" && copy_mode != "fill_by_fill" {
            return Err(Error::Config(format!(
                "COPY_MODE must be intent_net or fill_by_fill, got {copy_mode:?}"
            )));
        }

        let coalesce_ms = env_parse_or("COPY_COALESCE_MS", 300i64)?;
        if coalesce_ms <= 0 {
            return Err(Error::Config("COPY_COALESCE_MS must be > 0".into()));
        }

        let sizing_mode = match env_or("SIZING_MODE", "fixed").as_str() {
            "fixed" => SizingMode::Fixed,
            "proportional" => SizingMode::Proportional,
            "capped_proportional" => SizingMode::CappedProportional,
            other => {
                return Err(Error::Config(format!(
                    "SIZING_MODE must be one of fixed, proportional, capped_proportional, got {other:?}"
                )))
            }
        };

        let min_order_notional_usd = env_parse_or("SIZING_MIN_ORDER_NOTIONAL_USD", Decimal::new(5, 0))?;
        let max_notional_per_order_usd = env_parse_or("SIZING_MAX_NOTIONAL_PER_ORDER_USD", Decimal::new(500, 0))?;
        if max_notional_per_order_usd < min_order_notional_usd {
            return Err(Error::Config(
                "SIZING_MAX_NOTIONAL_PER_ORDER_USD must be >= SIZING_MIN_ORDER_NOTIONAL_USD".into(),
            ));
        }

        let order_type = env_or("EXECUTION_ORDER_TYPE", "marketable_limit");
        if order_type != "marketable_limit" {
            return Err(Error::Config(format!(
                "EXECUTION_ORDER_TYPE must be marketable_limit, got {order_type:?}"
            )));
        }

        let max_slippage_bps: u32 = env_parse_or("EXECUTION_MAX_SLIPPAGE_BPS", 120)?;
        if max_slippage_bps == 0 {
            return Err(Error::Config("EXECUTION_MAX_SLIPPAGE_BPS must be > 0".into()));
        }

        let near_expiry_cutoff_seconds: i64 = env_parse_or("EXECUTION_NEAR_EXPIRY_CUTOFF_SECONDS", 30)?;
        if near_expiry_cutoff_seconds < 0 {
            return Err(Error::Config("EXECUTION_NEAR_EXPIRY_CUTOFF_SECONDS must be >= 0".into()));
        }

        let fee_bps: Decimal = env_parse_or("EXECUTION_FEE_BPS", Decimal::ZERO)?;
        if fee_bps < Decimal::ZERO {
            return Err(Error::Config("EXECUTION_FEE_BPS must be >= 0".into()));
        }

        let dry_run: bool = env_parse_or("EXECUTION_DRY_RUN", true)?;

        let credentials = if dry_run {
            None
        } else {
            Some(PolymarketCredentials {
                clob_url: require_env("POLYMARKET_CLOB_URL")?,
                api_key: require_env("POLYMARKET_API_KEY")?,
                api_secret: require_env("POLYMARKET_API_SECRET")?,
                api_passphrase: require_env("POLYMARKET_API_PASSPHRASE")?,
            })
        };

        let auto_kill = AutoKillThresholds {
            max_error_rate: env_parse_or("AUTO_KILL_MAX_ERROR_RATE", 0.2)?,
            max_p95_latency_ms: env_parse_or("AUTO_KILL_MAX_P95_LATENCY_MS", 1200.0)?,
            recover_max_error_rate: env_parse_or("AUTO_KILL_RECOVER_MAX_ERROR_RATE", 0.1)?,
            recover_max_p95_latency_ms: env_parse_or("AUTO_KILL_RECOVER_MAX_P95_LATENCY_MS", 800.0)?,
            recovery_consecutive_snapshots: env_parse_or("AUTO_KILL_RECOVERY_CONSECUTIVE_SNAPSHOTS", 2)?,
        };
        if auto_kill.recover_max_error_rate >= auto_kill.max_error_rate {
            return Err(Error::Config(
                "AUTO_KILL_RECOVER_MAX_ERROR_RATE must be < AUTO_KILL_MAX_ERROR_RATE".into(),
            ));
        }
        if auto_kill.recover_max_p95_latency_ms >= auto_kill.max_p95_latency_ms {
            return Err(Error::Config(
                "AUTO_KILL_RECOVER_MAX_P95_LATENCY_MS must be < AUTO_KILL_MAX_P95_LATENCY_MS".into(),
            ));
        }

        let data_api_url = env_or("COINBOT_DATA_API_URL", "https://data-api.polymarket.com");
        let gamma_api_url = env_or("COINBOT_GAMMA_API_URL", "https://gamma-api.polymarket.com");
        let clob_ws_url = env_or("COINBOT_CLOB_WS_URL", "wss://ws-subscriptions-clob.polymarket.com/ws");

        Ok(Self {
            copy: CopyConfig {
                source_wallet: source_wallet.clone(),
                coalesce_ms,
                net_opposite_trades: env_parse_or("COPY_NET_OPPOSITE_TRADES", true)?,
            },
            max_slippage_bps,
            policy: PolicyConfig {
                near_expiry_cutoff_seconds,
                max_source_staleness_ms: env_parse_or("COPY_MAX_SOURCE_STALENESS_MS", 4000)?,
                sizing_mode,
                fixed_order_notional_usd: env_parse_or("SIZING_FIXED_ORDER_NOTIONAL_USD", Decimal::new(10, 0))?,
                size_multiplier: env_parse_or("SIZING_SIZE_MULTIPLIER", Decimal::new(1, 0))?,
                min_order_notional_usd,
                max_notional_per_order_usd,
            },
            risk: RiskConfig {
                max_total_notional_per_15m_window_usd: env_parse_or(
                    "SIZING_MAX_TOTAL_NOTIONAL_PER_15M_WINDOW_USD",
                    Decimal::new(2000, 0),
                )?,
                max_notional_per_market_usd: env_parse_or("SIZING_MAX_NOTIONAL_PER_MARKET_USD", Decimal::new(1000, 0))?,
                max_daily_traded_volume_usd: env_parse_or("SIZING_MAX_DAILY_TRADED_VOLUME_USD", Decimal::new(10_000, 0))?,
            },
            order_client: OrderClientConfig {
                dry_run,
                max_retries: env_parse_or("EXECUTION_MAX_RETRIES", 3)?,
                request_timeout: Duration::from_secs_f64(env_parse_or("EXECUTION_REQUEST_TIMEOUT_SECONDS", 3.0)?),
            },
            credentials,
            market_cache: MarketCacheConfig {
                gamma_api_url,
                ttl: Duration::from_secs(env_parse_or("MARKET_CACHE_TTL_SECONDS", 60)?),
                request_timeout: Duration::from_secs_f64(env_parse_or("MARKET_CACHE_REQUEST_TIMEOUT_SECONDS", 4.0)?),
            },
            activity_poller: ActivityPollerConfig {
                data_api_url: data_api_url.clone(),
                source_wallet: source_wallet.clone(),
                poll_interval: Duration::from_millis(env_parse_or("COPY_POLL_INTERVAL_MS", 700)?),
                limit: env_parse_or("COPY_ACTIVITY_LIMIT", 200)?,
                stream_name: "source_activity".to_string(),
            },
            ws_watcher: WsWatcherConfig {
                ws_url: clob_ws_url,
                data_api_url,
                source_wallet,
                ping_interval: Duration::from_secs(env_parse_or("COPY_WS_PING_INTERVAL_SECONDS", 20)?),
            },
            auto_kill,
            fee_bps,
            database_url: env_or("COINBOT_DATABASE_URL", "data/coinbot.db"),
            telemetry_dir: env_or("COINBOT_TELEMETRY_DIR", "runs/telemetry").into(),
            snapshot_interval: Duration::from_secs(env_parse_or("COINBOT_SNAPSHOT_INTERVAL_SECONDS", 30)?),
            logging: LoggingConfig {
                level: env_or("COINBOT_LOG_LEVEL", "info"),
                format: env_or("COINBOT_LOG_FORMAT", "pretty"),
            },
        })
    }
}

fn is_hex_address(value: &str) -> bool {
    value.len() == 42 && value.starts_with("0x") && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| Error::Config(format!("missing required environment variable {name}")))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| Error::Config(format!("{name} has an invalid value: {value:?}"))),
        Err(_) => Ok(default),
    }
}
