//! coinbot - copies trades from a watched wallet on a binary-outcome
//! prediction market into orders for a controlled account.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── core/
//! │   ├── domain/       # Trade events, windows, intents, orders
//! │   ├── intake/        # Activity-poller and websocket producers
//! │   ├── pipeline/      # Coalescer, sizing policy, risk tracker
//! │   ├── execution/     # Order client, market metadata cache
//! │   ├── store/         # Durable state (SQLite/Diesel)
//! │   ├── pnl/           # Realized/unrealized PnL tracking
//! │   └── telemetry/     # Metrics, audit log, kill switch, alerts, exporter
//! ├── app/               # Configuration and the orchestrator loop
//! └── cli/               # Command-line entry points
//! ```

pub mod app;
pub mod cli;
pub mod core;
pub mod error;
