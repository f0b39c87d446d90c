//! Source producers: the Activity API poller and the CLOB websocket watcher,
//! plus the backoff helper both reconnect loops share.

pub mod activity_poller;
pub mod reconnect;
pub mod ws_watcher;

pub use activity_poller::{ActivityPoller, ActivityPollerConfig};
pub use reconnect::Backoff;
pub use ws_watcher::{TradeFeedWatcher, WsWatcherConfig};
