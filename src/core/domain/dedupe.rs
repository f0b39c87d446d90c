//! Priority-ordered event fingerprint used for exactly-once intake.

use std::fmt;

/// Raw fields a producer can offer toward a dedupe fingerprint. Upstream
/// sometimes omits a stable `event_id`, so the fallback chain exists to
/// still produce a useful key.
#[derive(Debug, Clone, Default)]
pub struct EventKey {
    pub event_id: String,
    pub tx_hash: String,
    pub sequence: String,
    pub market_id: String,
    pub seen_at_unix: i64,
}

/// A stable fingerprint for one observed fill.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupeKey(String);

impl DedupeKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves the fingerprint priority: `id:` > `txseq:` > `tx:` > `fallback:`.
#[must_use]
pub fn build_dedupe_key(key: &EventKey) -> DedupeKey {
    if !key.event_id.is_empty() {
        return DedupeKey(format!("id:{}", key.event_id));
    }
    if !key.tx_hash.is_empty() && !key.sequence.is_empty() {
        return DedupeKey(format!("txseq:{}:{}", key.tx_hash, key.sequence));
    }
    if !key.tx_hash.is_empty() {
        return DedupeKey(format!("tx:{}:{}", key.tx_hash, key.market_id));
    }
    DedupeKey(format!(
        "fallback:{}:{}",
        key.market_id, key.seen_at_unix
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_takes_priority() {
        let key = EventKey {
            event_id: "evt-1".into(),
            tx_hash: "0xdead".into(),
            sequence: "3".into(),
            market_id: "m1".into(),
            seen_at_unix: 100,
        };
        assert_eq!(build_dedupe_key(&key).as_str(), "id:evt-1");
    }

    #[test]
    fn tx_and_sequence_used_when_no_event_id() {
        let key = EventKey {
            event_id: String::new(),
            tx_hash: "0xdead".into(),
            sequence: "3".into(),
            market_id: "m1".into(),
            seen_at_unix: 100,
        };
        assert_eq!(build_dedupe_key(&key).as_str(), "txseq:0xdead:3");
    }

    #[test]
    fn tx_alone_falls_back_to_market() {
        let key = EventKey {
            event_id: String::new(),
            tx_hash: "0xdead".into(),
            sequence: String::new(),
            market_id: "m1".into(),
            seen_at_unix: 100,
        };
        assert_eq!(build_dedupe_key(&key).as_str(), "tx:0xdead:m1");
    }

    #[test]
    fn fallback_uses_market_and_seen_at() {
        let key = EventKey {
            event_id: String::new(),
            tx_hash: String::new(),
            sequence: String::new(),
            market_id: "m1".into(),
            seen_at_unix: 100,
        };
        assert_eq!(build_dedupe_key(&key).as_str(), "fallback:m1:100");
    }

    #[test]
    fn identical_keys_produce_identical_fingerprints() {
        let key = EventKey {
            event_id: "evt-7".into(),
            ..EventKey::default()
        };
        assert_eq!(build_dedupe_key(&key), build_dedupe_key(&key.clone()));
    }
}
