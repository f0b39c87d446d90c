//! Database row types for the state store's two tables.

use diesel::prelude::*;

use super::schema::{checkpoints, processed_events};

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = checkpoints)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CheckpointRow {
    pub stream_name: String,
    pub value: String,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = processed_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProcessedEventRow {
    pub dedupe_key: String,
    pub event_id: String,
    pub tx_hash: String,
    pub sequence: String,
    pub market_id: String,
    pub seen_at_unix: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_row_is_insertable() {
        let _row = CheckpointRow {
            stream_name: "source_activity".to_string(),
            value: "evt-1".to_string(),
        };
    }

    #[test]
    fn processed_event_row_is_insertable() {
        let _row = ProcessedEventRow {
            dedupe_key: "id:evt-1".to_string(),
            event_id: "evt-1".to_string(),
            tx_hash: String::new(),
            sequence: String::new(),
            market_id: "m1".to_string(),
            seen_at_unix: 100,
        };
    }
}
