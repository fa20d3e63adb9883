//! Parameterized SQL for one `(object, object_event)` table pair. Builds every query string once
//! (at store construction) from the entity's table name rather than formatting it again per call.

#[derive(Debug, Clone)]
pub struct Statements {
    table: String,
}

impl Statements {
    pub fn new(entity_name: &str) -> Self {
        Self {
            table: entity_name.to_string(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn create_object_table(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (id BIGSERIAL PRIMARY KEY, data JSONB NOT NULL)",
            table = self.table
        )
    }

    pub fn create_event_table(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {table}_event (
                event_id BIGSERIAL PRIMARY KEY,
                object_id BIGINT NOT NULL,
                event_kind SMALLINT NOT NULL,
                event_time BIGINT NOT NULL,
                event_account_id BIGINT,
                data JSONB NOT NULL
            )",
            table = self.table
        )
    }

    pub fn create_event_object_id_index(&self) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS {table}_event_object_id_idx ON {table}_event (object_id)",
            table = self.table
        )
    }

    pub fn insert_object(&self) -> String {
        format!("INSERT INTO {table} (data) VALUES ($1) RETURNING id", table = self.table)
    }

    pub fn update_object(&self) -> String {
        format!("UPDATE {table} SET data = $2 WHERE id = $1", table = self.table)
    }

    pub fn delete_object(&self) -> String {
        format!("DELETE FROM {table} WHERE id = $1", table = self.table)
    }

    pub fn insert_event(&self) -> String {
        format!(
            "INSERT INTO {table}_event (object_id, event_kind, event_time, event_account_id, data)
             VALUES ($1, $2, $3, $4, $5) RETURNING event_id",
            table = self.table
        )
    }

    pub fn select_events_after(&self) -> String {
        format!(
            "SELECT event_id, object_id, event_kind, event_time, event_account_id, data
             FROM {table}_event WHERE event_id > $1 ORDER BY event_id ASC",
            table = self.table
        )
    }

    pub fn advisory_lock_key(&self) -> i64 {
        // Stable per-table key for `pg_advisory_lock`, derived from the table name: a cheap,
        // deterministic hash is enough since collisions only cost extra serialization, never
        // correctness.
        let mut hash: u64 = 1469598103934665603; // FNV offset basis
        for byte in self.table.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(1099511628211); // FNV prime
        }
        hash as i64
    }
}
