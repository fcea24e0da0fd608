use crate::{Database, KeyValueStore};
use anyhow::Result;
use rusqlite::OptionalExtension;

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row("SELECT value FROM client_state WHERE key = ?1", [key], |row| row.get(0))
                .optional()?;
            Ok(value)
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO client_state (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                (key, value),
            )?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM client_state WHERE key = ?1", [key])?;
            Ok(())
        })
    }

    /// All or nothing.
    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for key in keys {
                tx.execute("DELETE FROM client_state WHERE key = ?1", [*key])?;
            }
            tx.commit()?;
            Ok(())
        })
    }
}
