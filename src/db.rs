//! SQLite-backed cache for the last committed location.

use crate::location::{LocationStore, StoreError};
use crate::models::Location;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::info;

/// Key the location is stored under.
pub const SAVED_LOCATION_KEY: &str = "savedLocation";

pub struct SqliteLocationStore {
    conn: Connection,
}

impl SqliteLocationStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let store = Self::with_connection(Connection::open(path)?)?;
        info!("Opened location cache at {}", path.display());
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }
}

impl LocationStore for SqliteLocationStore {
    fn load(&self) -> Result<Option<Location>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?",
                [SAVED_LOCATION_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, location: &Location) -> Result<(), StoreError> {
        let json = serde_json::to_string(location)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            params![SAVED_LOCATION_KEY, json],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_loads_nothing() {
        let store = SqliteLocationStore::in_memory().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_overwrites_the_single_entry() {
        let store = SqliteLocationStore::in_memory().unwrap();
        store
            .save(&Location::new("Manila, Metro Manila", 14.5995, 120.9842))
            .unwrap();
        store
            .save(&Location::new("Pasig, Metro Manila", 14.5764, 121.0851))
            .unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.display_name, "Pasig, Metro Manila");

        let rows: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn corrupt_entry_surfaces_as_json_error() {
        let store = SqliteLocationStore::in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?, ?)",
                params![SAVED_LOCATION_KEY, "{not json"],
            )
            .unwrap();

        assert!(matches!(store.load(), Err(StoreError::Json(_))));
    }

    #[test]
    fn stored_value_uses_cache_shape() {
        let store = SqliteLocationStore::in_memory().unwrap();
        store
            .save(&Location::new("Taguig, Metro Manila", 14.5176, 121.0509))
            .unwrap();

        let raw: String = store
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?",
                [SAVED_LOCATION_KEY],
                |row| row.get(0),
            )
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["name"], "Taguig, Metro Manila");
        assert_eq!(value["lat"], 14.5176);
        assert_eq!(value["lng"], 121.0509);
    }
}
