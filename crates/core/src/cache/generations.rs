//! Cache generation operations.
//!
//! A generation is one named cache. Deleting it deletes every entry it holds.

use super::connection::CacheDb;
use crate::Error;
use chrono::Utc;
use tokio_rusqlite::params;

impl CacheDb {
    /// Open a generation, creating it if absent.
    ///
    /// Returns true when the generation did not exist before.
    pub async fn open_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        let created_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![name, created_at],
                )?;
                Ok(inserted == 1)
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a generation exists.
    pub async fn has_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn
                    .query_row("SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })
                    .map_err(Error::from)?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All generation names, oldest first.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all of its entries.
    ///
    /// Returns false if the generation did not exist.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
