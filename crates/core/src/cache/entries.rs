//! Cache entry operations.
//!
//! An entry maps a request (method + exact URL string) to a response snapshot
//! within one generation. URLs are not normalized: `/map` and `/map/` are
//! different keys, as are `/map` and `/map?day=2`.

use std::collections::BTreeMap;

use super::connection::CacheDb;
use crate::http::{Request, Response};
use crate::Error;
use bytes::Bytes;
use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored request/response pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub generation: String,
    pub method: String,
    pub url: String,
    pub response: Response,
    pub stored_at: String,
}

impl CacheDb {
    /// Insert or replace the entry for `request` in `generation`.
    ///
    /// Opens the generation if it does not exist yet. Concurrent writers to
    /// the same key race; the last write wins.
    pub async fn put_entry(&self, generation: &str, request: &Request, response: &Response) -> Result<(), Error> {
        self.write_entry(generation, request, response, true).await.map(|_| ())
    }

    /// Insert or replace the entry only while `generation` still exists.
    ///
    /// Returns `false` without writing when the generation was deleted, so a
    /// late writer cannot bring a removed generation back.
    pub async fn update_entry(&self, generation: &str, request: &Request, response: &Response) -> Result<bool, Error> {
        self.write_entry(generation, request, response, false).await
    }

    async fn write_entry(
        &self, generation: &str, request: &Request, response: &Response, create: bool,
    ) -> Result<bool, Error> {
        let generation = generation.to_string();
        let method = request.method.clone();
        let url = request.url.to_string();
        let status = response.status;
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.to_vec();
        let stored_at = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                if create {
                    tx.execute(
                        "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                        params![&generation, &stored_at],
                    )?;
                }
                let written = tx.execute(
                    "INSERT INTO entries (generation, method, url, status, headers_json, body, stored_at)
                    SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
                    WHERE EXISTS (SELECT 1 FROM generations WHERE name = ?1)
                    ON CONFLICT(generation, method, url) DO UPDATE SET
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![&generation, &method, &url, status, &headers_json, &body, &stored_at],
                )?;
                tx.commit()?;
                Ok(written > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Exact lookup of `request` (method + URL) in `generation`.
    pub async fn match_entry(&self, generation: &str, request: &Request) -> Result<Option<Response>, Error> {
        Ok(self
            .get_entry(generation, &request.method, request.url.as_str())
            .await?
            .map(|entry| entry.response))
    }

    /// Fetch the full stored entry, including its bookkeeping fields.
    pub async fn get_entry(&self, generation: &str, method: &str, url: &str) -> Result<Option<StoredEntry>, Error> {
        let generation = generation.to_string();
        let method = method.to_string();
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, headers_json, body, stored_at
                    FROM entries WHERE generation = ?1 AND method = ?2 AND url = ?3",
                )?;

                let result = stmt.query_row(params![&generation, &method, &url], |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                });

                match result {
                    Ok((status, headers_json, body, stored_at)) => {
                        let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)?;
                        Ok(Some(StoredEntry {
                            generation,
                            method,
                            url,
                            response: Response { status, headers, body: Bytes::from(body) },
                            stored_at,
                        }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in `generation`, sorted.
    pub async fn entry_urls(&self, generation: &str) -> Result<Vec<String>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY url ASC")?;
                let urls = stmt
                    .query_map(params![generation], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in `generation`.
    pub async fn entry_count(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
