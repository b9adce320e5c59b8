//! SQLite executor for [`QuoteStore`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use super::{QuoteStore, StoreError, StoreResult};
use crate::quote::Quote;

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS quote (
    id          TEXT PRIMARY KEY NOT NULL,
    book        TEXT NOT NULL,
    quote       TEXT NOT NULL,
    inserted_at TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);";

const COLUMNS: &str = "id, book, quote, inserted_at, updated_at";

/// One SQLite connection shared behind a mutex. Each call runs on tokio's
/// blocking pool so a slow statement never stalls the reactor.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens `url` and makes sure the `quote` table exists.
    ///
    /// `url` is a file path, optionally prefixed `sqlite://` or `sqlite:`;
    /// `:memory:` opens a private in-memory database.
    pub fn open(url: &str) -> StoreResult<Self> {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);

        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(Path::new(path))?
        };
        conn.execute_batch(SCHEMA_SQL)?;
        debug!(path, "sqlite store opened");

        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn in_memory() -> StoreResult<Self> {
        Self::open(":memory:")
    }

    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock())).await?
    }
}

#[async_trait]
impl QuoteStore for SqliteStore {
    async fn insert(&self, quote: &Quote) -> StoreResult<()> {
        let quote = quote.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO quote (id, book, quote, inserted_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    quote.id.to_string(),
                    quote.book,
                    quote.quote,
                    quote.inserted_at,
                    quote.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn all(&self) -> StoreResult<Vec<Quote>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM quote;"))?;
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(quote_from_row(row)?);
            }
            Ok(out)
        })
        .await
    }

    async fn update(&self, id: &str, text: &str, at: DateTime<Utc>) -> StoreResult<Vec<Quote>> {
        let id = parse_id(id)?;
        let text = text.to_owned();
        self.run(move |conn| {
            // Both statements run under the same lock, so no other call can
            // move the row's timestamps in between.
            let stamps = conn
                .query_row(
                    "SELECT inserted_at, updated_at FROM quote WHERE id = ?1;",
                    params![id.to_string()],
                    |row| {
                        Ok((
                            row.get::<_, DateTime<Utc>>("inserted_at"),
                            row.get::<_, DateTime<Utc>>("updated_at"),
                        ))
                    },
                )
                .optional()?;
            let Some((inserted_at, updated_at)) = stamps else {
                return Err(StoreError::NotFound(id.to_string()));
            };
            let floor = std::cmp::max(
                inserted_at.map_err(StoreError::Mapping)?,
                updated_at.map_err(StoreError::Mapping)?,
            );

            let mut stmt = conn.prepare(&format!(
                "UPDATE quote SET quote = ?2, updated_at = ?3 WHERE id = ?1 RETURNING {COLUMNS};"
            ))?;
            let rows = stmt.query(params![id.to_string(), text, next_stamp(floor, at)])?;
            collect_touched(rows, id)
        })
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<Vec<Quote>> {
        let id = parse_id(id)?;
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!("DELETE FROM quote WHERE id = ?1 RETURNING {COLUMNS};"))?;
            let rows = stmt.query(params![id.to_string()])?;
            collect_touched(rows, id)
        })
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.run(|conn| {
            conn.query_row("SELECT 1;", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }
}

fn parse_id(raw: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| StoreError::InvalidId(raw.to_owned()))
}

/// `at`, unless the row already carries that time or a later one (clock
/// skew, a writer with a faster clock); then one microsecond past the row.
fn next_stamp(floor: DateTime<Utc>, at: DateTime<Utc>) -> DateTime<Utc> {
    if at > floor { at } else { floor + chrono::Duration::microseconds(1) }
}

fn collect_touched(mut rows: rusqlite::Rows<'_>, id: Uuid) -> StoreResult<Vec<Quote>> {
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(quote_from_row(row)?);
    }
    if out.is_empty() {
        return Err(StoreError::NotFound(id.to_string()));
    }
    Ok(out)
}

/// Maps a row by column name. Any column that does not decode is a
/// [`StoreError::Mapping`], not a storage fault.
fn quote_from_row(row: &Row<'_>) -> StoreResult<Quote> {
    let id: String = row.get("id").map_err(StoreError::Mapping)?;
    let id = Uuid::parse_str(&id).map_err(|e| {
        StoreError::Mapping(rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(e),
        ))
    })?;

    Ok(Quote {
        id,
        book: row.get("book").map_err(StoreError::Mapping)?,
        quote: row.get("quote").map_err(StoreError::Mapping)?,
        inserted_at: row.get("inserted_at").map_err(StoreError::Mapping)?,
        updated_at: row.get("updated_at").map_err(StoreError::Mapping)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn insert_then_all_round_trips() {
        let store = SqliteStore::in_memory().unwrap();
        let q = Quote::new("Dune", "Fear is the mind-killer");
        store.insert(&q).await.unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all, vec![q]);
    }

    #[tokio::test]
    async fn update_touches_only_text_and_updated_at() {
        let store = SqliteStore::in_memory().unwrap();
        let q = Quote::new("Dune", "old");
        store.insert(&q).await.unwrap();

        let later = q.updated_at + Duration::seconds(5);
        let updated = store.update(&q.id.to_string(), "new", later).await.unwrap();

        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].quote, "new");
        assert_eq!(updated[0].book, "Dune");
        assert_eq!(updated[0].inserted_at, q.inserted_at);
        assert_eq!(updated[0].updated_at, later);
    }

    #[tokio::test]
    async fn update_with_a_lagging_clock_still_moves_forward() {
        let store = SqliteStore::in_memory().unwrap();
        let stored_at = Utc::now() + Duration::seconds(2);
        let q = Quote::new_at(Uuid::new_v4(), "Dune", "old", stored_at);
        store.insert(&q).await.unwrap();

        let updated = store.update(&q.id.to_string(), "new", Utc::now()).await.unwrap();
        assert_eq!(updated[0].inserted_at, stored_at);
        assert!(updated[0].updated_at > stored_at);

        let again = store.update(&q.id.to_string(), "newer", Utc::now()).await.unwrap();
        assert!(again[0].updated_at > updated[0].updated_at);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_not_found() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store.update(&Uuid::new_v4().to_string(), "x", Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_terminal() {
        let store = SqliteStore::in_memory().unwrap();
        let q = Quote::new("Dune", "gone");
        store.insert(&q).await.unwrap();

        let id = q.id.to_string();
        assert_eq!(store.delete(&id).await.unwrap(), vec![q]);
        assert!(store.all().await.unwrap().is_empty());
        assert!(matches!(store.delete(&id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn malformed_id_is_rejected_before_sql() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store.delete("1; DROP TABLE quote").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidId(_)));
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn unmappable_rows_are_reported_as_mapping_errors() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO quote VALUES ('not-a-uuid', 'b', 'q', 'yesterday', 'today');",
                [],
            )
            .unwrap();

        assert!(matches!(store.all().await, Err(StoreError::Mapping(_))));
    }

    #[tokio::test]
    async fn duplicate_ids_fail_at_the_engine() {
        let store = SqliteStore::in_memory().unwrap();
        let q = Quote::new("a", "b");
        store.insert(&q).await.unwrap();
        assert!(matches!(store.insert(&q).await, Err(StoreError::Sqlite(_))));
    }
}
