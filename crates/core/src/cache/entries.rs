//! Link queue entry storage.
//!
//! One row per distinct target URL, keyed by [`entry_key`]. A row with
//! status `pending` is a job waiting for the scheduler; any other status is
//! a resolved result that lives until `expires_at`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio_rusqlite::rusqlite::{
    self, params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef},
};

use super::clock::format_timestamp;
use super::connection::CacheDb;
use super::hash::entry_key;
use crate::Error;

/// Default entry kind for outbound links found in page content.
pub const LINK_KIND: &str = "link";

/// Page-preview metadata keyed by property name (`title`, `description`, ...).
pub type Preview = BTreeMap<String, String>;

const COLUMNS: &str = "id, kind, source_url, target_url, status, preview_json, created_at, expires_at";

/// Concatenated entry content matched by free-text search.
const SEARCH_EXPR: &str =
    "target_url || ' ' || source_url || ' ' || status || ' ' || kind || ' ' || COALESCE(preview_json, '')";

/// Resolution state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    /// Waiting for the scheduler to fetch it.
    Pending,
    /// The fetch failed before any HTTP status was obtained.
    Error,
    /// The fetch completed with this HTTP status code.
    Http(u16),
}

impl EntryStatus {
    pub fn is_pending(self) -> bool {
        matches!(self, EntryStatus::Pending)
    }

    /// `error` or an HTTP 4xx/5xx status.
    pub fn is_broken(self) -> bool {
        match self {
            EntryStatus::Pending => false,
            EntryStatus::Error => true,
            EntryStatus::Http(code) => (400..=599).contains(&code),
        }
    }

    /// Status for an HTTP code, falling back to `error` outside 100-599.
    pub fn from_code(code: u16) -> Self {
        if (100..=599).contains(&code) { EntryStatus::Http(code) } else { EntryStatus::Error }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Pending => f.write_str("pending"),
            EntryStatus::Error => f.write_str("error"),
            EntryStatus::Http(code) => write!(f, "{code}"),
        }
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid entry status: {0:?}")]
pub struct StatusParseError(pub String);

impl FromStr for EntryStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(EntryStatus::Pending),
            "error" => Ok(EntryStatus::Error),
            other => match other.parse::<u16>() {
                Ok(code) if (100..=599).contains(&code) => Ok(EntryStatus::Http(code)),
                _ => Err(StatusParseError(s.to_string())),
            },
        }
    }
}

impl Serialize for EntryStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EntryStatus::Http(code) => serializer.serialize_u16(*code),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for EntryStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u16),
            Text(String),
        }

        let parsed = match Raw::deserialize(deserializer)? {
            Raw::Code(code) => code.to_string().parse(),
            Raw::Text(text) => text.parse(),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

impl ToSql for EntryStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for EntryStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: StatusParseError| FromSqlError::Other(Box::new(e)))
    }
}

/// A queued (or resolved) outbound link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct QueueEntry {
    pub id: String,
    pub kind: String,
    /// Page the link was discovered on.
    pub source_url: String,
    /// Normalized external URL being checked.
    pub target_url: String,
    /// `"pending"`, `"error"` or an HTTP status code.
    #[schemars(with = "serde_json::Value")]
    pub status: EntryStatus,
    pub preview: Option<Preview>,
    pub created_at: String,
    pub expires_at: Option<String>,
}

impl QueueEntry {
    /// Build a fresh pending entry. `target_url` must already be normalized.
    pub fn pending(target_url: &str, source_url: &str, kind: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: entry_key(target_url),
            kind: kind.to_string(),
            source_url: source_url.to_string(),
            target_url: target_url.to_string(),
            status: EntryStatus::Pending,
            preview: None,
            created_at: format_timestamp(created_at),
            expires_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    pub fn is_resolved(&self) -> bool {
        !self.status.is_pending()
    }

    pub fn is_broken(&self) -> bool {
        self.status.is_broken()
    }

    pub fn is_link(&self) -> bool {
        self.kind == LINK_KIND
    }

    /// Look up one preview property.
    pub fn preview_value(&self, key: &str) -> Option<&str> {
        self.preview.as_ref().and_then(|p| p.get(key)).map(String::as_str)
    }
}

/// Selection criteria for listing, counting and clearing entries.
///
/// Expired entries never match.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub id_prefix: Option<String>,
    pub status: Option<EntryStatus>,
    /// Case-insensitive substring matched against the serialized entry.
    pub search: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl EntryFilter {
    pub fn status(status: EntryStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }

    pub fn search(term: impl Into<String>) -> Self {
        Self { search: Some(term.into()), ..Default::default() }
    }

    fn where_clause(&self, now: &str) -> (String, Vec<Value>) {
        let mut clauses = vec!["(expires_at IS NULL OR expires_at > ?)".to_string()];
        let mut values = vec![Value::Text(now.to_string())];

        if let Some(prefix) = &self.id_prefix {
            clauses.push("id LIKE ? ESCAPE '\\'".to_string());
            values.push(Value::Text(format!("{}%", escape_like(prefix))));
        }

        if let Some(status) = self.status {
            clauses.push("status = ?".to_string());
            values.push(Value::Text(status.to_string()));
        }

        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            clauses.push(format!("({SEARCH_EXPR}) LIKE ? ESCAPE '\\'"));
            values.push(Value::Text(format!("%{}%", escape_like(term))));
        }

        (clauses.join(" AND "), values)
    }
}

fn escape_like(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueEntry> {
    let preview_json: Option<String> = row.get(5)?;
    let preview = preview_json
        .map(|json| {
            serde_json::from_str::<Preview>(&json)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e)))
        })
        .transpose()?;

    Ok(QueueEntry {
        id: row.get(0)?,
        kind: row.get(1)?,
        source_url: row.get(2)?,
        target_url: row.get(3)?,
        status: row.get(4)?,
        preview,
        created_at: row.get(6)?,
        expires_at: row.get(7)?,
    })
}

/// Separate undecodable rows from genuine storage failures.
fn decode_error(err: rusqlite::Error) -> Error {
    match err {
        rusqlite::Error::FromSqlConversionFailure(_, _, e) => Error::CorruptEntry(e.to_string()),
        rusqlite::Error::InvalidColumnType(idx, name, ty) => {
            Error::CorruptEntry(format!("column {idx} ({name}) has type {ty}"))
        }
        other => Error::from(other),
    }
}

fn preview_to_json(preview: Option<&Preview>) -> Result<Option<String>, Error> {
    preview
        .map(|p| serde_json::to_string(p).map_err(|e| Error::CorruptEntry(e.to_string())))
        .transpose()
}

impl CacheDb {
    /// Insert a pending entry unless one already exists under its key.
    ///
    /// An expired row under the same key is dropped first, so an expired
    /// URL behaves exactly like one never seen. Returns whether a row was
    /// created.
    pub async fn insert_pending(&self, entry: &QueueEntry) -> Result<bool, Error> {
        let entry = entry.clone();
        let preview_json = preview_to_json(entry.preview.as_ref())?;
        let now = format_timestamp(self.now());

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM link_queue WHERE id = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
                    params![&entry.id, &now],
                )?;
                let inserted = tx.execute(
                    "INSERT INTO link_queue (id, kind, source_url, target_url, status, preview_json, created_at, expires_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(id) DO NOTHING",
                    params![
                        &entry.id,
                        &entry.kind,
                        &entry.source_url,
                        &entry.target_url,
                        &entry.status,
                        &preview_json,
                        &entry.created_at,
                        &entry.expires_at,
                    ],
                )?;
                tx.commit()?;
                Ok(inserted == 1)
            })
            .await
            .map_err(Error::from)
    }

    /// Expiry timestamp `ttl` from now, or `None` for no expiry.
    fn expiry_after(&self, ttl: Option<Duration>) -> Result<Option<String>, Error> {
        let Some(ttl) = ttl else {
            return Ok(None);
        };
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|delta| self.now().checked_add_signed(delta))
            .ok_or_else(|| Error::InvalidInput(format!("ttl out of range: {ttl:?}")))?;
        Ok(Some(format_timestamp(expires_at)))
    }

    /// Write an entry, overwriting whatever is stored under its key.
    ///
    /// `ttl` of `None` means the entry never expires on its own. Returns the
    /// entry as stored, with `expires_at` filled in.
    pub async fn put_entry(&self, entry: &QueueEntry, ttl: Option<Duration>) -> Result<QueueEntry, Error> {
        let mut entry = entry.clone();
        entry.expires_at = self.expiry_after(ttl)?;
        let preview_json = preview_to_json(entry.preview.as_ref())?;
        let stored = entry.clone();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO link_queue (id, kind, source_url, target_url, status, preview_json, created_at, expires_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(id) DO UPDATE SET
                        kind = excluded.kind,
                        source_url = excluded.source_url,
                        target_url = excluded.target_url,
                        status = excluded.status,
                        preview_json = excluded.preview_json,
                        created_at = excluded.created_at,
                        expires_at = excluded.expires_at",
                    params![
                        &entry.id,
                        &entry.kind,
                        &entry.source_url,
                        &entry.target_url,
                        &entry.status,
                        &preview_json,
                        &entry.created_at,
                        &entry.expires_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(stored)
    }

    /// Move a pending entry to its resolved `status` and `preview`.
    ///
    /// Only a row that is still pending is updated. Returns `None` when the
    /// entry was deleted or already resolved, leaving the store untouched.
    pub async fn resolve_entry(
        &self, id: &str, status: EntryStatus, preview: Option<&Preview>, ttl: Option<Duration>,
    ) -> Result<Option<QueueEntry>, Error> {
        if status.is_pending() {
            return Err(Error::InvalidInput(format!("cannot resolve {id} to pending")));
        }
        let expires_at = self.expiry_after(ttl)?;
        let preview_json = preview_to_json(preview)?;
        let id = id.to_string();

        self.conn
            .call(move |conn| -> Result<Option<QueueEntry>, Error> {
                let tx = conn.transaction()?;
                let updated = tx.execute(
                    "UPDATE link_queue SET status = ?1, preview_json = ?2, expires_at = ?3
                    WHERE id = ?4 AND status = 'pending'",
                    params![&status, &preview_json, &expires_at, &id],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let entry = tx
                    .query_row(&format!("SELECT {COLUMNS} FROM link_queue WHERE id = ?1"), params![&id], entry_from_row)
                    .map_err(decode_error)?;
                tx.commit()?;
                Ok(Some(entry))
            })
            .await
            .map_err(Error::from)
    }

    /// Get a live entry by key. Expired entries read as absent.
    pub async fn get_entry(&self, id: &str) -> Result<Option<QueueEntry>, Error> {
        let id = id.to_string();
        let now = format_timestamp(self.now());
        self.conn
            .call(move |conn| -> Result<Option<QueueEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM link_queue
                    WHERE id = ?1 AND (expires_at IS NULL OR expires_at > ?2)"
                ))?;

                match stmt.query_row(params![id, now], entry_from_row) {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(decode_error(e)),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a live entry. Returns whether one was removed.
    pub async fn delete_entry(&self, id: &str) -> Result<bool, Error> {
        let id = id.to_string();
        let now = format_timestamp(self.now());
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM link_queue WHERE id = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                    params![id, now],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// List live entries matching the filter, newest first.
    pub async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<QueueEntry>, Error> {
        let now = format_timestamp(self.now());
        let (clause, mut values) = filter.where_clause(&now);
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        values.push(Value::Integer(limit));
        values.push(Value::Integer(filter.offset as i64));

        self.conn
            .call(move |conn| -> Result<Vec<QueueEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM link_queue WHERE {clause}
                    ORDER BY created_at DESC, id ASC
                    LIMIT ? OFFSET ?"
                ))?;
                let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), entry_from_row)?;
                let entries = rows.map(|row| row.map_err(decode_error)).collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    /// Count live entries matching the filter. Offset and limit are ignored.
    pub async fn count_entries(&self, filter: &EntryFilter) -> Result<u64, Error> {
        let now = format_timestamp(self.now());
        let (clause, values) = filter.where_clause(&now);

        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM link_queue WHERE {clause}"),
                    rusqlite::params_from_iter(values.iter()),
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete live entries whose content matches `search`, or all of them.
    ///
    /// Expired rows are purged first and not included in the count.
    pub async fn delete_matching(&self, search: Option<&str>) -> Result<u64, Error> {
        let now = format_timestamp(self.now());
        let filter = EntryFilter { search: search.map(str::to_string), ..Default::default() };
        let (clause, values) = filter.where_clause(&now);

        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM link_queue WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![&now],
                )?;
                let count = tx.execute(
                    &format!("DELETE FROM link_queue WHERE {clause}"),
                    rusqlite::params_from_iter(values.iter()),
                )?;
                tx.commit()?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_entries(&self) -> Result<u64, Error> {
        let now = format_timestamp(self.now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM link_queue WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![now],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
