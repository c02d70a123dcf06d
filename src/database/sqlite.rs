//! SQLite implementation of the Database trait
//!
//! This module provides a SQLite-based implementation of the Database trait
//! using rusqlite and tokio-rusqlite for async operations.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row};
use tokio_rusqlite::Connection;

use super::migrations::CREATE_SCHEMA;
use super::Database;
use crate::error::DbError;
use crate::models::{Bill, Committee, Legislator, SyncReport};

const BILL_COLUMNS: &str = "id, congress, bill_type, number, title, origin_chamber, status, \
     introduced_date, latest_action_date, latest_action_text, sponsor_id, policy_area, update_date";

const LEGISLATOR_COLUMNS: &str = "id, first_name, middle_name, last_name, suffix, full_name, \
     party, state, district, chamber, is_current, image_url, update_date";

const COMMITTEE_COLUMNS: &str = "id, name, chamber, committee_type, parent_id, url, update_date";

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Create a new SQLite database connection
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        // Run migrations; also enables foreign keys on this connection
        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    // =========================================================================
    // Bill operations
    // =========================================================================

    async fn find_bill(&self, id: &str) -> Result<Option<Bill>, DbError> {
        let id = id.to_string();

        self.conn
            .call(move |conn| {
                let sql = format!("SELECT {} FROM bills WHERE id = ?1", BILL_COLUMNS);
                let bill = conn.query_row(&sql, [&id], bill_from_row).optional()?;

                let Some(mut bill) = bill else {
                    return Ok(None);
                };

                let mut stmt = conn.prepare(
                    "SELECT committee_id FROM bill_committees WHERE bill_id = ?1 ORDER BY committee_id",
                )?;
                bill.committee_ids = stmt
                    .query_map([&id], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;

                Ok(Some(bill))
            })
            .await
            .map_err(Into::into)
    }

    async fn create_bill(&self, bill: &Bill) -> Result<(), DbError> {
        let bill = bill.clone();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    r#"
                    INSERT INTO bills
                    (id, congress, bill_type, number, title, origin_chamber, status,
                     introduced_date, latest_action_date, latest_action_text, sponsor_id,
                     policy_area, update_date)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                    "#,
                    rusqlite::params![
                        bill.id,
                        bill.congress,
                        bill.bill_type.to_string(),
                        bill.number,
                        bill.title,
                        bill.origin_chamber.to_string(),
                        bill.status.to_string(),
                        bill.introduced_date.map(|d| d.to_rfc3339()),
                        bill.latest_action_date.map(|d| d.to_rfc3339()),
                        bill.latest_action_text,
                        bill.sponsor_id,
                        bill.policy_area,
                        bill.update_date.to_rfc3339(),
                    ],
                )?;
                link_committees(&tx, &bill.id, &bill.committee_ids)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(map_write_error)
    }

    async fn update_bill(&self, bill: &Bill) -> Result<(), DbError> {
        let bill = bill.clone();

        let updated = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let changed = tx.execute(
                    r#"
                    UPDATE bills SET
                        congress = ?2, bill_type = ?3, number = ?4, title = ?5,
                        origin_chamber = ?6, status = ?7, introduced_date = ?8,
                        latest_action_date = ?9, latest_action_text = ?10, sponsor_id = ?11,
                        policy_area = ?12, update_date = ?13, synced_at = CURRENT_TIMESTAMP
                    WHERE id = ?1
                    "#,
                    rusqlite::params![
                        bill.id,
                        bill.congress,
                        bill.bill_type.to_string(),
                        bill.number,
                        bill.title,
                        bill.origin_chamber.to_string(),
                        bill.status.to_string(),
                        bill.introduced_date.map(|d| d.to_rfc3339()),
                        bill.latest_action_date.map(|d| d.to_rfc3339()),
                        bill.latest_action_text,
                        bill.sponsor_id,
                        bill.policy_area,
                        bill.update_date.to_rfc3339(),
                    ],
                )?;
                if changed == 0 {
                    return Ok(false);
                }
                tx.execute("DELETE FROM bill_committees WHERE bill_id = ?1", [&bill.id])?;
                link_committees(&tx, &bill.id, &bill.committee_ids)?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(map_write_error)?;

        if updated {
            Ok(())
        } else {
            Err(DbError::NotFound)
        }
    }

    async fn list_bills(&self, congress: Option<u32>, limit: u32) -> Result<Vec<Bill>, DbError> {
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM bills WHERE (?1 IS NULL OR congress = ?1) \
                     ORDER BY update_date DESC, id LIMIT ?2",
                    BILL_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let bills = stmt
                    .query_map(rusqlite::params![congress, limit], bill_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(bills)
            })
            .await
            .map_err(Into::into)
    }

    async fn count_bills(&self) -> Result<u64, DbError> {
        self.count("bills").await
    }

    // =========================================================================
    // Legislator operations
    // =========================================================================

    async fn find_legislator(&self, id: &str) -> Result<Option<Legislator>, DbError> {
        let id = id.to_string();

        self.conn
            .call(move |conn| {
                let sql = format!("SELECT {} FROM legislators WHERE id = ?1", LEGISLATOR_COLUMNS);
                let legislator = conn
                    .query_row(&sql, [&id], legislator_from_row)
                    .optional()?;
                Ok(legislator)
            })
            .await
            .map_err(Into::into)
    }

    async fn create_legislator(&self, legislator: &Legislator) -> Result<(), DbError> {
        let l = legislator.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO legislators
                    (id, first_name, middle_name, last_name, suffix, full_name, party, state,
                     district, chamber, is_current, image_url, update_date)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                    "#,
                    rusqlite::params![
                        l.id,
                        l.first_name,
                        l.middle_name,
                        l.last_name,
                        l.suffix,
                        l.full_name,
                        l.party.to_string(),
                        l.state,
                        l.district,
                        l.chamber.to_string(),
                        l.is_current,
                        l.image_url,
                        l.update_date.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_write_error)
    }

    async fn update_legislator(&self, legislator: &Legislator) -> Result<(), DbError> {
        let l = legislator.clone();

        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE legislators SET
                        first_name = ?2, middle_name = ?3, last_name = ?4, suffix = ?5,
                        full_name = ?6, party = ?7, state = ?8, district = ?9, chamber = ?10,
                        is_current = ?11, image_url = ?12, update_date = ?13,
                        synced_at = CURRENT_TIMESTAMP
                    WHERE id = ?1
                    "#,
                    rusqlite::params![
                        l.id,
                        l.first_name,
                        l.middle_name,
                        l.last_name,
                        l.suffix,
                        l.full_name,
                        l.party.to_string(),
                        l.state,
                        l.district,
                        l.chamber.to_string(),
                        l.is_current,
                        l.image_url,
                        l.update_date.to_rfc3339(),
                    ],
                )?;
                Ok(changed)
            })
            .await
            .map_err(map_write_error)?;

        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn count_legislators(&self) -> Result<u64, DbError> {
        self.count("legislators").await
    }

    // =========================================================================
    // Committee operations
    // =========================================================================

    async fn find_committee(&self, id: &str) -> Result<Option<Committee>, DbError> {
        let id = id.to_string();

        self.conn
            .call(move |conn| {
                let sql = format!("SELECT {} FROM committees WHERE id = ?1", COMMITTEE_COLUMNS);
                let committee = conn.query_row(&sql, [&id], committee_from_row).optional()?;
                Ok(committee)
            })
            .await
            .map_err(Into::into)
    }

    async fn create_committee(&self, committee: &Committee) -> Result<(), DbError> {
        let c = committee.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO committees
                    (id, name, chamber, committee_type, parent_id, url, update_date)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    rusqlite::params![
                        c.id,
                        c.name,
                        c.chamber.to_string(),
                        c.committee_type.to_string(),
                        c.parent_id,
                        c.url,
                        c.update_date.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_write_error)
    }

    async fn update_committee(&self, committee: &Committee) -> Result<(), DbError> {
        let c = committee.clone();

        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE committees SET
                        name = ?2, chamber = ?3, committee_type = ?4, parent_id = ?5,
                        url = ?6, update_date = ?7, synced_at = CURRENT_TIMESTAMP
                    WHERE id = ?1
                    "#,
                    rusqlite::params![
                        c.id,
                        c.name,
                        c.chamber.to_string(),
                        c.committee_type.to_string(),
                        c.parent_id,
                        c.url,
                        c.update_date.to_rfc3339(),
                    ],
                )?;
                Ok(changed)
            })
            .await
            .map_err(map_write_error)?;

        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn count_committees(&self) -> Result<u64, DbError> {
        self.count("committees").await
    }

    // =========================================================================
    // Sync run operations
    // =========================================================================

    async fn record_sync_run(&self, report: &SyncReport) -> Result<i64, DbError> {
        let stats = serde_json::to_string(&report.stats)
            .map_err(|e| DbError::Serialization(e.to_string()))?;
        let errors = serde_json::to_string(&report.errors)
            .map_err(|e| DbError::Serialization(e.to_string()))?;
        let started_at = report.started_at.to_rfc3339();
        let finished_at = report.finished_at.to_rfc3339();
        let success = report.success;
        let aborted = report.aborted;
        let stalled = report.stalled;
        let error_count = report.errors.len() as i64;

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO sync_runs
                    (started_at, finished_at, success, aborted, stalled, stats, error_count, errors)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                    rusqlite::params![
                        started_at,
                        finished_at,
                        success,
                        aborted,
                        stalled,
                        stats,
                        error_count,
                        errors
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Into::into)
    }

    async fn last_successful_sync(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        self.conn
            .call(|conn| {
                let started_at: Option<String> = conn
                    .query_row(
                        "SELECT started_at FROM sync_runs WHERE success = 1 ORDER BY started_at DESC LIMIT 1",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(parse_datetime(started_at))
            })
            .await
            .map_err(Into::into)
    }
}

impl SqliteDatabase {
    async fn count(&self, table: &'static str) -> Result<u64, DbError> {
        self.conn
            .call(move |conn| {
                let count: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Into::into)
    }
}

/// Insert referrals, skipping committees that are not stored
fn link_committees(
    tx: &rusqlite::Transaction<'_>,
    bill_id: &str,
    committee_ids: &[String],
) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(
        r#"
        INSERT OR IGNORE INTO bill_committees (bill_id, committee_id)
        SELECT ?1, id FROM committees WHERE id = ?2
        "#,
    )?;
    for committee_id in committee_ids {
        stmt.execute(rusqlite::params![bill_id, committee_id])?;
    }
    Ok(())
}

/// Map constraint failures to [`DbError::ConstraintViolation`]
fn map_write_error(err: tokio_rusqlite::Error) -> DbError {
    match err {
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(code, message))
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::ConstraintViolation(message.unwrap_or_else(|| code.to_string()))
        }
        other => other.into(),
    }
}

fn bill_from_row(row: &Row<'_>) -> rusqlite::Result<Bill> {
    Ok(Bill {
        id: row.get(0)?,
        congress: row.get(1)?,
        bill_type: parse_column(row, 2)?,
        number: row.get(3)?,
        title: row.get(4)?,
        origin_chamber: parse_column(row, 5)?,
        status: parse_column(row, 6)?,
        introduced_date: parse_datetime(row.get(7)?),
        latest_action_date: parse_datetime(row.get(8)?),
        latest_action_text: row.get(9)?,
        sponsor_id: row.get(10)?,
        policy_area: row.get(11)?,
        committee_ids: Vec::new(),
        update_date: required_datetime(row, 12)?,
    })
}

fn legislator_from_row(row: &Row<'_>) -> rusqlite::Result<Legislator> {
    Ok(Legislator {
        id: row.get(0)?,
        first_name: row.get(1)?,
        middle_name: row.get(2)?,
        last_name: row.get(3)?,
        suffix: row.get(4)?,
        full_name: row.get(5)?,
        party: parse_column(row, 6)?,
        state: row.get(7)?,
        district: row.get(8)?,
        chamber: parse_column(row, 9)?,
        is_current: row.get(10)?,
        image_url: row.get(11)?,
        update_date: required_datetime(row, 12)?,
    })
}

fn committee_from_row(row: &Row<'_>) -> rusqlite::Result<Committee> {
    Ok(Committee {
        id: row.get(0)?,
        name: row.get(1)?,
        chamber: parse_column(row, 2)?,
        committee_type: parse_column(row, 3)?,
        parent_id: row.get(4)?,
        url: row.get(5)?,
        update_date: required_datetime(row, 6)?,
    })
}

/// Decode a text column through `FromStr`
fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let value: String = row.get(idx)?;
    value
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn required_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    parse_datetime(Some(value.clone())).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("Invalid datetime: {}", value).into(),
        )
    })
}

/// Parse a datetime string to DateTime<Utc>
fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                // Try parsing SQLite's datetime format
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
    })
}
