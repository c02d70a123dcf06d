//! Database migrations for congress-sync
//!
//! This module contains SQL migrations for the SQLite database schema.

/// SQL statement to create the initial database schema
pub const CREATE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Committees table
CREATE TABLE IF NOT EXISTS committees (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    chamber TEXT NOT NULL,
    committee_type TEXT NOT NULL,
    parent_id TEXT REFERENCES committees(id),
    url TEXT,
    update_date DATETIME NOT NULL,
    synced_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_committees_parent ON committees(parent_id);

-- Legislators table
CREATE TABLE IF NOT EXISTS legislators (
    id TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    middle_name TEXT,
    last_name TEXT NOT NULL,
    suffix TEXT,
    full_name TEXT NOT NULL,
    party TEXT NOT NULL,
    state TEXT NOT NULL,
    district INTEGER,
    chamber TEXT NOT NULL,
    is_current INTEGER NOT NULL DEFAULT 1,
    image_url TEXT,
    update_date DATETIME NOT NULL,
    synced_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_legislators_state ON legislators(state, chamber);

-- Bills table
CREATE TABLE IF NOT EXISTS bills (
    id TEXT PRIMARY KEY,
    congress INTEGER NOT NULL,
    bill_type TEXT NOT NULL,
    number INTEGER NOT NULL,
    title TEXT NOT NULL,
    origin_chamber TEXT NOT NULL,
    status TEXT NOT NULL,
    introduced_date DATETIME,
    latest_action_date DATETIME,
    latest_action_text TEXT,
    sponsor_id TEXT REFERENCES legislators(id),
    policy_area TEXT,
    update_date DATETIME NOT NULL,
    synced_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(congress, bill_type, number)
);

CREATE INDEX IF NOT EXISTS idx_bills_congress ON bills(congress, update_date DESC);
CREATE INDEX IF NOT EXISTS idx_bills_sponsor ON bills(sponsor_id);

-- Bill to committee referrals
CREATE TABLE IF NOT EXISTS bill_committees (
    bill_id TEXT NOT NULL REFERENCES bills(id) ON DELETE CASCADE,
    committee_id TEXT NOT NULL REFERENCES committees(id),
    PRIMARY KEY (bill_id, committee_id)
);

-- Sync run history
CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at DATETIME NOT NULL,
    finished_at DATETIME NOT NULL,
    success INTEGER NOT NULL,
    aborted INTEGER NOT NULL DEFAULT 0,
    stalled INTEGER NOT NULL DEFAULT 0,
    stats TEXT NOT NULL,
    error_count INTEGER NOT NULL DEFAULT 0,
    errors TEXT
);

CREATE INDEX IF NOT EXISTS idx_sync_runs_success ON sync_runs(success, started_at DESC);
"#;

/// Get the migration version
pub fn migration_version() -> i32 {
    1
}
