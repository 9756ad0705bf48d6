use std::time::Duration;

use rusqlite::{
    params, Connection, DatabaseName, OptionalExtension, Result, Row, TransactionBehavior,
};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const CURRENT_SCHEMA_VERSION: i64 = 2;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        name: "baseline_profile_schema_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS owners (
    owner_id TEXT PRIMARY KEY,
    display_name TEXT,
    avatar_url TEXT,
    email TEXT,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS handles (
    handle TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    reserved_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    owner_id TEXT PRIMARY KEY,
    handle TEXT NOT NULL,
    display_name TEXT NOT NULL,
    avatar_url TEXT,
    bio TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS links (
    owner_id TEXT NOT NULL REFERENCES profiles(owner_id) ON DELETE CASCADE,
    id TEXT NOT NULL,
    icon TEXT NOT NULL,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    link_order INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (owner_id, id)
);

CREATE INDEX IF NOT EXISTS idx_handles_owner ON handles(owner_id);
CREATE INDEX IF NOT EXISTS idx_links_owner_order ON links(owner_id, link_order);
"#,
    },
    Migration {
        version: 2,
        name: "link_click_counters_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS link_clicks (
    owner_id TEXT NOT NULL,
    link_id TEXT NOT NULL,
    clicks INTEGER NOT NULL DEFAULT 0,
    last_clicked_at TEXT,
    PRIMARY KEY (owner_id, link_id)
);
"#,
    },
];

pub fn open_connection(path: &str, busy_timeout: Duration) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_for_speed(&conn, busy_timeout)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

fn configure_for_speed(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    let millis = i64::try_from(busy_timeout.as_millis()).unwrap_or(i64::MAX);
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "foreign_keys", "ON")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.pragma_update(None::<DatabaseName>, "busy_timeout", millis)?;
    Ok(())
}

// Immediate so concurrent openers queue on the busy handler instead of
// failing a read-to-write upgrade.
fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
"#,
    )?;

    for migration in MIGRATIONS {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, now_utc_rfc3339()],
        )?;
    }

    tx.execute(
        r#"
INSERT INTO meta (key, value)
VALUES ('schema_version', ?1)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()
}

pub fn now_utc_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .expect("RFC3339 formatting for UTC timestamp should never fail")
}

// Owners

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRecord {
    pub owner_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
    pub first_seen_at: String,
    pub last_seen_at: String,
}

pub struct UpsertOwner<'a> {
    pub owner_id: &'a str,
    pub display_name: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
    pub email: Option<&'a str>,
    pub seen_at: &'a str,
}

/// Attributes the provider omitted this time keep their previous value.
pub fn upsert_owner(conn: &Connection, args: &UpsertOwner<'_>) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO owners (owner_id, display_name, avatar_url, email, first_seen_at, last_seen_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?5)
ON CONFLICT(owner_id) DO UPDATE SET
    display_name = COALESCE(excluded.display_name, owners.display_name),
    avatar_url = COALESCE(excluded.avatar_url, owners.avatar_url),
    email = COALESCE(excluded.email, owners.email),
    last_seen_at = excluded.last_seen_at
"#,
        params![
            args.owner_id,
            args.display_name,
            args.avatar_url,
            args.email,
            args.seen_at
        ],
    )?;
    Ok(())
}

pub fn get_owner(conn: &Connection, owner_id: &str) -> Result<Option<OwnerRecord>> {
    conn.query_row(
        r#"
SELECT owner_id, display_name, avatar_url, email, first_seen_at, last_seen_at
FROM owners
WHERE owner_id = ?1
"#,
        params![owner_id],
        |row| {
            Ok(OwnerRecord {
                owner_id: row.get(0)?,
                display_name: row.get(1)?,
                avatar_url: row.get(2)?,
                email: row.get(3)?,
                first_seen_at: row.get(4)?,
                last_seen_at: row.get(5)?,
            })
        },
    )
    .optional()
}

// Handle registry rows

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleRecord {
    pub handle: String,
    pub owner_id: String,
    pub reserved_at: String,
}

/// Inserts the mapping unless the handle is already present. Returns the
/// number of inserted rows (0 or 1).
pub fn insert_handle_if_absent(
    conn: &Connection,
    handle: &str,
    owner_id: &str,
    reserved_at: &str,
) -> Result<usize> {
    conn.execute(
        r#"
INSERT INTO handles (handle, owner_id, reserved_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(handle) DO NOTHING
"#,
        params![handle, owner_id, reserved_at],
    )
}

pub fn get_handle_owner(conn: &Connection, handle: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT owner_id FROM handles WHERE handle = ?1",
        params![handle],
        |row| row.get(0),
    )
    .optional()
}

/// Deletes the mapping only while it still belongs to `owner_id`.
pub fn delete_handle_for_owner(conn: &Connection, handle: &str, owner_id: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM handles WHERE handle = ?1 AND owner_id = ?2",
        params![handle, owner_id],
    )
}

/// Deletes the owner's mapping unless one of the owner's profiles points at it.
pub fn delete_unreferenced_handle_for_owner(
    conn: &Connection,
    handle: &str,
    owner_id: &str,
) -> Result<usize> {
    conn.execute(
        r#"
DELETE FROM handles
WHERE handle = ?1 AND owner_id = ?2
  AND NOT EXISTS (SELECT 1 FROM profiles WHERE owner_id = ?2 AND handle = ?1)
"#,
        params![handle, owner_id],
    )
}

pub fn list_handles(conn: &Connection) -> Result<Vec<HandleRecord>> {
    let mut stmt =
        conn.prepare("SELECT handle, owner_id, reserved_at FROM handles ORDER BY handle ASC")?;
    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(HandleRecord {
            handle: row.get(0)?,
            owner_id: row.get(1)?,
            reserved_at: row.get(2)?,
        });
    }
    Ok(result)
}

// Profiles

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    pub owner_id: String,
    pub handle: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct InsertProfile<'a> {
    pub owner_id: &'a str,
    pub handle: &'a str,
    pub display_name: &'a str,
    pub avatar_url: Option<&'a str>,
    pub bio: &'a str,
    pub created_at: &'a str,
}

pub fn insert_profile(conn: &Connection, args: &InsertProfile<'_>) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO profiles (owner_id, handle, display_name, avatar_url, bio, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
"#,
        params![
            args.owner_id,
            args.handle,
            args.display_name,
            args.avatar_url,
            args.bio,
            args.created_at
        ],
    )?;
    Ok(())
}

fn profile_from_row(row: &Row<'_>) -> Result<ProfileRecord> {
    Ok(ProfileRecord {
        owner_id: row.get(0)?,
        handle: row.get(1)?,
        display_name: row.get(2)?,
        avatar_url: row.get(3)?,
        bio: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn get_profile(conn: &Connection, owner_id: &str) -> Result<Option<ProfileRecord>> {
    conn.query_row(
        r#"
SELECT owner_id, handle, display_name, avatar_url, bio, created_at, updated_at
FROM profiles
WHERE owner_id = ?1
"#,
        params![owner_id],
        profile_from_row,
    )
    .optional()
}

pub fn list_profiles(conn: &Connection) -> Result<Vec<ProfileRecord>> {
    let mut stmt = conn.prepare(
        r#"
SELECT owner_id, handle, display_name, avatar_url, bio, created_at, updated_at
FROM profiles
ORDER BY owner_id ASC
"#,
    )?;
    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(profile_from_row(row)?);
    }
    Ok(result)
}

/// Repoints the profile only while it still carries `expected_handle`.
pub fn set_profile_handle(
    conn: &Connection,
    owner_id: &str,
    expected_handle: &str,
    handle: &str,
    updated_at: &str,
) -> Result<usize> {
    conn.execute(
        "UPDATE profiles SET handle = ?3, updated_at = ?4 WHERE owner_id = ?1 AND handle = ?2",
        params![owner_id, expected_handle, handle, updated_at],
    )
}

pub fn set_profile_display_name(
    conn: &Connection,
    owner_id: &str,
    display_name: &str,
    updated_at: &str,
) -> Result<usize> {
    conn.execute(
        "UPDATE profiles SET display_name = ?2, updated_at = ?3 WHERE owner_id = ?1",
        params![owner_id, display_name, updated_at],
    )
}

pub fn set_profile_bio(
    conn: &Connection,
    owner_id: &str,
    bio: &str,
    updated_at: &str,
) -> Result<usize> {
    conn.execute(
        "UPDATE profiles SET bio = ?2, updated_at = ?3 WHERE owner_id = ?1",
        params![owner_id, bio, updated_at],
    )
}

pub fn set_profile_avatar(
    conn: &Connection,
    owner_id: &str,
    avatar_url: Option<&str>,
    updated_at: &str,
) -> Result<usize> {
    conn.execute(
        "UPDATE profiles SET avatar_url = ?2, updated_at = ?3 WHERE owner_id = ?1",
        params![owner_id, avatar_url, updated_at],
    )
}

// Links

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub owner_id: String,
    pub id: String,
    pub icon: String,
    pub title: String,
    pub url: String,
    pub order: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct InsertLink<'a> {
    pub owner_id: &'a str,
    pub id: &'a str,
    pub icon: &'a str,
    pub title: &'a str,
    pub url: &'a str,
    pub order: i64,
    pub created_at: &'a str,
}

pub fn insert_link(conn: &Connection, args: &InsertLink<'_>) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO links (owner_id, id, icon, title, url, link_order, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
"#,
        params![
            args.owner_id,
            args.id,
            args.icon,
            args.title,
            args.url,
            args.order,
            args.created_at
        ],
    )?;
    Ok(())
}

/// Links for one owner in display order. Rows without an order sort as 0;
/// ties fall back to creation time and then id.
pub fn list_links(conn: &Connection, owner_id: &str) -> Result<Vec<LinkRecord>> {
    let mut stmt = conn.prepare(
        r#"
SELECT owner_id, id, icon, title, url, link_order, created_at, updated_at
FROM links
WHERE owner_id = ?1
ORDER BY COALESCE(link_order, 0) ASC, created_at ASC, id ASC
"#,
    )?;
    let mut rows = stmt.query(params![owner_id])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(LinkRecord {
            owner_id: row.get(0)?,
            id: row.get(1)?,
            icon: row.get(2)?,
            title: row.get(3)?,
            url: row.get(4)?,
            order: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        });
    }
    Ok(result)
}

pub fn get_link(conn: &Connection, owner_id: &str, id: &str) -> Result<Option<LinkRecord>> {
    conn.query_row(
        r#"
SELECT owner_id, id, icon, title, url, link_order, created_at, updated_at
FROM links
WHERE owner_id = ?1 AND id = ?2
"#,
        params![owner_id, id],
        |row| {
            Ok(LinkRecord {
                owner_id: row.get(0)?,
                id: row.get(1)?,
                icon: row.get(2)?,
                title: row.get(3)?,
                url: row.get(4)?,
                order: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        },
    )
    .optional()
}

pub fn count_links(conn: &Connection, owner_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM links WHERE owner_id = ?1",
        params![owner_id],
        |row| row.get(0),
    )
}

pub fn link_exists(conn: &Connection, owner_id: &str, id: &str) -> Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM links WHERE owner_id = ?1 AND id = ?2)",
        params![owner_id, id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub struct UpdateLinkFields<'a> {
    pub icon: Option<&'a str>,
    pub title: &'a str,
    pub url: &'a str,
    pub updated_at: &'a str,
}

pub fn update_link_fields(
    conn: &Connection,
    owner_id: &str,
    id: &str,
    args: &UpdateLinkFields<'_>,
) -> Result<usize> {
    conn.execute(
        r#"
UPDATE links
SET icon = COALESCE(?3, icon), title = ?4, url = ?5, updated_at = ?6
WHERE owner_id = ?1 AND id = ?2
"#,
        params![owner_id, id, args.icon, args.title, args.url, args.updated_at],
    )
}

pub fn set_link_order(
    conn: &Connection,
    owner_id: &str,
    id: &str,
    order: i64,
    updated_at: &str,
) -> Result<usize> {
    conn.execute(
        "UPDATE links SET link_order = ?3, updated_at = ?4 WHERE owner_id = ?1 AND id = ?2",
        params![owner_id, id, order, updated_at],
    )
}

pub fn delete_link(conn: &Connection, owner_id: &str, id: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM links WHERE owner_id = ?1 AND id = ?2",
        params![owner_id, id],
    )
}

pub fn list_link_owner_ids(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT owner_id FROM links ORDER BY owner_id ASC")?;
    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(row.get(0)?);
    }
    Ok(result)
}

// Click counters

/// Counts a click for an existing link. Returns `None` when the link is gone,
/// so a racing delete never leaves a counter behind.
pub fn increment_link_clicks(
    conn: &Connection,
    owner_id: &str,
    link_id: &str,
    clicked_at: &str,
) -> Result<Option<i64>> {
    conn.query_row(
        r#"
INSERT INTO link_clicks (owner_id, link_id, clicks, last_clicked_at)
SELECT ?1, ?2, 1, ?3
WHERE EXISTS (SELECT 1 FROM links WHERE owner_id = ?1 AND id = ?2)
ON CONFLICT(owner_id, link_id) DO UPDATE SET
    clicks = link_clicks.clicks + 1,
    last_clicked_at = excluded.last_clicked_at
RETURNING clicks
"#,
        params![owner_id, link_id, clicked_at],
        |row| row.get(0),
    )
    .optional()
}

pub fn list_link_clicks(conn: &Connection, owner_id: &str) -> Result<Vec<(String, i64)>> {
    let mut stmt =
        conn.prepare("SELECT link_id, clicks FROM link_clicks WHERE owner_id = ?1")?;
    let mut rows = stmt.query(params![owner_id])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push((row.get(0)?, row.get(1)?));
    }
    Ok(result)
}

pub fn delete_link_clicks(conn: &Connection, owner_id: &str, link_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM link_clicks WHERE owner_id = ?1 AND link_id = ?2",
        params![owner_id, link_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests;
