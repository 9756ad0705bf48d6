use super::{
    delete_handle_for_owner, get_handle_owner, get_owner, increment_link_clicks,
    insert_handle_if_absent, insert_link, insert_profile, list_links, open_connection,
    set_profile_handle, upsert_owner, InsertLink, InsertProfile, UpsertOwner,
    CURRENT_SCHEMA_VERSION,
};
use rusqlite::params;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn unique_db_path() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX_EPOCH")
        .as_nanos();
    std::env::temp_dir()
        .join(format!("linkpage-db-{}-{}.sqlite", nanos, uuid::Uuid::now_v7()))
        .display()
        .to_string()
}

fn cleanup_db_files(path: &str) {
    for suffix in ["", "-wal", "-shm"] {
        let candidate = format!("{path}{suffix}");
        let _ = std::fs::remove_file(candidate);
    }
}

fn open(path: &str) -> rusqlite::Connection {
    open_connection(path, Duration::from_millis(5000)).expect("connection should open")
}

fn table_exists(conn: &rusqlite::Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
            params![table_name],
            |row| row.get(0),
        )
        .expect("table existence query should be readable");
    exists == 1
}

fn seed_profile(conn: &rusqlite::Connection, owner: &str, handle: &str) {
    insert_profile(
        conn,
        &InsertProfile {
            owner_id: owner,
            handle,
            display_name: "Seed",
            avatar_url: None,
            bio: "",
            created_at: "2026-01-01T00:00:00Z",
        },
    )
    .expect("profile should insert");
}

#[test]
fn configures_connection_pragmas() {
    let path = unique_db_path();
    let conn = open(&path);

    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("journal_mode pragma should be readable");
    assert_eq!(journal_mode.to_uppercase(), "WAL");

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("foreign_keys pragma should be readable");
    assert_eq!(foreign_keys, 1);

    let busy_timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .expect("busy_timeout pragma should be readable");
    assert_eq!(busy_timeout, 5000);

    cleanup_db_files(&path);
}

#[test]
fn initializes_required_tables_and_schema_version() {
    let path = unique_db_path();
    let conn = open(&path);

    let tables = [
        "schema_migrations",
        "meta",
        "owners",
        "handles",
        "profiles",
        "links",
        "link_clicks",
    ];
    for table in tables {
        assert!(
            table_exists(&conn, table),
            "expected table '{}' to exist",
            table
        );
    }

    let schema_version: String = conn
        .query_row(
            "SELECT value FROM meta WHERE key='schema_version'",
            [],
            |row| row.get(0),
        )
        .expect("schema version should be stored in meta table");
    assert_eq!(schema_version, CURRENT_SCHEMA_VERSION.to_string());

    cleanup_db_files(&path);
}

#[test]
fn reapplies_migrations_idempotently() {
    let path = unique_db_path();
    drop(open(&path));

    let conn_second = open(&path);
    let applied_count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .expect("schema_migrations count should be queryable");
    assert_eq!(applied_count, CURRENT_SCHEMA_VERSION);

    cleanup_db_files(&path);
}

#[test]
fn handle_insert_is_first_writer_wins_and_delete_is_owner_guarded() {
    let path = unique_db_path();
    let conn = open(&path);

    let first = insert_handle_if_absent(&conn, "alice", "owner-a", "2026-01-01T00:00:00Z")
        .expect("insert should run");
    let second = insert_handle_if_absent(&conn, "alice", "owner-b", "2026-01-01T00:00:01Z")
        .expect("insert should run");
    assert_eq!(first, 1);
    assert_eq!(second, 0);
    assert_eq!(
        get_handle_owner(&conn, "alice").expect("lookup should run"),
        Some("owner-a".to_string())
    );

    let foreign = delete_handle_for_owner(&conn, "alice", "owner-b").expect("delete should run");
    assert_eq!(foreign, 0);
    let own = delete_handle_for_owner(&conn, "alice", "owner-a").expect("delete should run");
    assert_eq!(own, 1);
    assert_eq!(get_handle_owner(&conn, "alice").expect("lookup should run"), None);

    cleanup_db_files(&path);
}

#[test]
fn list_links_treats_missing_order_as_zero() {
    let path = unique_db_path();
    let conn = open(&path);
    seed_profile(&conn, "owner-a", "alice");

    insert_link(
        &conn,
        &InsertLink {
            owner_id: "owner-a",
            id: "second",
            icon: "🔗",
            title: "Second",
            url: "https://b.example",
            order: 1,
            created_at: "2026-01-01T00:00:00Z",
        },
    )
    .expect("link should insert");
    conn.execute(
        r#"
INSERT INTO links (owner_id, id, icon, title, url, link_order, created_at, updated_at)
VALUES ('owner-a', 'legacy', '🔗', 'Legacy', 'https://a.example', NULL,
        '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')
"#,
        [],
    )
    .expect("legacy row should insert");

    let links = list_links(&conn, "owner-a").expect("links should list");
    let ids = links.iter().map(|link| link.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["legacy", "second"]);
    assert_eq!(links[0].order, None);

    cleanup_db_files(&path);
}

#[test]
fn link_rows_require_an_owning_profile() {
    let path = unique_db_path();
    let conn = open(&path);

    let orphan = insert_link(
        &conn,
        &InsertLink {
            owner_id: "nobody",
            id: "x",
            icon: "🔗",
            title: "X",
            url: "https://x.example",
            order: 0,
            created_at: "2026-01-01T00:00:00Z",
        },
    );
    assert!(orphan.is_err());

    cleanup_db_files(&path);
}

#[test]
fn click_counter_increments_atomically() {
    let path = unique_db_path();
    let conn = open(&path);
    seed_profile(&conn, "owner-a", "alice");
    insert_link(
        &conn,
        &InsertLink {
            owner_id: "owner-a",
            id: "l1",
            icon: "🔗",
            title: "One",
            url: "https://one.example",
            order: 0,
            created_at: "2026-01-01T00:00:00Z",
        },
    )
    .expect("link should insert");

    let first = increment_link_clicks(&conn, "owner-a", "l1", "2026-01-01T00:00:00Z")
        .expect("increment should run");
    let second = increment_link_clicks(&conn, "owner-a", "l1", "2026-01-01T00:00:05Z")
        .expect("increment should run");
    assert_eq!((first, second), (Some(1), Some(2)));

    cleanup_db_files(&path);
}

#[test]
fn click_on_missing_link_writes_no_counter() {
    let path = unique_db_path();
    let conn = open(&path);
    seed_profile(&conn, "owner-a", "alice");

    let clicks = increment_link_clicks(&conn, "owner-a", "gone", "2026-01-01T00:00:00Z")
        .expect("increment should run");
    assert_eq!(clicks, None);
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM link_clicks", [], |row| row.get(0))
        .expect("count should run");
    assert_eq!(rows, 0);

    cleanup_db_files(&path);
}

#[test]
fn profile_repoint_requires_the_expected_handle() {
    let path = unique_db_path();
    let conn = open(&path);
    seed_profile(&conn, "owner-a", "alice");

    let stale = set_profile_handle(&conn, "owner-a", "bob", "carol", "2026-01-02T00:00:00Z")
        .expect("update should run");
    assert_eq!(stale, 0);
    let current = set_profile_handle(&conn, "owner-a", "alice", "carol", "2026-01-02T00:00:00Z")
        .expect("update should run");
    assert_eq!(current, 1);

    cleanup_db_files(&path);
}

#[test]
fn owner_upsert_keeps_attributes_the_provider_omitted() {
    let path = unique_db_path();
    let conn = open(&path);

    upsert_owner(
        &conn,
        &UpsertOwner {
            owner_id: "owner-a",
            display_name: Some("Ann"),
            avatar_url: Some("https://provider.example/a.png"),
            email: Some("ann@example.com"),
            seen_at: "2026-01-01T00:00:00Z",
        },
    )
    .expect("first upsert");
    upsert_owner(
        &conn,
        &UpsertOwner {
            owner_id: "owner-a",
            display_name: Some("Annie"),
            avatar_url: None,
            email: None,
            seen_at: "2026-02-01T00:00:00Z",
        },
    )
    .expect("second upsert");

    let owner = get_owner(&conn, "owner-a")
        .expect("lookup should run")
        .expect("owner exists");
    assert_eq!(owner.display_name.as_deref(), Some("Annie"));
    assert_eq!(
        owner.avatar_url.as_deref(),
        Some("https://provider.example/a.png")
    );
    assert_eq!(owner.first_seen_at, "2026-01-01T00:00:00Z");
    assert_eq!(owner.last_seen_at, "2026-02-01T00:00:00Z");

    cleanup_db_files(&path);
}
