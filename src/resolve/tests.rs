use super::ProfileResolver;
use crate::db;
use crate::links::{LinkCollection, NewLink};
use crate::profiles::{AttributePatch, NewProfileAttributes, ProfileStore};
use crate::test_support::{session, TempDb};

const PLACEHOLDER: &str = "https://placeholder.example/avatar.png";

#[test]
fn resolves_a_claimed_handle_case_insensitively() {
    let db = TempDb::new("linkpage-resolve");
    let conn = db.open();
    let ann = session("A", "Ann");
    ProfileStore::new(&conn)
        .create_profile(
            &ann,
            "alice",
            &NewProfileAttributes {
                bio: Some("Builder".to_string()),
                ..NewProfileAttributes::default()
            },
        )
        .expect("create");
    LinkCollection::new(&conn)
        .add(
            &ann,
            &NewLink {
                icon: Some("youtube".to_string()),
                title: "Videos".to_string(),
                url: "https://youtube.com/@alice".to_string(),
            },
        )
        .expect("add");
    LinkCollection::new(&conn)
        .add(
            &ann,
            &NewLink {
                icon: None,
                title: "Home".to_string(),
                url: "https://alice.example/".to_string(),
            },
        )
        .expect("add");

    let view = ProfileResolver::new(&conn, PLACEHOLDER)
        .resolve_public("  ALICE ")
        .expect("resolve")
        .expect("profile should resolve");
    assert_eq!(view.handle.as_str(), "alice");
    assert_eq!(view.bio.as_deref(), Some("Builder"));
    assert_eq!(view.description, "Ann - Builder");
    assert_eq!(view.avatar_url, "https://avatars.example/A.png");
    let shown = view
        .links
        .iter()
        .map(|link| (link.title.as_str(), link.display_url.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        shown,
        vec![("Videos", "youtube.com/@alice"), ("Home", "alice.example")]
    );
}

#[test]
fn empty_bio_is_omitted_and_avatar_falls_back_to_placeholder() {
    let db = TempDb::new("linkpage-resolve");
    let conn = db.open();
    let ann = session("A", "Ann");
    let store = ProfileStore::new(&conn);
    store
        .create_profile(&ann, "alice", &NewProfileAttributes::default())
        .expect("create");
    store
        .update_attributes(
            &ann,
            &AttributePatch {
                avatar_url: Some(String::new()),
                ..AttributePatch::default()
            },
        )
        .expect("clear avatar");

    let view = ProfileResolver::new(&conn, PLACEHOLDER)
        .resolve_public("alice")
        .expect("resolve")
        .expect("profile should resolve");
    assert_eq!(view.bio, None);
    assert_eq!(view.avatar_url, PLACEHOLDER);
    assert_eq!(view.description, "Check out Ann's links");

    let json = serde_json::to_value(&view).expect("view should serialize");
    assert!(json.get("bio").is_none());
}

#[test]
fn unknown_and_malformed_handles_resolve_to_nothing() {
    let db = TempDb::new("linkpage-resolve");
    let conn = db.open();
    let resolver = ProfileResolver::new(&conn, PLACEHOLDER);

    assert!(resolver.resolve_public("nobody").expect("resolve").is_none());
    assert!(resolver.resolve_public("no").expect("resolve").is_none());
    assert!(resolver.resolve_public("bad-handle!").expect("resolve").is_none());
}

#[test]
fn leaked_old_mapping_does_not_resolve() {
    let db = TempDb::new("linkpage-resolve");
    let conn = db.open();
    let ann = session("A", "Ann");
    let store = ProfileStore::new(&conn);
    store
        .create_profile(&ann, "alice", &NewProfileAttributes::default())
        .expect("create");
    store.rename_handle(&ann, "alicia").expect("rename");
    // simulate a crash between repoint and release
    db::insert_handle_if_absent(&conn, "alice", "A", "2026-01-01T00:00:00Z")
        .expect("leak old mapping");

    let resolver = ProfileResolver::new(&conn, PLACEHOLDER);
    assert!(resolver.resolve_public("alice").expect("resolve").is_none());
    assert!(resolver.resolve_public("alicia").expect("resolve").is_some());
}

#[test]
fn mapping_without_profile_does_not_resolve() {
    let db = TempDb::new("linkpage-resolve");
    let conn = db.open();
    db::insert_handle_if_absent(&conn, "ghost", "G", "2026-01-01T00:00:00Z")
        .expect("orphan mapping");

    let resolver = ProfileResolver::new(&conn, PLACEHOLDER);
    assert!(resolver.resolve_public("ghost").expect("resolve").is_none());
    assert!(resolver.resolve_owner("ghost").expect("resolve").is_none());
}
