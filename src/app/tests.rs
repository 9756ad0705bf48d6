use super::{App, AppError};
use crate::config::Config;
use crate::domain::handle::Handle;
use crate::identity::{AuthError, IdentityGateway, LocalIdentity, Principal};
use crate::registry::RegistryError;
use std::path::PathBuf;
use uuid::Uuid;

fn unique_workspace() -> PathBuf {
    let root = std::env::temp_dir().join(format!("linkpage-app-test-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&root).expect("temp workspace should be creatable");
    root
}

fn open_app(root: &std::path::Path) -> App {
    let db_path = root.join(".linkpage/state.sqlite");
    let config = Config::from_toml("").expect("defaults should load");
    App::open(db_path.to_str().expect("utf8 path"), config).expect("app should open")
}

fn identity(owner: &str) -> LocalIdentity {
    LocalIdentity {
        owner_id: Some(owner.to_string()),
        display_name: Some("Ann".to_string()),
        avatar_url: Some("https://provider.example/a.png".to_string()),
        email: Some("ann@example.com".to_string()),
    }
}

struct CancelledGateway;

impl IdentityGateway for CancelledGateway {
    fn authenticate(&self) -> Result<Principal, AuthError> {
        Err(AuthError::Cancelled)
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

#[test]
fn open_creates_the_database_directory() {
    let root = unique_workspace();
    let _app = open_app(&root);
    assert!(root.join(".linkpage/state.sqlite").exists());
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn sign_in_reports_missing_profile_then_the_claimed_one() {
    let root = unique_workspace();
    let app = open_app(&root);
    let gateway = identity("uid-a");

    let first = app.sign_in(&gateway).expect("sign in");
    assert!(first.profile.is_none());
    assert_eq!(first.email.as_deref(), Some("ann@example.com"));

    let session = app.session(&gateway).expect("session");
    app.profiles()
        .create_profile(&session, "alice", &Default::default())
        .expect("claim");

    let second = app.sign_in(&gateway).expect("sign in again");
    let profile = second.profile.expect("profile now exists");
    assert_eq!(profile.handle.as_str(), "alice");
    assert_eq!(second.first_seen_at, first.first_seen_at);
    assert!(app.sign_out(&gateway).is_ok());

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn cancelled_sign_in_surfaces_as_auth_error() {
    let root = unique_workspace();
    let app = open_app(&root);
    let err = app
        .session(&CancelledGateway)
        .expect_err("cancelled sign in");
    assert!(matches!(err, AppError::Auth(AuthError::Cancelled)));
    assert!(!err.is_retryable());
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn record_click_goes_through_public_resolution() {
    let root = unique_workspace();
    let app = open_app(&root);
    let session = app.session(&identity("uid-a")).expect("session");
    app.profiles()
        .create_profile(&session, "alice", &Default::default())
        .expect("claim");
    let link = app
        .links()
        .add(
            &session,
            &crate::links::NewLink {
                icon: None,
                title: "Site".to_string(),
                url: "https://a.example".to_string(),
            },
        )
        .expect("add");

    assert_eq!(app.record_click("ALICE", &link.id).expect("click"), 1);
    assert!(matches!(
        app.record_click("nobody", &link.id),
        Err(AppError::NotFound(_))
    ));

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn registry_errors_map_onto_the_app_taxonomy() {
    let handle = Handle::parse("alice").expect("valid handle");
    assert!(matches!(
        AppError::from(RegistryError::Conflict {
            handle: handle.clone()
        }),
        AppError::Conflict(_)
    ));
    assert!(matches!(
        AppError::from(RegistryError::NotOwner {
            handle: handle.clone()
        }),
        AppError::Conflict(_)
    ));
    assert!(matches!(
        AppError::from(RegistryError::NotFound { handle }),
        AppError::NotFound(_)
    ));
    let storage = AppError::from(RegistryError::Db(rusqlite::Error::InvalidQuery));
    assert!(storage.is_retryable());
}
