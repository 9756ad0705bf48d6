use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::identity::{Principal, Session};

/// A throwaway SQLite file that is removed, with its WAL side files, on drop.
pub struct TempDb {
    path: PathBuf,
}

impl TempDb {
    pub fn new(prefix: &str) -> Self {
        let path = std::env::temp_dir().join(format!("{prefix}-{}.sqlite", Uuid::now_v7()));
        Self { path }
    }

    pub fn path_str(&self) -> &str {
        self.path.to_str().expect("temp path should be utf8")
    }

    pub fn open(&self) -> Connection {
        db::open_connection(self.path_str(), Duration::from_millis(5000))
            .expect("connection should open")
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut candidate = self.path.clone().into_os_string();
            candidate.push(suffix);
            let _ = std::fs::remove_file(candidate);
        }
    }
}

pub fn session(owner_id: &str, display_name: &str) -> Session {
    Session::new(Principal {
        owner_id: owner_id.to_string(),
        display_name: Some(display_name.to_string()),
        avatar_url: Some(format!("https://avatars.example/{owner_id}.png")),
        email: Some(format!("{owner_id}@example.com")),
    })
}
