use std::error::Error;
use std::fmt;

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::db;
use crate::domain::handle::Handle;

const RESERVE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// This call wrote the mapping.
    Created,
    /// The owner already held the handle; nothing was written.
    AlreadyHeld,
}

/// Global handle → owner index. Every mutation is a single conditional
/// statement, so two sessions racing on one handle cannot both win.
pub struct HandleRegistry<'a> {
    conn: &'a Connection,
}

impl<'a> HandleRegistry<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Maps `handle` to `owner_id`. Reserving a handle the owner already holds
    /// succeeds without a write and reports `AlreadyHeld`; only a `Created`
    /// reservation may be undone by the caller.
    pub fn reserve(
        &self,
        handle: &Handle,
        owner_id: &str,
    ) -> Result<Reservation, RegistryError> {
        for _ in 0..RESERVE_ATTEMPTS {
            let inserted = db::insert_handle_if_absent(
                self.conn,
                handle.as_str(),
                owner_id,
                &db::now_utc_rfc3339(),
            )?;
            if inserted == 1 {
                debug!(handle = %handle, owner_id, "reserved handle");
                return Ok(Reservation::Created);
            }

            match db::get_handle_owner(self.conn, handle.as_str())? {
                Some(current) if current == owner_id => {
                    return Ok(Reservation::AlreadyHeld);
                }
                Some(current) => {
                    debug!(handle = %handle, owner_id, holder = %current, "handle taken");
                    return Err(RegistryError::Conflict {
                        handle: handle.clone(),
                    });
                }
                // released between the insert and the read; try again
                None => continue,
            }
        }

        warn!(handle = %handle, "handle kept flipping during reservation");
        Err(RegistryError::Conflict {
            handle: handle.clone(),
        })
    }

    /// Removes the mapping only if it still points at `expected_owner_id`.
    pub fn release(&self, handle: &Handle, expected_owner_id: &str) -> Result<(), RegistryError> {
        let deleted = db::delete_handle_for_owner(self.conn, handle.as_str(), expected_owner_id)?;
        if deleted == 1 {
            debug!(handle = %handle, owner_id = expected_owner_id, "released handle");
            return Ok(());
        }

        match db::get_handle_owner(self.conn, handle.as_str())? {
            Some(_) => Err(RegistryError::NotOwner {
                handle: handle.clone(),
            }),
            None => Err(RegistryError::NotFound {
                handle: handle.clone(),
            }),
        }
    }

    /// Undoes a reservation of ours. Leaves the mapping alone when a profile
    /// of the owner already points at it, and reports whether it was removed.
    pub fn release_unreferenced(
        &self,
        handle: &Handle,
        owner_id: &str,
    ) -> Result<bool, RegistryError> {
        let deleted =
            db::delete_unreferenced_handle_for_owner(self.conn, handle.as_str(), owner_id)?;
        if deleted == 0 {
            debug!(handle = %handle, owner_id, "handle still referenced or not ours; kept");
        }
        Ok(deleted == 1)
    }

    pub fn lookup(&self, handle: &Handle) -> Result<Option<String>, RegistryError> {
        Ok(db::get_handle_owner(self.conn, handle.as_str())?)
    }

    pub fn is_available(&self, handle: &Handle) -> Result<bool, RegistryError> {
        Ok(self.lookup(handle)?.is_none())
    }
}

#[derive(Debug)]
pub enum RegistryError {
    Conflict { handle: Handle },
    NotOwner { handle: Handle },
    NotFound { handle: Handle },
    Db(rusqlite::Error),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Conflict { handle } => {
                write!(f, "handle '{}' is already taken", handle)
            }
            RegistryError::NotOwner { handle } => {
                write!(f, "handle '{}' belongs to another owner", handle)
            }
            RegistryError::NotFound { handle } => {
                write!(f, "handle '{}' is not registered", handle)
            }
            RegistryError::Db(err) => write!(f, "database error: {}", err),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RegistryError::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(value: rusqlite::Error) -> Self {
        RegistryError::Db(value)
    }
}
