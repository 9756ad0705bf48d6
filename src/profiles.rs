use rusqlite::{ffi, Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::AppError;
use crate::db::{self, InsertProfile, ProfileRecord};
use crate::domain::attributes::{
    fit_display_name, normalize_bio, parse_avatar_url, parse_display_name,
};
use crate::domain::handle::Handle;
use crate::identity::Session;
use crate::image_store::ImageStore;
use crate::registry::{HandleRegistry, RegistryError, Reservation};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Profile {
    pub owner_id: String,
    pub handle: Handle,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ProfileRecord> for Profile {
    fn from(value: ProfileRecord) -> Self {
        Self {
            owner_id: value.owner_id,
            handle: Handle::from_stored(value.handle),
            display_name: value.display_name,
            avatar_url: value.avatar_url,
            bio: value.bio,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Optional starting attributes for a new profile. Missing values fall back
/// to what the identity provider reported.
#[derive(Debug, Clone, Default)]
pub struct NewProfileAttributes {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AttributePatch {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl AttributePatch {
    fn has_changes(&self) -> bool {
        self.display_name.is_some() || self.bio.is_some() || self.avatar_url.is_some()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AttributeUpdate {
    pub profile: Profile,
    pub changed: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenameOutcome {
    Renamed { from: Handle, to: Handle },
    Unchanged { handle: Handle },
}

pub struct ProfileStore<'a> {
    conn: &'a Connection,
}

impl<'a> ProfileStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, owner_id: &str) -> Result<Option<Profile>, AppError> {
        Ok(db::get_profile(self.conn, owner_id)?.map(Profile::from))
    }

    fn require(&self, owner_id: &str) -> Result<Profile, AppError> {
        self.get(owner_id)?.ok_or_else(|| {
            AppError::NotFound("no profile yet; claim a handle first".to_string())
        })
    }

    /// Reserves the handle, then writes the profile. If the profile write
    /// fails the reservation is released again so the handle is not left
    /// squatted by an owner with no profile.
    pub fn create_profile(
        &self,
        session: &Session,
        raw_handle: &str,
        attrs: &NewProfileAttributes,
    ) -> Result<Profile, AppError> {
        let handle = Handle::parse(raw_handle)?;
        let principal = session.principal();
        let display_name = match attrs.display_name.as_deref() {
            Some(raw) => parse_display_name(raw)?,
            None => principal
                .display_name
                .as_deref()
                .map(fit_display_name)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| handle.as_str().to_string()),
        };
        let avatar_url = match attrs.avatar_url.as_deref() {
            Some(raw) => parse_avatar_url(raw)?,
            None => principal.avatar_url.clone(),
        };
        let bio = normalize_bio(attrs.bio.as_deref().unwrap_or(""));

        if let Some(existing) = self.get(session.owner_id())? {
            return Err(AppError::Conflict(format!(
                "a profile already exists for this account (@{})",
                existing.handle
            )));
        }

        let registry = HandleRegistry::new(self.conn);
        let reservation = registry.reserve(&handle, session.owner_id())?;

        let created_at = db::now_utc_rfc3339();
        let write = db::insert_profile(
            self.conn,
            &InsertProfile {
                owner_id: session.owner_id(),
                handle: handle.as_str(),
                display_name: &display_name,
                avatar_url: avatar_url.as_deref(),
                bio: &bio,
                created_at: &created_at,
            },
        );

        if let Err(err) = write {
            warn!(handle = %handle, error = %err, "profile write failed");
            undo_reservation(&registry, reservation, &handle, session.owner_id());
            if is_duplicate_owner(&err) {
                return Err(AppError::Conflict(
                    "a profile already exists for this account".to_string(),
                ));
            }
            return Err(AppError::StorageUnavailable(err));
        }

        info!(handle = %handle, owner_id = session.owner_id(), "created profile");
        self.require(session.owner_id())
    }

    /// Moves the owner to a new handle. The new handle is reserved and the
    /// profile repointed before the old mapping is released, so the owner is
    /// never without a resolvable handle. The repoint only applies while the
    /// profile still carries the handle read at the start.
    pub fn rename_handle(
        &self,
        session: &Session,
        raw_handle: &str,
    ) -> Result<RenameOutcome, AppError> {
        let next = Handle::parse(raw_handle)?;
        let profile = self.require(session.owner_id())?;
        let current = profile.handle;
        if next == current {
            return Ok(RenameOutcome::Unchanged { handle: current });
        }

        let registry = HandleRegistry::new(self.conn);
        match registry.lookup(&next)? {
            Some(holder) if holder != session.owner_id() => {
                return Err(RegistryError::Conflict { handle: next }.into());
            }
            _ => {}
        }
        let reservation = registry.reserve(&next, session.owner_id())?;

        let repointed = db::set_profile_handle(
            self.conn,
            session.owner_id(),
            current.as_str(),
            next.as_str(),
            &db::now_utc_rfc3339(),
        );
        match repointed {
            Ok(1) => {}
            Ok(_) => {
                warn!(handle = %next, expected = %current, "profile changed during rename");
                undo_reservation(&registry, reservation, &next, session.owner_id());
                return Err(AppError::Conflict(
                    "profile changed during rename; reload and try again".to_string(),
                ));
            }
            Err(err) => {
                warn!(handle = %next, error = %err, "profile repoint failed");
                undo_reservation(&registry, reservation, &next, session.owner_id());
                return Err(AppError::StorageUnavailable(err));
            }
        }

        match registry.release(&current, session.owner_id()) {
            Ok(()) => {}
            Err(RegistryError::NotOwner { .. }) | Err(RegistryError::NotFound { .. }) => {
                debug!(handle = %current, "old handle no longer held; nothing to release");
            }
            Err(err) => {
                warn!(handle = %current, error = %err, "old handle left reserved after rename");
            }
        }

        info!(from = %current, to = %next, "renamed handle");
        Ok(RenameOutcome::Renamed {
            from: current,
            to: next,
        })
    }

    /// Validates every supplied field first, then writes only the ones that
    /// differ from the stored profile.
    pub fn update_attributes(
        &self,
        session: &Session,
        patch: &AttributePatch,
    ) -> Result<AttributeUpdate, AppError> {
        if !patch.has_changes() {
            return Err(AppError::InvalidInput(
                "update requires at least one field change".to_string(),
            ));
        }

        let display_name = patch
            .display_name
            .as_deref()
            .map(parse_display_name)
            .transpose()?;
        let bio = patch.bio.as_deref().map(normalize_bio);
        let avatar_url = patch
            .avatar_url
            .as_deref()
            .map(parse_avatar_url)
            .transpose()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current: Profile = db::get_profile(&tx, session.owner_id())?
            .map(Profile::from)
            .ok_or_else(|| {
                AppError::NotFound("no profile yet; claim a handle first".to_string())
            })?;
        let updated_at = db::now_utc_rfc3339();
        let mut changed = Vec::new();

        if let Some(name) = display_name.filter(|name| *name != current.display_name) {
            db::set_profile_display_name(&tx, session.owner_id(), &name, &updated_at)?;
            changed.push("display_name");
        }
        if let Some(bio) = bio.filter(|bio| *bio != current.bio) {
            db::set_profile_bio(&tx, session.owner_id(), &bio, &updated_at)?;
            changed.push("bio");
        }
        if let Some(avatar) = avatar_url.filter(|avatar| *avatar != current.avatar_url) {
            db::set_profile_avatar(&tx, session.owner_id(), avatar.as_deref(), &updated_at)?;
            changed.push("avatar_url");
        }
        tx.commit()?;

        debug!(owner_id = session.owner_id(), ?changed, "updated profile attributes");
        Ok(AttributeUpdate {
            profile: self.require(session.owner_id())?,
            changed,
        })
    }

    /// Points the avatar back at the picture the identity provider reported.
    pub fn reset_avatar(&self, session: &Session) -> Result<AttributeUpdate, AppError> {
        let profile = self.require(session.owner_id())?;
        let provider_avatar = db::get_owner(self.conn, session.owner_id())?
            .and_then(|owner| owner.avatar_url)
            .or_else(|| session.principal().avatar_url.clone());

        if profile.avatar_url == provider_avatar {
            return Ok(AttributeUpdate {
                profile,
                changed: Vec::new(),
            });
        }

        db::set_profile_avatar(
            self.conn,
            session.owner_id(),
            provider_avatar.as_deref(),
            &db::now_utc_rfc3339(),
        )?;
        Ok(AttributeUpdate {
            profile: self.require(session.owner_id())?,
            changed: vec!["avatar_url"],
        })
    }

    pub fn upload_avatar(
        &self,
        session: &Session,
        store: &dyn ImageStore,
        bytes: &[u8],
    ) -> Result<AttributeUpdate, AppError> {
        self.require(session.owner_id())?;
        let url = store.upload(bytes)?;
        self.update_attributes(
            session,
            &AttributePatch {
                avatar_url: Some(url),
                ..AttributePatch::default()
            },
        )
    }
}

// A concurrent create for the same owner won the primary key.
fn is_duplicate_owner(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if code.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

// Only a mapping this call created is released, and never one a profile of
// the owner already points at: another session of the same owner may own it.
fn undo_reservation(
    registry: &HandleRegistry<'_>,
    reservation: Reservation,
    handle: &Handle,
    owner_id: &str,
) {
    if reservation == Reservation::AlreadyHeld {
        debug!(handle = %handle, owner_id, "handle was already held; left in place");
        return;
    }
    match registry.release_unreferenced(handle, owner_id) {
        Ok(true) => debug!(handle = %handle, owner_id, "released reservation"),
        Ok(false) => {}
        Err(err) => {
            warn!(handle = %handle, error = %err, "compensating release failed; handle leaked");
        }
    }
}
