use std::error::Error;
use std::fmt;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::availability::AvailabilityChecker;
use crate::config::{Config, ConfigError};
use crate::db::{self, UpsertOwner};
use crate::domain::attributes::AttributeError;
use crate::domain::handle::ParseHandleError;
use crate::domain::link_input::LinkInputError;
use crate::identity::{AuthError, IdentityGateway, Session};
use crate::image_store::ImageStoreError;
use crate::links::LinkCollection;
use crate::profiles::{Profile, ProfileStore};
use crate::registry::RegistryError;
use crate::resolve::ProfileResolver;

pub struct App {
    conn: Connection,
    config: Config,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SignIn {
    pub owner_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub first_seen_at: String,
    pub last_seen_at: String,
    /// `None` means the owner still has to claim a handle.
    pub profile: Option<Profile>,
}

impl App {
    pub fn open(db_path: &str, config: Config) -> Result<Self, AppError> {
        ensure_parent_dir(db_path)?;
        let conn = db::open_connection(db_path, config.busy_timeout)?;
        Ok(Self { conn, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Authenticates through the gateway and records the provider attributes
    /// for the owner.
    pub fn session(&self, gateway: &dyn IdentityGateway) -> Result<Session, AppError> {
        let principal = gateway.authenticate()?;
        db::upsert_owner(
            &self.conn,
            &UpsertOwner {
                owner_id: &principal.owner_id,
                display_name: principal.display_name.as_deref(),
                avatar_url: principal.avatar_url.as_deref(),
                email: principal.email.as_deref(),
                seen_at: &db::now_utc_rfc3339(),
            },
        )?;
        debug!(owner_id = %principal.owner_id, "session established");
        Ok(Session::new(principal))
    }

    pub fn sign_in(&self, gateway: &dyn IdentityGateway) -> Result<SignIn, AppError> {
        let session = self.session(gateway)?;
        let profile = self.profiles().get(session.owner_id())?;
        if profile.is_none() {
            info!(owner_id = session.owner_id(), "signed in without a profile");
        }
        let owner = db::get_owner(&self.conn, session.owner_id())?.ok_or_else(|| {
            AppError::NotFound(format!("owner '{}' was not recorded", session.owner_id()))
        })?;
        Ok(SignIn {
            owner_id: owner.owner_id,
            display_name: owner.display_name,
            email: owner.email,
            first_seen_at: owner.first_seen_at,
            last_seen_at: owner.last_seen_at,
            profile,
        })
    }

    pub fn sign_out(&self, gateway: &dyn IdentityGateway) -> Result<(), AppError> {
        gateway.sign_out()?;
        Ok(())
    }

    pub fn profiles(&self) -> ProfileStore<'_> {
        ProfileStore::new(&self.conn)
    }

    pub fn links(&self) -> LinkCollection<'_> {
        LinkCollection::new(&self.conn)
    }

    pub fn resolver(&self) -> ProfileResolver<'_> {
        ProfileResolver::new(&self.conn, &self.config.placeholder_avatar_url)
    }

    pub fn availability(&self) -> AvailabilityChecker<'_> {
        AvailabilityChecker::new(&self.conn)
    }

    /// Public click tracking: resolves the handle the same way `show` does,
    /// so a desynced or unknown handle is `NotFound`.
    pub fn record_click(&self, raw_handle: &str, link_id: &str) -> Result<i64, AppError> {
        let owner_id = self
            .resolver()
            .resolve_owner(raw_handle)?
            .ok_or_else(|| AppError::NotFound(format!("no profile at @{}", raw_handle.trim())))?;
        self.links().record_click(&owner_id, link_id)
    }
}

fn ensure_parent_dir(path: &str) -> Result<(), AppError> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[derive(Debug)]
pub enum AppError {
    InvalidInput(String),
    Conflict(String),
    /// A reorder that no longer matches the stored link set.
    StaleOrder(String),
    NotFound(String),
    StorageUnavailable(rusqlite::Error),
    Auth(AuthError),
    Image(ImageStoreError),
    Config(ConfigError),
    Io(std::io::Error),
}

impl AppError {
    /// Only storage failures are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StorageUnavailable(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidInput(message) => write!(f, "{}", message),
            AppError::Conflict(message) => write!(f, "{}", message),
            AppError::StaleOrder(message) => {
                write!(f, "link order is stale: {}; reload and retry", message)
            }
            AppError::NotFound(message) => write!(f, "{}", message),
            AppError::StorageUnavailable(err) => write!(f, "storage unavailable: {}", err),
            AppError::Auth(err) => write!(f, "{}", err),
            AppError::Image(err) => write!(f, "{}", err),
            AppError::Config(err) => write!(f, "config error: {}", err),
            AppError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::StorageUnavailable(err) => Some(err),
            AppError::Auth(err) => Some(err),
            AppError::Image(err) => Some(err),
            AppError::Config(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::InvalidInput(_)
            | AppError::Conflict(_)
            | AppError::StaleOrder(_)
            | AppError::NotFound(_) => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Io(value)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        AppError::StorageUnavailable(value)
    }
}

impl From<RegistryError> for AppError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::Conflict { .. } | RegistryError::NotOwner { .. } => {
                AppError::Conflict(value.to_string())
            }
            RegistryError::NotFound { .. } => AppError::NotFound(value.to_string()),
            RegistryError::Db(err) => AppError::StorageUnavailable(err),
        }
    }
}

impl From<ParseHandleError> for AppError {
    fn from(value: ParseHandleError) -> Self {
        AppError::InvalidInput(value.to_string())
    }
}

impl From<LinkInputError> for AppError {
    fn from(value: LinkInputError) -> Self {
        AppError::InvalidInput(value.to_string())
    }
}

impl From<AttributeError> for AppError {
    fn from(value: AttributeError) -> Self {
        AppError::InvalidInput(value.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(value: AuthError) -> Self {
        AppError::Auth(value)
    }
}

impl From<ImageStoreError> for AppError {
    fn from(value: ImageStoreError) -> Self {
        AppError::Image(value)
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        AppError::Config(value)
    }
}

#[cfg(test)]
mod tests;
