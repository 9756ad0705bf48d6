use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};

use crate::app::AppError;
use crate::db;
use crate::domain::handle::Handle;
use crate::domain::icon::LinkIcon;
use crate::domain::link_input::display_url;
use crate::links::{Link, LinkCollection};
use crate::profiles::Profile;

/// Read-only projection served to anonymous visitors.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicView {
    pub handle: Handle,
    pub display_name: String,
    pub avatar_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub description: String,
    pub links: Vec<PublicLink>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicLink {
    pub id: String,
    pub icon: LinkIcon,
    pub icon_kind: &'static str,
    pub title: String,
    pub url: String,
    pub display_url: String,
}

impl From<Link> for PublicLink {
    fn from(value: Link) -> Self {
        Self {
            display_url: display_url(&value.url),
            icon_kind: value.icon.kind(),
            id: value.id,
            icon: value.icon,
            title: value.title,
            url: value.url,
        }
    }
}

pub struct ProfileResolver<'a> {
    conn: &'a Connection,
    placeholder_avatar_url: &'a str,
}

impl<'a> ProfileResolver<'a> {
    pub fn new(conn: &'a Connection, placeholder_avatar_url: &'a str) -> Self {
        Self {
            conn,
            placeholder_avatar_url,
        }
    }

    /// `Ok(None)` covers every flavour of "no such page": malformed text, an
    /// unknown handle, a mapping without a profile, and a leftover mapping
    /// that the profile no longer points back at.
    pub fn resolve_public(&self, raw_handle: &str) -> Result<Option<PublicView>, AppError> {
        let Some(profile) = self.resolve_profile(raw_handle)? else {
            return Ok(None);
        };
        let links = LinkCollection::new(self.conn)
            .list(&profile.owner_id)?
            .into_iter()
            .map(PublicLink::from)
            .collect();
        Ok(Some(self.project(profile, links)))
    }

    pub fn resolve_owner(&self, raw_handle: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .resolve_profile(raw_handle)?
            .map(|profile| profile.owner_id))
    }

    fn resolve_profile(&self, raw_handle: &str) -> Result<Option<Profile>, AppError> {
        let handle = match Handle::parse(raw_handle) {
            Ok(handle) => handle,
            Err(err) => {
                debug!(error = %err, "public lookup with malformed handle");
                return Ok(None);
            }
        };
        let Some(owner_id) = db::get_handle_owner(self.conn, handle.as_str())? else {
            return Ok(None);
        };
        let Some(profile) = db::get_profile(self.conn, &owner_id)?.map(Profile::from) else {
            warn!(handle = %handle, owner_id = %owner_id, "handle maps to an owner without a profile");
            return Ok(None);
        };
        if profile.handle != handle {
            warn!(
                handle = %handle,
                current = %profile.handle,
                "stale handle mapping; profile has moved on"
            );
            return Ok(None);
        }
        Ok(Some(profile))
    }

    fn project(&self, profile: Profile, links: Vec<PublicLink>) -> PublicView {
        let bio = Some(profile.bio).filter(|bio| !bio.is_empty());
        let description = match &bio {
            Some(bio) => format!("{} - {}", profile.display_name, bio),
            None => format!("Check out {}'s links", profile.display_name),
        };
        PublicView {
            avatar_url: profile
                .avatar_url
                .unwrap_or_else(|| self.placeholder_avatar_url.to_string()),
            handle: profile.handle,
            display_name: profile.display_name,
            bio,
            description,
            links,
        }
    }
}

#[cfg(test)]
mod tests;
