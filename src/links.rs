use std::collections::{HashMap, HashSet};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::AppError;
use crate::db::{self, InsertLink, LinkRecord, UpdateLinkFields};
use crate::domain::icon::LinkIcon;
use crate::domain::link_input::{parse_title, parse_url, LinkFields, LinkInputError};
use crate::identity::Session;
use crate::link_id::generate_link_id;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Link {
    pub id: String,
    pub icon: LinkIcon,
    pub title: String,
    pub url: String,
    pub order: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<LinkRecord> for Link {
    fn from(value: LinkRecord) -> Self {
        Self {
            icon: LinkIcon::from_stored(&value.icon),
            id: value.id,
            title: value.title,
            url: value.url,
            order: value.order.unwrap_or(0),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LinkStats {
    #[serde(flatten)]
    pub link: Link,
    pub clicks: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewLink {
    pub icon: Option<String>,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct LinkPatch {
    pub icon: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
}

impl LinkPatch {
    fn has_changes(&self) -> bool {
        self.icon.is_some() || self.title.is_some() || self.url.is_some()
    }
}

/// One owner's ordered links. Orders are dense `0..N-1` after every
/// committed write made through this type.
pub struct LinkCollection<'a> {
    conn: &'a Connection,
}

impl<'a> LinkCollection<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn list(&self, owner_id: &str) -> Result<Vec<Link>, AppError> {
        Ok(db::list_links(self.conn, owner_id)?
            .into_iter()
            .map(Link::from)
            .collect())
    }

    pub fn list_with_clicks(&self, session: &Session) -> Result<Vec<LinkStats>, AppError> {
        let clicks: HashMap<String, i64> = db::list_link_clicks(self.conn, session.owner_id())?
            .into_iter()
            .collect();
        Ok(self
            .list(session.owner_id())?
            .into_iter()
            .map(|link| LinkStats {
                clicks: clicks.get(&link.id).copied().unwrap_or(0),
                link,
            })
            .collect())
    }

    pub fn add(&self, session: &Session, input: &NewLink) -> Result<Link, AppError> {
        let fields = LinkFields::parse(input.icon.as_deref(), &input.title, &input.url)?;
        let owner_id = session.owner_id();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        require_profile(&tx, owner_id)?;
        let order = db::count_links(&tx, owner_id)?;
        let mut lookup_error = None;
        let id = generate_link_id(|candidate| match db::link_exists(&tx, owner_id, candidate) {
            Ok(exists) => exists,
            Err(err) => {
                lookup_error = Some(err);
                false
            }
        });
        if let Some(err) = lookup_error {
            return Err(err.into());
        }

        let created_at = db::now_utc_rfc3339();
        db::insert_link(
            &tx,
            &InsertLink {
                owner_id,
                id: &id,
                icon: fields.icon.as_stored(),
                title: &fields.title,
                url: &fields.url,
                order,
                created_at: &created_at,
            },
        )?;
        let link = db::get_link(&tx, owner_id, &id)?
            .map(Link::from)
            .ok_or_else(|| AppError::NotFound(format!("link '{}' vanished after insert", id)))?;
        tx.commit()?;

        info!(owner_id, link_id = %link.id, order, "added link");
        Ok(link)
    }

    /// Changes icon, title or url. Order is never touched here.
    pub fn edit(
        &self,
        session: &Session,
        link_id: &str,
        patch: &LinkPatch,
    ) -> Result<Link, AppError> {
        if !patch.has_changes() {
            return Err(AppError::InvalidInput(
                "edit requires at least one of icon, title or url".to_string(),
            ));
        }
        let icon = patch
            .icon
            .as_deref()
            .map(LinkIcon::parse)
            .transpose()
            .map_err(LinkInputError::from)?;
        let title = patch.title.as_deref().map(parse_title).transpose()?;
        let url = patch.url.as_deref().map(parse_url).transpose()?;
        let owner_id = session.owner_id();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current = Link::from(
            db::get_link(&tx, owner_id, link_id)?.ok_or_else(|| link_not_found(link_id))?,
        );
        // the stored icon text is only rewritten when a new icon was given
        let icon = icon.filter(|icon| *icon != current.icon);
        let title = title.unwrap_or_else(|| current.title.clone());
        let url = url.unwrap_or_else(|| current.url.clone());

        if icon.is_none() && title == current.title && url == current.url {
            debug!(owner_id, link_id, "edit left link unchanged");
            return Ok(current);
        }

        db::update_link_fields(
            &tx,
            owner_id,
            link_id,
            &UpdateLinkFields {
                icon: icon.as_ref().map(LinkIcon::as_stored),
                title: &title,
                url: &url,
                updated_at: &db::now_utc_rfc3339(),
            },
        )?;
        let link = db::get_link(&tx, owner_id, link_id)?
            .map(Link::from)
            .ok_or_else(|| link_not_found(link_id))?;
        tx.commit()?;
        Ok(link)
    }

    /// Removes the link and closes the gap so the rest stay dense.
    pub fn delete(&self, session: &Session, link_id: &str) -> Result<Vec<Link>, AppError> {
        let owner_id = session.owner_id();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if db::delete_link(&tx, owner_id, link_id)? == 0 {
            return Err(link_not_found(link_id));
        }
        db::delete_link_clicks(&tx, owner_id, link_id)?;

        let remaining = db::list_links(&tx, owner_id)?;
        let rewritten = resequence(&tx, owner_id, &remaining)?;
        tx.commit()?;

        info!(owner_id, link_id, rewritten, "deleted link");
        self.list(owner_id)
    }

    /// Applies a full ordering. `ids` must name every current link exactly
    /// once; anything else means the caller's view is out of date.
    pub fn reorder(&self, session: &Session, ids: &[String]) -> Result<Vec<Link>, AppError> {
        let owner_id = session.owner_id();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current = db::list_links(&tx, owner_id)?;

        if let Some(problem) = permutation_problem(&current, ids) {
            warn!(owner_id, %problem, "rejected stale reorder");
            return Err(AppError::StaleOrder(problem));
        }

        let by_id: HashMap<&str, &LinkRecord> =
            current.iter().map(|record| (record.id.as_str(), record)).collect();
        let updated_at = db::now_utc_rfc3339();
        let mut rewritten = 0usize;
        for (index, id) in ids.iter().enumerate() {
            let order = index as i64;
            let unchanged = by_id
                .get(id.as_str())
                .is_some_and(|record| record.order == Some(order));
            if !unchanged {
                db::set_link_order(&tx, owner_id, id, order, &updated_at)?;
                rewritten += 1;
            }
        }
        tx.commit()?;

        debug!(owner_id, rewritten, "reordered links");
        self.list(owner_id)
    }

    /// Public click tracking. The existence check and the increment are one
    /// upsert, so concurrent visitors never lose increments and a racing
    /// delete never leaves a counter behind.
    pub fn record_click(&self, owner_id: &str, link_id: &str) -> Result<i64, AppError> {
        let clicks =
            db::increment_link_clicks(self.conn, owner_id, link_id, &db::now_utc_rfc3339())?
                .ok_or_else(|| link_not_found(link_id))?;
        debug!(owner_id, link_id, clicks, "recorded click");
        Ok(clicks)
    }
}

/// Rewrites `order = index` for rows already in display order, touching only
/// rows whose stored order differs. Returns how many rows were written.
pub(crate) fn resequence(
    conn: &Connection,
    owner_id: &str,
    records: &[LinkRecord],
) -> Result<usize, rusqlite::Error> {
    let updated_at = db::now_utc_rfc3339();
    let mut rewritten = 0usize;
    for (index, record) in records.iter().enumerate() {
        let order = index as i64;
        if record.order != Some(order) {
            db::set_link_order(conn, owner_id, &record.id, order, &updated_at)?;
            rewritten += 1;
        }
    }
    Ok(rewritten)
}

/// True when the stored orders are exactly `0..N-1` in listing order.
pub(crate) fn order_is_dense(records: &[LinkRecord]) -> bool {
    records
        .iter()
        .enumerate()
        .all(|(index, record)| record.order == Some(index as i64))
}

fn permutation_problem(current: &[LinkRecord], ids: &[String]) -> Option<String> {
    let known: HashSet<&str> = current.iter().map(|record| record.id.as_str()).collect();
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    let mut unknown = Vec::new();
    for id in ids {
        if !seen.insert(id.as_str()) {
            duplicates.push(id.as_str());
        } else if !known.contains(id.as_str()) {
            unknown.push(id.as_str());
        }
    }
    let missing = current
        .iter()
        .map(|record| record.id.as_str())
        .filter(|id| !seen.contains(id))
        .collect::<Vec<_>>();

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing {}", missing.join(", ")));
    }
    if !unknown.is_empty() {
        parts.push(format!("unknown {}", unknown.join(", ")));
    }
    if !duplicates.is_empty() {
        parts.push(format!("duplicated {}", duplicates.join(", ")));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

fn require_profile(conn: &Connection, owner_id: &str) -> Result<(), AppError> {
    if db::get_profile(conn, owner_id)?.is_none() {
        return Err(AppError::NotFound(
            "no profile yet; claim a handle first".to_string(),
        ));
    }
    Ok(())
}

fn link_not_found(link_id: &str) -> AppError {
    AppError::NotFound(format!("link '{}' not found", link_id))
}
