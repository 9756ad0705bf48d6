use std::collections::HashMap;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use tracing::info;

use crate::db::{self, HandleRecord, ProfileRecord};
use crate::links::{order_is_dense, resequence};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoctorStatus {
    Pass,
    Warn,
    Fail,
}

impl DoctorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DoctorStatus::Pass => "pass",
            DoctorStatus::Warn => "warn",
            DoctorStatus::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DoctorCheck {
    pub name: String,
    pub status: DoctorStatus,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<String>,
    pub repaired: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DoctorReport {
    pub checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    pub fn failure_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|check| check.status == DoctorStatus::Fail)
            .count()
    }
}

/// Consistency sweep over handles, profiles and link orders. With `fix`,
/// repairs what can be repaired without guessing at user intent.
pub fn run_doctor(conn: &Connection, fix: bool) -> Result<DoctorReport, rusqlite::Error> {
    let checks = vec![
        check_schema(conn)?,
        check_profile_handles(conn, fix)?,
        check_registry_entries(conn, fix)?,
        check_link_orders(conn, fix)?,
    ];
    Ok(DoctorReport { checks })
}

fn check_schema(conn: &Connection) -> Result<DoctorCheck, rusqlite::Error> {
    let stored: String = conn.query_row(
        "SELECT value FROM meta WHERE key = 'schema_version'",
        [],
        |row| row.get(0),
    )?;
    let expected = db::CURRENT_SCHEMA_VERSION.to_string();
    let (status, detail) = if stored == expected {
        (DoctorStatus::Pass, format!("schema version {stored}"))
    } else {
        (
            DoctorStatus::Warn,
            format!("schema version {stored}, expected {expected}"),
        )
    };
    Ok(DoctorCheck {
        name: "schema".to_string(),
        status,
        detail,
        findings: Vec::new(),
        repaired: 0,
    })
}

/// Every profile's handle must map back to its owner.
fn check_profile_handles(conn: &Connection, fix: bool) -> Result<DoctorCheck, rusqlite::Error> {
    let mappings = handle_map(conn)?;
    let mut findings = Vec::new();
    let mut unresolved = 0usize;
    let mut repaired = 0usize;

    for profile in db::list_profiles(conn)? {
        match mappings.get(profile.handle.as_str()) {
            Some(holder) if *holder == profile.owner_id => {}
            Some(holder) => {
                findings.push(format!(
                    "@{} of {} is held by {}",
                    profile.handle, profile.owner_id, holder
                ));
                unresolved += 1;
            }
            None => {
                findings.push(format!(
                    "@{} of {} has no registry entry",
                    profile.handle, profile.owner_id
                ));
                let restored = fix
                    && db::insert_handle_if_absent(
                        conn,
                        &profile.handle,
                        &profile.owner_id,
                        &db::now_utc_rfc3339(),
                    )? == 1;
                if restored {
                    info!(
                        handle = %profile.handle,
                        owner_id = %profile.owner_id,
                        "restored handle mapping"
                    );
                    repaired += 1;
                } else {
                    unresolved += 1;
                }
            }
        }
    }

    let (status, detail) = if unresolved > 0 {
        (
            DoctorStatus::Fail,
            format!("{unresolved} profile(s) do not resolve through the registry"),
        )
    } else if repaired > 0 {
        (DoctorStatus::Pass, format!("restored {repaired} mapping(s)"))
    } else {
        (
            DoctorStatus::Pass,
            "every profile resolves through its handle".to_string(),
        )
    };
    Ok(DoctorCheck {
        name: "profile_handles".to_string(),
        status,
        detail,
        findings,
        repaired,
    })
}

/// Registry entries whose owner has no profile, or whose profile has moved to
/// another handle, are leftovers from interrupted claims and renames.
fn check_registry_entries(conn: &Connection, fix: bool) -> Result<DoctorCheck, rusqlite::Error> {
    let profiles: HashMap<String, ProfileRecord> = db::list_profiles(conn)?
        .into_iter()
        .map(|profile| (profile.owner_id.clone(), profile))
        .collect();
    let mut findings = Vec::new();
    let mut repaired = 0usize;

    for entry in db::list_handles(conn)? {
        let Some(problem) = registry_problem(&entry, &profiles) else {
            continue;
        };
        findings.push(format!("@{} ({}): {}", entry.handle, entry.owner_id, problem));
        if fix && db::delete_handle_for_owner(conn, &entry.handle, &entry.owner_id)? == 1 {
            info!(
                handle = %entry.handle,
                owner_id = %entry.owner_id,
                problem,
                "released stale handle"
            );
            repaired += 1;
        }
    }

    let leftover = findings.len() - repaired;
    let (status, detail) = if leftover > 0 {
        (
            DoctorStatus::Warn,
            format!("{leftover} stale handle(s) reserved; run with --fix to release"),
        )
    } else if repaired > 0 {
        (DoctorStatus::Pass, format!("released {repaired} stale handle(s)"))
    } else {
        (DoctorStatus::Pass, "no stale handles".to_string())
    };
    Ok(DoctorCheck {
        name: "registry_entries".to_string(),
        status,
        detail,
        findings,
        repaired,
    })
}

fn registry_problem(
    entry: &HandleRecord,
    profiles: &HashMap<String, ProfileRecord>,
) -> Option<&'static str> {
    match profiles.get(&entry.owner_id) {
        None => Some("orphaned, owner has no profile"),
        Some(profile) if profile.handle != entry.handle => Some("leaked, profile moved on"),
        Some(_) => None,
    }
}

fn check_link_orders(conn: &Connection, fix: bool) -> Result<DoctorCheck, rusqlite::Error> {
    let mut findings = Vec::new();
    let mut repaired = 0usize;

    for owner_id in db::list_link_owner_ids(conn)? {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let records = db::list_links(&tx, &owner_id)?;
        if order_is_dense(&records) {
            continue;
        }
        findings.push(format!(
            "{owner_id}: orders {:?}",
            records.iter().map(|record| record.order).collect::<Vec<_>>()
        ));
        if fix {
            let rewritten = resequence(&tx, &owner_id, &records)?;
            tx.commit()?;
            info!(owner_id = %owner_id, rewritten, "resequenced links");
            repaired += 1;
        }
    }

    let leftover = findings.len() - repaired;
    let (status, detail) = if leftover > 0 {
        (
            DoctorStatus::Warn,
            format!("{leftover} owner(s) with gapped link orders; run with --fix"),
        )
    } else if repaired > 0 {
        (DoctorStatus::Pass, format!("resequenced {repaired} owner(s)"))
    } else {
        (DoctorStatus::Pass, "link orders are dense".to_string())
    };
    Ok(DoctorCheck {
        name: "link_order".to_string(),
        status,
        detail,
        findings,
        repaired,
    })
}

fn handle_map(conn: &Connection) -> Result<HashMap<String, String>, rusqlite::Error> {
    Ok(db::list_handles(conn)?
        .into_iter()
        .map(|entry| (entry.handle, entry.owner_id))
        .collect())
}
