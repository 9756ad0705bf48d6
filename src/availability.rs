use std::io::BufRead;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};

use crate::app::AppError;
use crate::db;
use crate::domain::handle::Handle;
use crate::registry::HandleRegistry;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Availability {
    Available,
    Taken,
    Invalid(String),
    /// The candidate is the caller's own current handle.
    Unchanged,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Taken => "taken",
            Availability::Invalid(_) => "invalid",
            Availability::Unchanged => "unchanged",
        }
    }

    pub fn is_acceptable(&self) -> bool {
        matches!(self, Availability::Available | Availability::Unchanged)
    }
}

/// Side-effect free handle availability query.
pub struct AvailabilityChecker<'a> {
    conn: &'a Connection,
}

impl<'a> AvailabilityChecker<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn check(
        &self,
        candidate: &str,
        current_owner_id: Option<&str>,
    ) -> Result<Availability, AppError> {
        let handle = match Handle::parse(candidate) {
            Ok(handle) => handle,
            Err(err) => return Ok(Availability::Invalid(err.to_string())),
        };

        if let Some(owner_id) = current_owner_id {
            let current = db::get_profile(self.conn, owner_id)?.map(|profile| profile.handle);
            if current.as_deref() == Some(handle.as_str()) {
                return Ok(Availability::Unchanged);
            }
        }

        let registry = HandleRegistry::new(self.conn);
        if registry.is_available(&handle)? {
            return Ok(Availability::Available);
        }
        // a mapping the caller already holds is reservable again
        let holder = registry.lookup(&handle)?;
        if holder.is_some() && holder.as_deref() == current_owner_id {
            Ok(Availability::Available)
        } else {
            Ok(Availability::Taken)
        }
    }
}

/// Identifies one input revision. A result is only shown if its ticket is
/// still the latest one handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    revision: u64,
    input: String,
}

impl Ticket {
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Last-request-wins bookkeeping for availability checks.
#[derive(Debug, Default)]
pub struct AvailabilityTracker {
    revision: u64,
    input: String,
}

impl AvailabilityTracker {
    /// Records a new input revision; every earlier ticket becomes stale.
    pub fn revise(&mut self, input: &str) -> Ticket {
        self.revision += 1;
        self.input = input.to_string();
        self.ticket()
    }

    pub fn ticket(&self) -> Ticket {
        Ticket {
            revision: self.revision,
            input: self.input.clone(),
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.revision == self.revision && ticket.input == self.input
    }

    /// Hands `result` back only when `ticket` is still current.
    pub fn complete<T>(&self, ticket: &Ticket, result: T) -> Option<T> {
        self.is_current(ticket).then_some(result)
    }
}

/// Quiet-period timer: fires once input has stopped for `quiet`.
#[derive(Debug, Clone)]
pub struct Debounce {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    pub fn input(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
    }

    /// True once, when the quiet period has elapsed.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Fires immediately if something was pending.
    pub fn flush(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct FollowSettings {
    pub db_path: String,
    pub busy_timeout: Duration,
    pub debounce: Duration,
    pub current_owner_id: Option<String>,
}

enum FollowEvent {
    Input(String),
    InputClosed,
    Checked {
        ticket: Ticket,
        result: Result<Availability, AppError>,
    },
    WorkerFailed(AppError),
}

/// Reads candidate handles line by line, debounces them and reports results
/// that are still current when they arrive. Checks run on a worker thread
/// with its own connection. Returns once input is exhausted and every
/// dispatched check has come back.
pub fn follow<R, F>(settings: FollowSettings, input: R, mut emit: F) -> Result<(), AppError>
where
    R: BufRead + Send + 'static,
    F: FnMut(&str, &Availability),
{
    let (event_tx, event_rx) = mpsc::channel::<FollowEvent>();
    let (job_tx, job_rx) = mpsc::channel::<Ticket>();

    let reader_tx = event_tx.clone();
    thread::spawn(move || {
        for line in input.lines() {
            match line {
                Ok(line) => {
                    if reader_tx.send(FollowEvent::Input(line)).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "stopped reading candidates");
                    break;
                }
            }
        }
        let _ = reader_tx.send(FollowEvent::InputClosed);
    });

    let worker_settings = settings.clone();
    let worker = thread::spawn(move || {
        let opened = db::open_connection(&worker_settings.db_path, worker_settings.busy_timeout);
        let conn = match opened {
            Ok(conn) => conn,
            Err(err) => {
                let _ = event_tx.send(FollowEvent::WorkerFailed(err.into()));
                return;
            }
        };
        let checker = AvailabilityChecker::new(&conn);
        let owner_id = worker_settings.current_owner_id.as_deref();
        for ticket in job_rx {
            let result = checker.check(ticket.input(), owner_id);
            if event_tx.send(FollowEvent::Checked { ticket, result }).is_err() {
                return;
            }
        }
    });

    let mut tracker = AvailabilityTracker::default();
    let mut debounce = Debounce::new(settings.debounce);
    let mut pending: Option<Ticket> = None;
    let mut in_flight = 0usize;
    let mut closed = false;
    let mut outcome = Ok(());

    while !(closed && pending.is_none() && in_flight == 0) {
        let event = match debounce.remaining(Instant::now()) {
            Some(wait) => match event_rx.recv_timeout(wait) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match event_rx.recv() {
                Ok(event) => Some(event),
                Err(_) => break,
            },
        };

        match event {
            Some(FollowEvent::Input(line)) => {
                let candidate = line.trim();
                let ticket = tracker.revise(candidate);
                if candidate.is_empty() {
                    debounce.cancel();
                    pending = None;
                } else {
                    debounce.input(Instant::now());
                    pending = Some(ticket);
                }
            }
            Some(FollowEvent::InputClosed) => {
                closed = true;
                if !debounce.flush() {
                    pending = None;
                }
            }
            Some(FollowEvent::Checked { ticket, result }) => {
                in_flight -= 1;
                match tracker.complete(&ticket, result) {
                    Some(Ok(availability)) => emit(ticket.input(), &availability),
                    Some(Err(err)) => {
                        outcome = Err(err);
                        break;
                    }
                    None => debug!(candidate = ticket.input(), "discarded stale check"),
                }
            }
            Some(FollowEvent::WorkerFailed(err)) => {
                outcome = Err(err);
                break;
            }
            None => {}
        }

        let due = closed || debounce.ready(Instant::now());
        if due && !debounce.is_pending() {
            if let Some(ticket) = pending.take() {
                debug!(candidate = ticket.input(), "dispatching availability check");
                if job_tx.send(ticket).is_err() {
                    break;
                }
                in_flight += 1;
            }
        }
    }

    drop(job_tx);
    if worker.join().is_err() {
        warn!("availability worker panicked");
    }
    outcome
}
