use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

pub const MIN_HANDLE_LENGTH: usize = 3;
pub const MAX_HANDLE_LENGTH: usize = 20;

const HANDLE_PATTERN: &str = r"^[A-Za-z0-9_]{3,20}$";

fn handle_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(HANDLE_PATTERN).expect("handle pattern should compile"))
}

/// A validated, lowercase public handle.
///
/// Handles compare case-insensitively; the normalized form is the only one
/// that is ever stored, so the original casing is not preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    pub fn parse(raw: &str) -> Result<Self, ParseHandleError> {
        let trimmed = raw.trim();
        if !handle_regex().is_match(trimmed) {
            return Err(ParseHandleError::from_value(trimmed));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuilds a handle from a stored, already-normalized value.
    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Handle {
    type Err = ParseHandleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Handle::parse(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleProblem {
    Empty,
    TooShort,
    TooLong,
    BadCharacter(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHandleError {
    pub value: String,
    pub problem: HandleProblem,
}

impl ParseHandleError {
    fn from_value(value: &str) -> Self {
        let length = value.chars().count();
        let problem = if value.is_empty() {
            HandleProblem::Empty
        } else if let Some(ch) = value
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '_'))
        {
            HandleProblem::BadCharacter(ch)
        } else if length < MIN_HANDLE_LENGTH {
            HandleProblem::TooShort
        } else {
            HandleProblem::TooLong
        };
        Self {
            value: value.to_string(),
            problem,
        }
    }
}

impl fmt::Display for ParseHandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.problem {
            HandleProblem::Empty => write!(f, "handle cannot be empty"),
            HandleProblem::TooShort => write!(
                f,
                "handle '{}' is too short: use at least {} characters",
                self.value, MIN_HANDLE_LENGTH
            ),
            HandleProblem::TooLong => write!(
                f,
                "handle '{}' is too long: use at most {} characters",
                self.value, MAX_HANDLE_LENGTH
            ),
            HandleProblem::BadCharacter(ch) => write!(
                f,
                "handle '{}' contains '{}': only letters, digits and '_' are allowed",
                self.value, ch
            ),
        }
    }
}

impl Error for ParseHandleError {}
