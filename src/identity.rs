use std::error::Error;
use std::fmt;

use tracing::debug;

/// The authenticated principal as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub owner_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
}

/// Explicit per-request context. Every owner-scoped operation takes one of
/// these instead of reading ambient "current user" state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    principal: Principal,
}

impl Session {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn owner_id(&self) -> &str {
        &self.principal.owner_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

/// Boundary to the external identity provider.
pub trait IdentityGateway {
    fn authenticate(&self) -> Result<Principal, AuthError>;
    fn sign_out(&self) -> Result<(), AuthError>;
}

/// Identity supplied by the caller's environment (CLI flags or variables).
/// Trust is delegated to whoever launched the process.
#[derive(Debug, Clone, Default)]
pub struct LocalIdentity {
    pub owner_id: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
}

impl IdentityGateway for LocalIdentity {
    fn authenticate(&self) -> Result<Principal, AuthError> {
        let owner_id = self
            .owner_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                AuthError::Failed(
                    "no owner identity supplied; pass --owner or set LINKPAGE_OWNER".to_string(),
                )
            })?;

        debug!(owner_id, "authenticated local principal");
        Ok(Principal {
            owner_id: owner_id.to_string(),
            display_name: non_empty(self.display_name.as_deref()),
            avatar_url: non_empty(self.avatar_url.as_deref()),
            email: non_empty(self.email.as_deref()),
        })
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        debug!(owner_id = ?self.owner_id, "local identity has no provider session to end");
        Ok(())
    }
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    Cancelled,
    Failed(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Cancelled => write!(f, "sign-in was cancelled"),
            AuthError::Failed(message) => write!(f, "sign-in failed: {}", message),
        }
    }
}

impl Error for AuthError {}
