//! Session lookup. Turns an opaque token into an authenticated user id.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{RepoError, SessionsRepo, UsersRepo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthenticatedUserId(Uuid);

impl AuthenticatedUserId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    Authenticated(AuthenticatedUserId),
    Anonymous,
}

impl Session {
    pub fn user(&self) -> Option<AuthenticatedUserId> {
        match self {
            Session::Authenticated(user) => Some(*user),
            Session::Anonymous => None,
        }
    }

    /// Refuse anonymous callers.
    pub fn require(&self) -> Result<AuthenticatedUserId, AppError> {
        self.user()
            .ok_or_else(|| AppError::unauthorized("Sign in required"))
    }
}

#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, token: Option<&str>) -> Result<Session, RepoError>;
}

/// Resolves tokens against the `sessions` and `users` tables.
///
/// Malformed, unknown and expired tokens, as well as sessions whose user no
/// longer exists, all resolve to [`Session::Anonymous`].
#[derive(Clone)]
pub struct RepoSessionResolver {
    sessions: Arc<dyn SessionsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl RepoSessionResolver {
    pub fn new(sessions: Arc<dyn SessionsRepo>, users: Arc<dyn UsersRepo>) -> Self {
        Self { sessions, users }
    }

    async fn resolve_at(
        &self,
        token: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<Session, RepoError> {
        let Some(raw) = token.map(str::trim).filter(|value| !value.is_empty()) else {
            return Ok(Session::Anonymous);
        };

        let Ok(id) = Uuid::parse_str(raw) else {
            debug!("Malformed session token");
            return Ok(Session::Anonymous);
        };

        let Some(session) = self.sessions.find_session(id).await? else {
            return Ok(Session::Anonymous);
        };

        if session.is_expired_at(now) {
            debug!(session_id = %session.id, "Session expired");
            return Ok(Session::Anonymous);
        }

        match self.users.find_by_id(session.user_id).await? {
            Some(user) => Ok(Session::Authenticated(AuthenticatedUserId::new(user.id))),
            None => Ok(Session::Anonymous),
        }
    }
}

#[async_trait]
impl SessionResolver for RepoSessionResolver {
    async fn resolve(&self, token: Option<&str>) -> Result<Session, RepoError> {
        self.resolve_at(token, OffsetDateTime::now_utc()).await
    }
}
