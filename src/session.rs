// src/session.rs

//! Authenticated session handling.
//!
//! A [`Session`] is an immutable value built once from a successful login and
//! passed by reference to every component that needs the caller's identity.
//! [`SessionSlot`] holds the current one (if any) and broadcasts changes so
//! session-owned tasks such as the unread poller stop at logout.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{AppError, Result};

/// Role granted by the user service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// `"admin"` is the only elevated role; anything else is a regular user.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::User
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

/// Body of `POST /users/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub id: String,
    pub password: String,
}

impl Credentials {
    pub fn new(id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            password: password.into(),
        }
    }
}

/// Response of `POST /users/login`. Older user services omit the role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub role: String,
}

/// Identity of the logged-in user. Immutable for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    user_id: String,
    role: Role,
}

impl Session {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>, role: Role) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
            role,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// A session with an empty token is not valid for protected routes.
    pub fn is_valid(&self) -> bool {
        !self.token.trim().is_empty()
    }

    /// Fails with [`AppError::Forbidden`] unless the role is admin.
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

impl From<LoginResponse> for Session {
    fn from(response: LoginResponse) -> Self {
        Self::new(response.token, response.user_id, Role::parse(&response.role))
    }
}

/// Holder of the current session.
pub struct SessionSlot {
    current: watch::Sender<Option<Arc<Session>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    /// The current session, if any.
    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.borrow().clone()
    }

    /// Whether `session` is still the one signed in.
    pub fn is_current(&self, session: &Arc<Session>) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, session))
    }

    /// The current session or [`AppError::NoSession`].
    pub fn require(&self) -> Result<Arc<Session>> {
        self.current().ok_or(AppError::NoSession)
    }

    /// Install a freshly created session, replacing any previous one.
    pub fn begin(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        log::info!(
            "Session started for {} ({})",
            session.user_id(),
            session.role().as_str()
        );
        self.current.send_replace(Some(Arc::clone(&session)));
        session
    }

    /// Destroy the current session. Returns it if there was one.
    pub fn end(&self) -> Option<Arc<Session>> {
        let previous = self.current.send_replace(None);
        if let Some(session) = &previous {
            log::info!("Session ended for {}", session.user_id());
        }
        previous
    }

    /// Clear `session` if it is still the current one. A 401 answering a
    /// request made with an older token must not log out a newer login.
    pub fn expire(&self, session: &Arc<Session>) -> bool {
        let expired = self.current.send_if_modified(|current| match current {
            Some(active) if Arc::ptr_eq(active, session) => {
                *current = None;
                true
            }
            _ => false,
        });
        if expired {
            log::warn!(
                "Gateway rejected the session of {}; returning to login",
                session.user_id()
            );
        }
        expired
    }

    /// Apply the global unauthorized policy to a gateway result: a 401 tears
    /// the session down and surfaces only as [`AppError::SessionExpired`].
    pub fn check<T>(&self, session: &Arc<Session>, result: Result<T>) -> Result<T> {
        match result {
            Err(AppError::Unauthorized) => {
                self.expire(session);
                Err(AppError::SessionExpired)
            }
            other => other,
        }
    }

    /// Watch session changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Session>>> {
        self.current.subscribe()
    }
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self::new()
    }
}
