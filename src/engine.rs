// src/engine.rs

//! Client engine.
//!
//! Owns one process's session slot, store, bus and unread poller, and is the
//! single path through which views and actions reach the backend.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::actions::ActionLedger;
use crate::backend::Backend;
use crate::bus::Bus;
use crate::error::{AppError, Result};
use crate::gate::{RouteDecision, route_decision};
use crate::models::Config;
use crate::poll::{PollTarget, UnreadPoller};
use crate::session::{Credentials, Session, SessionSlot};
use crate::store::Store;

pub struct Engine {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) sessions: Arc<SessionSlot>,
    pub(crate) store: Arc<Store>,
    pub(crate) bus: Bus,
    pub(crate) config: Config,
    pub(crate) actions: ActionLedger,
    poller: Mutex<Option<UnreadPoller>>,
}

impl Engine {
    pub fn new(backend: Arc<dyn Backend>, config: Config) -> Arc<Self> {
        Arc::new(Self {
            backend,
            sessions: Arc::new(SessionSlot::new()),
            store: Arc::new(Store::new()),
            bus: Bus::new(),
            config,
            actions: ActionLedger::new(),
            poller: Mutex::new(None),
        })
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn sessions(&self) -> &SessionSlot {
        &self.sessions
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.sessions.current()
    }

    /// Authenticate and start the session's unread poller.
    ///
    /// Wrong credentials come back as a business error; there is no session
    /// to expire yet.
    pub async fn login(&self, credentials: &Credentials) -> Result<Arc<Session>> {
        let response = match self.backend.login(credentials).await {
            Err(AppError::Unauthorized) => {
                return Err(AppError::business(401, "Invalid credentials"));
            }
            other => other?,
        };

        self.stop_poller();
        self.store.clear();
        let session = self.sessions.begin(Session::from(response));
        self.start_poller(&session);
        Ok(session)
    }

    /// End the session locally. The server-side logout is best effort.
    pub async fn logout(&self) -> Result<()> {
        let Some(session) = self.sessions.current() else {
            return Ok(());
        };
        if let Err(e) = self.backend.logout(&session).await {
            log::warn!("Logout request failed, clearing local session anyway: {e}");
        }
        self.sessions.end();
        self.stop_poller();
        self.store.clear();
        Ok(())
    }

    /// Navigation decision for the current session.
    pub fn route(&self, path: &str) -> RouteDecision {
        route_decision(path, self.session().as_deref())
    }

    /// Run a backend call with the current session, applying the global 401
    /// policy to its result.
    pub async fn authed<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn Backend>, Arc<Session>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = self.sessions.require()?;
        let result = op(Arc::clone(&self.backend), Arc::clone(&session)).await;
        let result = self.sessions.check(&session, result);
        // Results for a session that ended while the request was out belong
        // to nobody.
        let result = match result {
            Ok(_) if !self.sessions.is_current(&session) => {
                log::debug!(
                    "Discarding a response for the ended session of {}",
                    session.user_id()
                );
                Err(AppError::SessionExpired)
            }
            other => other,
        };
        if matches!(result, Err(AppError::SessionExpired)) && self.sessions.current().is_none() {
            self.stop_poller();
            self.store.clear();
        }
        result
    }

    /// Like [`Engine::authed`], failing with [`AppError::Forbidden`] before
    /// any request when the session is not an administrator's.
    pub async fn authed_admin<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn Backend>, Arc<Session>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.sessions.require()?.require_admin()?;
        self.authed(op).await
    }

    /// Fetch the unread count now and publish it to the store.
    pub async fn refresh_unread(&self) -> Result<u32> {
        let count = self
            .authed(|backend, session| async move { backend.unread_count(&session).await })
            .await?;
        self.store.set_unread(count);
        Ok(count)
    }

    pub fn is_polling(&self) -> bool {
        self.poller().as_ref().is_some_and(UnreadPoller::is_running)
    }

    fn poller(&self) -> MutexGuard<'_, Option<UnreadPoller>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_poller(&self, session: &Arc<Session>) {
        let target = PollTarget {
            backend: Arc::clone(&self.backend),
            sessions: Arc::clone(&self.sessions),
            store: Arc::clone(&self.store),
            session: Arc::clone(session),
        };
        let poller = UnreadPoller::spawn(target, self.config.polling.unread_interval());
        *self.poller() = Some(poller);
    }

    fn stop_poller(&self) {
        if let Some(poller) = self.poller().take() {
            poller.stop();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop_poller();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{Failure, MemoryBackend};
    use crate::gate::LANDING_PATH;
    use crate::session::Role;
    use std::time::Duration;

    fn backend() -> Arc<MemoryBackend> {
        Arc::new(
            MemoryBackend::new()
                .with_user("admin", "admin123", Role::Admin)
                .with_user("user1", "pw", Role::User)
                .with_user("user2", "pw", Role::User),
        )
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let backend = backend();
        let engine = Engine::new(backend.clone(), Config::default());

        let session = engine.login(&Credentials::new("user1", "pw")).await.unwrap();
        assert_eq!(session.user_id(), "user1");
        assert!(engine.is_polling());
        assert_eq!(engine.route("/admin/dashboard"), RouteDecision::Redirect(LANDING_PATH));

        engine.store().set_unread(3);
        engine.logout().await.unwrap();
        assert!(engine.session().is_none());
        assert!(!engine.is_polling());
        assert_eq!(engine.store().unread(), 0);
        assert_eq!(engine.route("/cart"), RouteDecision::RedirectToLogin);
    }

    #[tokio::test]
    async fn test_bad_credentials_are_a_business_error() {
        let engine = Engine::new(backend(), Config::default());
        let err = engine
            .login(&Credentials::new("user1", "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Business { status: 401, .. }));
        assert!(engine.session().is_none());
    }

    #[tokio::test]
    async fn test_logout_ignores_backend_failure() {
        let backend = backend();
        let engine = Engine::new(backend.clone(), Config::default());
        engine.login(&Credentials::new("user1", "pw")).await.unwrap();

        backend.fail_next("logout", Failure::Network);
        engine.logout().await.unwrap();
        assert!(engine.session().is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session_and_store() {
        let backend = backend();
        let engine = Engine::new(backend.clone(), Config::default());
        engine.login(&Credentials::new("user1", "pw")).await.unwrap();
        engine.store().cart.replace(Vec::new());

        backend.revoke_tokens();
        let err = engine.refresh_unread().await.unwrap_err();
        assert!(matches!(err, AppError::SessionExpired));
        assert!(engine.session().is_none());
        assert!(!engine.is_polling());
    }

    #[tokio::test]
    async fn test_admin_calls_are_checked_locally() {
        let backend = backend();
        let engine = Engine::new(backend.clone(), Config::default());
        engine.login(&Credentials::new("user1", "pw")).await.unwrap();

        let err = engine
            .authed_admin(|b, s| async move { b.admin_active_borrows(&s).await })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        assert_eq!(backend.calls("admin_active_borrows"), 0);
    }

    #[tokio::test]
    async fn test_calls_without_session() {
        let engine = Engine::new(backend(), Config::default());
        assert!(matches!(
            engine.refresh_unread().await,
            Err(AppError::NoSession)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_for_ended_session_is_discarded() {
        let backend = backend();
        let engine = Engine::new(backend.clone(), Config::default());
        engine.login(&Credentials::new("user1", "pw")).await.unwrap();

        let slow = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move {
                engine
                    .authed(|b, s| async move {
                        let answer = b.active_borrows(&s).await;
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        answer
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;

        engine.logout().await.unwrap();
        let second = engine.login(&Credentials::new("user2", "pw")).await.unwrap();

        let result = slow.await.unwrap();
        assert!(matches!(result, Err(AppError::SessionExpired)));
        assert!(engine.sessions().is_current(&second));
        assert!(engine.is_polling());
    }
}
