//! Dependencies shared by every feature service.

use std::sync::Arc;

use crate::backend::{AuthSession, AuthUser, Backend};
use crate::config::ClientConfig;
use crate::guard::{AccessGuard, GuardRequirements};
use crate::mutation::{IntentSequencer, Mutation};
use crate::notify::{report_error, ErrorMonitor, LogNotifier, Notifier};
use crate::query::{keys, QueryClient, QueryKey};
use crate::{Error, Result};

/// Explicitly injected application context: the backend handle, the query
/// cache and the notification sinks. Cheap to clone.
#[derive(Clone)]
pub struct AppContext {
    pub backend: Arc<dyn Backend>,
    pub queries: QueryClient,
    pub notifier: Arc<dyn Notifier>,
    pub monitor: Option<Arc<dyn ErrorMonitor>>,
    pub intents: IntentSequencer,
    pub config: ClientConfig,
}

impl AppContext {
    pub fn new(backend: Arc<dyn Backend>, config: ClientConfig) -> Self {
        Self {
            backend,
            queries: QueryClient::new(config.query),
            notifier: Arc::new(LogNotifier),
            monitor: None,
            intents: IntentSequencer::new(),
            config,
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<dyn ErrorMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn storage_bucket(&self) -> &str {
        &self.config.storage_bucket
    }

    pub fn mutation(&self, name: &str) -> Mutation {
        Mutation::new(&self.queries, name)
    }

    pub fn guard(&self, requirements: GuardRequirements) -> AccessGuard {
        AccessGuard::new(self.backend.clone(), self.queries.clone(), requirements)
    }

    /// Signed-in user, or an error when there is no session.
    pub async fn current_user(&self) -> Result<AuthUser> {
        self.backend
            .user()
            .await?
            .ok_or_else(|| Error::Unauthenticated("Sign in to continue".to_string()))
    }

    /// Toast and log a failed action, forwarding to monitoring if set.
    pub fn report(&self, context: &str, error: &Error) {
        report_error(self.notifier.as_ref(), self.monitor.as_deref(), context, error);
    }

    /// Publish a new session to the cache and drop cached privilege checks.
    /// Call after any sign-in, refresh or sign-out.
    pub fn session_changed(&self, session: Option<AuthSession>) {
        tracing::debug!(
            user_id = session.as_ref().map(|session| session.user.id.as_str()),
            "Session changed"
        );
        self.queries.set_query_data(&keys::session(), Arc::new(session));
        self.queries.remove_matching(&QueryKey::new(keys::IS_ADMIN));
    }

    /// Re-read the backend session and publish it.
    pub async fn refresh_session(&self) -> Result<Option<AuthSession>> {
        let session = self.backend.session().await?;
        self.session_changed(session.clone());
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.backend.sign_out().await?;
        self.session_changed(None);
        Ok(())
    }

    /// Report `result`'s error, if any, and pass it through.
    pub(crate) fn reported<T>(&self, context: &str, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            self.report(context, error);
        }
        result
    }
}
