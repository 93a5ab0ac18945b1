//! Access guard for protected views.
//!
//! The guard decides whether a protected subtree renders or a fallback
//! does. It is a rendering decision only; the hosted backend enforces the
//! real access rules.

use std::sync::Arc;

use serde_json::json;

use crate::backend::{AuthSession, Backend};
use crate::query::{keys, QueryClient, QueryState};
use crate::{Error, Result};

pub const ADMIN_CHECK_FUNCTION: &str = "check_is_admin";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardRequirements {
    pub require_auth: bool,
    /// Implies `require_auth`.
    pub require_admin: bool,
}

impl GuardRequirements {
    pub const fn authenticated() -> Self {
        Self {
            require_auth: true,
            require_admin: false,
        }
    }

    pub const fn admin() -> Self {
        Self {
            require_auth: true,
            require_admin: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Error(Error),
    Unauthenticated,
    Unauthorized,
    Authorized,
}

/// What a fallback view offers the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackAction {
    SignIn,
    GoHome,
    Reload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    Loading,
    SignInRequired,
    AccessDenied,
    ErrorView(Error),
}

impl Fallback {
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Loading => "Loading",
            Self::SignInRequired => "Sign In Required",
            Self::AccessDenied => "Access Denied",
            Self::ErrorView(_) => "Something went wrong",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Loading => "Checking your access.".to_string(),
            Self::SignInRequired => "Please sign in to view this page.".to_string(),
            Self::AccessDenied => "You do not have permission to view this page.".to_string(),
            Self::ErrorView(error) => error.kind().user_message().to_string(),
        }
    }

    pub const fn action(&self) -> Option<FallbackAction> {
        match self {
            Self::Loading => None,
            Self::SignInRequired => Some(FallbackAction::SignIn),
            Self::AccessDenied => Some(FallbackAction::GoHome),
            Self::ErrorView(_) => Some(FallbackAction::Reload),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<T> {
    Children(T),
    Fallback(Fallback),
}

impl GuardState {
    pub fn render<T>(self, children: T) -> Rendered<T> {
        match self {
            Self::Authorized => Rendered::Children(children),
            Self::Loading => Rendered::Fallback(Fallback::Loading),
            Self::Unauthenticated => Rendered::Fallback(Fallback::SignInRequired),
            Self::Unauthorized => Rendered::Fallback(Fallback::AccessDenied),
            Self::Error(error) => Rendered::Fallback(Fallback::ErrorView(error)),
        }
    }

    /// Transition from a resolved session and, when it was needed, the
    /// privilege check result.
    fn resolve(
        requirements: GuardRequirements,
        session: Option<&AuthSession>,
        is_admin: Option<bool>,
    ) -> Self {
        let require_auth = requirements.require_auth || requirements.require_admin;
        match session {
            None if require_auth => Self::Unauthenticated,
            None => Self::Authorized,
            Some(_) if !requirements.require_admin => Self::Authorized,
            Some(_) => match is_admin {
                Some(true) => Self::Authorized,
                Some(false) => Self::Unauthorized,
                None => Self::Loading,
            },
        }
    }
}

pub struct AccessGuard {
    backend: Arc<dyn Backend>,
    queries: QueryClient,
    requirements: GuardRequirements,
}

impl AccessGuard {
    pub fn new(
        backend: Arc<dyn Backend>,
        queries: QueryClient,
        requirements: GuardRequirements,
    ) -> Self {
        Self {
            backend,
            queries,
            requirements,
        }
    }

    pub const fn requirements(&self) -> GuardRequirements {
        self.requirements
    }

    /// Resolve the guard, fetching through the query cache as needed.
    ///
    /// The privilege check is only issued when admin access is required.
    pub async fn evaluate(&self) -> GuardState {
        let session = match self.session().await {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!("Session lookup failed: {}", error);
                return GuardState::Error(error);
            }
        };

        let is_admin = match session.as_ref() {
            Some(session) if self.requirements.require_admin => {
                match self.is_admin(&session.user.id).await {
                    Ok(is_admin) => Some(is_admin),
                    Err(error) => {
                        tracing::warn!(user_id = %session.user.id, "Admin check failed: {}", error);
                        return GuardState::Error(error);
                    }
                }
            }
            _ => None,
        };

        let state = GuardState::resolve(self.requirements, session.as_ref(), is_admin);
        tracing::debug!(?state, "Access guard resolved");
        state
    }

    /// Current state from cached data only, without fetching.
    pub fn current(&self) -> GuardState {
        let session: QueryState<Option<AuthSession>> = self.queries.state(&keys::session());
        if let Some(error) = session.error.filter(|_| session.data.is_none()) {
            return GuardState::Error(error);
        }
        let Some(session) = session.data else {
            return GuardState::Loading;
        };
        let session = (*session).as_ref();

        let is_admin = match session {
            Some(session) if self.requirements.require_admin => {
                let admin: QueryState<bool> = self.queries.state(&keys::is_admin(&session.user.id));
                if let Some(error) = admin.error.filter(|_| admin.data.is_none()) {
                    return GuardState::Error(error);
                }
                admin.data.map(|value| *value)
            }
            _ => None,
        };
        GuardState::resolve(self.requirements, session, is_admin)
    }

    async fn session(&self) -> Result<Option<AuthSession>> {
        let backend = self.backend.clone();
        let session = self
            .queries
            .fetch_query(keys::session(), self.queries.default_options(), move || {
                let backend = backend.clone();
                async move { backend.session().await }
            })
            .await?;
        Ok((*session).clone())
    }

    async fn is_admin(&self, user_id: &str) -> Result<bool> {
        let backend = self.backend.clone();
        let owned_user_id = user_id.to_string();
        let is_admin = self
            .queries
            .fetch_query(
                keys::is_admin(user_id),
                self.queries.default_options(),
                move || {
                    let backend = backend.clone();
                    let user_id = owned_user_id.clone();
                    async move { check_is_admin(backend.as_ref(), &user_id).await }
                },
            )
            .await?;
        Ok(*is_admin)
    }
}

/// Ask the backend whether `user_id` holds the admin role.
pub async fn check_is_admin(backend: &dyn Backend, user_id: &str) -> Result<bool> {
    let value = backend
        .rpc(ADMIN_CHECK_FUNCTION, json!({ "user_id": user_id }))
        .await?;
    value.as_bool().ok_or_else(|| {
        Error::Serialization(format!("{ADMIN_CHECK_FUNCTION} returned {value}, expected a boolean"))
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::{CallKind, MemoryBackend};
    use crate::config::QueryConfig;

    fn guard(backend: &MemoryBackend, requirements: GuardRequirements) -> AccessGuard {
        AccessGuard::new(
            Arc::new(backend.clone()),
            QueryClient::new(QueryConfig::default()),
            requirements,
        )
    }

    #[tokio::test]
    async fn no_session_with_auth_required_renders_sign_in() {
        let backend = MemoryBackend::new();
        let state = guard(&backend, GuardRequirements::authenticated())
            .evaluate()
            .await;

        assert_eq!(state, GuardState::Unauthenticated);
        let rendered = state.render("dashboard");
        assert_eq!(rendered, Rendered::Fallback(Fallback::SignInRequired));
        if let Rendered::Fallback(fallback) = rendered {
            assert_eq!(fallback.title(), "Sign In Required");
            assert_eq!(fallback.action(), Some(FallbackAction::SignIn));
        }
    }

    #[tokio::test]
    async fn non_admin_session_renders_access_denied() {
        let backend = MemoryBackend::new();
        backend.sign_in_as("user-1");

        let state = guard(&backend, GuardRequirements::admin()).evaluate().await;

        assert_eq!(state, GuardState::Unauthorized);
        let Rendered::Fallback(fallback) = state.render(()) else {
            panic!("expected a fallback");
        };
        assert_eq!(fallback.title(), "Access Denied");
        assert_eq!(fallback.action(), Some(FallbackAction::GoHome));
        assert_eq!(backend.count_calls(CallKind::Rpc), 1);
    }

    #[tokio::test]
    async fn admin_session_renders_children() {
        let backend = MemoryBackend::new();
        backend.sign_in_as("admin-1");
        backend.grant_admin("admin-1");

        let state = guard(&backend, GuardRequirements::admin()).evaluate().await;
        assert_eq!(state.render("admin panel"), Rendered::Children("admin panel"));
    }

    #[tokio::test]
    async fn authenticated_guard_skips_privilege_check() {
        let backend = MemoryBackend::new();
        backend.sign_in_as("user-1");

        let state = guard(&backend, GuardRequirements::authenticated())
            .evaluate()
            .await;

        assert_eq!(state.render(42), Rendered::Children(42));
        assert_eq!(backend.count_calls(CallKind::Rpc), 0);
    }

    #[tokio::test]
    async fn admin_requirement_without_session_needs_sign_in() {
        let backend = MemoryBackend::new();
        let state = guard(&backend, GuardRequirements::admin()).evaluate().await;

        assert_eq!(state, GuardState::Unauthenticated);
        assert_eq!(backend.count_calls(CallKind::Rpc), 0);
    }

    #[tokio::test]
    async fn open_guard_renders_for_anonymous_users() {
        let backend = MemoryBackend::new();
        let state = guard(&backend, GuardRequirements::default()).evaluate().await;
        assert_eq!(state, GuardState::Authorized);
    }

    #[tokio::test]
    async fn session_failure_renders_error_view() {
        let backend = MemoryBackend::new();
        backend.fail_next(CallKind::Session, Error::http(401, "JWT expired"));

        let guard = guard(&backend, GuardRequirements::authenticated());
        let state = guard.evaluate().await;

        assert_eq!(state, GuardState::Error(Error::http(401, "JWT expired")));
        assert_eq!(guard.current(), state);
        let Rendered::Fallback(fallback) = state.render(()) else {
            panic!("expected a fallback");
        };
        assert_eq!(fallback.title(), "Something went wrong");
        assert_eq!(fallback.action(), Some(FallbackAction::Reload));
    }

    #[tokio::test]
    async fn current_is_loading_before_first_evaluation() {
        let backend = MemoryBackend::new();
        backend.sign_in_as("user-1");
        let guard = guard(&backend, GuardRequirements::admin());

        assert_eq!(guard.current(), GuardState::Loading);
        guard.evaluate().await;
        assert_eq!(guard.current(), GuardState::Unauthorized);
    }

    #[tokio::test]
    async fn session_is_served_from_cache_on_reevaluation() {
        let backend = MemoryBackend::new();
        backend.sign_in_as("admin-1");
        backend.grant_admin("admin-1");
        let guard = guard(&backend, GuardRequirements::admin());

        guard.evaluate().await;
        guard.evaluate().await;

        assert_eq!(backend.count_calls(CallKind::Session), 1);
        assert_eq!(backend.count_calls(CallKind::Rpc), 1);
    }
}
