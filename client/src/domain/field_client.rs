//! Client service orchestrating the session against the field API.
//!
//! The service owns the single [`Session`] for the process. Every
//! authenticated call goes through [`FieldClient::authorized`], which renews
//! the access token once when the server rejects it and retries the call
//! once. The session mutex is only held between awaits, never across one.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mockable::Clock;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::domain::ports::{FieldApi, FieldApiError, TokenStore, TokenStoreError};
use crate::domain::{
    ClientProject, LoginCredentials, MapScene, MapSceneError, PolygonFailurePolicy,
    ProjectOverview, Session, SessionState, SessionTransitionError,
};

/// Service-level errors returned by [`FieldClient`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// No credentials are held; log in first.
    #[error("not logged in")]
    NotAuthenticated,
    /// The server no longer accepts the session and it could not be renewed.
    #[error("session expired; log in again")]
    SessionExpired,
    /// Another task is renewing the session.
    #[error("session refresh already in progress")]
    RefreshInProgress,
    /// The remote API failed.
    #[error(transparent)]
    Api(#[from] FieldApiError),
    /// Token persistence failed.
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
    /// The session rejected a transition.
    #[error(transparent)]
    Session(#[from] SessionTransitionError),
    /// Parcel data could not be turned into a map.
    #[error(transparent)]
    MapScene(#[from] MapSceneError),
}

/// Authenticated client for the field monitoring API.
pub struct FieldClient<A, S> {
    api: Arc<A>,
    tokens: Arc<S>,
    clock: Arc<dyn Clock>,
    session: Mutex<Session>,
}

impl<A, S> FieldClient<A, S> {
    /// Create an anonymous client.
    pub fn new(api: Arc<A>, tokens: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            tokens,
            clock,
            session: Mutex::new(Session::new()),
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session().state()
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A, S> FieldClient<A, S>
where
    A: FieldApi,
    S: TokenStore,
{
    /// Load persisted tokens into the session.
    ///
    /// Returns `true` when a stored session was found.
    ///
    /// # Errors
    ///
    /// Propagates [`TokenStoreError`] when the store cannot be read.
    pub fn restore(&self) -> Result<bool, ClientError> {
        let Some(tokens) = self.tokens.load()? else {
            debug!("no stored session");
            return Ok(false);
        };
        self.session().login(tokens);
        debug!("restored stored session");
        Ok(true)
    }

    /// Like [`FieldClient::restore`], but an unreadable stored session is
    /// dropped instead of failing.
    ///
    /// Used before commands that replace or remove the stored session, so a
    /// corrupt file never locks the user out. The file itself is left for
    /// the next `store` or `clear` to overwrite.
    ///
    /// # Errors
    ///
    /// Propagates [`TokenStoreError::Io`]; only corrupt contents are ignored.
    pub fn restore_or_discard(&self) -> Result<bool, ClientError> {
        match self.restore() {
            Err(ClientError::TokenStore(error @ TokenStoreError::Corrupt { .. })) => {
                warn!(%error, "ignoring unreadable stored session");
                Ok(false)
            }
            other => other,
        }
    }

    /// Log in and persist the issued tokens.
    ///
    /// Returns the display name sent by the server, falling back to the
    /// username.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] when the server refuses the credentials
    /// and [`ClientError::TokenStore`] when the tokens cannot be persisted.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<String, ClientError> {
        let grant = self.api.login(credentials).await?;
        self.tokens.store(&grant.tokens)?;
        self.session().login(grant.tokens);
        info!(username = credentials.username(), "logged in");

        Ok(grant
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| credentials.username().to_owned()))
    }

    /// Revoke the session server-side and forget it locally.
    ///
    /// The server call is best effort: local credentials are dropped even
    /// when it fails.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TokenStore`] when the stored tokens cannot be
    /// removed.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let held = self.session().logout();
        if let Some(tokens) = held {
            if let Err(error) = self.api.logout(&tokens).await {
                warn!(%error, "server logout failed; clearing local session");
            }
        }
        self.tokens.clear()?;
        info!("logged out");
        Ok(())
    }

    /// Run `call` with the current access token, renewing it once on
    /// rejection.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotAuthenticated`] when no session is held.
    /// - [`ClientError::SessionExpired`] when the token is rejected and
    ///   cannot be renewed, or the renewed token is rejected too.
    /// - [`ClientError::Api`] for any other API failure; these are never
    ///   retried.
    pub async fn authorized<T, F, Fut>(&self, call: F) -> Result<T, ClientError>
    where
        F: Fn(Zeroizing<String>) -> Fut,
        Fut: Future<Output = Result<T, FieldApiError>>,
    {
        let access = match self.usable_access()? {
            Some(access) => access,
            None => self.refresh().await?,
        };

        match call(access).await {
            Err(error) if error.is_unauthorized() => {
                debug!(%error, "access token rejected; refreshing");
                self.expire();
                let renewed = self.refresh().await?;
                match call(renewed).await {
                    Err(error) if error.is_unauthorized() => {
                        warn!(%error, "renewed access token rejected");
                        self.expire();
                        Err(ClientError::SessionExpired)
                    }
                    other => other.map_err(ClientError::from),
                }
            }
            other => other.map_err(ClientError::from),
        }
    }

    /// Projects visible to the user, with their nodes and expiry.
    ///
    /// # Errors
    ///
    /// See [`FieldClient::authorized`].
    pub async fn dashboard(&self) -> Result<Vec<ProjectOverview>, ClientError> {
        let api = Arc::clone(&self.api);
        let dashboard = self
            .authorized(|token| {
                let api = Arc::clone(&api);
                async move { api.dashboard(&token).await }
            })
            .await?;
        let today = self.clock.utc().date_naive();
        Ok(ProjectOverview::build(
            dashboard.projects,
            &dashboard.nodes,
            today,
        ))
    }

    /// Lightweight listing of the client's projects.
    ///
    /// # Errors
    ///
    /// See [`FieldClient::authorized`].
    pub async fn client_projects(&self) -> Result<Vec<ClientProject>, ClientError> {
        let api = Arc::clone(&self.api);
        self.authorized(|token| {
            let api = Arc::clone(&api);
            async move { api.client_projects(&token).await }
        })
        .await
    }

    /// Fetch a project's parcels and assemble its map.
    ///
    /// # Errors
    ///
    /// See [`FieldClient::authorized`]; additionally returns
    /// [`ClientError::MapScene`] when the scene cannot be assembled under
    /// `policy`.
    pub async fn map_scene(
        &self,
        project_id: i64,
        policy: PolygonFailurePolicy,
    ) -> Result<MapScene, ClientError> {
        let api = Arc::clone(&self.api);
        let map = self
            .authorized(|token| {
                let api = Arc::clone(&api);
                async move { api.parcel_map(&token, project_id).await }
            })
            .await?;
        let scene = MapScene::assemble(&map.parcels, &map.nodes, map.city_center, policy)?;
        debug!(
            project_id,
            polygons = scene.polygons.len(),
            skipped = scene.skipped.len(),
            markers = scene.markers.len(),
            "map scene assembled"
        );
        Ok(scene)
    }

    /// Access token for the next call, or `None` when the session is expired
    /// and must be renewed first.
    fn usable_access(&self) -> Result<Option<Zeroizing<String>>, ClientError> {
        let session = self.session();
        match session.state() {
            SessionState::Anonymous => Err(ClientError::NotAuthenticated),
            SessionState::Refreshing => Err(ClientError::RefreshInProgress),
            SessionState::Expired => Ok(None),
            SessionState::Authenticated => Ok(session
                .access_token()
                .map(|token| Zeroizing::new(token.to_owned()))),
        }
    }

    fn expire(&self) {
        if let Err(error) = self.session().expire() {
            debug!(%error, "session changed while the call was in flight");
        }
    }

    async fn refresh(&self) -> Result<Zeroizing<String>, ClientError> {
        let refresh_token = {
            let mut session = self.session();
            match session.begin_refresh() {
                Ok(token) => token,
                Err(SessionTransitionError::MissingRefreshToken) => {
                    return Err(ClientError::SessionExpired);
                }
                Err(SessionTransitionError::InvalidTransition {
                    state: SessionState::Refreshing,
                    ..
                }) => return Err(ClientError::RefreshInProgress),
                Err(SessionTransitionError::InvalidTransition {
                    state: SessionState::Anonymous,
                    ..
                }) => return Err(ClientError::NotAuthenticated),
                Err(other) => return Err(other.into()),
            }
        };

        match self.api.refresh(&refresh_token).await {
            Ok(access) => {
                let tokens = self.session().complete_refresh(access)?.clone();
                self.tokens.store(&tokens)?;
                info!("session refreshed");
                Ok(Zeroizing::new(tokens.access().to_owned()))
            }
            Err(error) => {
                self.session().fail_refresh()?;
                match error {
                    FieldApiError::Unauthorized { .. } | FieldApiError::Rejected { .. } => {
                        warn!(%error, "refresh token rejected");
                        Err(ClientError::SessionExpired)
                    }
                    other => Err(other.into()),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "field_client_tests.rs"]
mod tests;
