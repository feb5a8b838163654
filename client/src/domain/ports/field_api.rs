//! Driven port for the remote field monitoring API.
//!
//! The domain owns the request and response shapes so the client service can
//! stay transport-agnostic; the reqwest adapter lives in
//! `outbound::http`.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::{ClientProject, Dashboard, LoginCredentials, ParcelMap, SessionTokens};

/// Tokens and profile data returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    /// Issued access/refresh tokens.
    pub tokens: SessionTokens,
    /// Display name chosen by the user, when the server sends one.
    pub display_name: Option<String>,
}

define_port_error! {
    /// Errors surfaced while calling the field API.
    pub enum FieldApiError {
        /// The server rejected the bearer token or the credentials.
        Unauthorized { message: String } =>
            "field api rejected authentication: {message}",
        /// The server rejected the request for another client-side reason.
        Rejected { status: u16, message: String } =>
            "field api rejected request with status {status}: {message}",
        /// The call exceeded its timeout.
        Timeout { message: String } =>
            "field api timeout: {message}",
        /// Network transport failed or the server errored.
        Transport { message: String } =>
            "field api transport failed: {message}",
        /// The response body did not match the expected shape.
        Decode { message: String } =>
            "field api response decode failed: {message}",
        /// The adapter could not build the request.
        InvalidRequest { message: String } =>
            "field api request invalid: {message}",
    }
}

impl FieldApiError {
    /// Whether the failure means the access token is no longer accepted.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Port for the remote field monitoring API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FieldApi: Send + Sync {
    /// Exchange credentials for session tokens.
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginGrant, FieldApiError>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<String, FieldApiError>;

    /// Revoke the session server-side.
    async fn logout(&self, tokens: &SessionTokens) -> Result<(), FieldApiError>;

    /// Projects and sensor nodes visible to the user.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use fieldwatch::domain::ports::{FieldApi, FixtureFieldApi};
    ///
    /// let api = FixtureFieldApi;
    /// let dashboard = api.dashboard("access-token").await?;
    /// assert!(dashboard.projects.is_empty());
    /// # Ok::<(), fieldwatch::domain::ports::FieldApiError>(())
    /// ```
    async fn dashboard(&self, access_token: &str) -> Result<Dashboard, FieldApiError>;

    /// Lightweight listing of the client's projects.
    async fn client_projects(&self, access_token: &str)
    -> Result<Vec<ClientProject>, FieldApiError>;

    /// Parcel polygons, nodes and city centre for one project.
    async fn parcel_map(
        &self,
        access_token: &str,
        project_id: i64,
    ) -> Result<ParcelMap, FieldApiError>;
}

/// Fixture implementation that accepts any credentials and returns empty
/// listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureFieldApi;

#[async_trait]
impl FieldApi for FixtureFieldApi {
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginGrant, FieldApiError> {
        Ok(LoginGrant {
            tokens: SessionTokens::new("fixture-access", Some("fixture-refresh".to_owned())),
            display_name: Some(credentials.username().to_owned()),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<String, FieldApiError> {
        Ok("fixture-access".to_owned())
    }

    async fn logout(&self, _tokens: &SessionTokens) -> Result<(), FieldApiError> {
        Ok(())
    }

    async fn dashboard(&self, _access_token: &str) -> Result<Dashboard, FieldApiError> {
        Ok(Dashboard::default())
    }

    async fn client_projects(
        &self,
        _access_token: &str,
    ) -> Result<Vec<ClientProject>, FieldApiError> {
        Ok(Vec::new())
    }

    async fn parcel_map(
        &self,
        _access_token: &str,
        _project_id: i64,
    ) -> Result<ParcelMap, FieldApiError> {
        Ok(ParcelMap::default())
    }
}
