//! Reqwest-backed field API adapter.
//!
//! This adapter owns transport details only: URL building, bearer headers,
//! timeout and HTTP error mapping, and JSON decoding into domain records.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use super::dto::{
    ClientProjectDto, DashboardDto, ErrorBodyDto, LoginRequestDto, LoginResponseDto,
    ParcelMapDto, RefreshRequestDto, RefreshResponseDto,
};
use crate::domain::ports::{FieldApi, FieldApiError, LoginGrant};
use crate::domain::{ClientProject, Dashboard, LoginCredentials, ParcelMap, SessionTokens};

const REQUEST_ID_HEADER: &str = "x-request-id";

const LOGIN_PATH: &str = "authmobile/login/";
const REFRESH_PATH: &str = "authmobile/refresh/";
const LOGOUT_PATH: &str = "authmobile/logout/";
const DASHBOARD_PATH: &str = "projC/";
const CLIENT_PROJECTS_PATH: &str = "client_projects/";
const PARCELS_PATH: &str = "fetch_parcelles/";

/// Field API adapter issuing JSON requests against one base URL.
pub struct HttpFieldApi {
    client: Client,
    base: Url,
}

impl HttpFieldApi {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    ///
    /// `base` should end with `/` so endpoint paths join beneath it.
    /// ```rust,ignore
    /// let api = HttpFieldApi::new(Url::parse("http://192.0.2.10:8000/")?, timeout)?;
    /// ```
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, FieldApiError> {
        self.base.join(path).map_err(|error| {
            FieldApiError::invalid_request(format!("cannot build URL for {path}: {error}"))
        })
    }

    async fn send<T>(&self, path: &str, request: RequestBuilder) -> Result<T, FieldApiError>
    where
        T: DeserializeOwned,
    {
        let request_id = Uuid::new_v4();
        debug!(%request_id, path, "sending field api request");
        let response = request
            .header(ACCEPT, "application/json")
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            warn!(%request_id, path, status = status.as_u16(), "field api request failed");
            return Err(map_status_error(status, body.as_ref()));
        }

        serde_json::from_slice(body.as_ref()).map_err(|error| {
            FieldApiError::decode(format!("invalid JSON payload from {path}: {error}"))
        })
    }

    async fn get<T>(&self, path: &str, access_token: &str) -> Result<T, FieldApiError>
    where
        T: DeserializeOwned,
    {
        let request = self
            .client
            .get(self.endpoint(path)?)
            .header(AUTHORIZATION, bearer(access_token)?);
        self.send(path, request).await
    }
}

#[async_trait]
impl FieldApi for HttpFieldApi {
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginGrant, FieldApiError> {
        let body = LoginRequestDto {
            username: credentials.username(),
            password: credentials.password(),
        };
        let request = self.client.post(self.endpoint(LOGIN_PATH)?).json(&body);
        let decoded: LoginResponseDto = self.send(LOGIN_PATH, request).await?;
        Ok(LoginGrant {
            tokens: SessionTokens::new(decoded.access, decoded.refresh),
            display_name: decoded.pseudo,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, FieldApiError> {
        let body = RefreshRequestDto {
            refresh: refresh_token,
        };
        let request = self.client.post(self.endpoint(REFRESH_PATH)?).json(&body);
        let decoded: RefreshResponseDto = self.send(REFRESH_PATH, request).await?;
        Ok(decoded.access)
    }

    async fn logout(&self, tokens: &SessionTokens) -> Result<(), FieldApiError> {
        let body = RefreshRequestDto {
            refresh: tokens.refresh().unwrap_or_default(),
        };
        let mut request = self.client.post(self.endpoint(LOGOUT_PATH)?).json(&body);
        if !tokens.access().is_empty() {
            request = request.header(AUTHORIZATION, bearer(tokens.access())?);
        }
        let _: serde_json::Value = self.send(LOGOUT_PATH, request).await.or_else(|error| {
            // Some deployments answer logout with an empty 200/205 body.
            match error {
                FieldApiError::Decode { .. } => Ok(serde_json::Value::Null),
                other => Err(other),
            }
        })?;
        Ok(())
    }

    async fn dashboard(&self, access_token: &str) -> Result<Dashboard, FieldApiError> {
        let decoded: DashboardDto = self.get(DASHBOARD_PATH, access_token).await?;
        decoded.into_domain().map_err(FieldApiError::decode)
    }

    async fn client_projects(
        &self,
        access_token: &str,
    ) -> Result<Vec<ClientProject>, FieldApiError> {
        let decoded: Vec<ClientProjectDto> =
            self.get(CLIENT_PROJECTS_PATH, access_token).await?;
        Ok(decoded
            .into_iter()
            .map(ClientProjectDto::into_domain)
            .collect())
    }

    async fn parcel_map(
        &self,
        access_token: &str,
        project_id: i64,
    ) -> Result<ParcelMap, FieldApiError> {
        let mut url = self.endpoint(PARCELS_PATH)?;
        url.query_pairs_mut()
            .append_pair("polygon_id", &project_id.to_string());
        let request = self
            .client
            .get(url)
            .header(AUTHORIZATION, bearer(access_token)?);
        let decoded: ParcelMapDto = self.send(PARCELS_PATH, request).await?;
        Ok(decoded.into_domain())
    }
}

fn bearer(access_token: &str) -> Result<HeaderValue, FieldApiError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {access_token}")).map_err(|_| {
        FieldApiError::invalid_request("access token contains invalid header characters")
    })?;
    value.set_sensitive(true);
    Ok(value)
}

fn map_transport_error(error: reqwest::Error) -> FieldApiError {
    if error.is_timeout() {
        FieldApiError::timeout(error.to_string())
    } else {
        FieldApiError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> FieldApiError {
    let detail = serde_json::from_slice::<ErrorBodyDto>(body)
        .ok()
        .and_then(|decoded| decoded.detail)
        .filter(|detail| !detail.trim().is_empty());
    let message = match detail {
        Some(detail) => detail,
        None => {
            let preview = body_preview(body);
            if preview.is_empty() {
                format!("status {}", status.as_u16())
            } else {
                format!("status {}: {}", status.as_u16(), preview)
            }
        }
    };

    match status {
        StatusCode::UNAUTHORIZED => FieldApiError::unauthorized(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            FieldApiError::timeout(message)
        }
        _ if status.is_client_error() => FieldApiError::rejected(status.as_u16(), message),
        _ => FieldApiError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
