//! Behaviour tests for the client session lifecycle.
//!
//! A scripted in-process API stands in for the server so the scenarios can
//! rotate tokens and break endpoints without a network.

use std::cell::RefCell;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use fieldwatch::domain::ports::{FieldApi, FieldApiError, LoginGrant, TokenStore};
use fieldwatch::domain::{
    ClientError, ClientProject, Dashboard, FieldClient, LoginCredentials, ParcelMap, Project,
    ProjectOverview, SessionState, SessionTokens,
};
use fieldwatch::outbound::token_store::MemoryTokenStore;
use mockable::DefaultClock;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tokio::runtime::Runtime;

const PASSWORD: &str = "s3cret";
const REFRESH_TOKEN: &str = "refresh-1";

struct ScriptState {
    accepted_access: String,
    refresh_accepted: bool,
    logout_reachable: bool,
}

struct ScriptedFieldApi {
    state: Mutex<ScriptState>,
}

impl ScriptedFieldApi {
    fn new() -> Self {
        Self {
            state: Mutex::new(ScriptState {
                accepted_access: "access-1".to_owned(),
                refresh_accepted: true,
                logout_reachable: true,
            }),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().expect("script state lock")
    }

    fn check_access(&self, access_token: &str) -> Result<(), FieldApiError> {
        if self.script().accepted_access == access_token {
            Ok(())
        } else {
            Err(FieldApiError::unauthorized("Given token not valid for any token type"))
        }
    }
}

#[async_trait]
impl FieldApi for ScriptedFieldApi {
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginGrant, FieldApiError> {
        if credentials.password() != PASSWORD {
            return Err(FieldApiError::unauthorized(
                "No active account found with the given credentials",
            ));
        }
        Ok(LoginGrant {
            tokens: SessionTokens::new(
                self.script().accepted_access.clone(),
                Some(REFRESH_TOKEN.to_owned()),
            ),
            display_name: Some("Ranger Rick".to_owned()),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, FieldApiError> {
        let (accepted, access) = {
            let script = self.script();
            (script.refresh_accepted, script.accepted_access.clone())
        };
        if accepted && refresh_token == REFRESH_TOKEN {
            Ok(access)
        } else {
            Err(FieldApiError::unauthorized("Token is blacklisted"))
        }
    }

    async fn logout(&self, _tokens: &SessionTokens) -> Result<(), FieldApiError> {
        if self.script().logout_reachable {
            Ok(())
        } else {
            Err(FieldApiError::transport("connection refused"))
        }
    }

    async fn dashboard(&self, access_token: &str) -> Result<Dashboard, FieldApiError> {
        self.check_access(access_token)?;
        Ok(Dashboard {
            projects: vec![Project {
                id: 7,
                name: "North ridge".to_owned(),
                description: "Olive groves".to_owned(),
                starts_on: NaiveDate::from_ymd_opt(2024, 1, 1),
                ends_on: None,
                attachment: None,
            }],
            nodes: Vec::new(),
        })
    }

    async fn client_projects(
        &self,
        access_token: &str,
    ) -> Result<Vec<ClientProject>, FieldApiError> {
        self.check_access(access_token)?;
        Ok(Vec::new())
    }

    async fn parcel_map(
        &self,
        access_token: &str,
        _project_id: i64,
    ) -> Result<ParcelMap, FieldApiError> {
        self.check_access(access_token)?;
        Ok(ParcelMap::default())
    }
}

struct SessionWorld {
    runtime: Runtime,
    api: Arc<ScriptedFieldApi>,
    store: Arc<MemoryTokenStore>,
    client: FieldClient<ScriptedFieldApi, MemoryTokenStore>,
    login: RefCell<Option<Result<String, ClientError>>>,
    dashboard: RefCell<Option<Result<Vec<ProjectOverview>, ClientError>>>,
}

impl SessionWorld {
    fn new() -> Self {
        let api = Arc::new(ScriptedFieldApi::new());
        let store = Arc::new(MemoryTokenStore::new());
        let client = FieldClient::new(
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::new(DefaultClock),
        );
        Self {
            runtime: Runtime::new().expect("create runtime"),
            api,
            store,
            client,
            login: RefCell::new(None),
            dashboard: RefCell::new(None),
        }
    }

    fn log_in(&self, username: &str, password: &str) {
        let credentials =
            LoginCredentials::try_from_parts(username, password).expect("valid credentials");
        let result = self.runtime.block_on(self.client.login(&credentials));
        *self.login.borrow_mut() = Some(result);
    }

    fn dashboard_error(&self) -> ClientError {
        match self.dashboard.borrow().as_ref().expect("dashboard result") {
            Ok(_) => panic!("expected the dashboard request to fail"),
            Err(error) => error.clone(),
        }
    }
}

#[fixture]
fn world() -> SessionWorld {
    SessionWorld::new()
}

#[given("a reachable field API")]
fn a_reachable_field_api(world: &SessionWorld) {
    assert_eq!(world.client.state(), SessionState::Anonymous);
}

#[given("the user is logged in")]
fn the_user_is_logged_in(world: &SessionWorld) {
    world.log_in("ranger", PASSWORD);
    assert_eq!(world.client.state(), SessionState::Authenticated);
}

#[given("the server has rotated the access token to \"{access}\"")]
fn the_server_has_rotated_the_access_token(world: &SessionWorld, access: String) {
    world.api.script().accepted_access = access;
}

#[given("the server rejects refresh tokens")]
fn the_server_rejects_refresh_tokens(world: &SessionWorld) {
    world.api.script().refresh_accepted = false;
}

#[given("the logout endpoint is unreachable")]
fn the_logout_endpoint_is_unreachable(world: &SessionWorld) {
    world.api.script().logout_reachable = false;
}

#[when("the user logs in as \"{username}\" with password \"{password}\"")]
fn the_user_logs_in(world: &SessionWorld, username: String, password: String) {
    world.log_in(&username, &password);
}

#[when("the dashboard is requested")]
fn the_dashboard_is_requested(world: &SessionWorld) {
    let result = world.runtime.block_on(world.client.dashboard());
    *world.dashboard.borrow_mut() = Some(result);
}

#[when("the user logs out")]
fn the_user_logs_out(world: &SessionWorld) {
    world
        .runtime
        .block_on(world.client.logout())
        .expect("logout succeeds locally");
}

#[then("the session is \"{state}\"")]
fn the_session_is(world: &SessionWorld, state: String) {
    let expected: SessionState = state.parse().expect("known session state");
    assert_eq!(world.client.state(), expected);
}

#[then("the display name is \"{name}\"")]
fn the_display_name_is(world: &SessionWorld, name: String) {
    let login = world.login.borrow();
    let display_name = login
        .as_ref()
        .expect("login result")
        .as_ref()
        .expect("expected login to succeed");
    assert_eq!(display_name, &name);
}

#[then("the login is rejected")]
fn the_login_is_rejected(world: &SessionWorld) {
    let login = world.login.borrow();
    let error = match login.as_ref().expect("login result") {
        Ok(_) => panic!("expected login to fail"),
        Err(error) => error,
    };
    assert!(matches!(
        error,
        ClientError::Api(FieldApiError::Unauthorized { .. })
    ));
}

#[then("the token store holds access token \"{access}\"")]
fn the_token_store_holds(world: &SessionWorld, access: String) {
    let stored = world
        .store
        .load()
        .expect("store readable")
        .expect("tokens stored");
    assert_eq!(stored.access(), access);
    assert_eq!(stored.refresh(), Some(REFRESH_TOKEN));
}

#[then("the token store is empty")]
fn the_token_store_is_empty(world: &SessionWorld) {
    assert_eq!(world.store.load().expect("store readable"), None);
}

#[then("the dashboard lists {count} projects")]
fn the_dashboard_lists_projects(world: &SessionWorld, count: usize) {
    let dashboard = world.dashboard.borrow();
    let overview = dashboard
        .as_ref()
        .expect("dashboard result")
        .as_ref()
        .expect("expected the dashboard request to succeed");
    assert_eq!(overview.len(), count);
}

#[then("the request fails because the session expired")]
fn the_request_fails_session_expired(world: &SessionWorld) {
    assert_eq!(world.dashboard_error(), ClientError::SessionExpired);
}

#[then("the request fails because no session is held")]
fn the_request_fails_without_session(world: &SessionWorld) {
    assert_eq!(world.dashboard_error(), ClientError::NotAuthenticated);
}

#[scenario(path = "tests/features/session_lifecycle.feature")]
fn session_lifecycle_scenarios(world: SessionWorld) {
    drop(world);
}
