//! Session credential state machine.
//!
//! One [`Session`] is owned by the client for the whole process lifetime and
//! passed explicitly to whatever needs a token. Transitions:
//!
//! - `login` moves any state to `Authenticated`;
//! - `begin_refresh` moves `Authenticated` or `Expired` to `Refreshing` and
//!   hands out the refresh token;
//! - `complete_refresh` returns to `Authenticated` with the new access token;
//! - `fail_refresh` and `expire` land in `Expired`;
//! - `logout` returns to `Anonymous` from anywhere.

use std::fmt;

use zeroize::Zeroizing;

/// Access token plus the optional token used to renew it.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    access: Zeroizing<String>,
    refresh: Option<Zeroizing<String>>,
}

impl SessionTokens {
    /// Bundle an access token with an optional refresh token.
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: Zeroizing::new(access.into()),
            refresh: refresh.map(Zeroizing::new),
        }
    }

    /// Bearer token for API calls.
    pub fn access(&self) -> &str {
        self.access.as_str()
    }

    /// Token accepted by the refresh endpoint, if one was issued.
    pub fn refresh(&self) -> Option<&str> {
        self.refresh.as_deref().map(String::as_str)
    }

    fn with_access(self, access: Zeroizing<String>) -> Self {
        Self {
            access,
            refresh: self.refresh,
        }
    }
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access", &"<redacted>")
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No credentials held.
    Anonymous,
    /// A usable access token is held.
    Authenticated,
    /// A refresh request is in flight.
    Refreshing,
    /// The access token was rejected and has not been renewed.
    Expired,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Anonymous => "anonymous",
            Self::Authenticated => "authenticated",
            Self::Refreshing => "refreshing",
            Self::Expired => "expired",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for SessionState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "anonymous" => Ok(Self::Anonymous),
            "authenticated" => Ok(Self::Authenticated),
            "refreshing" => Ok(Self::Refreshing),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown session state: {other}")),
        }
    }
}

/// Rejected session transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionTransitionError {
    /// The operation is not valid from the current state.
    #[error("cannot {operation} while the session is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: SessionState,
    },
    /// A refresh was requested but no refresh token is held.
    #[error("session holds no refresh token")]
    MissingRefreshToken,
}

#[derive(Default)]
enum Phase {
    #[default]
    Anonymous,
    Authenticated(SessionTokens),
    Refreshing(SessionTokens),
    Expired(Option<Zeroizing<String>>),
}

/// Session credential holder enforcing the login/refresh/logout lifecycle.
///
/// # Examples
/// ```
/// use fieldwatch::domain::{Session, SessionState, SessionTokens};
///
/// let mut session = Session::new();
/// session.login(SessionTokens::new("access-1", Some("refresh-1".to_owned())));
///
/// let refresh = session.begin_refresh()?;
/// assert_eq!(refresh.as_str(), "refresh-1");
/// session.complete_refresh("access-2")?;
/// assert_eq!(session.access_token(), Some("access-2"));
///
/// session.logout();
/// assert_eq!(session.state(), SessionState::Anonymous);
/// # Ok::<(), fieldwatch::domain::SessionTransitionError>(())
/// ```
#[derive(Default)]
pub struct Session {
    phase: Phase,
}

impl Session {
    /// Start anonymous.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Anonymous => SessionState::Anonymous,
            Phase::Authenticated(_) => SessionState::Authenticated,
            Phase::Refreshing(_) => SessionState::Refreshing,
            Phase::Expired(_) => SessionState::Expired,
        }
    }

    /// Access token usable for API calls; only available while authenticated.
    pub fn access_token(&self) -> Option<&str> {
        match &self.phase {
            Phase::Authenticated(tokens) => Some(tokens.access()),
            _ => None,
        }
    }

    /// Tokens held while authenticated or refreshing.
    pub fn tokens(&self) -> Option<&SessionTokens> {
        match &self.phase {
            Phase::Authenticated(tokens) | Phase::Refreshing(tokens) => Some(tokens),
            _ => None,
        }
    }

    /// Install freshly issued tokens, replacing any previous credentials.
    pub fn login(&mut self, tokens: SessionTokens) {
        self.phase = Phase::Authenticated(tokens);
    }

    /// Enter `Refreshing` and return the refresh token to send.
    ///
    /// # Errors
    ///
    /// Fails from `Anonymous` or `Refreshing`, and when no refresh token is
    /// held. A failed attempt leaves the state unchanged.
    pub fn begin_refresh(&mut self) -> Result<Zeroizing<String>, SessionTransitionError> {
        let refresh = match &self.phase {
            Phase::Authenticated(tokens) => tokens.refresh.clone(),
            Phase::Expired(refresh) => refresh.clone(),
            Phase::Anonymous | Phase::Refreshing(_) => {
                return Err(self.invalid("begin refresh"));
            }
        };
        let refresh = refresh.ok_or(SessionTransitionError::MissingRefreshToken)?;

        let previous = std::mem::take(&mut self.phase);
        let tokens = match previous {
            Phase::Authenticated(tokens) => tokens,
            _ => SessionTokens {
                access: Zeroizing::new(String::new()),
                refresh: Some(refresh.clone()),
            },
        };
        self.phase = Phase::Refreshing(tokens);
        Ok(refresh)
    }

    /// Leave `Refreshing` with a renewed access token.
    ///
    /// # Errors
    ///
    /// Fails unless a refresh is in flight.
    pub fn complete_refresh(
        &mut self,
        access: impl Into<String>,
    ) -> Result<&SessionTokens, SessionTransitionError> {
        match std::mem::take(&mut self.phase) {
            Phase::Refreshing(tokens) => {
                let renewed = tokens.with_access(Zeroizing::new(access.into()));
                self.phase = Phase::Authenticated(renewed);
            }
            other => {
                self.phase = other;
                return Err(self.invalid("complete refresh"));
            }
        }
        self.tokens().ok_or_else(|| self.invalid("complete refresh"))
    }

    /// Leave `Refreshing` without a new token; the refresh token is kept.
    ///
    /// # Errors
    ///
    /// Fails unless a refresh is in flight.
    pub fn fail_refresh(&mut self) -> Result<(), SessionTransitionError> {
        match std::mem::take(&mut self.phase) {
            Phase::Refreshing(tokens) => {
                self.phase = Phase::Expired(tokens.refresh);
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.invalid("fail refresh"))
            }
        }
    }

    /// Mark the access token as rejected.
    ///
    /// # Errors
    ///
    /// Fails unless the session is authenticated.
    pub fn expire(&mut self) -> Result<(), SessionTransitionError> {
        match std::mem::take(&mut self.phase) {
            Phase::Authenticated(tokens) => {
                self.phase = Phase::Expired(tokens.refresh);
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.invalid("expire"))
            }
        }
    }

    /// Drop all credentials, returning the tokens that were held.
    pub fn logout(&mut self) -> Option<SessionTokens> {
        match std::mem::take(&mut self.phase) {
            Phase::Authenticated(tokens) | Phase::Refreshing(tokens) => Some(tokens),
            Phase::Expired(Some(refresh)) => Some(SessionTokens {
                access: Zeroizing::new(String::new()),
                refresh: Some(refresh),
            }),
            Phase::Expired(None) | Phase::Anonymous => None,
        }
    }

    fn invalid(&self, operation: &'static str) -> SessionTransitionError {
        SessionTransitionError::InvalidTransition {
            operation,
            state: self.state(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for session transitions.

    use super::*;
    use rstest::{fixture, rstest};

    fn tokens(access: &str, refresh: Option<&str>) -> SessionTokens {
        SessionTokens::new(access, refresh.map(str::to_owned))
    }

    #[fixture]
    fn authenticated() -> Session {
        let mut session = Session::new();
        session.login(tokens("access-1", Some("refresh-1")));
        session
    }

    #[test]
    fn starts_anonymous() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(session.access_token().is_none());
    }

    #[rstest]
    fn refresh_round_trip_keeps_refresh_token(mut authenticated: Session) {
        let refresh = authenticated.begin_refresh().expect("refresh should start");
        assert_eq!(refresh.as_str(), "refresh-1");
        assert_eq!(authenticated.state(), SessionState::Refreshing);
        assert!(authenticated.access_token().is_none());

        let renewed = authenticated
            .complete_refresh("access-2")
            .expect("refresh should complete");
        assert_eq!(renewed.access(), "access-2");
        assert_eq!(renewed.refresh(), Some("refresh-1"));
        assert_eq!(authenticated.state(), SessionState::Authenticated);
    }

    #[rstest]
    fn failed_refresh_expires_and_allows_retry(mut authenticated: Session) {
        authenticated.begin_refresh().expect("refresh should start");
        authenticated.fail_refresh().expect("refresh should fail cleanly");
        assert_eq!(authenticated.state(), SessionState::Expired);

        let refresh = authenticated
            .begin_refresh()
            .expect("expired session retains refresh token");
        assert_eq!(refresh.as_str(), "refresh-1");
        authenticated
            .complete_refresh("access-3")
            .expect("refresh should complete");
        assert_eq!(authenticated.access_token(), Some("access-3"));
    }

    #[test]
    fn refresh_requires_refresh_token() {
        let mut session = Session::new();
        session.login(tokens("access-1", None));
        assert_eq!(
            session.begin_refresh(),
            Err(SessionTransitionError::MissingRefreshToken)
        );
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[rstest]
    #[case::begin_from_anonymous("begin refresh")]
    #[case::complete_from_anonymous("complete refresh")]
    #[case::fail_from_anonymous("fail refresh")]
    #[case::expire_from_anonymous("expire")]
    fn anonymous_sessions_reject_transitions(#[case] operation: &str) {
        let mut session = Session::new();
        let error = match operation {
            "begin refresh" => session.begin_refresh().map(|_| ()),
            "complete refresh" => session.complete_refresh("x").map(|_| ()),
            "fail refresh" => session.fail_refresh(),
            "expire" => session.expire(),
            _ => panic!("unsupported operation: {operation}"),
        }
        .expect_err("anonymous session must reject transition");

        assert!(matches!(
            error,
            SessionTransitionError::InvalidTransition {
                state: SessionState::Anonymous,
                ..
            }
        ));
    }

    #[rstest]
    fn concurrent_refresh_is_rejected(mut authenticated: Session) {
        authenticated.begin_refresh().expect("first refresh starts");
        let error = authenticated
            .begin_refresh()
            .expect_err("second refresh must be rejected");
        assert!(matches!(
            error,
            SessionTransitionError::InvalidTransition {
                state: SessionState::Refreshing,
                ..
            }
        ));
    }

    #[rstest]
    fn logout_returns_held_tokens(mut authenticated: Session) {
        let previous = authenticated.logout().expect("tokens were held");
        assert_eq!(previous.access(), "access-1");
        assert_eq!(authenticated.state(), SessionState::Anonymous);
        assert!(authenticated.logout().is_none());
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let rendered = format!("{:?}", tokens("secret-access", Some("secret-refresh")));
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }
}
