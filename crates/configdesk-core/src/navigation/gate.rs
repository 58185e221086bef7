use std::sync::Arc;

use tracing::debug;

use crate::auth::SessionSource;

/// Entry point for unauthenticated users
pub const LOGIN_PATH: &str = "/login";

/// Where a login lands when no intent was carried
pub const DEFAULT_DESTINATION: &str = "/dashboard";

/// Query parameter carrying the pending intent through the login flow
pub const RETURN_URL_PARAM: &str = "returnUrl";

/// Only in-app absolute paths may be replayed after login
fn is_in_app_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}

/// The protected location a user asked for before being sent to log in.
///
/// Consumed exactly once, by value, after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingIntent {
    path: Option<String>,
}

impl PendingIntent {
    /// Capture `path`; anything that is not an in-app path is dropped
    pub fn new(path: &str) -> Self {
        if is_in_app_path(path) {
            Self {
                path: Some(path.to_string()),
            }
        } else {
            debug!(path, "Ignoring navigation intent outside the app");
            Self::none()
        }
    }

    pub fn none() -> Self {
        Self { path: None }
    }

    /// Read the intent from a login URL's query string (without the `?`)
    pub fn from_query(query: &str) -> Self {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == RETURN_URL_PARAM)
            .and_then(|(_, value)| urlencoding::decode(value).ok())
            .map(|path| Self::new(&path))
            .unwrap_or_default()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Where to go now that the user is logged in
    pub fn consume(self) -> String {
        self.path
            .unwrap_or_else(|| DEFAULT_DESTINATION.to_string())
    }
}

/// Redirect issued for a denied navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub target: String,
    pub intent: PendingIntent,
}

impl LoginRedirect {
    /// The login URL with the intent encoded as `returnUrl`
    pub fn url(&self) -> String {
        match self.intent.path() {
            Some(path) => format!(
                "{}?{}={}",
                self.target,
                RETURN_URL_PARAM,
                urlencoding::encode(path)
            ),
            None => self.target.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Denied(LoginRedirect),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed)
    }
}

/// Decides whether a protected view may be entered.
///
/// The decision trusts the local session entirely: no network call, no
/// expiry check. Each attempt is checked once; a login that happens after
/// a denial does not retroactively allow it.
#[derive(Clone)]
pub struct NavigationGate {
    session: Arc<dyn SessionSource>,
}

impl NavigationGate {
    pub fn new(session: Arc<dyn SessionSource>) -> Self {
        Self { session }
    }

    pub fn check(&self, requested: &str) -> GateDecision {
        if self.session.is_authenticated() {
            debug!(requested, "Navigation allowed");
            return GateDecision::Allowed;
        }

        debug!(requested, "Navigation denied, redirecting to login");
        GateDecision::Denied(LoginRedirect {
            target: LOGIN_PATH.to_string(),
            intent: PendingIntent::new(requested),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryStorage, SessionRecord, SessionStore};

    fn gate() -> (Arc<SessionStore>, NavigationGate) {
        let store = Arc::new(SessionStore::open(Box::new(MemoryStorage::new())));
        let gate = NavigationGate::new(store.clone());
        (store, gate)
    }

    #[test]
    fn test_denied_without_session() {
        let (_store, gate) = gate();

        match gate.check("/dashboard") {
            GateDecision::Denied(redirect) => {
                assert_eq!(redirect.target, "/login");
                assert_eq!(redirect.intent.path(), Some("/dashboard"));
                assert_eq!(redirect.url(), "/login?returnUrl=%2Fdashboard");
            }
            GateDecision::Allowed => panic!("expected denial"),
        }
    }

    #[test]
    fn test_allowed_with_session() {
        let (store, gate) = gate();
        store.establish(SessionRecord::new("abc", "alice"));
        assert_eq!(gate.check("/dashboard"), GateDecision::Allowed);
    }

    #[test]
    fn test_empty_credential_is_denied() {
        let (store, gate) = gate();
        store.establish(SessionRecord::new("", "alice"));
        assert!(!gate.check("/dashboard").is_allowed());
    }

    #[test]
    fn test_decision_is_not_retroactive() {
        let (store, gate) = gate();
        let first = gate.check("/dashboard");
        store.establish(SessionRecord::new("abc", "alice"));

        assert!(!first.is_allowed());
        assert!(gate.check("/dashboard").is_allowed());
    }

    #[test]
    fn test_intent_round_trips_through_login_url() {
        let (_store, gate) = gate();
        let GateDecision::Denied(redirect) = gate.check("/dashboard?tab=configs") else {
            panic!("expected denial");
        };

        let url = redirect.url();
        let query = url.split_once('?').map(|(_, q)| q).expect("query");
        let intent = PendingIntent::from_query(query);
        assert_eq!(intent.consume(), "/dashboard?tab=configs");
    }

    #[test]
    fn test_missing_intent_defaults_to_dashboard() {
        assert_eq!(PendingIntent::from_query("").consume(), "/dashboard");
        assert_eq!(PendingIntent::from_query("foo=bar").consume(), "/dashboard");
        assert_eq!(PendingIntent::none().consume(), "/dashboard");
    }

    #[test]
    fn test_external_intents_are_dropped() {
        assert_eq!(PendingIntent::new("https://evil.example").path(), None);
        assert_eq!(PendingIntent::new("//evil.example").path(), None);
        assert_eq!(
            PendingIntent::from_query("returnUrl=https%3A%2F%2Fevil.example").consume(),
            "/dashboard"
        );
    }

    #[test]
    fn test_redirect_without_intent_is_plain_login() {
        let redirect = LoginRedirect {
            target: LOGIN_PATH.to_string(),
            intent: PendingIntent::none(),
        };
        assert_eq!(redirect.url(), "/login");
    }
}
