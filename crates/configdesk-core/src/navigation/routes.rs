use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::auth::SessionSource;

use super::gate::{GateDecision, NavigationGate, PendingIntent, DEFAULT_DESTINATION, LOGIN_PATH};

/// Redirect chains longer than this are treated as a routing loop
const MAX_REDIRECTS: usize = 8;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Too many redirects navigating to {0}")]
    TooManyRedirects(String),
}

/// Views the application can render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Login { intent: PendingIntent },
    Dashboard,
}

/// Outcome of resolving a single URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render(View),
    Redirect(String),
}

/// Where a navigation finally landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landing {
    pub url: String,
    pub view: View,
}

fn split_url(url: &str) -> (&str, &str) {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let path = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    (path, query)
}

/// The application's route table.
///
/// - `/login` is public, but sends authenticated users to the dashboard
/// - `/dashboard` is protected by the [`NavigationGate`]
/// - the root and any unknown path redirect to the dashboard
#[derive(Clone)]
pub struct Router {
    gate: NavigationGate,
    session: Arc<dyn SessionSource>,
}

impl Router {
    pub fn new(session: Arc<dyn SessionSource>) -> Self {
        Self {
            gate: NavigationGate::new(session.clone()),
            session,
        }
    }

    /// Resolve one step of navigation for `url`
    pub fn resolve(&self, url: &str) -> Navigation {
        let (path, query) = split_url(url);

        match path {
            LOGIN_PATH => {
                if self.session.is_authenticated() {
                    Navigation::Redirect(DEFAULT_DESTINATION.to_string())
                } else {
                    Navigation::Render(View::Login {
                        intent: PendingIntent::from_query(query),
                    })
                }
            }
            DEFAULT_DESTINATION => match self.gate.check(url) {
                GateDecision::Allowed => Navigation::Render(View::Dashboard),
                GateDecision::Denied(redirect) => Navigation::Redirect(redirect.url()),
            },
            _ => Navigation::Redirect(DEFAULT_DESTINATION.to_string()),
        }
    }

    /// Follow redirects from `url` until a view renders
    pub fn navigate(&self, url: &str) -> Result<Landing, NavigationError> {
        let mut current = url.to_string();

        for _ in 0..=MAX_REDIRECTS {
            match self.resolve(&current) {
                Navigation::Render(view) => {
                    debug!(url = %current, ?view, "Navigation landed");
                    return Ok(Landing { url: current, view });
                }
                Navigation::Redirect(next) => {
                    debug!(from = %current, to = %next, "Redirecting");
                    current = next;
                }
            }
        }

        Err(NavigationError::TooManyRedirects(url.to_string()))
    }
}
