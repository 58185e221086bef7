//! Request and outcome transforms applied around every dispatch.
//!
//! `ApiClient` runs each request through [`CredentialAttacher`] before it is
//! sent and each outcome through [`RejectionHandler`] after it returns.

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Request;
use tracing::{debug, info, warn};

use crate::auth::{SessionRecord, SessionSource, SessionTeardown};

use super::ApiError;

/// Build the `Authorization` value for a session, if it has a usable credential
pub fn bearer_header(session: Option<&SessionRecord>) -> Option<HeaderValue> {
    let record = session.filter(|r| r.is_valid())?;
    match HeaderValue::from_str(&format!("Bearer {}", record.credential)) {
        Ok(mut value) => {
            value.set_sensitive(true);
            Some(value)
        }
        Err(_) => {
            warn!("Session credential is not a valid header value, sending request without it");
            None
        }
    }
}

/// Add the bearer header for `session` to `request`. Requests without a
/// usable session are returned untouched.
pub fn attach_credential(mut request: Request, session: Option<&SessionRecord>) -> Request {
    if let Some(value) = bearer_header(session) {
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    request
}

/// Attaches the current session's credential to outgoing requests.
#[derive(Clone)]
pub struct CredentialAttacher {
    session: Arc<dyn SessionSource>,
}

impl CredentialAttacher {
    pub fn new(session: Arc<dyn SessionSource>) -> Self {
        Self { session }
    }

    /// Reads the session at call time; the request keeps whatever it got
    pub fn attach(&self, request: Request) -> Request {
        let current = self.session.current();
        debug!(
            url = %request.url(),
            authenticated = current.as_ref().map(|r| r.is_valid()).unwrap_or(false),
            "Preparing request"
        );
        attach_credential(request, current.as_ref())
    }
}

/// Tears the session down when the server rejects its credential.
#[derive(Clone)]
pub struct RejectionHandler {
    session: Arc<dyn SessionTeardown>,
}

impl RejectionHandler {
    pub fn new(session: Arc<dyn SessionTeardown>) -> Self {
        Self { session }
    }

    /// Pass `outcome` through. A 401 clears the session first; the error
    /// itself always reaches the caller.
    pub fn handle<T>(&self, outcome: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(ref e) = outcome {
            if e.is_authorization_rejection() {
                info!("Credential rejected by server, clearing session");
                self.session.clear();
            }
        }
        outcome
    }
}
