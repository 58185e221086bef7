use std::fmt;

use serde::{Deserialize, Serialize};

use crate::auth::SessionRecord;

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

/// Body returned by `/api/auth/login` and `/api/auth/register`
#[derive(Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub username: String,
}

impl AuthResponse {
    pub fn into_session(self) -> SessionRecord {
        SessionRecord::new(self.token, self.username)
    }
}
