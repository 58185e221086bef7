//! Application facade.
//!
//! `App` wires one `SessionStore` into the API client, the navigation gate
//! and the router, and implements the login/logout flows on top of them.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::auth::{SessionSource, SessionStorage, SessionStore};
use crate::config::Config;
use crate::models::RegisterRequest;
use crate::navigation::{Landing, LoginRedirect, NavigationError, PendingIntent, Router, LOGIN_PATH};

pub struct App {
    pub config: Config,
    store: Arc<SessionStore>,
    api: ApiClient,
    router: Router,
    persist_config: bool,
}

impl App {
    /// Build the app with the storage backend named in `config`. Config
    /// changes (last username) are written back to disk.
    pub fn new(config: Config) -> Result<Self> {
        let storage = config.session_storage()?;
        let mut app = Self::with_storage(config, storage)?;
        app.persist_config = true;
        Ok(app)
    }

    /// Build the app over an explicit storage backend. Config changes stay
    /// in memory.
    pub fn with_storage(config: Config, storage: Box<dyn SessionStorage>) -> Result<Self> {
        let store = Arc::new(SessionStore::open(storage));
        let api = ApiClient::new(&config, store.clone())?;
        let router = Router::new(store.clone());

        Ok(Self {
            config,
            store,
            api,
            router,
            persist_config: false,
        })
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    /// Log in and return the path to continue to
    pub async fn login(&mut self, username: &str, password: &str, intent: PendingIntent) -> Result<String> {
        if username.is_empty() || password.is_empty() {
            return Err(anyhow::anyhow!("Username and password required"));
        }

        let record = self.api.authenticate(username, password).await?;
        self.store.establish(record);
        self.remember_user(username);

        info!(username, "Login successful");
        Ok(intent.consume())
    }

    /// Create an account, which also logs the new user in
    pub async fn register(
        &mut self,
        request: &RegisterRequest,
        intent: PendingIntent,
    ) -> Result<String> {
        if request.username.is_empty() || request.password.is_empty() {
            return Err(anyhow::anyhow!("Username and password required"));
        }

        let record = self.api.register(request).await?;
        self.store.establish(record);
        self.remember_user(&request.username);

        info!(username = %request.username, "Registration successful");
        Ok(intent.consume())
    }

    /// End the session and send the user to the login page
    pub fn logout(&self) -> LoginRedirect {
        self.store.clear();
        LoginRedirect {
            target: LOGIN_PATH.to_string(),
            intent: PendingIntent::none(),
        }
    }

    pub fn navigate(&self, url: &str) -> Result<Landing, NavigationError> {
        self.router.navigate(url)
    }

    fn remember_user(&mut self, username: &str) {
        self.config.last_username = Some(username.to_string());
        if self.persist_config {
            if let Err(e) = self.config.save() {
                warn!(error = %e, "Failed to save config");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryStorage, SessionRecord};
    use crate::navigation::View;

    fn app() -> App {
        App::with_storage(Config::default(), Box::new(MemoryStorage::new())).expect("app")
    }

    #[tokio::test]
    async fn test_login_requires_both_fields() {
        let mut app = app();
        let err = app
            .login("", "secret", PendingIntent::none())
            .await
            .expect_err("should fail");
        assert!(err.to_string().contains("required"));

        let err = app
            .login("alice", "", PendingIntent::none())
            .await
            .expect_err("should fail");
        assert!(err.to_string().contains("required"));
        assert!(!app.is_authenticated());
    }

    #[test]
    fn test_logout_clears_and_redirects() {
        let app = app();
        app.store().establish(SessionRecord::new("abc", "alice"));
        assert!(app.is_authenticated());

        let redirect = app.logout();
        assert_eq!(redirect.url(), "/login");
        assert!(!app.is_authenticated());
        assert_eq!(app.navigate("/dashboard").expect("navigate").url, "/login?returnUrl=%2Fdashboard");
    }

    #[test]
    fn test_navigate_uses_shared_store() {
        let app = app();
        app.store().establish(SessionRecord::new("abc", "alice"));
        assert_eq!(app.navigate("/").expect("navigate").view, View::Dashboard);
    }
}
