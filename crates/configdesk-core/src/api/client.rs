//! API client for the config manager services.
//!
//! This module provides the `ApiClient` struct. Every request it sends goes
//! through the same pipeline: credential attachment, dispatch, status check,
//! rejection handling. There is no per-call opt-out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{AbortRegistration, Abortable};
use reqwest::{Client, Method, Request, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::{SessionRecord, SessionStore};
use crate::config::Config;
use crate::models::{AuthResponse, Configuration, LoginRequest, RegisterRequest};

use super::interceptor::{CredentialAttacher, RejectionHandler};
use super::ApiError;

/// Path of the login endpoint on the user service
const LOGIN_PATH: &str = "/api/auth/login";

/// Path of the registration endpoint on the user service
const REGISTER_PATH: &str = "/api/auth/register";

/// Base path of the configuration resource on the config service
const CONFIGS_PATH: &str = "/api/configs";

/// Run `future` until it finishes or `registration`'s handle is aborted.
///
/// An abort surfaces as [`ApiError::Cancelled`]. If the request was dropped
/// before its response arrived, the rejection handler never saw it.
pub async fn cancellable<T, F>(registration: AbortRegistration, future: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match Abortable::new(future, registration).await {
        Ok(outcome) => outcome,
        Err(_aborted) => {
            debug!("Request cancelled by caller");
            Err(ApiError::Cancelled)
        }
    }
}

/// API client for the user and config services.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    user_api_url: String,
    config_api_url: String,
    attacher: CredentialAttacher,
    rejection: RejectionHandler,
}

impl ApiClient {
    /// Create a client whose pipeline reads and tears down `store`
    pub fn new(config: &Config, store: Arc<SessionStore>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self::with_interceptors(
            client,
            &config.user_api_url,
            &config.config_api_url,
            CredentialAttacher::new(store.clone()),
            RejectionHandler::new(store),
        ))
    }

    /// Assemble a client from explicit parts
    pub fn with_interceptors(
        client: Client,
        user_api_url: &str,
        config_api_url: &str,
        attacher: CredentialAttacher,
        rejection: RejectionHandler,
    ) -> Self {
        Self {
            client,
            user_api_url: user_api_url.trim_end_matches('/').to_string(),
            config_api_url: config_api_url.trim_end_matches('/').to_string(),
            attacher,
            rejection,
        }
    }

    /// Start building a request. Send it with [`ApiClient::execute`].
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Attach credentials, dispatch, and run the outcome through the
    /// rejection handler
    pub async fn execute(&self, request: Request) -> Result<Response, ApiError> {
        let request = self.attacher.attach(request);
        let outcome = self.dispatch(request).await;
        self.rejection.handle(outcome)
    }

    async fn dispatch(&self, request: Request) -> Result<Response, ApiError> {
        let method = request.method().clone();
        let url = request.url().clone();

        let response = self.client.execute(request).await?;
        debug!(%method, %url, status = %response.status(), "Response received");
        Self::check_response(response).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let request = builder.build()?;
        let url = request.url().clone();
        let response = self.execute(request).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e)))
    }

    fn configs_url(&self) -> String {
        format!("{}{}", self.config_api_url, CONFIGS_PATH)
    }

    // ===== Authentication =====

    /// Exchange username and password for a session record
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<SessionRecord, ApiError> {
        let url = format!("{}{}", self.user_api_url, LOGIN_PATH);
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self
            .send_json(self.request(Method::POST, &url).json(&body))
            .await?;
        Ok(auth.into_session())
    }

    /// Create an account; the server logs the new user in right away
    pub async fn register(&self, request: &RegisterRequest) -> Result<SessionRecord, ApiError> {
        let url = format!("{}{}", self.user_api_url, REGISTER_PATH);
        let auth: AuthResponse = self
            .send_json(self.request(Method::POST, &url).json(request))
            .await?;
        Ok(auth.into_session())
    }

    // ===== Configurations =====

    pub async fn list_configurations(&self) -> Result<Vec<Configuration>, ApiError> {
        self.send_json(self.request(Method::GET, &self.configs_url()))
            .await
    }

    pub async fn get_configuration(&self, id: i64) -> Result<Configuration, ApiError> {
        let url = format!("{}/{}", self.configs_url(), id);
        self.send_json(self.request(Method::GET, &url)).await
    }

    pub async fn get_configuration_by_key(&self, key: &str) -> Result<Configuration, ApiError> {
        let url = format!("{}/key/{}", self.configs_url(), urlencoding::encode(key));
        self.send_json(self.request(Method::GET, &url)).await
    }

    pub async fn create_configuration(&self, config: &Configuration) -> Result<Configuration, ApiError> {
        self.send_json(self.request(Method::POST, &self.configs_url()).json(config))
            .await
    }

    pub async fn update_configuration(&self, id: i64, config: &Configuration) -> Result<Configuration, ApiError> {
        let url = format!("{}/{}", self.configs_url(), id);
        self.send_json(self.request(Method::PUT, &url).json(config))
            .await
    }

    pub async fn delete_configuration(&self, id: i64) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.configs_url(), id);
        let request = self.request(Method::DELETE, &url).build()?;
        self.execute(request).await?;
        Ok(())
    }
}
