//! REST API client module for the config manager services.
//!
//! This module provides the `ApiClient` for the user service (login,
//! registration) and the config service (configuration CRUD), plus the two
//! transforms every request passes through:
//! - `CredentialAttacher` adds `Authorization: Bearer <token>` when a
//!   session exists
//! - `RejectionHandler` clears the session when the server answers 401

pub mod client;
pub mod error;
pub mod interceptor;

pub use client::{cancellable, ApiClient};
pub use error::ApiError;
pub use interceptor::{attach_credential, bearer_header, CredentialAttacher, RejectionHandler};
