//! configdesk core - session handling for the config manager client.
//!
//! One `SessionStore` owns the authenticated session. Everything else reads
//! it through narrow capabilities:
//! - [`api`]: every request gets the bearer credential attached, and a 401
//!   from any endpoint tears the session down
//! - [`navigation`]: protected views are gated on the session, denied
//!   attempts redirect to `/login` with the requested path preserved
//! - [`app`]: the login/logout flows tying the pieces together

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod models;
pub mod navigation;

pub use api::{ApiClient, ApiError};
pub use app::App;
pub use auth::{SessionRecord, SessionStore};
pub use config::Config;
