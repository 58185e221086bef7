//! Data models for the config manager services.
//!
//! This module contains the wire types for:
//! - Authentication: login/register requests and the token response
//! - Configurations: key/value entries with audit metadata

pub mod auth;
pub mod configuration;

pub use auth::{AuthResponse, LoginRequest, RegisterRequest};
pub use configuration::Configuration;
