//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionStore`: the single owner of the current session, persisted
//!   across restarts and observable by subscribers
//! - `SessionStorage` backends: file, OS keychain and in-memory
//!
//! Sessions carry no expiry of their own. A session ends when the user logs
//! out or when the server rejects its credential.

pub mod session;
pub mod storage;

pub use session::{SessionRecord, SessionSource, SessionStore, SessionTeardown, Subscription};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage, SESSION_KEY};
