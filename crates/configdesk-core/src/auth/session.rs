use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::storage::SessionStorage;

/// The authenticated identity: bearer token plus the user it belongs to.
///
/// Serialized with the same field names as the login response so a stored
/// record reads like the `{token, username}` body the server returned.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "token")]
    pub credential: String,
    #[serde(rename = "username")]
    pub principal: String,
}

impl SessionRecord {
    pub fn new(credential: impl Into<String>, principal: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            principal: principal.into(),
        }
    }

    /// A record only counts as a session if it carries a credential
    pub fn is_valid(&self) -> bool {
        !self.credential.is_empty()
    }
}

// Keep tokens out of logs
impl fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecord")
            .field("credential", &"<redacted>")
            .field("principal", &self.principal)
            .finish()
    }
}

/// Read access to the current session.
pub trait SessionSource: Send + Sync {
    fn current(&self) -> Option<SessionRecord>;

    /// True if there is a session with a non-empty credential
    fn is_authenticated(&self) -> bool {
        self.current().map(|r| r.is_valid()).unwrap_or(false)
    }
}

/// The one mutation other components are allowed to trigger.
pub trait SessionTeardown: Send + Sync {
    fn clear(&self);
}

type Observer = Arc<dyn Fn(Option<&SessionRecord>) + Send + Sync>;

struct ObserverEntry {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Observer,
}

#[derive(Default)]
struct ObserverList {
    next_id: AtomicU64,
    entries: Mutex<Vec<ObserverEntry>>,
}

impl ObserverList {
    fn remove(&self, id: u64) {
        self.entries.lock().retain(|e| e.id != id);
    }
}

/// Handle returned by [`SessionStore::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    observers: Weak<ObserverList>,
}

impl Subscription {
    /// Stop receiving notifications. No invocation starts after this returns.
    pub fn unsubscribe(self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(observers) = self.observers.upgrade() {
            observers.remove(self.id);
        }
    }
}

/// Owner of the process-wide session slot.
///
/// `establish` and `clear` run under a mutation lock so that the
/// persist-replace-publish sequence never interleaves with another mutation.
/// Observers run while that lock is held and must not call `establish`,
/// `clear` or `subscribe` themselves; reading `current()` from an observer
/// is fine.
pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
    state: RwLock<Option<SessionRecord>>,
    mutation: Mutex<()>,
    observers: Arc<ObserverList>,
}

impl SessionStore {
    /// Open the store, restoring any persisted session
    pub fn open(storage: Box<dyn SessionStorage>) -> Self {
        let store = Self {
            storage,
            state: RwLock::new(None),
            mutation: Mutex::new(()),
            observers: Arc::new(ObserverList::default()),
        };
        let restored = store.restore();
        debug!(restored = restored.is_some(), "Session store opened");
        *store.state.write() = restored;
        store
    }

    /// Read the persisted session. Missing, unreadable or malformed data
    /// all mean "logged out".
    pub fn restore(&self) -> Option<SessionRecord> {
        let contents = match self.storage.read() {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session");
                return None;
            }
        };

        match serde_json::from_str::<SessionRecord>(&contents) {
            Ok(record) if record.is_valid() => Some(record),
            Ok(_) => {
                debug!("Persisted session has no credential, ignoring");
                None
            }
            Err(e) => {
                debug!(error = %e, "Persisted session is malformed, ignoring");
                None
            }
        }
    }

    pub fn current(&self) -> Option<SessionRecord> {
        self.state.read().clone()
    }

    /// Persist `record`, make it current, then notify observers
    pub fn establish(&self, record: SessionRecord) {
        let _guard = self.mutation.lock();

        match serde_json::to_string(&record) {
            Ok(contents) => {
                if let Err(e) = self.storage.write(&contents) {
                    warn!(error = %e, "Failed to persist session");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize session"),
        }

        info!(principal = %record.principal, "Session established");
        *self.state.write() = Some(record.clone());
        self.publish(Some(&record));
    }

    /// Drop the session. Always notifies, even if already logged out.
    pub fn clear(&self) {
        let _guard = self.mutation.lock();

        if let Err(e) = self.storage.remove() {
            warn!(error = %e, "Failed to remove persisted session");
        }

        let previous = self.state.write().take();
        match previous {
            Some(ref record) => info!(principal = %record.principal, "Session cleared"),
            None => debug!("Session clear requested while logged out"),
        }
        self.publish(None);
    }

    /// Register an observer. It is called right away with the current state,
    /// then once for every later `establish`/`clear`.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(Option<&SessionRecord>) + Send + Sync + 'static,
    {
        let _guard = self.mutation.lock();

        let id = self.observers.next_id.fetch_add(1, Ordering::SeqCst);
        let active = Arc::new(AtomicBool::new(true));
        let callback: Observer = Arc::new(observer);

        self.observers.entries.lock().push(ObserverEntry {
            id,
            active: active.clone(),
            callback: callback.clone(),
        });

        let current = self.current();
        callback(current.as_ref());

        Subscription {
            id,
            active,
            observers: Arc::downgrade(&self.observers),
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.observers.entries.lock().len()
    }

    fn publish(&self, state: Option<&SessionRecord>) {
        // Snapshot so observers can unsubscribe while being notified
        let snapshot: Vec<(Arc<AtomicBool>, Observer)> = self
            .observers
            .entries
            .lock()
            .iter()
            .map(|e| (e.active.clone(), e.callback.clone()))
            .collect();

        for (active, callback) in snapshot {
            if active.load(Ordering::SeqCst) {
                callback(state);
            }
        }
    }
}

impl SessionSource for SessionStore {
    fn current(&self) -> Option<SessionRecord> {
        SessionStore::current(self)
    }
}

impl SessionTeardown for SessionStore {
    fn clear(&self) {
        SessionStore::clear(self)
    }
}
