//! Seams to the identity provider and the remote document store.
//!
//! The core only asks "who is signed in" and "mirror this document". Both sides
//! are traits; the in-process implementations here back the CLI and the tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::RemoteError;
use crate::guards::MineProfile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: String,
}

pub type AuthListener = Box<dyn FnMut(Option<&User>)>;

/// Source of the signed-in identity.
pub trait Identity {
    fn current_user(&self) -> Option<User>;

    /// Register for session transitions. Delivery stops once the returned
    /// handle is cancelled or dropped.
    fn subscribe(&self, listener: AuthListener) -> Subscription;
}

/// Cancellation handle for an [`Identity`] subscription.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(f) = self.cancel.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.cancel.take() {
            f();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[derive(Default)]
struct IdentityState {
    user: Option<User>,
    next_id: u64,
    listeners: BTreeMap<u64, Rc<RefCell<AuthListener>>>,
}

/// In-process identity whose session is driven by `sign_in` / `sign_out`.
/// Clones share the same session. Listeners must not sign in or out themselves.
#[derive(Clone, Default)]
pub struct LocalIdentity {
    state: Rc<RefCell<IdentityState>>,
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: User) -> Self {
        let identity = Self::new();
        identity.state.borrow_mut().user = Some(user);
        identity
    }

    pub fn sign_in(&self, user: User) {
        info!(uid = %user.uid, "signed in");
        self.state.borrow_mut().user = Some(user);
        self.notify();
    }

    pub fn sign_out(&self) {
        if self.state.borrow_mut().user.take().is_some() {
            info!("signed out");
        }
        self.notify();
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    fn notify(&self) {
        // Release the state borrow before calling out.
        let (user, listeners): (Option<User>, Vec<_>) = {
            let state = self.state.borrow();
            (state.user.clone(), state.listeners.values().cloned().collect())
        };
        for listener in listeners {
            let mut f = listener.borrow_mut();
            (&mut **f)(user.as_ref());
        }
    }
}

impl Identity for LocalIdentity {
    fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    fn subscribe(&self, listener: AuthListener) -> Subscription {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id;
            state.next_id += 1;
            state.listeners.insert(id, Rc::new(RefCell::new(listener)));
            id
        };
        let weak: Weak<RefCell<IdentityState>> = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.borrow_mut().listeners.remove(&id);
            }
        })
    }
}

/// Per-user remote collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Emissions,
    Pathways,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Emissions => "emissions",
            Collection::Pathways => "pathways",
        }
    }
}

/// Hosted document store, reached only through this narrow interface.
pub trait RemoteStore {
    /// Store `document` under `users/<uid>/<collection>`, returning its id.
    fn append(&mut self, uid: &str, collection: Collection, document: Value) -> Result<String, RemoteError>;

    /// All documents of one collection, in insertion order.
    fn list(&self, uid: &str, collection: Collection) -> Result<Vec<Value>, RemoteError>;

    /// Store the mine profile under `mines/<uid>`.
    fn put_profile(&mut self, uid: &str, profile: &MineProfile) -> Result<(), RemoteError>;

    fn get_profile(&self, uid: &str) -> Result<Option<MineProfile>, RemoteError>;
}

/// Stamp a document with its server-side creation time.
pub fn with_created_at(mut document: Value) -> Value {
    if let Value::Object(map) = &mut document {
        map.insert("createdAt".to_string(), Value::String(Utc::now().to_rfc3339()));
    }
    document
}

/// Remote store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    collections: HashMap<(String, Collection), Vec<(String, Value)>>,
    mines: HashMap<String, MineProfile>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RemoteStore for InMemoryRemoteStore {
    fn append(&mut self, uid: &str, collection: Collection, document: Value) -> Result<String, RemoteError> {
        if !document.is_object() {
            return Err(RemoteError::Rejected("document must be an object".into()));
        }
        let id = Uuid::new_v4().to_string();
        self.collections
            .entry((uid.to_string(), collection))
            .or_default()
            .push((id.clone(), with_created_at(document)));
        debug!(uid, collection = collection.name(), id = %id, "stored remote document");
        Ok(id)
    }

    fn list(&self, uid: &str, collection: Collection) -> Result<Vec<Value>, RemoteError> {
        Ok(self
            .collections
            .get(&(uid.to_string(), collection))
            .map(|docs| docs.iter().map(|(_, d)| d.clone()).collect())
            .unwrap_or_default())
    }

    fn put_profile(&mut self, uid: &str, profile: &MineProfile) -> Result<(), RemoteError> {
        self.mines.insert(uid.to_string(), profile.clone());
        Ok(())
    }

    fn get_profile(&self, uid: &str) -> Result<Option<MineProfile>, RemoteError> {
        Ok(self.mines.get(uid).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> User {
        User {
            uid: "u-1".into(),
            email: "ops@mine.example".into(),
        }
    }

    #[test]
    fn test_subscription_delivers_transitions() {
        let identity = LocalIdentity::new();
        let seen: Rc<RefCell<Vec<Option<String>>>> = Rc::default();
        let sink = seen.clone();
        let sub = identity.subscribe(Box::new(move |u: Option<&User>| {
            sink.borrow_mut().push(u.map(|u| u.uid.clone()));
        }));

        identity.sign_in(user());
        identity.sign_out();
        assert_eq!(*seen.borrow(), vec![Some("u-1".to_string()), None]);

        sub.cancel();
        assert_eq!(identity.listener_count(), 0);
        identity.sign_in(user());
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_dropping_subscription_cancels() {
        let identity = LocalIdentity::new();
        {
            let _sub = identity.subscribe(Box::new(|_: Option<&User>| {}));
            assert_eq!(identity.listener_count(), 1);
        }
        assert_eq!(identity.listener_count(), 0);
    }

    #[test]
    fn test_current_user() {
        let identity = LocalIdentity::new();
        assert!(identity.current_user().is_none());
        let shared = identity.clone();
        shared.sign_in(user());
        assert_eq!(identity.current_user(), Some(user()));
    }

    #[test]
    fn test_remote_append_and_list() {
        let mut store = InMemoryRemoteStore::new();
        let id = store
            .append("u-1", Collection::Emissions, json!({"emission": 1.0}))
            .unwrap();
        assert!(!id.is_empty());
        store.append("u-1", Collection::Emissions, json!({"emission": 2.0})).unwrap();

        let docs = store.list("u-1", Collection::Emissions).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["emission"], 2.0);
        assert!(docs[0]["createdAt"].is_string());
        assert!(store.list("u-1", Collection::Pathways).unwrap().is_empty());
        assert!(store.list("u-2", Collection::Emissions).unwrap().is_empty());
    }

    #[test]
    fn test_remote_rejects_non_object() {
        let mut store = InMemoryRemoteStore::new();
        let err = store.append("u-1", Collection::Pathways, json!(3)).unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(_)));
    }
}
