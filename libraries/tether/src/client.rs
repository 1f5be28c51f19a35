use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::backend::RemoteBackend;
use crate::bridge::completion;
use crate::{RemoteError, RemoteErrorCode, Snapshot, StoreError, StorePath};

/// Who is signed in right now, if anyone.
pub trait IdentityProvider: Send + Sync + 'static {
    fn current_user_id(&self) -> Option<String>;
}

impl<F> IdentityProvider for F
where
    F: Fn() -> Option<String> + Send + Sync + 'static,
{
    fn current_user_id(&self) -> Option<String> {
        self()
    }
}

/// An identity the composition root (or a test) sets explicitly.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    user_id: Mutex<Option<String>>,
}

impl StaticIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Mutex::new(Some(user_id.into())),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        *self.user_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(user_id.into());
    }

    pub fn sign_out(&self) {
        *self.user_id.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A handle to one node: the shared store session plus a path. Cheap to clone
/// and never mutated, so concurrent operations can each hold their own.
#[derive(Clone)]
pub struct RemoteReference {
    backend: Arc<dyn RemoteBackend>,
    path: StorePath,
}

impl fmt::Debug for RemoteReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteReference")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RemoteReference {
    fn root(backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            backend,
            path: StorePath::root(),
        }
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub fn child(&self, segment: &str) -> Result<Self, StoreError> {
        Ok(Self {
            backend: Arc::clone(&self.backend),
            path: self.path.child(segment)?,
        })
    }

    pub fn descendant(&self, path: &StorePath) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            path: self.path.join(path),
        }
    }

    /// Issue exactly one single-event read and await whichever continuation
    /// fires first.
    pub async fn read_once(&self) -> Result<Snapshot, RemoteError> {
        let (resolver, pending) = completion::<Snapshot>("single-event read");
        let on_error = resolver.clone();
        self.backend.observe_single_event(
            &self.path,
            Box::new(move |snapshot: Snapshot| {
                resolver.resolve(Ok(snapshot));
            }),
            Box::new(move |error: RemoteError| {
                on_error.resolve(Err(error));
            }),
        );
        pending.wait().await
    }

    pub async fn set_value(&self, value: Value) -> Result<(), RemoteError> {
        let (resolver, pending) = completion::<()>("set value");
        self.backend.set_value(
            &self.path,
            value,
            Box::new(move |error: Option<RemoteError>| {
                resolver.resolve(match error {
                    None => Ok(()),
                    Some(error) => Err(error),
                });
            }),
        );
        pending.wait().await
    }

    pub fn child_by_auto_id(&self) -> Result<String, RemoteError> {
        self.backend.child_by_auto_id(&self.path).ok_or_else(|| {
            RemoteError::new(
                RemoteErrorCode::KeyUnavailable,
                format!("no key generated under {}", self.path),
            )
        })
    }
}

/// One signed-in user's namespace, pinned at the moment it was resolved.
#[derive(Clone, Debug)]
pub struct UserScope {
    user_id: String,
    reference: RemoteReference,
}

impl UserScope {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn reference(&self) -> &RemoteReference {
        &self.reference
    }

    pub async fn read_once(&self, path: &StorePath) -> Result<Snapshot, StoreError> {
        Ok(self.reference.descendant(path).read_once().await?)
    }

    pub async fn write_once(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        Ok(self.reference.descendant(path).set_value(value).await?)
    }

    pub fn child_key(&self, path: &StorePath) -> Result<String, StoreError> {
        Ok(self.reference.descendant(path).child_by_auto_id()?)
    }
}

/// The process-wide store connection, scoped per call to the signed-in user.
///
/// Construct one in the composition root and hand out `Arc`s of it; there is
/// no global instance.
pub struct RemoteStoreClient {
    backend: Arc<dyn RemoteBackend>,
    identity: Arc<dyn IdentityProvider>,
    root: Mutex<Option<RemoteReference>>,
}

impl RemoteStoreClient {
    pub fn new(backend: Arc<dyn RemoteBackend>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            backend,
            identity,
            root: Mutex::new(None),
        }
    }

    /// Configure the backend and root a reference. Does nothing if a root
    /// reference already exists.
    pub fn connect(&self) -> Result<(), StoreError> {
        let mut root = self.root.lock().unwrap_or_else(PoisonError::into_inner);
        if root.is_some() {
            return Ok(());
        }

        self.backend.configure()?;
        *root = Some(RemoteReference::root(Arc::clone(&self.backend)));
        log::info!("Remote store connected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.root
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.identity.current_user_id()
    }

    fn root_reference(&self) -> Result<RemoteReference, StoreError> {
        self.root
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreError::NotConnected)
    }

    /// Resolve the signed-in user once. Every operation on the returned scope
    /// targets that user, even if the identity changes afterwards. The identity
    /// check comes first so a signed-out caller always sees `NoUserScope`.
    pub fn user_scope(&self) -> Result<UserScope, StoreError> {
        let user_id = self.identity.current_user_id().ok_or(StoreError::NoUserScope)?;
        let reference = self.root_reference()?.child(&user_id)?;
        Ok(UserScope { user_id, reference })
    }

    pub async fn read_once(&self, path: &StorePath) -> Result<Snapshot, StoreError> {
        self.user_scope()?.read_once(path).await
    }

    pub async fn write_once(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.user_scope()?.write_once(path, value).await
    }

    /// A fresh store-generated key for a new child of `path`.
    pub fn child_key(&self, path: &StorePath) -> Result<String, StoreError> {
        self.user_scope()?.child_key(path)
    }

    /// Read an app-wide node that lives outside every user namespace, such as
    /// release metadata. User data must go through [`Self::read_once`].
    pub async fn read_shared_once(&self, path: &StorePath) -> Result<Snapshot, StoreError> {
        let reference = self.root_reference()?.descendant(path);
        Ok(reference.read_once().await?)
    }
}
