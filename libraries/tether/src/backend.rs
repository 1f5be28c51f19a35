//! The callback-style surface a remote store SDK exposes.
//!
//! Backends report results by calling continuations, the way mobile database
//! SDKs do. Nothing here is async; [`crate::RemoteReference`] bridges these
//! callbacks into single awaitable results.

use serde_json::Value;

use crate::{RemoteError, Snapshot, StorePath};

pub type OnValue = Box<dyn FnOnce(Snapshot) + Send + 'static>;
pub type OnError = Box<dyn FnOnce(RemoteError) + Send + 'static>;
pub type OnComplete = Box<dyn FnOnce(Option<RemoteError>) + Send + 'static>;

pub trait RemoteBackend: Send + Sync + 'static {
    /// One-time setup of the underlying connection. Only called by
    /// [`crate::RemoteStoreClient::connect`], which guarantees it runs once.
    fn configure(&self) -> Result<(), RemoteError>;

    /// Read the node at `path` once. A well-behaved backend calls exactly one
    /// of the two continuations exactly once.
    fn observe_single_event(&self, path: &StorePath, on_value: OnValue, on_error: OnError);

    /// Replace the node at `path` with `value`; `null` removes it.
    fn set_value(&self, path: &StorePath, value: Value, on_complete: OnComplete);

    /// A new globally unique child key under `path`. Key generation happens
    /// client-side in real SDKs, so this is synchronous.
    fn child_by_auto_id(&self, path: &StorePath) -> Option<String>;
}
