//! A client for hierarchical remote stores whose SDKs report results through callbacks.
//!
//! How it fits together:
//! 1. A [`RemoteBackend`] is the raw SDK surface: single-event reads, writes and
//!    key generation, each reporting through continuations.
//! 2. A [`RemoteReference`] addresses one node and turns each callback pair into a
//!    single awaitable result. The first continuation to fire wins; later ones are
//!    logged and dropped, and continuations dropped unfired resolve as `Cancelled`.
//! 3. [`RemoteStoreClient`] owns the connection, connects once, and namespaces every
//!    read and write under the signed-in user. Without a user nothing is sent.

mod backend;
mod bridge;
mod client;
mod error;
pub mod memory;
mod path;
mod snapshot;

#[cfg(feature = "rest")]
pub mod rest;

pub use backend::{OnComplete, OnError, OnValue, RemoteBackend};
pub use client::{IdentityProvider, RemoteReference, RemoteStoreClient, StaticIdentity, UserScope};
pub use error::{RemoteError, RemoteErrorCode, StoreError};
pub use path::StorePath;
pub use snapshot::Snapshot;
