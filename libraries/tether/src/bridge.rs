//! A one-shot completion point shared by a success and a failure continuation.

use std::sync::{Arc, Mutex, PoisonError};

use futures::channel::oneshot;

use crate::{RemoteError, RemoteErrorCode};

type Slot<T> = Arc<Mutex<Option<oneshot::Sender<Result<T, RemoteError>>>>>;

/// The writing half. Clones share one slot, so however many continuations hold
/// a resolver, only the first `resolve` is delivered.
pub(crate) struct Resolver<T> {
    slot: Slot<T>,
    what: &'static str,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            what: self.what,
        }
    }
}

pub(crate) struct Pending<T> {
    receiver: oneshot::Receiver<Result<T, RemoteError>>,
    what: &'static str,
}

pub(crate) fn completion<T>(what: &'static str) -> (Resolver<T>, Pending<T>) {
    let (sender, receiver) = oneshot::channel();
    (
        Resolver {
            slot: Arc::new(Mutex::new(Some(sender))),
            what,
        },
        Pending { receiver, what },
    )
}

impl<T> Resolver<T> {
    /// Returns `false` if the call was already resolved; the outcome is dropped.
    pub(crate) fn resolve(&self, outcome: Result<T, RemoteError>) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(sender) => {
                // the receiver may be gone if the caller stopped waiting
                let _ = sender.send(outcome);
                true
            }
            None => {
                log::error!(
                    "{} resolved more than once; ignoring the later {} outcome",
                    self.what,
                    if outcome.is_ok() { "success" } else { "failure" }
                );
                false
            }
        }
    }
}

impl<T> Pending<T> {
    pub(crate) async fn wait(self) -> Result<T, RemoteError> {
        match self.receiver.await {
            Ok(outcome) => outcome,
            Err(oneshot::Canceled) => Err(RemoteError::new(
                RemoteErrorCode::Cancelled,
                format!("{} callbacks were dropped without being called", self.what),
            )),
        }
    }
}
