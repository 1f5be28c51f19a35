//! Remembers, per user, that bootstrap already succeeded this session.
//!
//! Overlapping loads for the same user share one in-flight bootstrap instead of
//! each starting their own. A failed bootstrap is forgotten so the next load
//! tries again; a successful one is kept until the process exits. A run only
//! ever updates its own entry, so a run that finishes after `forget` cannot
//! clobber the run that replaced it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use tether::StoreError;

use crate::bootstrap::{BootstrapOutcome, BootstrapPolicy};

type Running = Shared<BoxFuture<'static, Result<Arc<BootstrapOutcome>, StoreError>>>;

enum GateEntry {
    Running { run: u64, future: Running },
    Confirmed(Arc<BootstrapOutcome>),
}

impl GateEntry {
    fn is_run(&self, id: u64) -> bool {
        matches!(self, GateEntry::Running { run, .. } if *run == id)
    }
}

#[derive(Default)]
pub struct BootstrapGate {
    entries: Arc<DashMap<String, GateEntry>>,
    next_run: AtomicU64,
}

impl BootstrapGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_confirmed(&self, user_id: &str) -> bool {
        matches!(
            self.entries.get(user_id).as_deref(),
            Some(GateEntry::Confirmed(_))
        )
    }

    /// Make the next `confirm` for this user run bootstrap again.
    pub fn forget(&self, user_id: &str) {
        self.entries.remove(user_id);
    }

    /// Run `bootstrap` unless this user is already confirmed or a run for them
    /// is in flight, in which case that result is shared.
    pub async fn confirm<Fut>(
        &self,
        user_id: &str,
        bootstrap: Fut,
    ) -> Result<Arc<BootstrapOutcome>, StoreError>
    where
        Fut: Future<Output = Result<BootstrapOutcome, StoreError>> + Send + 'static,
    {
        // the entry guard must be released before awaiting: the running future
        // writes back into the map when it finishes
        let running = match self.entries.entry(user_id.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                GateEntry::Confirmed(outcome) => return Ok(Arc::clone(outcome)),
                GateEntry::Running { future, .. } => future.clone(),
            },
            Entry::Vacant(entry) => {
                let run = self.next_run.fetch_add(1, Ordering::Relaxed);
                let entries = Arc::clone(&self.entries);
                let user_id = user_id.to_string();
                let running = async move {
                    let result = bootstrap.await.map(Arc::new);
                    match &result {
                        Ok(outcome) => {
                            if let Some(mut entry) = entries.get_mut(&user_id) {
                                if entry.is_run(run) {
                                    *entry = GateEntry::Confirmed(Arc::clone(outcome));
                                }
                            }
                        }
                        Err(_) => {
                            entries.remove_if(&user_id, |_, entry| entry.is_run(run));
                        }
                    }
                    result
                }
                .boxed()
                .shared();

                entry.insert(GateEntry::Running {
                    run,
                    future: running.clone(),
                });
                running
            }
        };

        running.await
    }
}

/// A [`BootstrapPolicy`] that runs at most once per user per session.
pub struct SessionBootstrap {
    policy: BootstrapPolicy,
    gate: BootstrapGate,
}

impl SessionBootstrap {
    pub fn new(policy: BootstrapPolicy) -> Self {
        Self {
            policy,
            gate: BootstrapGate::new(),
        }
    }

    pub fn gate(&self) -> &BootstrapGate {
        &self.gate
    }

    pub async fn ensure(&self) -> Result<Arc<BootstrapOutcome>, StoreError> {
        let scope = self.policy.user_scope()?;
        let policy = self.policy.clone();
        let user_id = scope.user_id().to_string();
        self.gate
            .confirm(&user_id, async move { policy.ensure_defaults_in(&scope).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted(
        runs: &Arc<AtomicUsize>,
        result: Result<BootstrapOutcome, StoreError>,
    ) -> impl Future<Output = Result<BootstrapOutcome, StoreError>> + Send + 'static {
        let runs = Arc::clone(runs);
        async move {
            runs.fetch_add(1, Ordering::SeqCst);
            result
        }
    }

    #[tokio::test]
    async fn confirmed_users_skip_bootstrap() {
        let gate = BootstrapGate::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let satisfied = BootstrapOutcome::AlreadySatisfied { existing: 2 };

        gate.confirm("u1", counted(&runs, Ok(satisfied.clone())))
            .await
            .unwrap();
        let second = gate
            .confirm("u1", counted(&runs, Ok(satisfied.clone())))
            .await
            .unwrap();

        assert_eq!(*second, satisfied);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(gate.is_confirmed("u1"));
        assert!(!gate.is_confirmed("u2"));
    }

    #[tokio::test]
    async fn failures_are_retried() {
        let gate = BootstrapGate::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let failed = gate
            .confirm("u1", counted(&runs, Err(StoreError::NoUserScope)))
            .await;
        assert_eq!(failed, Err(StoreError::NoUserScope));
        assert!(!gate.is_confirmed("u1"));

        gate.confirm(
            "u1",
            counted(&runs, Ok(BootstrapOutcome::Seeded { created: vec![] })),
        )
        .await
        .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn overlapping_confirms_share_one_run() {
        let gate = BootstrapGate::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let (release, released) = futures::channel::oneshot::channel::<()>();

        let slow = {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                let _ = released.await;
                Ok::<_, StoreError>(BootstrapOutcome::AlreadySatisfied { existing: 2 })
            }
        };

        let first = gate.confirm("u1", slow);
        let second = gate.confirm(
            "u1",
            counted(&runs, Ok(BootstrapOutcome::AlreadySatisfied { existing: 9 })),
        );
        let releaser = async {
            let _ = release.send(());
        };
        let (first, second, ()) = futures::join!(first, second, releaser);

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[tokio::test]
    async fn forget_reopens_the_gate() {
        let gate = BootstrapGate::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let ok = BootstrapOutcome::AlreadySatisfied { existing: 2 };
        gate.confirm("u1", counted(&runs, Ok(ok.clone()))).await.unwrap();
        gate.forget("u1");
        gate.confirm("u1", counted(&runs, Ok(ok))).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn late_runs_leave_their_replacement_alone() {
        let gate = BootstrapGate::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let (fail_old, old_fails) = futures::channel::oneshot::channel::<()>();
        let (finish_new, new_finishes) = futures::channel::oneshot::channel::<()>();

        let mut old = Box::pin(gate.confirm("u1", async move {
            let _ = old_fails.await;
            Err::<BootstrapOutcome, _>(StoreError::NotConnected)
        }));
        assert!(futures::poll!(&mut old).is_pending());

        gate.forget("u1");
        let mut new = Box::pin(gate.confirm("u1", async move {
            let _ = new_finishes.await;
            Ok::<_, StoreError>(BootstrapOutcome::AlreadySatisfied { existing: 2 })
        }));
        assert!(futures::poll!(&mut new).is_pending());

        let _ = fail_old.send(());
        assert_eq!(old.await, Err(StoreError::NotConnected));

        // still the replacement's entry, so this joins it instead of running
        let joined = gate.confirm(
            "u1",
            counted(&runs, Ok(BootstrapOutcome::Seeded { created: vec![] })),
        );
        let finisher = async {
            let _ = finish_new.send(());
        };
        let (new, joined, ()) = futures::join!(new, joined, finisher);

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(new.unwrap(), joined.unwrap());
        assert!(gate.is_confirmed("u1"));
    }
}
