//! A backend that keeps the whole tree in process memory.
//!
//! Used for the offline/dev composition and as the fixture for tests, so it
//! also counts requests and can be told to fail.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

use crate::backend::{OnComplete, OnError, OnValue, RemoteBackend};
use crate::{RemoteError, RemoteErrorCode, Snapshot, StorePath};

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    tree: Mutex<Value>,
    next_key: AtomicU64,
    configure_calls: AtomicUsize,
    remote_calls: AtomicUsize,
    faults: Mutex<Faults>,
    fire_both_callbacks: AtomicBool,
}

#[derive(Debug, Default)]
struct Faults {
    failing_reads: usize,
    writes_before_failure: Option<usize>,
    withhold_keys: bool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `configure` ran.
    pub fn configure_calls(&self) -> usize {
        self.configure_calls.load(Ordering::SeqCst)
    }

    /// Reads, writes and key allocations issued against this backend.
    pub fn remote_calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    /// Put a raw value in the tree, bypassing the request path.
    pub fn set_node(&self, path: &StorePath, value: Value) {
        let mut tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
        write_node(&mut tree, path, value);
    }

    pub fn node(&self, path: &StorePath) -> Option<Value> {
        let tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
        read_node(&tree, path).filter(|value| !value.is_null()).cloned()
    }

    /// The next `count` reads fail with a network error.
    pub fn fail_next_reads(&self, count: usize) {
        self.faults().failing_reads = count;
    }

    /// Let `count` more writes succeed, then fail every write after that.
    pub fn fail_writes_after(&self, count: usize) {
        self.faults().writes_before_failure = Some(count);
    }

    pub fn heal_writes(&self) {
        self.faults().writes_before_failure = None;
    }

    pub fn withhold_keys(&self, withhold: bool) {
        self.faults().withhold_keys = withhold;
    }

    /// Misbehave like a buggy SDK: call the success continuation and then the
    /// failure continuation for every read.
    pub fn fire_both_callbacks(&self, enabled: bool) {
        self.fire_both_callbacks.store(enabled, Ordering::SeqCst);
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RemoteBackend for InMemoryBackend {
    fn configure(&self) -> Result<(), RemoteError> {
        self.configure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn observe_single_event(&self, path: &StorePath, on_value: OnValue, on_error: OnError) {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);

        let should_fail = {
            let mut faults = self.faults();
            if faults.failing_reads > 0 {
                faults.failing_reads -= 1;
                true
            } else {
                false
            }
        };
        if should_fail {
            on_error(RemoteError::network(format!("read of {path} failed")));
            return;
        }

        // never call back while holding the tree lock: callers may re-enter
        let value = {
            let tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
            read_node(&tree, path).cloned()
        };
        let snapshot = Snapshot::new(path.key().map(str::to_string), value);

        on_value(snapshot);
        if self.fire_both_callbacks.load(Ordering::SeqCst) {
            on_error(RemoteError::network("spurious failure after success"));
        }
    }

    fn set_value(&self, path: &StorePath, value: Value, on_complete: OnComplete) {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);

        let rejected = {
            let mut faults = self.faults();
            match faults.writes_before_failure.as_mut() {
                Some(0) => true,
                Some(remaining) => {
                    *remaining -= 1;
                    false
                }
                None => false,
            }
        };
        if rejected {
            on_complete(Some(RemoteError::new(
                RemoteErrorCode::PermissionDenied,
                format!("write to {path} rejected"),
            )));
            return;
        }

        {
            let mut tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
            write_node(&mut tree, path, value);
        }
        on_complete(None);
    }

    fn child_by_auto_id(&self, _path: &StorePath) -> Option<String> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults().withhold_keys {
            return None;
        }
        // zero-padded so lexical order is allocation order
        let seq = self.next_key.fetch_add(1, Ordering::SeqCst);
        Some(format!("-M{seq:018}"))
    }
}

fn read_node<'a>(tree: &'a Value, path: &StorePath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(tree, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn write_node(tree: &mut Value, path: &StorePath, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        *tree = value;
        return;
    };

    let mut node = tree;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if value.is_null() {
        if let Value::Object(map) = node {
            map.remove(last);
        }
        return;
    }
    ensure_object(node).insert(last.clone(), value);
}

/// Leaves replaced by writes below them become objects, as in the real store.
fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}
