use std::sync::{Arc, Mutex, PoisonError};

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Returned by [`Publisher::subscribe`]; hand it back to unsubscribe.
    pub struct ListenerKey;
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// One output channel: a single writer, any number of listeners, and the
/// latest value replayed to whoever subscribes late.
pub struct Publisher<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    latest: Option<T>,
    listeners: SlotMap<ListenerKey, Listener<T>>,
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                latest: None,
                listeners: SlotMap::with_key(),
            }),
        }
    }
}

impl<T: Clone> Publisher<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> ListenerKey {
        let listener: Listener<T> = Arc::new(listener);
        let (key, latest) = {
            let mut inner = self.lock();
            let key = inner.listeners.insert(Arc::clone(&listener));
            (key, inner.latest.clone())
        };
        if let Some(latest) = latest {
            listener(&latest);
        }
        key
    }

    pub fn unsubscribe(&self, key: ListenerKey) -> bool {
        self.lock().listeners.remove(key).is_some()
    }

    pub fn send(&self, value: T) {
        // collect first and call outside the lock, since listeners commonly
        // turn around and read `latest` or publish on another channel
        let listeners: Vec<Listener<T>> = {
            let mut inner = self.lock();
            inner.latest = Some(value.clone());
            inner.listeners.values().cloned().collect()
        };
        for listener in listeners {
            listener(&value);
        }
    }

    pub fn latest(&self) -> Option<T> {
        self.lock().latest.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
