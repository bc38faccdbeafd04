use std::sync::{Mutex, MutexGuard};

pub type Observer<E> = Box<dyn Fn(&E) + Send + Sync>;

/// handed out by [`Observers::subscribe`], used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

/// a list of callbacks interested in events of type `E`. State holders own one of these and
/// call [`Observers::notify`] after every change they make
pub struct Observers<E> {
    inner: Mutex<ObserverList<E>>,
}

struct ObserverList<E> {
    next_id: usize,
    observers: Vec<(SubscriptionId, Observer<E>)>,
}

impl<E> Observers<E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ObserverList {
                next_id: 0,
                observers: Vec::new(),
            }),
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut list = lock(&self.inner);
        let id = SubscriptionId(list.next_id);
        list.next_id += 1;
        list.observers.push((id, Box::new(observer)));
        id
    }

    /// returns false if nothing was subscribed under `id`
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut list = lock(&self.inner);
        let before = list.observers.len();
        list.observers.retain(|(existing, _)| *existing != id);
        before != list.observers.len()
    }

    /// observers run in subscription order. They must not subscribe or unsubscribe from inside
    /// the callback
    pub fn notify(&self, event: &E) {
        let list = lock(&self.inner);
        for (_, observer) in &list.observers {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// a panicking observer shouldn't take every later notification down with it
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| {
        log::warn!("An observer list mutex was poisoned! Recovering...");
        mutex.clear_poison();
        e.into_inner()
    })
}
