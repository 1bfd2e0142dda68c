use std::{
    collections::BTreeMap,
    sync::{Arc, Weak},
};

use crate::utils::new_subscriber_id;

type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;
type Listeners<S> = Arc<parking_lot::Mutex<BTreeMap<u64, Listener<S>>>>;

/// The listeners interested in a value of type `S`, notified in subscription order.
pub(crate) struct Subscribers<S> {
    listeners: Listeners<S>,
}

impl<S> Default for Subscribers<S> {
    fn default() -> Self {
        Self {
            listeners: Arc::new(parking_lot::Mutex::new(BTreeMap::new())),
        }
    }
}

impl<S: 'static> Subscribers<S> {
    pub fn subscribe(&self, listener: impl Fn(&S) + Send + Sync + 'static) -> Subscription {
        let sub_id = new_subscriber_id();
        self.listeners.lock().insert(sub_id, Arc::new(listener));
        let listeners = Arc::downgrade(&self.listeners);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(listeners) = Weak::upgrade(&listeners) {
                    listeners.lock().remove(&sub_id);
                }
            })),
        }
    }

    pub fn notify(&self, value: &S) {
        // Not holding the lock while calling out, listeners may subscribe or drop their own subscription:
        let listeners = self.listeners.lock().values().cloned().collect::<Vec<_>>();
        for listener in listeners {
            listener(value);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }
}

/// Keeps a listener registered, dropping it unsubscribes.
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Keep the listener registered for as long as the store lives.
    pub fn detach(mut self) {
        self.unsubscribe.take();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}
