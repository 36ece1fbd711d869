use std::collections::BTreeMap;
use std::sync::Arc;

pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`Observers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Explicit observer registry; notification order is subscription order.
pub struct Observers<T> {
    observers: BTreeMap<SubscriptionId, Observer<T>>,
    next_id: u64,
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            observers: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<T> Observers<T> {
    pub fn subscribe(&mut self, observer: Observer<T>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.insert(id, observer);
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.remove(&id).is_some()
    }

    pub fn notify(&self, value: &T) {
        for observer in self.observers.values() {
            observer(value);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
