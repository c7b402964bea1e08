//! Replaying publish/subscribe cell.
//!
//! A [`Subject`] holds the latest value of some piece of shared state
//! (available time steps, current time, selected region, ...). New
//! subscribers are called immediately with that value, then again on
//! every update.

use std::cell::RefCell;
use std::rc::Rc;

/// Handle returned by [`Subject::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback for subject updates.
pub type Listener<T> = Rc<dyn Fn(&T)>;

struct SubjectInner<T> {
    value: T,
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
}

/// Shared, replaying value holder. Clones share the same state.
pub struct Subject<T> {
    inner: Rc<RefCell<SubjectInner<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Default> Default for Subject<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Subject<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SubjectInner {
                value,
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Runs `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Stores a new value and notifies every listener.
    ///
    /// Listeners may read the subject but must not call `set` on it.
    pub fn set(&self, value: T) {
        let listeners: Vec<Listener<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.value = value;
            inner.listeners.iter().map(|(_, l)| l.clone()).collect()
        };

        let inner = self.inner.borrow();
        for listener in listeners {
            listener(&inner.value);
        }
    }

    /// Registers a listener and replays the current value to it.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> SubscriptionId {
        let listener: Listener<T> = Rc::new(listener);
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = SubscriptionId(inner.next_id);
            inner.next_id += 1;
            inner.listeners.push((id, listener.clone()));
            id
        };

        let inner = self.inner.borrow();
        listener(&inner.value);
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.listeners.len();
        inner.listeners.retain(|(other, _)| *other != id);
        inner.listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

impl<T: Clone> Subject<T> {
    /// Clone of the current value.
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_late_subscriber_receives_latest_value() {
        let subject = Subject::new(1);
        subject.set(2);
        subject.set(3);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        subject.subscribe(move |v| sink.borrow_mut().push(*v));

        subject.set(4);
        assert_eq!(*seen.borrow(), vec![3, 4]);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let subject = Subject::new(0);
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let id = subject.subscribe(move |_| counter.set(counter.get() + 1));

        assert!(subject.unsubscribe(id));
        assert!(!subject.unsubscribe(id));
        subject.set(5);

        assert_eq!(calls.get(), 1);
        assert_eq!(subject.subscriber_count(), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let subject = Subject::new(String::from("a"));
        let other = subject.clone();
        other.set("b".to_string());
        assert_eq!(subject.get(), "b");
    }

    #[test]
    fn test_listener_may_read_subject() {
        let subject = Subject::new(10);
        let reader = subject.clone();
        let seen = Rc::new(Cell::new(0));
        let sink = seen.clone();
        subject.subscribe(move |_| sink.set(reader.get()));

        subject.set(11);
        assert_eq!(seen.get(), 11);
    }
}
