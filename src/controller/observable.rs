use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Handle returned by `Observable::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer<T> = Rc<dyn Fn(&T)>;

/// A value with change observers, read and written on one thread.
///
/// Observers run after the new value is stored and receive a copy of it, so
/// they may read or write the observable (or anything else) without borrow
/// conflicts.
pub struct Observable<T> {
    value: RefCell<T>,
    observers: RefCell<Vec<(SubscriptionId, Observer<T>)>>,
    next_id: Cell<u64>,
}

impl<T: Clone> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            observers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Borrows the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Stores `value` and notifies every observer.
    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value.clone();
        self.notify(&value);
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&T) + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.observers.borrow_mut().push((id, Rc::new(observer)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    pub fn clear_observers(&self) {
        self.observers.borrow_mut().clear();
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    fn notify(&self, value: &T) {
        let observers: Vec<Observer<T>> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        for observer in observers {
            observer(value);
        }
    }
}

impl<T: Clone + PartialEq> Observable<T> {
    /// Like `set`, but skips storing and notifying when the value is unchanged.
    pub fn set_if_changed(&self, value: T) -> bool {
        if *self.value.borrow() == value {
            return false;
        }
        self.set(value);
        true
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.value.borrow())
            .field("observers", &self.observers.borrow().len())
            .finish()
    }
}
