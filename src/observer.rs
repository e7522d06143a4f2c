// Observer list - Broadcast of state snapshots to subscribers
// Subscribers are removed through an explicit Subscription token

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Listener<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct ListenerList<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

/// Ordered list of listeners receiving `&T` snapshots
pub struct Observers<T> {
    list: Rc<RefCell<ListenerList<T>>>,
}

impl<T: 'static> Observers<T> {
    pub fn new() -> Self {
        Self {
            list: Rc::new(RefCell::new(ListenerList {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register a listener. It stays registered until the returned
    /// Subscription is used to remove it.
    pub fn subscribe(&self, listener: impl FnMut(&T) + 'static) -> Subscription {
        let listener: Listener<T> = Rc::new(RefCell::new(listener));
        let mut list = self.list.borrow_mut();
        let id = list.next_id;
        list.next_id += 1;
        list.entries.push((id, listener));

        let weak: Weak<RefCell<ListenerList<T>>> = Rc::downgrade(&self.list);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(list) = weak.upgrade() {
                    list.borrow_mut().entries.retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    /// Deliver `value` to one listener only (the most recently added)
    pub fn notify_last(&self, value: &T) {
        let last = self.list.borrow().entries.last().map(|(_, l)| Rc::clone(l));
        if let Some(listener) = last {
            (&mut *listener.borrow_mut())(value);
        }
    }

    /// Deliver `value` to every listener, in subscription order.
    ///
    /// Listeners may subscribe or unsubscribe from inside the callback; the
    /// change takes effect from the next emit.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .list
            .borrow()
            .entries
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();

        for listener in snapshot {
            // A listener re-entering itself would double borrow; skip it
            if let Ok(mut f) = listener.try_borrow_mut() {
                (&mut *f)(value);
            }
        }
    }
}

impl<T: 'static> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Removal token returned by `subscribe`.
///
/// Dropping the token leaves the listener registered; call `unsubscribe`
/// to remove it.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}
