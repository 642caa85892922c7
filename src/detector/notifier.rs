//! Publish/subscribe for named events
//!
//! Listeners are registered per event name and identified by their `Rc`,
//! so registering the same listener twice for one name has no effect and
//! removal needs the exact `Rc` that was registered.
//!
//! # Example
//!
//! ```rust
//! use secret_code::detector::notifier::{Listener, Notifier};
//! use std::rc::Rc;
//!
//! let notifier: Notifier<u32> = Notifier::new();
//! let print: Listener<u32> = Rc::new(|value: &u32| println!("got {}", value));
//!
//! notifier.on("success failed", &print);
//! notifier.trigger("success", &7);
//! notifier.off(Some("failed"), Some(&print));
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Callback receiving the event payload
pub type Listener<P> = Rc<dyn Fn(&P)>;

pub struct Notifier<P> {
    listeners: RefCell<HashMap<String, Vec<Listener<P>>>>,
}

impl<P> Notifier<P> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
        }
    }

    /// Registers `listener` for one or more space separated event names
    pub fn on(&self, names: &str, listener: &Listener<P>) -> &Self {
        let mut listeners = self.listeners.borrow_mut();
        for name in names.split_whitespace() {
            let registered = listeners.entry(name.to_string()).or_default();
            if !registered.iter().any(|l| Rc::ptr_eq(l, listener)) {
                registered.push(Rc::clone(listener));
            }
        }
        self
    }

    /// Registers several listeners for the same names, in order
    pub fn on_each(&self, names: &str, listeners: &[Listener<P>]) -> &Self {
        for listener in listeners {
            self.on(names, listener);
        }
        self
    }

    /// Registers a mapping of event names to listeners
    pub fn on_map<'a, I>(&self, map: I) -> &Self
    where
        I: IntoIterator<Item = (&'a str, Listener<P>)>,
    {
        for (names, listener) in map {
            self.on(names, &listener);
        }
        self
    }

    /// Removes listeners
    ///
    /// * `off(None, None)` - everything
    /// * `off(Some(names), None)` - all listeners of the given names
    /// * `off(Some(names), Some(l))` - exactly `l` for the given names
    /// * `off(None, Some(l))` - `l` from every name it is registered for,
    ///   other listeners are left alone (it does not clear everything)
    pub fn off(&self, names: Option<&str>, listener: Option<&Listener<P>>) -> &Self {
        let mut listeners = self.listeners.borrow_mut();
        match (names, listener) {
            (None, None) => listeners.clear(),
            (None, Some(listener)) => {
                for registered in listeners.values_mut() {
                    registered.retain(|l| !Rc::ptr_eq(l, listener));
                }
            }
            (Some(names), None) => {
                for name in names.split_whitespace() {
                    listeners.remove(name);
                }
            }
            (Some(names), Some(listener)) => {
                for name in names.split_whitespace() {
                    if let Some(registered) = listeners.get_mut(name) {
                        registered.retain(|l| !Rc::ptr_eq(l, listener));
                    }
                }
            }
        }
        self
    }

    /// Removes several listeners, see [`off`](Self::off) for `names`
    pub fn off_each(&self, names: Option<&str>, listeners: &[Listener<P>]) -> &Self {
        for listener in listeners {
            self.off(names, Some(listener));
        }
        self
    }

    /// Synchronously calls every listener of `name` in registration order.
    ///
    /// Works on a snapshot of the listener list, listeners may call `on`/`off`.
    /// A panicking listener is not caught.
    pub fn trigger(&self, name: &str, payload: &P) {
        let snapshot: Vec<Listener<P>> = match self.listeners.borrow().get(name) {
            Some(registered) => registered.clone(),
            None => return,
        };

        debug!("Triggering '{}' for {} listeners", name, snapshot.len());
        for listener in snapshot {
            listener(payload);
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.listener_count(name) > 0
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners
            .borrow()
            .get(name)
            .map(|registered| registered.len())
            .unwrap_or(0)
    }
}

impl<P> Default for Notifier<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for Notifier<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.borrow();
        let mut counts: Vec<(&String, usize)> =
            listeners.iter().map(|(name, l)| (name, l.len())).collect();
        counts.sort();
        f.debug_struct("Notifier").field("listeners", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> Listener<u32> {
        let log = Rc::clone(log);
        Rc::new(move |value: &u32| log.borrow_mut().push(format!("{}:{}", tag, value)))
    }

    #[test]
    fn trigger_runs_in_registration_order() {
        let notifier = Notifier::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        notifier.on("tick", &tagged(&log, "a"));
        notifier.on("tick", &tagged(&log, "b"));
        notifier.trigger("tick", &1);
        notifier.trigger("other", &2);

        assert_eq!(*log.borrow(), vec!["a:1", "b:1"]);
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let notifier = Notifier::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let listener = tagged(&log, "x");

        notifier.on("tick", &listener).on("tick", &listener);
        notifier.on_each("tick", &[Rc::clone(&listener)]);

        assert_eq!(notifier.listener_count("tick"), 1);
        notifier.trigger("tick", &3);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn space_separated_names_and_maps() {
        let notifier = Notifier::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        notifier.on("success  failed", &tagged(&log, "both"));
        notifier.on_map([("timeout", tagged(&log, "mapped"))]);

        notifier.trigger("success", &1);
        notifier.trigger("failed", &2);
        notifier.trigger("timeout", &3);

        assert_eq!(*log.borrow(), vec!["both:1", "both:2", "mapped:3"]);
    }

    #[test]
    fn off_variants() {
        let notifier = Notifier::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = tagged(&log, "a");
        let b = tagged(&log, "b");

        notifier.on("one two", &a).on("one two", &b);

        notifier.off(Some("one"), Some(&a));
        assert_eq!(notifier.listener_count("one"), 1);
        assert_eq!(notifier.listener_count("two"), 2);

        notifier.off(None, Some(&b));
        assert_eq!(notifier.listener_count("one"), 0);
        assert_eq!(notifier.listener_count("two"), 1);

        notifier.on("one", &b);
        notifier.off(Some("two"), None);
        assert!(!notifier.has("two"));
        assert!(notifier.has("one"));

        notifier.off(None, None);
        assert!(!notifier.has("one"));

        notifier.trigger("one", &0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn off_each_mirrors_on_each() {
        let notifier = Notifier::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = tagged(&log, "a");
        let b = tagged(&log, "b");
        let c = tagged(&log, "c");

        notifier.on_each("one two", &[Rc::clone(&a), Rc::clone(&b), Rc::clone(&c)]);

        notifier.off_each(Some("one"), &[Rc::clone(&a), Rc::clone(&b)]);
        assert_eq!(notifier.listener_count("one"), 1);
        assert_eq!(notifier.listener_count("two"), 3);

        notifier.off_each(None, &[Rc::clone(&c)]);
        notifier.trigger("one", &1);
        notifier.trigger("two", &2);

        assert_eq!(*log.borrow(), vec!["a:2", "b:2"]);
    }

    #[test]
    fn off_without_names_keeps_other_listeners() {
        let notifier = Notifier::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let gone = tagged(&log, "gone");
        let kept = tagged(&log, "kept");

        notifier.on("success failed", &gone).on("success", &kept);
        notifier.off(None, Some(&gone));
        notifier.trigger("success", &1);
        notifier.trigger("failed", &2);

        assert_eq!(*log.borrow(), vec!["kept:1"]);
        assert!(!notifier.has("failed"));
    }

    #[test]
    fn listener_can_unsubscribe_itself_during_trigger() {
        let notifier = Rc::new(Notifier::<u32>::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let slot: Rc<RefCell<Option<Listener<u32>>>> = Rc::new(RefCell::new(None));

        let weak = Rc::downgrade(&notifier);
        let me = Rc::clone(&slot);
        let sink = Rc::clone(&log);
        let once: Listener<u32> = Rc::new(move |value: &u32| {
            sink.borrow_mut().push(format!("once:{}", value));
            if let (Some(notifier), Some(listener)) = (weak.upgrade(), me.borrow().as_ref()) {
                notifier.off(Some("tick"), Some(listener));
            }
        });
        *slot.borrow_mut() = Some(Rc::clone(&once));

        notifier.on("tick", &once);
        notifier.trigger("tick", &1);
        notifier.trigger("tick", &2);

        assert_eq!(*log.borrow(), vec!["once:1"]);
    }
}
