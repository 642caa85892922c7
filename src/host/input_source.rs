//! Key input abstraction and the in-process keyboard source
//!
//! The detector never reads a global keyboard. It is handed an [`InputSource`]
//! and subscribes/unsubscribes its handlers as its state changes.
//!
//! ```text
//! Host (terminal, window, channel) ──► KeyboardInput ──► subscribed KeyHandlers
//!                                       key_down / key_up
//! ```

use crate::keys::KeyCode;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Kind of key notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEventKind {
    KeyDown,
    KeyUp,
}

impl fmt::Display for KeyEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyEventKind::KeyDown => write!(f, "keydown"),
            KeyEventKind::KeyUp => write!(f, "keyup"),
        }
    }
}

/// A single key notification as it travels through channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub code: KeyCode,
}

impl KeyEvent {
    pub fn down(code: KeyCode) -> Self {
        Self {
            kind: KeyEventKind::KeyDown,
            code,
        }
    }

    pub fn up(code: KeyCode) -> Self {
        Self {
            kind: KeyEventKind::KeyUp,
            code,
        }
    }

    /// Down followed by up, i.e. one complete keystroke
    pub fn stroke(code: KeyCode) -> [KeyEvent; 2] {
        [Self::down(code), Self::up(code)]
    }
}

/// Callback invoked with the key code of each notification.
///
/// Handlers are compared by `Rc` identity, so a subscriber has to keep the
/// same `Rc` around to be able to unsubscribe it again.
pub type KeyHandler = Rc<dyn Fn(KeyCode)>;

/// Source of key-down / key-up notifications
pub trait InputSource {
    /// Attaches `handler` for `kind`. Attaching the same handler twice is a no-op.
    fn subscribe(&self, kind: KeyEventKind, handler: &KeyHandler);

    /// Detaches `handler` for `kind`. Unknown handlers are ignored.
    fn unsubscribe(&self, kind: KeyEventKind, handler: &KeyHandler);
}

#[derive(Default)]
struct Subscriptions {
    key_down: Vec<KeyHandler>,
    key_up: Vec<KeyHandler>,
}

impl Subscriptions {
    fn for_kind(&mut self, kind: KeyEventKind) -> &mut Vec<KeyHandler> {
        match kind {
            KeyEventKind::KeyDown => &mut self.key_down,
            KeyEventKind::KeyUp => &mut self.key_up,
        }
    }
}

/// In-process [`InputSource`] fed by the host
///
/// Whatever produces keys (a terminal reader, a channel, a test) calls
/// [`key_down`](Self::key_down) / [`key_up`](Self::key_up) and every handler
/// subscribed at that moment is invoked in subscription order.
#[derive(Default)]
pub struct KeyboardInput {
    subscriptions: RefCell<Subscriptions>,
}

impl KeyboardInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&self, code: KeyCode) {
        self.dispatch(KeyEventKind::KeyDown, code);
    }

    pub fn key_up(&self, code: KeyCode) {
        self.dispatch(KeyEventKind::KeyUp, code);
    }

    pub fn dispatch_event(&self, event: KeyEvent) {
        self.dispatch(event.kind, event.code);
    }

    /// One full keystroke: down then up
    pub fn press(&self, code: KeyCode) {
        self.key_down(code);
        self.key_up(code);
    }

    pub fn type_keys(&self, codes: &[KeyCode]) {
        for code in codes {
            self.press(*code);
        }
    }

    pub fn subscriber_count(&self, kind: KeyEventKind) -> usize {
        self.subscriptions.borrow_mut().for_kind(kind).len()
    }

    fn dispatch(&self, kind: KeyEventKind, code: KeyCode) {
        // Snapshot: handlers re-subscribe while they run
        let handlers: Vec<KeyHandler> = self.subscriptions.borrow_mut().for_kind(kind).clone();
        debug!("Dispatching {} {} to {} handlers", kind, code, handlers.len());

        for handler in handlers {
            handler(code);
        }
    }
}

impl InputSource for KeyboardInput {
    fn subscribe(&self, kind: KeyEventKind, handler: &KeyHandler) {
        let mut subscriptions = self.subscriptions.borrow_mut();
        let handlers = subscriptions.for_kind(kind);
        if !handlers.iter().any(|h| Rc::ptr_eq(h, handler)) {
            handlers.push(Rc::clone(handler));
        }
    }

    fn unsubscribe(&self, kind: KeyEventKind, handler: &KeyHandler) {
        self.subscriptions
            .borrow_mut()
            .for_kind(kind)
            .retain(|h| !Rc::ptr_eq(h, handler));
    }
}

impl fmt::Debug for KeyboardInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscriptions = self.subscriptions.borrow();
        f.debug_struct("KeyboardInput")
            .field("key_down", &subscriptions.key_down.len())
            .field("key_up", &subscriptions.key_up.len())
            .finish()
    }
}
