//! One-shot, cancellable timers
//!
//! Two implementations of [`Scheduler`]:
//!
//! * [`ManualScheduler`] - virtual clock, time only moves on [`ManualScheduler::advance`]
//! * [`TokioScheduler`] - real timers on a tokio `LocalSet`

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Callback run once when a timer elapses
pub type TimerCallback = Box<dyn FnOnce()>;

/// Handle of a scheduled timer, used to cancel it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

pub trait Scheduler {
    /// Runs `callback` once after `delay` unless cancelled first
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Cancels a pending timer. Fired or unknown ids are ignored.
    fn cancel(&self, id: TimerId);
}

// =============================================================================
// MANUAL
// =============================================================================

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    // (deadline, id) keeps ties in scheduling order
    pending: BTreeMap<(Duration, u64), TimerCallback>,
}

/// Deterministic scheduler driven by the host
///
/// Nothing fires on its own. The host moves the clock forward with
/// [`advance`](Self::advance), which runs every timer that became due, in
/// deadline order.
#[derive(Default)]
pub struct ManualScheduler {
    clock: RefCell<ManualClock>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed virtual time since creation
    pub fn now(&self) -> Duration {
        self.clock.borrow().now
    }

    /// Number of timers not yet fired or cancelled
    pub fn pending(&self) -> usize {
        self.clock.borrow().pending.len()
    }

    /// Moves the clock forward by `by` and fires all timers due until then.
    ///
    /// Callbacks run without any internal borrow held, so they may schedule
    /// or cancel timers themselves. Timers they schedule inside the window
    /// fire within the same call.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.borrow().now + by;

        loop {
            let due = {
                let mut clock = self.clock.borrow_mut();
                let next = clock
                    .pending
                    .first_key_value()
                    .map(|(key, _)| *key)
                    .filter(|(deadline, _)| *deadline <= target);

                match next {
                    Some(key) => {
                        clock.now = key.0;
                        clock.pending.remove(&key).map(|callback| (key.1, callback))
                    }
                    None => None,
                }
            };

            match due {
                Some((id, callback)) => {
                    debug!("Virtual timer {} fired", TimerId(id));
                    callback();
                }
                None => break,
            }
        }

        self.clock.borrow_mut().now = target;
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let mut clock = self.clock.borrow_mut();
        let id = clock.next_id;
        clock.next_id += 1;
        let deadline = clock.now + delay;
        clock.pending.insert((deadline, id), callback);
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) {
        self.clock
            .borrow_mut()
            .pending
            .retain(|(_, pending_id), _| *pending_id != id.0);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clock = self.clock.borrow();
        f.debug_struct("ManualScheduler")
            .field("now", &clock.now)
            .field("pending", &clock.pending.len())
            .finish()
    }
}

// =============================================================================
// TOKIO
// =============================================================================

/// Scheduler backed by `tokio::time`
///
/// Every timer is a `spawn_local` task, so this has to be used from inside a
/// [`tokio::task::LocalSet`]. Cancellation goes through a per-timer child of
/// one root [`CancellationToken`]; dropping the scheduler cancels whatever is
/// still pending.
pub struct TokioScheduler {
    next_id: Cell<u64>,
    timers: Rc<RefCell<HashMap<TimerId, CancellationToken>>>,
    root: CancellationToken,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            timers: Rc::new(RefCell::new(HashMap::new())),
            root: CancellationToken::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let id = TimerId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let token = self.root.child_token();
        self.timers.borrow_mut().insert(id, token.clone());
        let timers = Rc::clone(&self.timers);

        tokio::task::spawn_local(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("{} cancelled", id);
                }
                _ = tokio::time::sleep(delay) => {
                    // Entry is gone if cancel() ran after the sleep completed
                    let still_pending = timers.borrow_mut().remove(&id).is_some();
                    if still_pending {
                        debug!("{} fired after {:?}", id, delay);
                        callback();
                    }
                }
            }
        });

        id
    }

    fn cancel(&self, id: TimerId) {
        match self.timers.borrow_mut().remove(&id) {
            Some(token) => token.cancel(),
            None => debug!("{} already fired or cancelled", id),
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        let pending = self.timers.borrow().len();
        if pending > 0 {
            warn!("Dropping scheduler with {} pending timers", pending);
        }
        self.timers.borrow_mut().clear();
        self.root.cancel();
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("pending", &self.timers.borrow().len())
            .finish()
    }
}
