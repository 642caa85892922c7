//! Secret code detection on top of an [`InputSource`] and a [`Scheduler`]
//!
//! The detector listens for the first key of its sequence on key-down. Once
//! that key arrives it is *armed*: key-up events are captured into a buffer
//! and a timeout is scheduled. The attempt is judged as soon as the buffer
//! reaches the length of the sequence, never per key, so an early wrong key
//! only shows up once enough keys were entered.
//!
//! Every concluded attempt publishes one outcome on the detector's
//! [`Notifier`] and the detector goes back to waiting for the first key.

use super::error::DetectorError;
use super::notifier::{Listener, Notifier};
use crate::config::DetectorConfig;
use crate::host::{InputSource, KeyEventKind, KeyHandler, Scheduler, TimerId};
use crate::keys::{self, KeyCode};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, info};

/// Event name published when the code was entered correctly
pub const SUCCESS: &str = "success";
/// Event name published when the code was entered wrong
pub const FAILED: &str = "failed";
/// Event name published when the attempt ran out of time
pub const TIMEOUT: &str = "timeout";

/// Time to enter the code, counted from the first key
pub const DEFAULT_TIME_THRESHOLD: Duration = Duration::from_millis(3000);

/// The three ways an attempt can end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
    Timeout,
}

impl Outcome {
    pub fn event_name(&self) -> &'static str {
        match self {
            Outcome::Success => SUCCESS,
            Outcome::Failed => FAILED,
            Outcome::Timeout => TIMEOUT,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event_name())
    }
}

/// What happens when the buffer is full but does not match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Publish `failed` right away
    #[default]
    Fail,
    /// Keep capturing; the next key-up overflows the buffer and fails,
    /// or the timeout ends the attempt
    AwaitOverflow,
}

/// Payload delivered with every outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeEvent {
    pub outcome: Outcome,
    /// Keys captured between arming and the outcome
    pub captured: Vec<KeyCode>,
    pub armed_at: DateTime<Local>,
    pub concluded_at: DateTime<Local>,
}

/// Tunables of a detector
#[derive(Clone, Debug)]
pub struct DetectorSettings {
    /// Time allowed for the whole code, measured from the arming key-down
    pub time_threshold: Duration,

    /// Reaction to a full buffer that does not match the sequence
    pub on_mismatch: MismatchPolicy,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            time_threshold: DEFAULT_TIME_THRESHOLD,
            on_mismatch: MismatchPolicy::Fail,
        }
    }
}

enum Phase {
    Idle,
    Armed {
        buffer: Vec<KeyCode>,
        timer: TimerId,
        attempt: u64,
        armed_at: DateTime<Local>,
    },
}

struct DetectorState {
    enabled: bool,
    phase: Phase,
    next_attempt: u64,
}

struct Inner {
    sequence: Vec<KeyCode>,
    settings: DetectorSettings,
    state: RefCell<DetectorState>,
    input: Rc<dyn InputSource>,
    scheduler: Rc<dyn Scheduler>,
    notifier: Notifier<OutcomeEvent>,
    // Stable handlers, the input source removes them by identity
    start_handler: KeyHandler,
    input_handler: KeyHandler,
    weak_self: Weak<Inner>,
}

/// Detects a fixed key sequence entered within a time window
///
/// # Example
///
/// ```rust
/// use secret_code::detector::{CodeDetector, SUCCESS};
/// use secret_code::host::{KeyboardInput, ManualScheduler};
/// use secret_code::keys::KONAMI;
/// use std::rc::Rc;
///
/// let input = Rc::new(KeyboardInput::new());
/// let scheduler = Rc::new(ManualScheduler::new());
/// let detector = CodeDetector::new(KONAMI.to_vec(), None, input.clone(), scheduler)?;
///
/// detector.listen(SUCCESS, |_| println!("cheat mode on"));
/// input.type_keys(&KONAMI);
/// # Ok::<(), secret_code::detector::DetectorError>(())
/// ```
pub struct CodeDetector {
    inner: Rc<Inner>,
}

impl CodeDetector {
    /// Creates a detector and enables it
    ///
    /// # Errors
    ///
    /// [`DetectorError::InvalidArgument`] if `sequence` is empty or the time
    /// threshold is zero.
    pub fn new(
        sequence: Vec<KeyCode>,
        settings: Option<DetectorSettings>,
        input: Rc<dyn InputSource>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Result<Self, DetectorError> {
        let settings = settings.unwrap_or_default();

        if sequence.is_empty() {
            return Err(DetectorError::InvalidArgument(
                "a secret code needs at least one key".to_string(),
            ));
        }
        if settings.time_threshold.is_zero() {
            return Err(DetectorError::InvalidArgument(
                "time threshold must be greater than zero".to_string(),
            ));
        }

        info!(
            "Creating code detector for [{}] with {:?} to enter it",
            keys::describe(&sequence),
            settings.time_threshold
        );

        let inner = Rc::new_cyclic(|weak: &Weak<Inner>| {
            let on_down = weak.clone();
            let start_handler: KeyHandler = Rc::new(move |code: KeyCode| {
                if let Some(inner) = on_down.upgrade() {
                    inner.on_start_code_input(code);
                }
            });

            let on_up = weak.clone();
            let input_handler: KeyHandler = Rc::new(move |code: KeyCode| {
                if let Some(inner) = on_up.upgrade() {
                    inner.on_code_input(code);
                }
            });

            Inner {
                sequence,
                settings,
                state: RefCell::new(DetectorState {
                    enabled: false,
                    phase: Phase::Idle,
                    next_attempt: 0,
                }),
                input,
                scheduler,
                notifier: Notifier::new(),
                start_handler,
                input_handler,
                weak_self: weak.clone(),
            }
        });

        inner.set_enabled(true);
        Ok(Self { inner })
    }

    /// Creates a detector from a validated [`DetectorConfig`]
    pub fn from_config(
        config: &DetectorConfig,
        input: Rc<dyn InputSource>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Result<Self, DetectorError> {
        let sequence = config.resolve_sequence()?;
        let settings = config.settings()?;
        Self::new(sequence, Some(settings), input, scheduler)
    }

    /// Turns listening on or off. Either way the current attempt is dropped
    /// without publishing anything.
    pub fn enable(&self, enabled: bool) {
        self.inner.set_enabled(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.borrow().enabled
    }

    /// Whether the first key was seen and keys are being captured
    pub fn is_armed(&self) -> bool {
        matches!(self.inner.state.borrow().phase, Phase::Armed { .. })
    }

    /// Snapshot of the keys captured in the current attempt
    pub fn captured(&self) -> Vec<KeyCode> {
        match &self.inner.state.borrow().phase {
            Phase::Armed { buffer, .. } => buffer.clone(),
            Phase::Idle => Vec::new(),
        }
    }

    /// Drops the current attempt without publishing anything.
    ///
    /// An enabled detector waits for the first key again. A disabled one
    /// stays deaf until [`enable(true)`](Self::enable).
    pub fn reset(&self) {
        self.inner.reset();
    }

    /// Detaches from the input source and releases the detector
    pub fn destroy(self) {
        info!("Destroying code detector");
        self.inner.reset();
        self.inner.set_enabled(false);
        self.inner.notifier.off(None, None);
    }

    pub fn sequence(&self) -> &[KeyCode] {
        &self.inner.sequence
    }

    pub fn time_threshold(&self) -> Duration {
        self.inner.settings.time_threshold
    }

    pub fn on_mismatch(&self) -> MismatchPolicy {
        self.inner.settings.on_mismatch
    }

    pub fn notifier(&self) -> &Notifier<OutcomeEvent> {
        &self.inner.notifier
    }

    pub fn on(&self, names: &str, listener: &Listener<OutcomeEvent>) -> &Self {
        self.inner.notifier.on(names, listener);
        self
    }

    pub fn off(&self, names: Option<&str>, listener: Option<&Listener<OutcomeEvent>>) -> &Self {
        self.inner.notifier.off(names, listener);
        self
    }

    /// Registers a closure and hands back the listener for a later [`off`](Self::off)
    pub fn listen<F>(&self, names: &str, callback: F) -> Listener<OutcomeEvent>
    where
        F: Fn(&OutcomeEvent) + 'static,
    {
        let listener: Listener<OutcomeEvent> = Rc::new(callback);
        self.inner.notifier.on(names, &listener);
        listener
    }
}

impl Drop for CodeDetector {
    fn drop(&mut self) {
        self.inner.input.unsubscribe(KeyEventKind::KeyUp, &self.inner.input_handler);
        self.inner.input.unsubscribe(KeyEventKind::KeyDown, &self.inner.start_handler);
        self.inner.disarm();
    }
}

impl fmt::Debug for CodeDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeDetector")
            .field("sequence", &self.inner.sequence)
            .field("settings", &self.inner.settings)
            .field("enabled", &self.is_enabled())
            .field("captured", &self.captured())
            .finish()
    }
}

impl Inner {
    fn set_enabled(&self, enabled: bool) {
        debug!("Setting detector enabled={}", enabled);
        self.state.borrow_mut().enabled = enabled;

        self.input.unsubscribe(KeyEventKind::KeyUp, &self.input_handler);
        self.input.unsubscribe(KeyEventKind::KeyDown, &self.start_handler);
        self.disarm();

        if enabled {
            self.reset();
        }
    }

    fn reset(&self) {
        self.input.unsubscribe(KeyEventKind::KeyUp, &self.input_handler);
        if self.state.borrow().enabled {
            self.input.subscribe(KeyEventKind::KeyDown, &self.start_handler);
        }
        self.disarm();
    }

    /// Back to Idle, cancelling the pending timeout
    fn disarm(&self) {
        let phase = std::mem::replace(&mut self.state.borrow_mut().phase, Phase::Idle);
        if let Phase::Armed { timer, buffer, .. } = phase {
            debug!("Disarming, discarding {} captured keys", buffer.len());
            self.scheduler.cancel(timer);
        }
    }

    // key-down while waiting for the first key
    fn on_start_code_input(&self, code: KeyCode) {
        let attempt = {
            let mut state = self.state.borrow_mut();
            if !state.enabled || matches!(state.phase, Phase::Armed { .. }) {
                return;
            }
            if code != self.sequence[0] {
                return;
            }
            let attempt = state.next_attempt;
            state.next_attempt += 1;
            attempt
        };

        self.input.subscribe(KeyEventKind::KeyUp, &self.input_handler);
        self.input.unsubscribe(KeyEventKind::KeyDown, &self.start_handler);

        let weak = self.weak_self.clone();
        let timer = self.scheduler.schedule(
            self.settings.time_threshold,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_timeout(attempt);
                }
            }),
        );

        debug!("Armed by {} (attempt {}), {}", code, attempt, timer);
        self.state.borrow_mut().phase = Phase::Armed {
            buffer: Vec::with_capacity(self.sequence.len()),
            timer,
            attempt,
            armed_at: Local::now(),
        };
    }

    // key-up while armed
    fn on_code_input(&self, code: KeyCode) {
        let verdict = {
            let mut state = self.state.borrow_mut();
            if !state.enabled {
                return;
            }
            let Phase::Armed { buffer, .. } = &mut state.phase else {
                return;
            };

            buffer.push(code);
            let expected = self.sequence.len();

            if buffer.len() < expected {
                debug!("Captured {} ({}/{})", code, buffer.len(), expected);
                return;
            }

            if buffer.len() > expected {
                Some(Outcome::Failed)
            } else if *buffer == self.sequence {
                Some(Outcome::Success)
            } else {
                match self.settings.on_mismatch {
                    MismatchPolicy::Fail => Some(Outcome::Failed),
                    MismatchPolicy::AwaitOverflow => {
                        debug!("Full buffer does not match, waiting for overflow");
                        None
                    }
                }
            }
        };

        if let Some(outcome) = verdict {
            self.conclude(outcome);
        }
    }

    fn on_timeout(&self, attempt: u64) {
        let current = match &self.state.borrow().phase {
            Phase::Armed { attempt: armed, .. } => *armed == attempt,
            Phase::Idle => false,
        };
        if !current {
            debug!("Ignoring stale timeout of attempt {}", attempt);
            return;
        }
        self.conclude(Outcome::Timeout);
    }

    /// Publishes the outcome, then resets
    fn conclude(&self, outcome: Outcome) {
        let event = match &self.state.borrow().phase {
            Phase::Armed {
                buffer, armed_at, ..
            } => OutcomeEvent {
                outcome,
                captured: buffer.clone(),
                armed_at: *armed_at,
                concluded_at: Local::now(),
            },
            Phase::Idle => return,
        };

        info!(
            "Secret code attempt ended: {} after [{}]",
            outcome,
            keys::describe(&event.captured)
        );
        self.notifier.trigger(outcome.event_name(), &event);
        self.reset();
    }
}
