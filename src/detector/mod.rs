//! Secret code detection
//!
//! # State Machine
//!
//! ```text
//!            key-down == sequence[0]
//!   Idle ───────────────────────────────► Armed
//!    ▲                                      │ key-up: capture
//!    │   success / failed / timeout         │ timer: threshold
//!    └──────────────────────────────────────┘
//!
//!   enable(false): detach everything, no outcome
//!   reset():       back to Idle, no outcome
//! ```
//!
//! Outcomes are published on a [`Notifier`] under the names
//! [`SUCCESS`], [`FAILED`] and [`TIMEOUT`].

pub mod code_detector;
pub mod error;
pub mod notifier;

pub use code_detector::{
    CodeDetector, DetectorSettings, MismatchPolicy, Outcome, OutcomeEvent,
    DEFAULT_TIME_THRESHOLD, FAILED, SUCCESS, TIMEOUT,
};
pub use error::DetectorError;
pub use notifier::{Listener, Notifier};
