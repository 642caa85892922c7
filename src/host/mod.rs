//! Host collaborators of the detector
//!
//! 1. [`input_source`] - key-down / key-up subscription
//! 2. [`scheduler`] - one-shot cancellable timers
//!
//! Both are traits so the detector can run against a real keyboard and tokio
//! timers, or against a fully virtual host.

pub mod input_source;
pub mod scheduler;

pub use input_source::{InputSource, KeyEvent, KeyEventKind, KeyHandler, KeyboardInput};
pub use scheduler::{ManualScheduler, Scheduler, TimerCallback, TimerId, TokioScheduler};
