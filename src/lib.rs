//! Secret code detection for keyboard input
//!
//! Watches key events for a fixed sequence (the Konami code by default) typed
//! within a time window and publishes `success`, `failed` or `timeout`.
//!
//! 1. [`keys`] - key code constants and the [`keys::KONAMI`] preset
//! 2. [`host`] - input source and timer abstractions the detector runs on
//! 3. [`detector`] - the detection state machine and its notifier
//! 4. [`config`] - TOML configuration
//! 5. [`service`] - channel driven tokio wrapper
//!
//! # Architecture
//!
//! ```text
//! InputSource ──► CodeDetector ──► Notifier ──► listeners
//!                      │
//!                  Scheduler (timeout)
//! ```

pub mod config;
pub mod detector;
pub mod host;
pub mod keys;
pub mod service;
