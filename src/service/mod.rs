//! Async runtime bridge for the detector
//!
//! The detector itself is single threaded and callback driven. This module
//! puts it behind channels so producers can feed it from async code:
//!
//! ```text
//! Producer ─[KeyEvent]→ DetectorService (LocalSet task) ─[OutcomeEvent]→ Consumer
//! ```

pub mod detector_service;

pub use detector_service::{
    Configured, DetectorHandle, DetectorService, DetectorServiceState, Initializing, Running,
    Stopped, KEY_CHANNEL_CAPACITY,
};
