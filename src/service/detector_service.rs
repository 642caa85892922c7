//! Detector service with statum state machine for channel driven input
//!
//! Runs a [`CodeDetector`] inside a tokio `LocalSet` task. Key events arrive
//! on an mpsc channel, outcomes leave on another one, the timeout runs on
//! real tokio timers.
//!
//! # State Machine
//!
//! ```text
//! Initializing ──► Configured ──► Running ──► Stopped
//!     (configure)     (activate)    (shutdown / channel closed)
//! ```
//!
//! # Architecture
//!
//! ```text
//! KeyEvent ──► [KeyboardInput] ──► [CodeDetector] ──► OutcomeEvent
//!    ▲                                  │                 │
//!    │                           [TokioScheduler]         ▼
//! Input Channel                                     Output Channel
//! ```

use crate::config::DetectorConfig;
use crate::detector::{CodeDetector, DetectorError, OutcomeEvent, FAILED, SUCCESS, TIMEOUT};
use crate::host::{KeyEvent, KeyboardInput, TokioScheduler};
use crate::keys::{self, KeyCode};
use statum::{machine, state};
use std::rc::Rc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Buffered key events between producer and detector task
pub const KEY_CHANNEL_CAPACITY: usize = 100;

/// States for the detector service lifecycle using statum
#[state]
#[derive(Debug, Clone)]
pub enum DetectorServiceState {
    Initializing, // Config stored, nothing built yet
    Configured,   // Detector built and wired to the outcome channel
    Running,      // Feeding key events in the main loop
    Stopped,      // Loop ended, ready for cleanup
}

#[machine]
pub struct DetectorService<S: DetectorServiceState> {
    config: DetectorConfig,
    event_receiver: mpsc::Receiver<KeyEvent>,
    outcome_sender: mpsc::UnboundedSender<OutcomeEvent>,
    input: Rc<KeyboardInput>,
    detector: Option<CodeDetector>,
    processed: u64,
}

impl<S: DetectorServiceState> DetectorService<S> {
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Number of key events handed to the detector so far
    pub fn processed(&self) -> u64 {
        self.processed
    }
}

impl DetectorService<Initializing> {
    pub fn create(
        config: DetectorConfig,
        event_receiver: mpsc::Receiver<KeyEvent>,
        outcome_sender: mpsc::UnboundedSender<OutcomeEvent>,
    ) -> Self {
        info!("Initializing detector service");

        Self::new(
            config,
            event_receiver,
            outcome_sender,
            Rc::new(KeyboardInput::new()),
            None, // detector
            0,    // processed
        )
    }

    /// Builds the detector and forwards its outcomes into the outcome channel
    pub fn configure(mut self) -> Result<DetectorService<Configured>, DetectorError> {
        info!("Configuring detector service");

        let scheduler = Rc::new(TokioScheduler::new());
        let detector = match CodeDetector::from_config(&self.config, self.input.clone(), scheduler)
        {
            Ok(detector) => detector,
            Err(e) => {
                error!("Failed to build detector: {}", e);
                return Err(e);
            }
        };

        let sender = self.outcome_sender.clone();
        detector.listen(&format!("{} {} {}", SUCCESS, FAILED, TIMEOUT), move |event| {
            if let Err(e) = sender.send(event.clone()) {
                warn!("Outcome receiver gone, dropping {}: {}", event.outcome, e);
            }
        });

        debug!(
            "Detector ready for [{}]",
            keys::describe(detector.sequence())
        );
        self.detector = Some(detector);
        Ok(self.transition())
    }
}

impl DetectorService<Configured> {
    pub fn activate(self) -> DetectorService<Running> {
        info!("Activating detector service");
        self.transition()
    }
}

impl DetectorService<Running> {
    /// Hands one key event to the detector
    pub fn feed(&mut self, event: KeyEvent) {
        debug!("Feeding {} {}", event.kind, event.code);
        self.input.dispatch_event(event);
        self.processed += 1;
    }

    /// Main loop, ends on shutdown signal or when all key senders are gone
    pub async fn run_until_shutdown(
        mut self,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> DetectorService<Stopped> {
        info!("Starting key event loop");

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }

                event = self.event_receiver.recv() => {
                    match event {
                        Some(event) => self.feed(event),
                        None => {
                            info!("Key channel closed");
                            break;
                        }
                    }
                }
            }
        }

        info!("Transitioning to Stopped after {} events", self.processed);
        self.transition()
    }
}

impl DetectorService<Stopped> {
    /// Destroys the detector, returns the number of processed events
    pub fn shutdown(mut self) -> u64 {
        if let Some(detector) = self.detector.take() {
            detector.destroy();
        }
        info!("Detector service shut down");
        self.processed
    }
}

/// Handle for a detector service running in a `spawn_local` task
///
/// # Example
///
/// ```rust,no_run
/// use secret_code::config::DetectorConfig;
/// use secret_code::keys::KONAMI;
/// use secret_code::service::DetectorHandle;
/// use tokio::task::LocalSet;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// LocalSet::new()
///     .run_until(async {
///         let mut handle = DetectorHandle::spawn_local(DetectorConfig::default())?;
///         for code in KONAMI {
///             handle.press(code).await?;
///         }
///         if let Some(event) = handle.next_outcome().await {
///             println!("{}", event.outcome);
///         }
///         handle.shutdown().await?;
///         Ok::<(), Box<dyn std::error::Error>>(())
///     })
///     .await
/// # }
/// ```
#[derive(Debug)]
pub struct DetectorHandle {
    key_sender: mpsc::Sender<KeyEvent>,
    outcome_receiver: mpsc::UnboundedReceiver<OutcomeEvent>,
    task_handle: Option<JoinHandle<u64>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl DetectorHandle {
    /// Configures, activates and spawns a service.
    ///
    /// Must be called from inside a [`tokio::task::LocalSet`].
    pub fn spawn_local(config: DetectorConfig) -> Result<Self, DetectorError> {
        let (key_sender, key_receiver) = mpsc::channel(KEY_CHANNEL_CAPACITY);
        let (outcome_sender, outcome_receiver) = mpsc::unbounded_channel();

        let service = DetectorService::create(config, key_receiver, outcome_sender)
            .configure()?
            .activate();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task_handle = tokio::task::spawn_local(async move {
            let stopped = service.run_until_shutdown(shutdown_rx).await;
            stopped.shutdown()
        });

        info!("Detector service spawned");
        Ok(Self {
            key_sender,
            outcome_receiver,
            task_handle: Some(task_handle),
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Additional sender for producers living elsewhere
    pub fn key_sender(&self) -> mpsc::Sender<KeyEvent> {
        self.key_sender.clone()
    }

    pub async fn send(&self, event: KeyEvent) -> Result<(), DetectorError> {
        self.key_sender
            .send(event)
            .await
            .map_err(|e| DetectorError::ChannelError(format!("Failed to send key event: {}", e)))
    }

    /// Sends a full keystroke (down, then up)
    pub async fn press(&self, code: KeyCode) -> Result<(), DetectorError> {
        for event in KeyEvent::stroke(code) {
            self.send(event).await?;
        }
        Ok(())
    }

    /// Waits for the next outcome, `None` once the service has stopped
    pub async fn next_outcome(&mut self) -> Option<OutcomeEvent> {
        self.outcome_receiver.recv().await
    }

    pub fn try_next_outcome(&mut self) -> Option<OutcomeEvent> {
        self.outcome_receiver.try_recv().ok()
    }

    /// Stops the service and waits for the task.
    ///
    /// Returns the number of key events the service processed.
    pub async fn shutdown(&mut self) -> Result<u64, DetectorError> {
        debug!("Sending shutdown signal to detector service");

        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).is_err() {
                warn!("Detector task already terminated");
            }
        }

        match self.task_handle.take() {
            Some(handle) => match handle.await {
                Ok(processed) => Ok(processed),
                Err(e) => {
                    error!("Detector task panicked: {}", e);
                    Err(DetectorError::ChannelError(format!(
                        "Detector task failed: {}",
                        e
                    )))
                }
            },
            None => {
                debug!("Detector service already shut down");
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{MismatchPolicy, Outcome};
    use crate::keys::{DOWN, KONAMI, UP};
    use std::time::Duration;
    use tokio::task::LocalSet;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn konami_over_channel_succeeds() {
        LocalSet::new()
            .run_until(async {
                let mut handle = DetectorHandle::spawn_local(DetectorConfig::default()).unwrap();
                for code in KONAMI {
                    handle.press(code).await.unwrap();
                }

                let event = handle.next_outcome().await.unwrap();
                assert_eq!(event.outcome, Outcome::Success);
                assert_eq!(event.captured, KONAMI.to_vec());

                assert_eq!(handle.shutdown().await.unwrap(), 20);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn partial_entry_times_out_on_tokio_timer() {
        LocalSet::new()
            .run_until(async {
                let mut handle = DetectorHandle::spawn_local(DetectorConfig::default()).unwrap();
                let start = Instant::now();

                handle.send(KeyEvent::down(UP)).await.unwrap();
                handle.send(KeyEvent::up(UP)).await.unwrap();
                handle.send(KeyEvent::up(DOWN)).await.unwrap();

                let event = handle.next_outcome().await.unwrap();
                assert_eq!(event.outcome, Outcome::Timeout);
                assert_eq!(event.captured, vec![UP, DOWN]);
                assert!(start.elapsed() >= Duration::from_millis(3000));

                tokio::time::sleep(Duration::from_secs(10)).await;
                assert!(handle.try_next_outcome().is_none());
                handle.shutdown().await.unwrap();
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_policy_fails_on_eleventh_key() {
        LocalSet::new()
            .run_until(async {
                let config = DetectorConfig {
                    on_mismatch: MismatchPolicy::AwaitOverflow,
                    ..DetectorConfig::default()
                };
                let mut handle = DetectorHandle::spawn_local(config).unwrap();

                handle.send(KeyEvent::down(UP)).await.unwrap();
                for code in 0..11 {
                    handle.send(KeyEvent::up(code)).await.unwrap();
                }

                let event = handle.next_outcome().await.unwrap();
                assert_eq!(event.outcome, Outcome::Failed);
                assert_eq!(event.captured.len(), 11);
                handle.shutdown().await.unwrap();
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn closing_the_key_channel_stops_the_service() {
        LocalSet::new()
            .run_until(async {
                let (key_sender, key_receiver) = mpsc::channel(4);
                let (outcome_sender, mut outcome_receiver) = mpsc::unbounded_channel();
                let service = DetectorService::create(
                    DetectorConfig::default(),
                    key_receiver,
                    outcome_sender,
                )
                .configure()
                .unwrap()
                .activate();

                let (_shutdown_tx, shutdown_rx) = oneshot::channel();
                key_sender.send(KeyEvent::down(UP)).await.unwrap();
                drop(key_sender);

                let stopped = service.run_until_shutdown(shutdown_rx).await;
                assert_eq!(stopped.processed(), 1);
                assert_eq!(stopped.shutdown(), 1);

                // destroyed while armed, the timeout never fires
                tokio::time::sleep(Duration::from_secs(5)).await;
                assert!(outcome_receiver.try_recv().is_err());
            })
            .await;
    }

    #[test]
    fn invalid_config_fails_to_configure() {
        let (_key_sender, key_receiver) = mpsc::channel(1);
        let (outcome_sender, _outcome_receiver) = mpsc::unbounded_channel();
        let config = DetectorConfig {
            sequence: Vec::new(),
            ..DetectorConfig::default()
        };

        let result = DetectorService::create(config, key_receiver, outcome_sender).configure();
        assert!(matches!(result, Err(DetectorError::InvalidArgument(_))));
    }
}
