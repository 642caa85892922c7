use color_eyre::{eyre::eyre, Result};
use secret_code::config::{DetectorConfig, KeySpec};
use secret_code::detector::OutcomeEvent;
use secret_code::host::KeyEvent;
use secret_code::keys;
use secret_code::service::DetectorHandle;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup()?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = DetectorConfig::load_or_default(config_path.as_deref())
        .await
        .map_err(|e| eyre!("Failed to load config: {}", e))?;

    info!(
        "Waiting for [{}] within {}ms, type key names separated by spaces",
        keys::describe(&config.resolve_sequence()?),
        config.time_threshold_ms
    );

    LocalSet::new().run_until(run(config)).await
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;

    let level = max_level(std::env::var("RUST_LOG").ok().as_deref());
    init_logging(level);
    Ok(())
}

// RUST_LOG holds a plain level here ("debug", "WARN"), anything else means info
fn max_level(rust_log: Option<&str>) -> Level {
    rust_log
        .and_then(|value| value.trim().parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

fn init_logging(level: Level) {
    // Single threaded runtime, thread ids carry no information
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn run(config: DetectorConfig) -> Result<()> {
    let grace = Duration::from_millis(config.time_threshold_ms);
    let mut handle = DetectorHandle::spawn_local(config)?;
    let mut reader = tokio::task::spawn_local(read_keys(handle.key_sender()));

    loop {
        tokio::select! {
            result = &mut reader => {
                result??;
                debug!("Input closed");
                break;
            }

            outcome = handle.next_outcome() => match outcome {
                Some(event) => report(&event),
                None => break,
            }
        }
    }

    // Any attempt still armed ends within the threshold
    while let Ok(Some(event)) = tokio::time::timeout(grace, handle.next_outcome()).await {
        report(&event);
    }

    let processed = handle.shutdown().await?;
    info!("Processed {} key events", processed);
    Ok(())
}

// Every token on stdin is one keystroke
async fn read_keys(sender: mpsc::Sender<KeyEvent>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        for token in line.split_whitespace() {
            match KeySpec::Name(token.to_string()).resolve() {
                Ok(code) => {
                    for event in KeyEvent::stroke(code) {
                        sender
                            .send(event)
                            .await
                            .map_err(|e| eyre!("Detector stopped: {}", e))?;
                    }
                }
                Err(e) => warn!("Skipping input: {}", e),
            }
        }
    }

    Ok(())
}

fn report(event: &OutcomeEvent) {
    let elapsed = event.concluded_at - event.armed_at;
    info!(
        "{} after [{}] in {}ms",
        event.outcome,
        keys::describe(&event.captured),
        elapsed.num_milliseconds()
    );
    println!("{}", event.outcome);
}
