//! Detector configuration
//!
//! A config file is optional. Every field has a default, so an empty file
//! yields the Konami code with a three second window:
//!
//! ```toml
//! sequence = ["up", "up", "down", "down", "left", "right", "left", "right", "b", "a"]
//! time_threshold_ms = 3000
//! on_mismatch = "fail"        # or "await_overflow"
//! ```
//!
//! Keys may be given by name (see [`crate::keys`]) or as raw codes.

use crate::detector::{DetectorError, DetectorSettings, MismatchPolicy, DEFAULT_TIME_THRESHOLD};
use crate::keys::{self, KeyCode, KONAMI};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Directory below the home directory holding the config file
pub const CONFIG_DIR: &str = ".secret-code";
pub const CONFIG_FILE: &str = "config.toml";

/// One entry of a configured sequence
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum KeySpec {
    Code(KeyCode),
    Name(String),
}

impl KeySpec {
    pub fn resolve(&self) -> Result<KeyCode, DetectorError> {
        match self {
            KeySpec::Code(code) => Ok(*code),
            KeySpec::Name(name) => match keys::code_for_name(name) {
                Some(code) => Ok(code),
                // "38" written as a string
                None => name
                    .trim()
                    .parse::<KeyCode>()
                    .map_err(|_| DetectorError::UnknownKey(name.clone())),
            },
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub sequence: Vec<KeySpec>,
    pub time_threshold_ms: u64,
    pub on_mismatch: MismatchPolicy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sequence: KONAMI.iter().map(|code| KeySpec::Code(*code)).collect(),
            time_threshold_ms: DEFAULT_TIME_THRESHOLD.as_millis() as u64,
            on_mismatch: MismatchPolicy::default(),
        }
    }
}

impl DetectorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, DetectorError> {
        toml::from_str(content).map_err(|e| DetectorError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, DetectorError> {
        toml::to_string(self).map_err(|e| DetectorError::Config(e.to_string()))
    }

    /// Reads and parses a config file
    pub async fn load(path: &Path) -> Result<Self, DetectorError> {
        debug!("Loading detector config from {}", path.display());
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            DetectorError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise the file at [`default_path`](Self::default_path)
    /// if it exists, otherwise the defaults
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, DetectorError> {
        if let Some(path) = path {
            return Self::load(path).await;
        }

        let default_path = Self::default_path();
        let exists = tokio::fs::try_exists(&default_path).await.map_err(|e| {
            DetectorError::Config(format!(
                "Failed to check {}: {}",
                default_path.display(),
                e
            ))
        })?;

        if exists {
            Self::load(&default_path).await
        } else {
            info!(
                "No config at {}, using the Konami code",
                default_path.display()
            );
            Ok(Self::default())
        }
    }

    /// `$HOME/.secret-code/config.toml`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| {
            warn!("Could not determine home directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub fn resolve_sequence(&self) -> Result<Vec<KeyCode>, DetectorError> {
        if self.sequence.is_empty() {
            return Err(DetectorError::InvalidArgument(
                "sequence must not be empty".to_string(),
            ));
        }
        self.sequence.iter().map(KeySpec::resolve).collect()
    }

    pub fn settings(&self) -> Result<DetectorSettings, DetectorError> {
        if self.time_threshold_ms == 0 {
            return Err(DetectorError::InvalidArgument(
                "time_threshold_ms must be greater than zero".to_string(),
            ));
        }
        Ok(DetectorSettings {
            time_threshold: Duration::from_millis(self.time_threshold_ms),
            on_mismatch: self.on_mismatch,
        })
    }

    pub fn validate(&self) -> Result<(), DetectorError> {
        self.resolve_sequence()?;
        self.settings()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{A, B, UP};

    #[test]
    fn empty_document_gives_konami_defaults() {
        let config = DetectorConfig::from_toml_str("").unwrap();
        assert_eq!(config.resolve_sequence().unwrap(), KONAMI.to_vec());
        assert_eq!(config.time_threshold_ms, 3000);
        assert_eq!(config.on_mismatch, MismatchPolicy::Fail);
    }

    #[test]
    fn names_and_codes_can_be_mixed() {
        let config = DetectorConfig::from_toml_str(
            r#"
            sequence = ["Up", 66, "a", "65"]
            time_threshold_ms = 1500
            on_mismatch = "await_overflow"
            "#,
        )
        .unwrap();

        assert_eq!(config.resolve_sequence().unwrap(), vec![UP, B, A, 65]);
        let settings = config.settings().unwrap();
        assert_eq!(settings.time_threshold, Duration::from_millis(1500));
        assert_eq!(settings.on_mismatch, MismatchPolicy::AwaitOverflow);
    }

    #[test]
    fn unknown_key_name_is_reported() {
        let config = DetectorConfig::from_toml_str(r#"sequence = ["up", "hyper"]"#).unwrap();
        match config.resolve_sequence() {
            Err(DetectorError::UnknownKey(name)) => assert_eq!(name, "hyper"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn empty_sequence_and_zero_threshold_are_invalid() {
        let empty = DetectorConfig::from_toml_str("sequence = []").unwrap();
        assert!(matches!(
            empty.validate(),
            Err(DetectorError::InvalidArgument(_))
        ));

        let zero = DetectorConfig::from_toml_str("time_threshold_ms = 0").unwrap();
        assert!(matches!(
            zero.validate(),
            Err(DetectorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let result = DetectorConfig::from_toml_str("sequence = [");
        assert!(matches!(result, Err(DetectorError::Config(_))));
    }

    #[test]
    fn serialized_config_parses_back() {
        let config = DetectorConfig {
            sequence: vec![KeySpec::Name("esc".to_string()), KeySpec::Code(13)],
            time_threshold_ms: 800,
            on_mismatch: MismatchPolicy::AwaitOverflow,
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(DetectorConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn default_path_ends_in_config_dir() {
        let path = DetectorConfig::default_path();
        assert!(path.ends_with(Path::new(CONFIG_DIR).join(CONFIG_FILE)));
    }

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("secret-code-{}-{}", std::process::id(), name))
    }

    #[tokio::test]
    async fn load_reads_an_existing_file() {
        let path = scratch_file("load.toml");
        tokio::fs::write(&path, "sequence = [\"b\", 65]\ntime_threshold_ms = 1200\n")
            .await
            .unwrap();

        let result = DetectorConfig::load(&path).await;
        let _ = tokio::fs::remove_file(&path).await;

        let config = result.unwrap();
        assert_eq!(config.resolve_sequence().unwrap(), vec![B, A]);
        assert_eq!(config.time_threshold_ms, 1200);
        assert_eq!(config.on_mismatch, MismatchPolicy::Fail);
    }

    #[tokio::test]
    async fn load_or_default_prefers_the_given_path() {
        let path = scratch_file("explicit.toml");
        tokio::fs::write(&path, "sequence = [\"esc\"]\n").await.unwrap();

        let result = DetectorConfig::load_or_default(Some(&path)).await;
        let _ = tokio::fs::remove_file(&path).await;

        assert_eq!(result.unwrap().resolve_sequence().unwrap(), vec![27]);
    }

    #[tokio::test]
    async fn load_validates_after_parsing() {
        let path = scratch_file("empty-sequence.toml");
        tokio::fs::write(&path, "sequence = []\n").await.unwrap();

        let result = DetectorConfig::load(&path).await;
        let _ = tokio::fs::remove_file(&path).await;

        assert!(matches!(result, Err(DetectorError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn missing_explicit_file_is_an_error() {
        let result =
            DetectorConfig::load_or_default(Some(Path::new("/definitely/not/here.toml"))).await;
        assert!(matches!(result, Err(DetectorError::Config(_))));
    }
}
