//! Fehlerdefinitionen für den Code-Detektor

use thiserror::Error;

/// Fehlertypen für Detektor, Konfiguration und Service
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Ungültiges Argument bei der Konstruktion (z.B. leere Sequenz)
    #[error("Ungültiges Argument: {0}")]
    InvalidArgument(String),

    /// Ein Tastenname konnte nicht aufgelöst werden
    #[error("Unbekannte Taste: {0}")]
    UnknownKey(String),

    /// Fehler beim Laden oder Parsen der Konfiguration
    #[error("Konfigurationsfehler: {0}")]
    Config(String),

    /// Fehler bei der Kommunikation über Kanäle
    #[error("Kanalfehler: {0}")]
    ChannelError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_detail() {
        let unknown = DetectorError::UnknownKey("hyper".to_string());
        assert_eq!(unknown.to_string(), "Unbekannte Taste: hyper");

        let config = DetectorError::Config("sequence = [".to_string());
        assert_eq!(config.to_string(), "Konfigurationsfehler: sequence = [");
    }
}
