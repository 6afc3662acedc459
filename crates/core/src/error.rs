//! Fehlertypen fuer Sprechfunk
//!
//! Zentraler Fehler-Enum fuer alle Crates. Die Display-Strings der
//! Signalisierungs-Varianten gehen woertlich als `error{message}` an den
//! Client; `Unknown type` behaelt deshalb seine englische Wire-Form.

use thiserror::Error;

/// Globaler Result-Alias fuer Sprechfunk
pub type Result<T> = std::result::Result<T, FunkFehler>;

/// Alle moeglichen Fehler im Sprechfunk-System
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunkFehler {
    // --- Signalisierung (Client-sichtbar) ---
    #[error("Nicht registriert – bitte zuerst einen Namen registrieren")]
    NichtRegistriert,

    #[error("Name darf nicht leer sein")]
    LeererName,

    #[error("Name '{0}' ist reserviert")]
    NameReserviert(String),

    #[error("Umbenennen nicht moeglich solange ein Kanal betreten ist")]
    UmbenennenImKanal,

    #[error("Kanal '{0}' existiert bereits")]
    KanalExistiertBereits(String),

    #[error("Kanal '{0}' nicht gefunden")]
    KanalNichtGefunden(String),

    #[error("Name '{name}' ist im Kanal '{kanal}' bereits vergeben")]
    NameImKanalVergeben { name: String, kanal: String },

    #[error("Nur der Eigentuemer darf den Kanal '{0}' schliessen")]
    NichtEigentuemer(String),

    #[error("Unknown type: {0}")]
    UnbekannterTyp(String),

    // --- Admin-Pfad ---
    #[error("Client '{0}' nicht gefunden")]
    ClientNichtGefunden(String),

    // --- Intern ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl FunkFehler {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// True wenn der Fehler als `error{message}` an den Client geht
    /// (im Gegensatz zu internen Fehlern, die nur geloggt werden)
    pub fn ist_klient_sichtbar(&self) -> bool {
        !matches!(self, Self::Konfiguration(_) | Self::Intern(_))
    }
}
