//! Gemeinsame Identifikationstypen fuer Sprechfunk
//!
//! Verbindungen bekommen beim Accept eine zufaellige `ConnId`. Sie ist
//! unabhaengig vom registrierten Namen: Namen sind erst nach `register`
//! bekannt und global nicht eindeutig.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Verbindungs-ID (Schluessel der Session-Tabelle)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId(pub Uuid);

impl ConnId {
    /// Erstellt eine neue zufaellige ConnId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}
