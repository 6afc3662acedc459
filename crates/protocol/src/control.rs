//! Signalisierungs-Protokoll (WebSocket-Textframes)
//!
//! Alle Steuerungsnachrichten sind JSON-Objekte mit einem `type`-Feld
//! als Diskriminator, Feldnamen klein geschrieben.
//!
//! ## Design
//! - Tagged Enums fuer typsichere Nachrichtentypen
//! - Kaputtes JSON wird stillschweigend verworfen
//! - Ein unbekannter `type` erzeugt eine `error`-Antwort

use serde::{Deserialize, Serialize};
use sprechfunk_core::FunkFehler;

// ---------------------------------------------------------------------------
// Kanal-Info
// ---------------------------------------------------------------------------

/// Infoblock eines Kanals fuer Listen und Antworten
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanalInfo {
    pub name: String,
    pub owner: String,
    pub users: Vec<String>,
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Nachrichten vom Client an den Server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientNachricht {
    /// Namen registrieren (erster Schritt jeder Sitzung)
    Register { name: String },
    /// Kanal anlegen, Eigentuemer wird der eigene Name
    CreateChannel { channel: String },
    /// Kanal betreten
    Join { channel: String },
    /// Kanalwechsel (Leave + Join in einem Schritt)
    Switch { channel: String },
    /// Aktuellen Kanal verlassen
    Leave,
    /// Kanal schliessen (nur Eigentuemer)
    CloseChannel { channel: String },
    /// Kanalliste anfordern
    ListChannels,
    /// Push-to-Talk-Zustand setzen
    Talking { talking: bool },
    /// Selbststummschaltung setzen
    Mute { muted: bool },
    /// Lebenszeichen
    Ping,
}

/// Die `type`-Werte, die [`ClientNachricht`] kennt
const BEKANNTE_TYPEN: &[&str] = &[
    "register",
    "create_channel",
    "join",
    "switch",
    "leave",
    "close_channel",
    "list_channels",
    "talking",
    "mute",
    "ping",
];

/// Ergebnis des Parsens eines eingehenden Textframes
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErgebnis {
    /// Gueltige Nachricht
    Nachricht(ClientNachricht),
    /// JSON war gueltig, aber der `type` ist unbekannt
    UnbekannterTyp(String),
    /// Kaputtes JSON oder unbrauchbare Felder – stillschweigend verwerfen
    Verworfen,
}

impl ClientNachricht {
    /// Parst einen eingehenden Textframe
    pub fn parsen(text: &str) -> ParseErgebnis {
        let wert: serde_json::Value = match serde_json::from_str(text) {
            Ok(w) => w,
            Err(_) => return ParseErgebnis::Verworfen,
        };

        let typ = match wert.get("type").and_then(|t| t.as_str()) {
            Some(t) => t.to_string(),
            None => return ParseErgebnis::Verworfen,
        };

        if !BEKANNTE_TYPEN.contains(&typ.as_str()) {
            return ParseErgebnis::UnbekannterTyp(typ);
        }

        match serde_json::from_value::<ClientNachricht>(wert) {
            Ok(nachricht) => ParseErgebnis::Nachricht(nachricht),
            // Bekannter Typ mit fehlenden/falschen Feldern
            Err(_) => ParseErgebnis::Verworfen,
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Nachrichten vom Server an den Client (Antworten und Benachrichtigungen)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerNachricht {
    /// Antwort auf `register`
    Registered {
        name: String,
        channels: Vec<KanalInfo>,
    },
    /// Antwort auf `join` und `switch`
    Joined {
        channel: String,
        owner: String,
        /// Die anderen Mitglieder (ohne den Beitretenden)
        users: Vec<String>,
    },
    /// Antwort auf `leave`
    Left,
    /// Antwort auf `mute`; bei Admin-Eingriff mit `source:"admin"`
    Muted {
        muted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// Antwort auf `ping`
    Pong,
    /// Jemand ist dem eigenen Kanal beigetreten
    UserJoined { name: String },
    /// Jemand hat einen Kanal verlassen
    UserLeft { name: String, channel: String },
    /// Ein Kanal wurde angelegt
    ChannelCreated { channel: String, owner: String },
    /// Ein Kanal wurde geloescht (an alle Clients)
    ChannelDeleted { channel: String },
    /// Der eigene Kanal wurde unter einem geschlossen
    ChannelClosed { channel: String },
    /// Aktuelle Kanalliste
    Channels { list: Vec<KanalInfo> },
    /// Push-to-Talk-Zustand eines Kanalmitglieds
    Talking { name: String, talking: bool },
    /// Rauswurf durch einen Administrator
    Kicked { message: String },
    /// Fehlerantwort; die Sitzung bleibt offen
    Error { message: String },
}

impl ServerNachricht {
    /// Baut eine `error`-Antwort aus einem Client-sichtbaren Fehler
    pub fn fehler(fehler: &FunkFehler) -> Self {
        Self::Error {
            message: fehler.to_string(),
        }
    }

    /// Serialisiert die Nachricht als JSON-String
    pub fn als_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_parsen() {
        let ergebnis = ClientNachricht::parsen(r#"{"type":"register","name":"anna"}"#);
        assert_eq!(
            ergebnis,
            ParseErgebnis::Nachricht(ClientNachricht::Register {
                name: "anna".into()
            })
        );
    }

    #[test]
    fn nachrichten_ohne_felder_parsen() {
        for (text, erwartet) in [
            (r#"{"type":"leave"}"#, ClientNachricht::Leave),
            (r#"{"type":"ping"}"#, ClientNachricht::Ping),
            (r#"{"type":"list_channels"}"#, ClientNachricht::ListChannels),
        ] {
            assert_eq!(
                ClientNachricht::parsen(text),
                ParseErgebnis::Nachricht(erwartet.clone()),
                "Text: {text}"
            );
        }
    }

    #[test]
    fn unbekannter_typ() {
        let ergebnis = ClientNachricht::parsen(r#"{"type":"frobnicate","x":1}"#);
        assert_eq!(ergebnis, ParseErgebnis::UnbekannterTyp("frobnicate".into()));
    }

    #[test]
    fn kaputtes_json_wird_verworfen() {
        assert_eq!(ClientNachricht::parsen("{nicht json"), ParseErgebnis::Verworfen);
        assert_eq!(ClientNachricht::parsen(""), ParseErgebnis::Verworfen);
        assert_eq!(ClientNachricht::parsen("42"), ParseErgebnis::Verworfen);
        assert_eq!(ClientNachricht::parsen(r#"{"kein_typ":true}"#), ParseErgebnis::Verworfen);
    }

    #[test]
    fn bekannter_typ_mit_fehlenden_feldern_wird_verworfen() {
        assert_eq!(ClientNachricht::parsen(r#"{"type":"join"}"#), ParseErgebnis::Verworfen);
        assert_eq!(
            ClientNachricht::parsen(r#"{"type":"talking","talking":"ja"}"#),
            ParseErgebnis::Verworfen
        );
    }

    #[test]
    fn server_nachricht_wire_format() {
        let json = ServerNachricht::Joined {
            channel: "halle".into(),
            owner: "anna".into(),
            users: vec!["ben".into()],
        }
        .als_json()
        .unwrap();
        assert!(json.contains(r#""type":"joined""#));
        assert!(json.contains(r#""channel":"halle""#));
        assert!(json.contains(r#""owner":"anna""#));

        let json = ServerNachricht::Pong.als_json().unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }

    #[test]
    fn muted_ohne_source_hat_kein_source_feld() {
        let json = ServerNachricht::Muted {
            muted: true,
            source: None,
        }
        .als_json()
        .unwrap();
        assert!(!json.contains("source"));

        let json = ServerNachricht::Muted {
            muted: true,
            source: Some("admin".into()),
        }
        .als_json()
        .unwrap();
        assert!(json.contains(r#""source":"admin""#));
    }

    #[test]
    fn fehler_antwort() {
        let json = ServerNachricht::fehler(&FunkFehler::UnbekannterTyp("abc".into()))
            .als_json()
            .unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("Unknown type: abc"));
    }
}
