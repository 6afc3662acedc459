//! sprechfunk-signaling – WebSocket-Signalisierung
//!
//! Dieser Crate bindet das Relay an den Transport:
//!
//! ```text
//! GET /ws (WebSocket-Upgrade)
//!     |
//!     v
//! verbindung_verarbeiten (pro Verbindung ein Task)
//!     |  Zustaende: unregistriert -> registriert -> im Kanal
//!     |  Textframes  -> Dispatcher -> Relay-Operationen
//!     |  Binaerframes -> Audio-Ingress (still verworfen wenn ungueltig)
//!     |  Send-Queue  -> WebSocket (Antworten, Broadcasts, Audio)
//!     v
//! Relay (sprechfunk-relay)
//! ```

pub mod connection;
pub mod dispatcher;

// Bequeme Re-Exporte
pub use connection::ws_router;
pub use dispatcher::Dispatcher;
