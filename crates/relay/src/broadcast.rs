//! Send-Queues aller verbundenen Clients
//!
//! Der `Broadcaster` verwaltet pro Verbindung eine begrenzte mpsc-Queue.
//! Der Verbindungs-Task liest aus seiner Queue und schreibt auf den
//! WebSocket; der Kern legt Nachrichten ausschliesslich via `try_send` ab.
//! Blockiert der Transport, wird verworfen statt gewartet – der Mischer
//! darf niemals haengen.
//!
//! Alle ausgehenden Nachrichten einer Sitzung – Antworten, Broadcasts und
//! Audio-Frames – laufen durch dieselbe Queue und behalten damit ihre
//! Einreihungs-Reihenfolge.

use dashmap::DashMap;
use sprechfunk_core::ConnId;
use sprechfunk_protocol::ServerNachricht;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Groesse der Send-Queue pro Client
const SEND_QUEUE_GROESSE: usize = 64;

/// Eine ausgehende Einheit auf dem Weg zum Transport
#[derive(Debug, Clone, PartialEq)]
pub enum Ausgehend {
    /// Signalisierungs-Nachricht (wird im Verbindungs-Task serialisiert)
    Signal(ServerNachricht),
    /// Fertig kodierter 640-Byte-PCM-Frame
    Audio(Vec<u8>),
    /// Der Verbindungs-Task soll den Transport schliessen und enden
    Schliessen,
}

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
#[derive(Debug, Clone)]
pub struct ClientSender {
    pub conn_id: ConnId,
    tx: mpsc::Sender<Ausgehend>,
}

impl ClientSender {
    /// Reiht eine Nachricht nicht-blockierend ein
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, nachricht: Ausgehend) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn = %self.conn_id, "Send-Queue voll – Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(conn = %self.conn_id, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Zentrale Send-Queue-Verwaltung fuer alle Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct Broadcaster {
    inner: Arc<DashMap<ConnId, ClientSender>>,
}

impl Broadcaster {
    /// Erstellt einen leeren Broadcaster
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Verbindung und gibt ihre Empfangs-Queue zurueck
    pub fn registrieren(&self, conn_id: ConnId) -> mpsc::Receiver<Ausgehend> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        self.inner.insert(conn_id, ClientSender { conn_id, tx });
        rx
    }

    /// Entfernt eine Verbindung aus dem Broadcaster
    pub fn entfernen(&self, conn_id: &ConnId) {
        self.inner.remove(conn_id);
    }

    /// Sendet eine Signalisierungs-Nachricht an eine Verbindung
    pub fn signal(&self, conn_id: &ConnId, nachricht: ServerNachricht) -> bool {
        match self.inner.get(conn_id) {
            Some(sender) => sender.senden(Ausgehend::Signal(nachricht)),
            None => false,
        }
    }

    /// Sendet einen Audio-Frame an eine Verbindung
    pub fn audio(&self, conn_id: &ConnId, frame: Vec<u8>) -> bool {
        match self.inner.get(conn_id) {
            Some(sender) => sender.senden(Ausgehend::Audio(frame)),
            None => false,
        }
    }

    /// Weist den Verbindungs-Task an, den Transport zu schliessen
    pub fn schliessen(&self, conn_id: &ConnId) {
        if let Some(sender) = self.inner.get(conn_id) {
            sender.senden(Ausgehend::Schliessen);
        }
    }

    /// Sendet eine Nachricht an eine Liste von Verbindungen
    ///
    /// Gibt die Anzahl der erfolgreichen Einreihungen zurueck.
    pub fn signal_an_viele(&self, ziele: &[ConnId], nachricht: &ServerNachricht) -> usize {
        let mut gesendet = 0;
        for conn_id in ziele {
            if self.signal(conn_id, nachricht.clone()) {
                gesendet += 1;
            }
        }
        gesendet
    }

    /// Sendet eine Nachricht an alle Verbindungen
    pub fn signal_an_alle(&self, nachricht: &ServerNachricht) -> usize {
        let mut gesendet = 0;
        self.inner.iter().for_each(|eintrag| {
            if eintrag.value().senden(Ausgehend::Signal(nachricht.clone())) {
                gesendet += 1;
            }
        });
        gesendet
    }

    /// Anzahl der registrierten Verbindungen
    pub fn anzahl(&self) -> usize {
        self.inner.len()
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_registriert(&self, conn_id: &ConnId) -> bool {
        self.inner.contains_key(conn_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
