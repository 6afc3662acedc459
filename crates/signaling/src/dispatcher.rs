//! Nachrichten-Dispatcher – Routet Client-Nachrichten an das Relay
//!
//! Der Dispatcher ist die Zustandsmaschine der Signalisierung: er parst
//! eingehende Textframes und ruft die passende Relay-Operation auf. Die
//! Zustandspruefung (registriert? im Kanal?) passiert im Relay selbst;
//! Client-sichtbare Fehler gehen als `error{message}` zurueck, alles
//! andere wird nur geloggt. Ein Fehler in einem Handler beruehrt weder
//! den Registry-Zustand noch andere Verbindungen.

use sprechfunk_core::{ConnId, FunkFehler};
use sprechfunk_protocol::control::{ClientNachricht, ParseErgebnis};
use sprechfunk_relay::Relay;
use std::sync::Arc;

/// Zentraler Dispatcher fuer eingehende Nachrichten
pub struct Dispatcher {
    relay: Arc<Relay>,
}

impl Dispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(relay: Arc<Relay>) -> Self {
        Self { relay }
    }

    /// Verarbeitet einen eingehenden Textframe
    ///
    /// Kaputtes JSON wird stillschweigend verworfen; ein unbekannter
    /// `type` bekommt eine `error`-Antwort.
    pub fn text_verarbeiten(&self, conn_id: &ConnId, text: &str) {
        match ClientNachricht::parsen(text) {
            ParseErgebnis::Nachricht(nachricht) => self.verarbeiten(conn_id, nachricht),
            ParseErgebnis::UnbekannterTyp(typ) => {
                tracing::debug!(conn = %conn_id, typ = %typ, "Unbekannter Nachrichtentyp");
                self.relay
                    .fehler_senden(conn_id, &FunkFehler::UnbekannterTyp(typ));
            }
            ParseErgebnis::Verworfen => {
                tracing::debug!(conn = %conn_id, "Unbrauchbarer Textframe verworfen");
            }
        }
    }

    /// Verarbeitet einen eingehenden Binaerframe (Audio)
    pub fn binaer_verarbeiten(&self, conn_id: &ConnId, bytes: &[u8]) {
        self.relay.frame_einspeisen(conn_id, bytes);
    }

    fn verarbeiten(&self, conn_id: &ConnId, nachricht: ClientNachricht) {
        let ergebnis = match nachricht {
            ClientNachricht::Register { name } => self.relay.registrieren(conn_id, &name),
            ClientNachricht::CreateChannel { channel } => {
                self.relay.kanal_erstellen(conn_id, &channel)
            }
            // join und switch teilen sich den Pfad: Beitreten verlaesst
            // einen etwaigen Quellkanal immer zuerst
            ClientNachricht::Join { channel } | ClientNachricht::Switch { channel } => {
                self.relay.beitreten(conn_id, &channel)
            }
            ClientNachricht::Leave => {
                self.relay.verlassen(conn_id);
                Ok(())
            }
            ClientNachricht::CloseChannel { channel } => {
                self.relay.kanal_schliessen(conn_id, &channel)
            }
            ClientNachricht::ListChannels => {
                self.relay.kanal_liste(conn_id);
                Ok(())
            }
            ClientNachricht::Talking { talking } => {
                self.relay.sprechen_setzen(conn_id, talking);
                Ok(())
            }
            ClientNachricht::Mute { muted } => {
                self.relay.stumm_setzen(conn_id, muted);
                Ok(())
            }
            ClientNachricht::Ping => {
                self.relay.ping(conn_id);
                Ok(())
            }
        };

        if let Err(fehler) = ergebnis {
            if fehler.ist_klient_sichtbar() {
                self.relay.fehler_senden(conn_id, &fehler);
            } else {
                tracing::error!(conn = %conn_id, fehler = %fehler, "Handler-Fehler");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sprechfunk_protocol::control::ServerNachricht;
    use sprechfunk_relay::Ausgehend;
    use tokio::sync::mpsc;

    fn signale(rx: &mut mpsc::Receiver<Ausgehend>) -> Vec<ServerNachricht> {
        let mut raus = Vec::new();
        while let Ok(n) = rx.try_recv() {
            if let Ausgehend::Signal(n) = n {
                raus.push(n);
            }
        }
        raus
    }

    #[tokio::test]
    async fn voller_anmeldefluss_ueber_den_draht() {
        let relay = Relay::neu();
        let dispatcher = Dispatcher::neu(Arc::clone(&relay));
        let (conn, mut rx) = relay.verbinden();

        dispatcher.text_verarbeiten(&conn, r#"{"type":"register","name":"a"}"#);
        dispatcher.text_verarbeiten(&conn, r#"{"type":"create_channel","channel":"room"}"#);
        dispatcher.text_verarbeiten(&conn, r#"{"type":"join","channel":"room"}"#);

        let nachrichten = signale(&mut rx);
        assert!(matches!(&nachrichten[0], ServerNachricht::Registered { name, .. } if name == "a"));
        assert!(matches!(
            &nachrichten[1],
            ServerNachricht::ChannelCreated { channel, owner } if channel == "room" && owner == "a"
        ));
        assert!(matches!(&nachrichten[2], ServerNachricht::Channels { .. }));
        assert!(matches!(
            &nachrichten[3],
            ServerNachricht::Joined { channel, owner, users }
                if channel == "room" && owner == "a" && users.is_empty()
        ));
    }

    #[tokio::test]
    async fn unbekannter_typ_bekommt_fehler() {
        let relay = Relay::neu();
        let dispatcher = Dispatcher::neu(Arc::clone(&relay));
        let (conn, mut rx) = relay.verbinden();

        dispatcher.text_verarbeiten(&conn, r#"{"type":"frobnicate"}"#);

        assert_eq!(
            signale(&mut rx),
            vec![ServerNachricht::Error {
                message: "Unknown type: frobnicate".into(),
            }]
        );
    }

    #[tokio::test]
    async fn kaputtes_json_bleibt_stumm() {
        let relay = Relay::neu();
        let dispatcher = Dispatcher::neu(Arc::clone(&relay));
        let (conn, mut rx) = relay.verbinden();

        dispatcher.text_verarbeiten(&conn, "{kein json");
        dispatcher.text_verarbeiten(&conn, "[1,2,3]");

        assert!(signale(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn operation_ohne_registrierung() {
        let relay = Relay::neu();
        let dispatcher = Dispatcher::neu(Arc::clone(&relay));
        let (conn, mut rx) = relay.verbinden();

        dispatcher.text_verarbeiten(&conn, r#"{"type":"create_channel","channel":"x"}"#);

        match signale(&mut rx).first() {
            Some(ServerNachricht::Error { message }) => {
                assert!(message.contains("registrier"), "war: {message}")
            }
            anderes => panic!("Fehler erwartet, war {anderes:?}"),
        }
    }

    #[tokio::test]
    async fn ping_pong_und_mute() {
        let relay = Relay::neu();
        let dispatcher = Dispatcher::neu(Arc::clone(&relay));
        let (conn, mut rx) = relay.verbinden();

        dispatcher.text_verarbeiten(&conn, r#"{"type":"ping"}"#);
        assert_eq!(signale(&mut rx), vec![ServerNachricht::Pong]);

        dispatcher.text_verarbeiten(&conn, r#"{"type":"register","name":"anna"}"#);
        dispatcher.text_verarbeiten(&conn, r#"{"type":"create_channel","channel":"halle"}"#);
        dispatcher.text_verarbeiten(&conn, r#"{"type":"join","channel":"halle"}"#);
        signale(&mut rx);

        dispatcher.text_verarbeiten(&conn, r#"{"type":"mute","muted":true}"#);
        assert_eq!(
            signale(&mut rx),
            vec![ServerNachricht::Muted {
                muted: true,
                source: None,
            }]
        );
    }

    #[tokio::test]
    async fn binaerframes_laufen_in_die_queue() {
        let relay = Relay::neu();
        let dispatcher = Dispatcher::neu(Arc::clone(&relay));
        let (conn, _rx) = relay.verbinden();

        dispatcher.text_verarbeiten(&conn, r#"{"type":"register","name":"anna"}"#);
        dispatcher.text_verarbeiten(&conn, r#"{"type":"create_channel","channel":"halle"}"#);
        dispatcher.text_verarbeiten(&conn, r#"{"type":"join","channel":"halle"}"#);
        dispatcher.text_verarbeiten(&conn, r#"{"type":"talking","talking":true}"#);

        dispatcher.binaer_verarbeiten(&conn, &vec![0u8; 640]);
        assert_eq!(relay.snapshot().clients[0].queue_size, 1);

        // Falsche Laenge bleibt ohne Wirkung
        dispatcher.binaer_verarbeiten(&conn, &vec![0u8; 639]);
        assert_eq!(relay.snapshot().clients[0].queue_size, 1);
    }
}
