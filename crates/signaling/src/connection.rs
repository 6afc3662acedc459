//! WebSocket-Verbindung – ein Task pro Client
//!
//! Der Task besitzt den Socket exklusiv und pendelt zwischen zwei Quellen:
//! eingehende Frames vom Client und die Send-Queue aus dem Relay. Nur das
//! Schreiben auf den Socket darf suspendieren; alle Zustandsaenderungen
//! laufen synchron durch den Dispatcher ins Relay.
//!
//! Beim Verlassen der Schleife – Client-Close, Schreibfehler oder das
//! `Schliessen`-Sentinel des Watchdogs/Kicks – raeumt `trennen` die
//! Sitzung auf. Trennen und Watchdog-Eviction sind idempotent.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use sprechfunk_relay::{Ausgehend, Relay};
use std::sync::Arc;

use crate::dispatcher::Dispatcher;

/// Router mit dem WebSocket-Endpunkt `GET /ws`
pub fn ws_router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(relay)
}

/// `GET /ws` – Upgrade auf WebSocket
async fn ws_handler(
    State(relay): State<Arc<Relay>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| verbindung_verarbeiten(relay, socket))
}

/// Verarbeitungsschleife einer WebSocket-Verbindung
pub async fn verbindung_verarbeiten(relay: Arc<Relay>, socket: WebSocket) {
    let (conn_id, mut ausgehend_rx) = relay.verbinden();
    let dispatcher = Dispatcher::neu(Arc::clone(&relay));
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            eingehend = stream.next() => {
                match eingehend {
                    Some(Ok(Message::Text(text))) => {
                        dispatcher.text_verarbeiten(&conn_id, &text);
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        dispatcher.binaer_verarbeiten(&conn_id, &bytes);
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Transport-Keepalive; die Liveness regelt der Watchdog
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(conn = %conn_id, "Verbindung vom Client geschlossen");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(conn = %conn_id, fehler = %e, "WebSocket-Lesefehler");
                        break;
                    }
                }
            }

            ausgehend = ausgehend_rx.recv() => {
                match ausgehend {
                    Some(Ausgehend::Signal(nachricht)) => {
                        match nachricht.als_json() {
                            Ok(json) => {
                                if sink.send(Message::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                // Interner Fehler: loggen, Nachricht fallen
                                // lassen, Sitzung weiterlaufen lassen
                                tracing::error!(
                                    conn = %conn_id,
                                    fehler = %e,
                                    "Serialisierung der Antwort fehlgeschlagen"
                                );
                            }
                        }
                    }
                    Some(Ausgehend::Audio(bytes)) => {
                        if sink.send(Message::Binary(bytes)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ausgehend::Schliessen) => {
                        tracing::info!(conn = %conn_id, "Transport wird serverseitig geschlossen");
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    relay.trennen(&conn_id);
    tracing::info!(conn = %conn_id, "Verbindungs-Task beendet");
}
