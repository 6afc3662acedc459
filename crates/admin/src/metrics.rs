//! Prometheus-Metriken des Relays
//!
//! Endpoint: `GET /metrics` (unauthentifiziert, wie der Health-Text)
//!
//! Registrierte Metriken:
//! - `sprechfunk_connected_clients` – Gauge: aktuell verbundene Clients
//! - `sprechfunk_channels_total` – Gauge: angelegte Kanaele
//! - `sprechfunk_channels_active` – Gauge: Kanaele mit laufendem Mixer
//! - `sprechfunk_frames_accepted_total` – Counter: angenommene Audio-Frames
//! - `sprechfunk_frames_dropped_total` – Counter: verworfene Audio-Frames
//! - `sprechfunk_frames_mixed_total` – Counter: gemischte Ausgabe-Frames
//!
//! Die Zaehler leben als Atomics im Relay; die Registry wird pro Scrape
//! aus dem aktuellen Stand aufgebaut.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use crate::AdminState;

/// `GET /metrics` – Prometheus-Text-Format
pub async fn metriken(State(state): State<AdminState>) -> Response {
    match metriken_text(&state) {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(fehler = %e, "Metriken-Encoding fehlgeschlagen");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn metriken_text(state: &AdminState) -> prometheus::Result<String> {
    let registry = Registry::new();

    let verbunden = IntGauge::new(
        "sprechfunk_connected_clients",
        "Aktuell verbundene Clients",
    )?;
    let kanaele = IntGauge::new("sprechfunk_channels_total", "Angelegte Kanaele")?;
    let aktiv = IntGauge::new(
        "sprechfunk_channels_active",
        "Kanaele mit laufendem Mixer",
    )?;
    let angenommen = IntCounter::new(
        "sprechfunk_frames_accepted_total",
        "Angenommene Audio-Frames",
    )?;
    let verworfen = IntCounter::new(
        "sprechfunk_frames_dropped_total",
        "Verworfene Audio-Frames",
    )?;
    let gemischt = IntCounter::new(
        "sprechfunk_frames_mixed_total",
        "Gemischte Ausgabe-Frames",
    )?;

    registry.register(Box::new(verbunden.clone()))?;
    registry.register(Box::new(kanaele.clone()))?;
    registry.register(Box::new(aktiv.clone()))?;
    registry.register(Box::new(angenommen.clone()))?;
    registry.register(Box::new(verworfen.clone()))?;
    registry.register(Box::new(gemischt.clone()))?;

    let relay = &state.relay;
    verbunden.set(relay.klienten_anzahl() as i64);
    kanaele.set(relay.kanal_anzahl() as i64);
    aktiv.set(relay.aktive_kanal_anzahl() as i64);

    let statistik = relay.statistik();
    angenommen.inc_by(statistik.frames_angenommen);
    verworfen.inc_by(statistik.frames_verworfen);
    gemischt.inc_by(statistik.frames_gemischt);

    let mut puffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut puffer)?;
    Ok(String::from_utf8(puffer).unwrap_or_default())
}
