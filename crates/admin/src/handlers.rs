//! REST-Handler der Admin- und Status-Endpunkte

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use sprechfunk_core::FunkFehler;

use crate::auth::{berechtigung_pruefen, TokenQuery};
use crate::AdminState;

/// Uebersetzt einen Relay-Fehler in die passende HTTP-Antwort
fn fehler_antwort(fehler: &FunkFehler) -> Response {
    let status = match fehler {
        FunkFehler::ClientNichtGefunden(_) | FunkFehler::KanalNichtGefunden(_) => {
            StatusCode::NOT_FOUND
        }
        FunkFehler::KanalExistiertBereits(_) => StatusCode::CONFLICT,
        FunkFehler::Konfiguration(_) | FunkFehler::Intern(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(json!({ "error": fehler.to_string() }))).into_response()
}

// ---------------------------------------------------------------------------
// Oeffentliche Endpunkte
// ---------------------------------------------------------------------------

/// `GET /` – simpler Lebenszeichen-Text
pub async fn gesundheit(State(state): State<AdminState>) -> String {
    format!(
        "Sprechfunk Relay – online seit {}s, {} Clients, {} Kanaele\n",
        state.relay.uptime_sek(),
        state.relay.klienten_anzahl(),
        state.relay.kanal_anzahl()
    )
}

/// `GET /status` – oeffentlicher Zustands-Ueberblick
pub async fn oeffentlicher_status(State(state): State<AdminState>) -> Response {
    let snapshot = state.relay.snapshot();
    Json(json!({
        "uptime": snapshot.uptime,
        "totalClients": snapshot.clients.len(),
        "channels": snapshot.channels,
    }))
    .into_response()
}

// ---------------------------------------------------------------------------
// Admin-Endpunkte
// ---------------------------------------------------------------------------

/// `GET /admin/status` – vollstaendiger Snapshot
pub async fn admin_status(
    State(state): State<AdminState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(antwort) = berechtigung_pruefen(&state, &headers, &query) {
        return antwort;
    }

    let snapshot = state.relay.snapshot();
    Json(json!({
        "uptime": snapshot.uptime,
        "started_at": state.gestartet.to_rfc3339(),
        "clients": snapshot.clients,
        "channels": snapshot.channels,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct KanalBody {
    pub channel: Option<String>,
}

/// `POST /admin/channel/create` – Kanal mit Owner-Sentinel `admin` anlegen
pub async fn kanal_erstellen(
    State(state): State<AdminState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    body: Option<Json<KanalBody>>,
) -> Response {
    if let Err(antwort) = berechtigung_pruefen(&state, &headers, &query) {
        return antwort;
    }

    let Some(kanal) = body.and_then(|Json(b)| b.channel).filter(|k| !k.trim().is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing channel" })),
        )
            .into_response();
    };

    match state.relay.admin_kanal_erstellen(&kanal) {
        Ok(()) => Json(json!({ "ok": true, "channel": kanal.trim() })).into_response(),
        Err(e) => fehler_antwort(&e),
    }
}

/// `DELETE /admin/channel/:channel` – Kanal ohne Eigentuemer-Pruefung loeschen
pub async fn kanal_loeschen(
    State(state): State<AdminState>,
    Path(kanal): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(antwort) = berechtigung_pruefen(&state, &headers, &query) {
        return antwort;
    }

    match state.relay.admin_kanal_loeschen(&kanal) {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(e) => fehler_antwort(&e),
    }
}

/// `POST /admin/client/:name/join` – Client in einen Kanal zwingen
pub async fn client_join(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    body: Option<Json<KanalBody>>,
) -> Response {
    if let Err(antwort) = berechtigung_pruefen(&state, &headers, &query) {
        return antwort;
    }

    let Some(kanal) = body.and_then(|Json(b)| b.channel).filter(|k| !k.trim().is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing channel" })),
        )
            .into_response();
    };

    match state.relay.admin_beitritt_erzwingen(&name, &kanal) {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(e) => fehler_antwort(&e),
    }
}

/// `POST /admin/client/:name/leave` – Client aus seinem Kanal loesen
pub async fn client_leave(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(antwort) = berechtigung_pruefen(&state, &headers, &query) {
        return antwort;
    }

    match state.relay.admin_verlassen_erzwingen(&name) {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(e) => fehler_antwort(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct MuteBody {
    pub muted: Option<bool>,
}

/// `POST /admin/client/:name/mute` – Stummschaltung erzwingen (Default: an)
pub async fn client_mute(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    body: Option<Json<MuteBody>>,
) -> Response {
    if let Err(antwort) = berechtigung_pruefen(&state, &headers, &query) {
        return antwort;
    }

    let muted = body.and_then(|Json(b)| b.muted).unwrap_or(true);
    match state.relay.admin_stumm_erzwingen(&name, muted) {
        Ok(()) => Json(json!({ "ok": true, "name": name, "muted": muted })).into_response(),
        Err(e) => fehler_antwort(&e),
    }
}

/// `POST /admin/client/:name/kick` – Client vom Server werfen
pub async fn client_kick(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(antwort) = berechtigung_pruefen(&state, &headers, &query) {
        return antwort;
    }

    match state.relay.admin_kick(&name) {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(e) => fehler_antwort(&e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
