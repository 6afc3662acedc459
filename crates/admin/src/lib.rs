//! sprechfunk-admin – HTTP-Verwaltungsschnittstelle
//!
//! Stellt neben den oeffentlichen Endpunkten (`/`, `/status`, `/metrics`)
//! die Token-geschuetzte Admin-API bereit:
//!
//! | Methode | Pfad | Zweck |
//! |---|---|---|
//! | GET | `/admin/status` | Vollstaendiger Zustands-Snapshot |
//! | POST | `/admin/channel/create` | Kanal anlegen (Owner `admin`) |
//! | DELETE | `/admin/channel/:channel` | Kanal loeschen |
//! | POST | `/admin/client/:name/join` | Client in Kanal zwingen |
//! | POST | `/admin/client/:name/leave` | Client aus Kanal loesen |
//! | POST | `/admin/client/:name/mute` | Stummschaltung erzwingen |
//! | POST | `/admin/client/:name/kick` | Client trennen |
//! | GET | `/admin/panel` | HTML-Verwaltungsoberflaeche |
//!
//! Authentifizierung: gemeinsames Token im Header `x-admin-token` oder als
//! Query-Parameter `?token=`; fehlend/falsch ergibt 401.

pub mod auth;
pub mod handlers;
pub mod metrics;
pub mod panel;

use axum::{
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use sprechfunk_relay::Relay;
use std::sync::Arc;

/// Geteilter Zustand aller Admin-Handler
#[derive(Clone)]
pub struct AdminState {
    pub relay: Arc<Relay>,
    pub token: String,
    pub gestartet: DateTime<Utc>,
}

impl AdminState {
    pub fn neu(relay: Arc<Relay>, token: String) -> Self {
        Self {
            relay,
            token,
            gestartet: Utc::now(),
        }
    }
}

/// Erstellt den vollstaendigen Admin- und Status-Router
pub fn admin_router(relay: Arc<Relay>, token: String) -> Router {
    let state = AdminState::neu(relay, token);
    Router::new()
        // Oeffentlich
        .route("/", get(handlers::gesundheit))
        .route("/status", get(handlers::oeffentlicher_status))
        .route("/metrics", get(metrics::metriken))
        // Admin (Token-geschuetzt)
        .route("/admin/status", get(handlers::admin_status))
        .route("/admin/panel", get(panel::admin_panel))
        .route("/admin/channel/create", post(handlers::kanal_erstellen))
        .route("/admin/channel/:channel", delete(handlers::kanal_loeschen))
        .route("/admin/client/:name/join", post(handlers::client_join))
        .route("/admin/client/:name/leave", post(handlers::client_leave))
        .route("/admin/client/:name/mute", post(handlers::client_mute))
        .route("/admin/client/:name/kick", post(handlers::client_kick))
        .with_state(state)
}
