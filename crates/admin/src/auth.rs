//! Token-Pruefung fuer die Admin-Endpunkte
//!
//! Das gemeinsame Token kommt als Header `x-admin-token` oder als
//! Query-Parameter `?token=`. Fehlt es oder passt es nicht, antwortet
//! jeder Admin-Handler mit 401 `{"error":"Unauthorized"}`.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::AdminState;

/// Query-Parameter der Admin-Endpunkte
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Extrahiert das Token aus Header oder Query
pub fn token_aus_anfrage<'a>(headers: &'a HeaderMap, query: &'a TokenQuery) -> Option<&'a str> {
    headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .or(query.token.as_deref())
}

/// Prueft das Admin-Token einer Anfrage
///
/// Gibt bei Fehlschlag die fertige 401-Antwort zurueck, die der Handler
/// direkt durchreicht.
pub fn berechtigung_pruefen(
    state: &AdminState,
    headers: &HeaderMap,
    query: &TokenQuery,
) -> Result<(), Response> {
    match token_aus_anfrage(headers, query) {
        Some(token) if token == state.token => Ok(()),
        _ => {
            tracing::debug!("Admin-Anfrage ohne gueltiges Token abgewiesen");
            Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_aus_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-admin-token", HeaderValue::from_static("geheim"));
        let query = TokenQuery::default();
        assert_eq!(token_aus_anfrage(&headers, &query), Some("geheim"));
    }

    #[test]
    fn token_aus_query() {
        let headers = HeaderMap::new();
        let query = TokenQuery {
            token: Some("geheim".into()),
        };
        assert_eq!(token_aus_anfrage(&headers, &query), Some("geheim"));
    }

    #[test]
    fn header_schlaegt_query() {
        let mut headers = HeaderMap::new();
        headers.insert("x-admin-token", HeaderValue::from_static("kopf"));
        let query = TokenQuery {
            token: Some("query".into()),
        };
        assert_eq!(token_aus_anfrage(&headers, &query), Some("kopf"));
    }

    #[test]
    fn ohne_token_leer() {
        let headers = HeaderMap::new();
        let query = TokenQuery::default();
        assert_eq!(token_aus_anfrage(&headers, &query), None);
    }
}
