//! sprechfunk-server – Zusammenbau und Start
//!
//! Baut aus den Teil-Crates den lauffaehigen Server: ein Relay, ein
//! Watchdog-Task, ein axum-Router mit WebSocket- und Admin-Endpunkten
//! auf EINEM Port. Der Prozess beendet sich mit Exit-Code 0 nach einem
//! sauberen Shutdown (Ctrl-C) und ungleich 0, wenn der Port nicht
//! gebunden werden kann.

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use config::ServerConfig;
use sprechfunk_relay::{watchdog, Relay, WatchdogConfig};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Relay anlegen (Kanaele + Sitzungen, in-memory)
    /// 2. Watchdog-Task starten
    /// 3. Router zusammensetzen (WebSocket + Admin/Status)
    /// 4. Listener binden – einziger fataler Fehler
    /// 5. Bedienen bis Ctrl-C / SIGTERM
    pub async fn starten(self) -> Result<()> {
        let relay = Relay::neu();

        let watchdog_handle = watchdog::starten(
            Arc::clone(&relay),
            WatchdogConfig {
                intervall: Duration::from_secs(self.config.watchdog.pruef_intervall_sek),
                frist: Duration::from_secs(self.config.watchdog.ping_frist_sek),
            },
        );

        let app = sprechfunk_signaling::ws_router(Arc::clone(&relay))
            .merge(sprechfunk_admin::admin_router(
                Arc::clone(&relay),
                self.config.admin.token.clone(),
            ));

        let bind_adresse = self.config.bind_adresse();
        let listener = tokio::net::TcpListener::bind(&bind_adresse)
            .await
            .map_err(|e| anyhow::anyhow!("Port-Bindung an {bind_adresse} fehlgeschlagen: {e}"))?;

        tracing::info!(
            adresse = %bind_adresse,
            "Sprechfunk-Relay bereit (WebSocket unter /ws, Admin unter /admin)"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        watchdog_handle.abort();
        tracing::info!("Server sauber beendet");
        Ok(())
    }
}

/// Wartet auf Ctrl-C
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown-Signal empfangen"),
        Err(e) => tracing::error!(fehler = %e, "Shutdown-Signal nicht verfuegbar"),
    }
}
