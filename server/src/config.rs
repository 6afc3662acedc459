//! Server-Konfiguration
//!
//! Wird beim Start aus einer optionalen TOML-Datei geladen; alle Felder
//! haben Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Die Umgebungsvariablen `PORT` und `ADMIN_TOKEN`
//! ueberschreiben die Dateiwerte zuletzt.

use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Admin-Schnittstelle
    pub admin: AdminEinstellungen,
    /// Liveness-Watchdog
    pub watchdog: WatchdogEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP + WebSocket
    pub bind_adresse: String,
    /// Port fuer HTTP + WebSocket
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 5000,
        }
    }
}

/// Admin-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminEinstellungen {
    /// Gemeinsames Bearer-Token der Admin-Endpunkte.
    /// Der Standardwert ist nur fuer die lokale Entwicklung gedacht.
    pub token: String,
}

impl Default for AdminEinstellungen {
    fn default() -> Self {
        Self {
            token: "admin1234".into(),
        }
    }
}

/// Watchdog-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogEinstellungen {
    /// Abstand zwischen zwei Sweeps in Sekunden
    pub pruef_intervall_sek: u64,
    /// Maximales Alter des letzten Pings in Sekunden
    pub ping_frist_sek: u64,
}

impl Default for WatchdogEinstellungen {
    fn default() -> Self {
        Self {
            pruef_intervall_sek: 5,
            ping_frist_sek: 25,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.umgebung_anwenden()?;
        Ok(config)
    }

    /// Wendet die Umgebungsvariablen `PORT` und `ADMIN_TOKEN` an
    pub fn umgebung_anwenden(&mut self) -> anyhow::Result<()> {
        if let Ok(port) = std::env::var("PORT") {
            self.netzwerk.port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT '{port}' ist keine gueltige Portnummer"))?;
        }
        if let Ok(token) = std::env::var("ADMIN_TOKEN") {
            self.admin.token = token;
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }
}
