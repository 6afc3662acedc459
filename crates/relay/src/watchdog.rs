//! Liveness-Watchdog – entfernt stumme Sitzungen
//!
//! Clients muessen regelmaessig `ping` senden. Der Watchdog laeuft als
//! globaler Task und prueft alle Sitzungen in einem festen Intervall;
//! wessen letztes Lebenszeichen aelter als die Frist ist, wird aus seinem
//! Kanal geloest, aus der Sitzungstabelle entfernt und sein Transport
//! geschlossen. Auf den Keepalive des Transports verlaesst sich das Relay
//! nicht – dieser Sweep ist der einzige Abraeum-Mechanismus fuer stumme
//! Verbindungen.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::registry::Relay;

/// Zeitparameter des Watchdogs
#[derive(Debug, Clone, Copy)]
pub struct WatchdogConfig {
    /// Abstand zwischen zwei Sweeps
    pub intervall: Duration,
    /// Maximales Alter des letzten Lebenszeichens
    pub frist: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            intervall: Duration::from_secs(5),
            frist: Duration::from_secs(25),
        }
    }
}

/// Startet den Watchdog-Task
pub fn starten(relay: Arc<Relay>, config: WatchdogConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut takt = tokio::time::interval(config.intervall);
        takt.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            intervall_sek = config.intervall.as_secs_f64(),
            frist_sek = config.frist.as_secs_f64(),
            "Watchdog gestartet"
        );

        loop {
            takt.tick().await;
            let entfernt = relay.abgelaufene_evizieren(config.frist);
            if entfernt > 0 {
                tracing::info!(entfernt, "Watchdog-Sweep hat Sitzungen entfernt");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Ausgehend;

    #[tokio::test]
    async fn watchdog_schliesst_stumme_verbindungen() {
        let relay = Relay::neu();
        let (_conn, mut rx) = relay.verbinden();

        let handle = starten(
            Arc::clone(&relay),
            WatchdogConfig {
                intervall: Duration::from_millis(20),
                frist: Duration::from_millis(40),
            },
        );

        // Ohne Pings muss die Sitzung binnen weniger Sweeps verschwinden
        let mut geschlossen = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            while let Ok(nachricht) = rx.try_recv() {
                if nachricht == Ausgehend::Schliessen {
                    geschlossen = true;
                }
            }
            if geschlossen {
                break;
            }
        }
        handle.abort();

        assert!(geschlossen, "Watchdog muss den Transport schliessen");
        assert_eq!(relay.klienten_anzahl(), 0);
    }
}
