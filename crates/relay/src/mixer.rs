//! Mixer-Task – der 20-ms-Takt eines aktiven Kanals
//!
//! Pro Kanal mit Mitgliedern laeuft genau ein Task. Jeder Tick ruft
//! [`Relay::mix_tick`] auf; die gesamte Mix-Arbeit passiert dort unter dem
//! Registry-Lock und bleibt weit unter dem Tick-Budget. Der Task endet,
//! wenn der Tick Stopp meldet (Kanal leer oder geloescht) oder das
//! Stop-Signal aus dem Register kommt; ein spaeterer Join startet einen
//! frischen Task.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::registry::Relay;
use sprechfunk_protocol::frame::FRAME_DAUER_MS;

/// Tick-Intervall des Mixers (entspricht der Frame-Dauer)
pub const TICK: Duration = Duration::from_millis(FRAME_DAUER_MS);

/// Startet den Mixer-Task fuer einen Kanal
///
/// Wird ausschliesslich vom Register beim Uebergang Idle -> Laeuft
/// aufgerufen; der zugehoerige `stop`-Sender liegt im Kanaleintrag.
pub(crate) fn starten(relay: Arc<Relay>, kanal: String, mut stop: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut takt = tokio::time::interval(TICK);
        // Verpasste Ticks nicht nachholen – lieber einen Frame auslassen
        // als einen Burst erzeugen
        takt.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(kanal = %kanal, "Mixer gestartet");

        loop {
            tokio::select! {
                _ = takt.tick() => {
                    if !relay.mix_tick(&kanal) {
                        break;
                    }
                }
                ergebnis = stop.changed() => {
                    if ergebnis.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(kanal = %kanal, "Mixer beendet");
    });
}
