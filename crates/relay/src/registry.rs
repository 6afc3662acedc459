//! Kanalregister und Sitzungstabelle – der Verwalter des Relay-Zustands
//!
//! Beide Tabellen liegen hinter EINEM exklusiven Mutex. Jede Mutation –
//! Signalisierungs-Handler, Mixer-Tick, Watchdog-Sweep, Admin-Aufruf –
//! laeuft durch diesen Lock; gehalten wird er nie ueber einen Await-Punkt.
//! Antworten und Broadcasts werden unter demselben Lock-Abschnitt in die
//! Send-Queues eingereiht, damit pro Sitzung die Einreihungs-Reihenfolge
//! der Semantik entspricht (z.B. `joined` vor dem zugehoerigen
//! `user_joined`-Fan-out, `channels` immer mit Nach-Aenderungs-Stand).
//!
//! ## Lebenszyklen
//! - Sitzung: Accept -> `register` setzt den Namen -> Trennung/Eviction
//! - Kanal: `create_channel`/Admin -> bleibt auch leer bestehen ->
//!   nur `close_channel` (Eigentuemer) oder Admin-Loeschung entfernt ihn
//! - Mitgliedschaft: Join -> Leave/Wechsel/Trennung/Kick/Kanal-Schliessung

use parking_lot::Mutex;
use serde::Serialize;
use sprechfunk_core::{ConnId, FunkFehler, Result};
use sprechfunk_protocol::control::{KanalInfo, ServerNachricht};
use sprechfunk_protocol::frame;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::watch;

use crate::broadcast::{Ausgehend, Broadcaster};
use crate::jitter_buffer::JitterBuffer;
use crate::mixer;

/// Eigentuemer-Sentinel fuer Kanaele, die ueber die Admin-Schnittstelle
/// angelegt wurden. Der Name ist bei `register` gesperrt, damit er nie
/// mit einem echten Client kollidiert.
pub const ADMIN_EIGENTUEMER: &str = "admin";

/// Abschiedstext beim Admin-Kick (Wire-Literal, Clients zeigen ihn an)
const KICK_MELDUNG: &str = "Disconnected by an administrator";

// ---------------------------------------------------------------------------
// Zustandstypen
// ---------------------------------------------------------------------------

/// Eine live Verbindung samt Identitaet
#[derive(Debug)]
struct Sitzung {
    conn_id: ConnId,
    /// Gesetzt durch das erste `register` (getrimmt, nicht leer)
    name: Option<String>,
    /// Name des aktuell betretenen Kanals
    kanal: Option<String>,
    verbunden_seit: Instant,
    /// Startet auf `verbunden_seit`; damit ist die Watchdog-Frist
    /// `max(letzter_ping, verbunden_seit)` einfach `letzter_ping`
    letzter_ping: Instant,
}

/// Mitgliedschaft eines Namens in einem Kanal
#[derive(Debug)]
struct Mitglied {
    conn_id: ConnId,
    queue: JitterBuffer,
    talking: bool,
    muted: bool,
}

impl Mitglied {
    fn neu(conn_id: ConnId) -> Self {
        Self {
            conn_id,
            queue: JitterBuffer::neu(),
            talking: false,
            muted: false,
        }
    }
}

/// Zustand des Kanal-Mixers
enum MixerZustand {
    /// Kein Mixer-Task (Kanal leer)
    Idle,
    /// Mixer-Task laeuft; `stop` beendet ihn vorzeitig
    Laeuft { stop: watch::Sender<bool> },
}

impl MixerZustand {
    fn laeuft(&self) -> bool {
        matches!(self, Self::Laeuft { .. })
    }
}

/// Ein benannter Kanal mit seiner Mitgliedertabelle
struct Kanal {
    name: String,
    /// Name des Erstellers; aendert sich nach dem Anlegen nie
    owner: String,
    mitglieder: HashMap<String, Mitglied>,
    mixer: MixerZustand,
}

impl Kanal {
    fn neu(name: String, owner: String) -> Self {
        Self {
            name,
            owner,
            mitglieder: HashMap::new(),
            mixer: MixerZustand::Idle,
        }
    }
}

/// Der gesperrte Kernzustand: beide Tabellen unter einem Dach
#[derive(Default)]
struct RelayInner {
    kanaele: HashMap<String, Kanal>,
    sitzungen: HashMap<ConnId, Sitzung>,
}

// ---------------------------------------------------------------------------
// Statistik
// ---------------------------------------------------------------------------

/// Laufende Zaehler des Relays (lock-frei, fuer /metrics)
#[derive(Debug, Default)]
pub struct RelayStatistik {
    frames_angenommen: AtomicU64,
    frames_verworfen: AtomicU64,
    frames_gemischt: AtomicU64,
}

/// Momentaufnahme der Zaehler
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatistikSnapshot {
    pub frames_angenommen: u64,
    pub frames_verworfen: u64,
    pub frames_gemischt: u64,
}

// ---------------------------------------------------------------------------
// Snapshot (Admin-Sicht)
// ---------------------------------------------------------------------------

/// Momentaufnahme des Relay-Zustands fuer die Admin-Schnittstelle
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Uptime in Sekunden
    pub uptime: u64,
    pub clients: Vec<ClientSnapshot>,
    pub channels: Vec<KanalSnapshot>,
}

/// Sicht auf eine Sitzung
#[derive(Debug, Clone, Serialize)]
pub struct ClientSnapshot {
    pub name: Option<String>,
    pub channel: Option<String>,
    pub muted: bool,
    pub talking: bool,
    pub queue_size: usize,
    pub connected_secs: u64,
}

/// Sicht auf einen Kanal
#[derive(Debug, Clone, Serialize)]
pub struct KanalSnapshot {
    pub name: String,
    pub owner: String,
    pub user_count: usize,
    pub users: Vec<String>,
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// Der zentrale Verwalter von Kanaelen, Sitzungen und Send-Queues
pub struct Relay {
    inner: Mutex<RelayInner>,
    broadcaster: Broadcaster,
    statistik: RelayStatistik,
    start_zeit: Instant,
}

impl Relay {
    /// Erstellt ein leeres Relay
    pub fn neu() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(RelayInner::default()),
            broadcaster: Broadcaster::neu(),
            statistik: RelayStatistik::default(),
            start_zeit: Instant::now(),
        })
    }

    // -----------------------------------------------------------------------
    // Verbindungs-Lebenszyklus
    // -----------------------------------------------------------------------

    /// Nimmt eine neue Verbindung auf
    ///
    /// Gibt die ConnId und die Empfangs-Queue zurueck, aus der der
    /// Verbindungs-Task liest und auf den Transport schreibt.
    pub fn verbinden(&self) -> (ConnId, mpsc::Receiver<Ausgehend>) {
        let conn_id = ConnId::new();
        let rx = self.broadcaster.registrieren(conn_id);

        let jetzt = Instant::now();
        self.inner.lock().sitzungen.insert(
            conn_id,
            Sitzung {
                conn_id,
                name: None,
                kanal: None,
                verbunden_seit: jetzt,
                letzter_ping: jetzt,
            },
        );

        tracing::info!(conn = %conn_id, "Neue Verbindung aufgenommen");
        (conn_id, rx)
    }

    /// Baut eine Verbindung ab (Client-seitiger Abbruch)
    ///
    /// Idempotent mit der Watchdog-Eviction: wer zuerst kommt, raeumt auf.
    pub fn trennen(&self, conn_id: &ConnId) {
        let mut inner = self.inner.lock();
        self.sitzung_entfernen(&mut inner, conn_id, None, false);
    }

    // -----------------------------------------------------------------------
    // Signalisierungs-Operationen
    // -----------------------------------------------------------------------

    /// `register` – setzt den Namen der Sitzung
    ///
    /// Umbenennen ist erlaubt solange kein Kanal betreten ist
    /// (Mitgliedschaften sind nach Namen geschluesselt).
    pub fn registrieren(&self, conn_id: &ConnId, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FunkFehler::LeererName);
        }
        if name == ADMIN_EIGENTUEMER {
            return Err(FunkFehler::NameReserviert(name.to_string()));
        }

        let mut inner = self.inner.lock();
        let sitzung = inner
            .sitzungen
            .get_mut(conn_id)
            .ok_or(FunkFehler::NichtRegistriert)?;
        if sitzung.kanal.is_some() {
            return Err(FunkFehler::UmbenennenImKanal);
        }
        sitzung.name = Some(name.to_string());

        tracing::info!(conn = %conn_id, name = %name, "Client registriert");

        let antwort = ServerNachricht::Registered {
            name: name.to_string(),
            channels: kanal_infos(&inner),
        };
        self.broadcaster.signal(conn_id, antwort);
        Ok(())
    }

    /// `create_channel` – legt einen Kanal an, Eigentuemer ist der Absender
    pub fn kanal_erstellen(&self, conn_id: &ConnId, kanal: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let name = registrierter_name(&inner, conn_id)?;
        self.kanal_anlegen_intern(&mut inner, kanal, name)
    }

    /// `join` / `switch` – betritt einen Kanal, verlaesst vorher den alten
    ///
    /// Ziel-Validierung passiert VOR dem Verlassen des Quellkanals; die
    /// Sitzung ist nie Mitglied in beiden Kanaelen gleichzeitig.
    pub fn beitreten(self: &Arc<Self>, conn_id: &ConnId, ziel: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let name = registrierter_name(&inner, conn_id)?;

        let aktuell = inner
            .sitzungen
            .get(conn_id)
            .and_then(|s| s.kanal.clone());

        // Wechsel in den aktuellen Kanal: Membership-No-op, frische
        // joined-Antwort, keine Broadcasts
        if aktuell.as_deref() == Some(ziel) {
            if let Some(kanal) = inner.kanaele.get(ziel) {
                self.broadcaster
                    .signal(conn_id, joined_antwort(kanal, &name));
            }
            return Ok(());
        }

        // Ziel validieren, bevor irgendetwas mutiert wird
        {
            let ziel_kanal = inner
                .kanaele
                .get(ziel)
                .ok_or_else(|| FunkFehler::KanalNichtGefunden(ziel.to_string()))?;
            if ziel_kanal.mitglieder.contains_key(&name) {
                return Err(FunkFehler::NameImKanalVergeben {
                    name: name.clone(),
                    kanal: ziel.to_string(),
                });
            }
        }

        // Quellkanal verlassen; Beobachter duerfen user_left vor
        // user_joined sehen
        if let Some(quelle) = aktuell {
            self.mitglied_entfernen(&mut inner, &quelle, &name);
        }

        // Ziel betreten
        if let Some(sitzung) = inner.sitzungen.get_mut(conn_id) {
            sitzung.kanal = Some(ziel.to_string());
        }
        let kanal = inner
            .kanaele
            .get_mut(ziel)
            .expect("Ziel wurde oben validiert");
        kanal
            .mitglieder
            .insert(name.clone(), Mitglied::neu(*conn_id));

        // Antwort an den Beitretenden VOR dem Fan-out einreihen
        self.broadcaster
            .signal(conn_id, joined_antwort(kanal, &name));

        let andere: Vec<ConnId> = kanal
            .mitglieder
            .iter()
            .filter(|(n, _)| *n != &name)
            .map(|(_, m)| m.conn_id)
            .collect();
        self.broadcaster.signal_an_viele(
            &andere,
            &ServerNachricht::UserJoined { name: name.clone() },
        );

        // Mixer (wieder) starten: er laeuft genau dann, wenn Mitglieder da sind
        if !kanal.mixer.laeuft() {
            let (stop_tx, stop_rx) = watch::channel(false);
            kanal.mixer = MixerZustand::Laeuft { stop: stop_tx };
            mixer::starten(Arc::clone(self), ziel.to_string(), stop_rx);
        }

        tracing::info!(conn = %conn_id, name = %name, kanal = %ziel, "Kanal betreten");
        self.kanaele_broadcast(&inner);
        Ok(())
    }

    /// `leave` – verlaesst den aktuellen Kanal; idempotent
    pub fn verlassen(&self, conn_id: &ConnId) {
        let mut inner = self.inner.lock();

        let (name, kanal) = match inner.sitzungen.get_mut(conn_id) {
            Some(s) => (s.name.clone(), s.kanal.take()),
            None => return,
        };

        // Antwort zuerst, danach die Fan-outs
        self.broadcaster.signal(conn_id, ServerNachricht::Left);

        if let (Some(name), Some(kanal_name)) = (name, kanal) {
            self.mitglied_entfernen(&mut inner, &kanal_name, &name);
            tracing::info!(conn = %conn_id, name = %name, kanal = %kanal_name, "Kanal verlassen");
            self.kanaele_broadcast(&inner);
        }
    }

    /// `close_channel` – loescht einen Kanal, nur fuer den Eigentuemer
    pub fn kanal_schliessen(&self, conn_id: &ConnId, kanal: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let name = registrierter_name(&inner, conn_id)?;

        {
            let eintrag = inner
                .kanaele
                .get(kanal)
                .ok_or_else(|| FunkFehler::KanalNichtGefunden(kanal.to_string()))?;
            if eintrag.owner != name {
                return Err(FunkFehler::NichtEigentuemer(kanal.to_string()));
            }
        }

        self.kanal_loeschen_intern(&mut inner, kanal);
        tracing::info!(name = %name, kanal = %kanal, "Kanal geschlossen");
        Ok(())
    }

    /// `list_channels` – schickt dem Absender die aktuelle Kanalliste
    pub fn kanal_liste(&self, conn_id: &ConnId) {
        let inner = self.inner.lock();
        self.broadcaster.signal(
            conn_id,
            ServerNachricht::Channels {
                list: kanal_infos(&inner),
            },
        );
    }

    /// `talking` – setzt den Push-to-Talk-Zustand
    ///
    /// Ausserhalb eines Kanals wirkungslos.
    pub fn sprechen_setzen(&self, conn_id: &ConnId, talking: bool) {
        let mut inner = self.inner.lock();

        let (name, kanal_name) = match sitzungs_mitgliedschaft(&inner, conn_id) {
            Some(paar) => paar,
            None => return,
        };

        let Some(kanal) = inner.kanaele.get_mut(&kanal_name) else {
            return;
        };
        let Some(mitglied) = kanal.mitglieder.get_mut(&name) else {
            return;
        };
        mitglied.talking = talking;

        let andere: Vec<ConnId> = kanal
            .mitglieder
            .iter()
            .filter(|(n, _)| *n != &name)
            .map(|(_, m)| m.conn_id)
            .collect();
        self.broadcaster
            .signal_an_viele(&andere, &ServerNachricht::Talking { name, talking });
    }

    /// `mute` – setzt die Selbststummschaltung
    ///
    /// Ausserhalb eines Kanals wirkungslos.
    pub fn stumm_setzen(&self, conn_id: &ConnId, muted: bool) {
        let mut inner = self.inner.lock();

        let (name, kanal_name) = match sitzungs_mitgliedschaft(&inner, conn_id) {
            Some(paar) => paar,
            None => return,
        };

        if let Some(mitglied) = inner
            .kanaele
            .get_mut(&kanal_name)
            .and_then(|k| k.mitglieder.get_mut(&name))
        {
            mitglied.muted = muted;
            self.broadcaster
                .signal(conn_id, ServerNachricht::Muted { muted, source: None });
        }
    }

    /// `ping` – Lebenszeichen; setzt die Watchdog-Frist zurueck
    pub fn ping(&self, conn_id: &ConnId) {
        let mut inner = self.inner.lock();
        if let Some(sitzung) = inner.sitzungen.get_mut(conn_id) {
            sitzung.letzter_ping = Instant::now();
            self.broadcaster.signal(conn_id, ServerNachricht::Pong);
        }
    }

    /// Schickt einem Client eine `error`-Antwort
    pub fn fehler_senden(&self, conn_id: &ConnId, fehler: &FunkFehler) {
        self.broadcaster
            .signal(conn_id, ServerNachricht::fehler(fehler));
    }

    // -----------------------------------------------------------------------
    // Audio-Ingress
    // -----------------------------------------------------------------------

    /// Nimmt einen Binaerframe an
    ///
    /// Still verworfen wird alles, was nicht passt: falsche Laenge, kein
    /// Kanal, gemutet, nicht am Sprechen, volle Queue.
    pub fn frame_einspeisen(&self, conn_id: &ConnId, bytes: &[u8]) {
        let Some(samples) = frame::dekodieren(bytes) else {
            self.statistik.frames_verworfen.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let mut inner = self.inner.lock();

        let Some((name, kanal_name)) = sitzungs_mitgliedschaft(&inner, conn_id) else {
            self.statistik.frames_verworfen.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let Some(mitglied) = inner
            .kanaele
            .get_mut(&kanal_name)
            .and_then(|k| k.mitglieder.get_mut(&name))
        else {
            self.statistik.frames_verworfen.fetch_add(1, Ordering::Relaxed);
            return;
        };

        if mitglied.muted || !mitglied.talking {
            self.statistik.frames_verworfen.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if mitglied.queue.push(samples) {
            self.statistik.frames_angenommen.fetch_add(1, Ordering::Relaxed);
        } else {
            self.statistik.frames_verworfen.fetch_add(1, Ordering::Relaxed);
        }
    }

    // -----------------------------------------------------------------------
    // Mixer-Tick
    // -----------------------------------------------------------------------

    /// Ein Mix-Durchlauf fuer einen Kanal
    ///
    /// Gibt `false` zurueck wenn der Kanal fehlt oder leer ist – der
    /// Mixer-Task beendet sich dann; der Idle-Uebergang passiert hier
    /// unter dem Lock, damit ein paralleler Join ihn sauber neu startet.
    pub fn mix_tick(&self, kanal_name: &str) -> bool {
        let mut inner = self.inner.lock();

        let Some(kanal) = inner.kanaele.get_mut(kanal_name) else {
            return false;
        };
        if kanal.mitglieder.is_empty() {
            kanal.mixer = MixerZustand::Idle;
            return false;
        }

        // Sprecher-Eignung einmal pro Tick festhalten
        let berechtigt: Vec<String> = kanal
            .mitglieder
            .iter()
            .filter(|(_, m)| !m.muted && m.talking && m.queue.bereit())
            .map(|(n, _)| n.clone())
            .collect();
        if berechtigt.is_empty() {
            return true;
        }

        let hoerer: Vec<(String, ConnId)> = kanal
            .mitglieder
            .iter()
            .map(|(n, m)| (n.clone(), m.conn_id))
            .collect();

        for (hoerer_name, hoerer_conn) in hoerer {
            // Mix-Minus: jeder Hoerer bekommt alle Sprecher ausser sich selbst,
            // und zieht dafuer eigene Frames aus deren Queues
            let mut beitraege = Vec::new();
            for sprecher in &berechtigt {
                if sprecher == &hoerer_name {
                    continue;
                }
                if let Some(frame) = kanal
                    .mitglieder
                    .get_mut(sprecher)
                    .and_then(|m| m.queue.pop())
                {
                    beitraege.push(frame);
                }
            }
            if beitraege.is_empty() {
                continue;
            }

            let gemischt = sprechfunk_audio::mischen(&beitraege);
            let bytes = frame::kodieren(&gemischt);
            self.broadcaster.audio(&hoerer_conn, bytes);
            self.statistik.frames_gemischt.fetch_add(1, Ordering::Relaxed);
        }

        true
    }

    // -----------------------------------------------------------------------
    // Watchdog
    // -----------------------------------------------------------------------

    /// Entfernt alle Sitzungen, deren letztes Lebenszeichen aelter als
    /// `frist` ist, und schliesst deren Transporte
    ///
    /// Gibt die Anzahl der entfernten Sitzungen zurueck.
    pub fn abgelaufene_evizieren(&self, frist: Duration) -> usize {
        let jetzt = Instant::now();
        let mut inner = self.inner.lock();

        let abgelaufen: Vec<ConnId> = inner
            .sitzungen
            .values()
            .filter(|s| jetzt.duration_since(s.letzter_ping) > frist)
            .map(|s| s.conn_id)
            .collect();

        for conn_id in &abgelaufen {
            tracing::warn!(conn = %conn_id, "Ping-Frist ueberschritten – Sitzung wird entfernt");
            self.sitzung_entfernen(&mut inner, conn_id, None, true);
        }
        abgelaufen.len()
    }

    // -----------------------------------------------------------------------
    // Admin-Schnittstelle
    // -----------------------------------------------------------------------

    /// Legt einen Kanal mit dem Eigentuemer-Sentinel `admin` an
    pub fn admin_kanal_erstellen(&self, kanal: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        self.kanal_anlegen_intern(&mut inner, kanal, ADMIN_EIGENTUEMER.to_string())
    }

    /// Loescht einen Kanal ohne Eigentuemer-Pruefung
    pub fn admin_kanal_loeschen(&self, kanal: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.kanaele.contains_key(kanal) {
            return Err(FunkFehler::KanalNichtGefunden(kanal.to_string()));
        }
        self.kanal_loeschen_intern(&mut inner, kanal);
        tracing::info!(kanal = %kanal, "Kanal per Admin geloescht");
        Ok(())
    }

    /// Zwingt einen Client in einen Kanal
    pub fn admin_beitritt_erzwingen(self: &Arc<Self>, client: &str, kanal: &str) -> Result<()> {
        let conn_id = self.conn_von_name(client)?;
        self.beitreten(&conn_id, kanal)
    }

    /// Zwingt einen Client aus seinem Kanal
    pub fn admin_verlassen_erzwingen(&self, client: &str) -> Result<()> {
        let conn_id = self.conn_von_name(client)?;
        self.verlassen(&conn_id);
        Ok(())
    }

    /// Setzt die Stummschaltung eines Clients von aussen
    ///
    /// Die Benachrichtigung an den Betroffenen traegt `source:"admin"`.
    pub fn admin_stumm_erzwingen(&self, client: &str, muted: bool) -> Result<()> {
        let conn_id = self.conn_von_name(client)?;
        let mut inner = self.inner.lock();

        if let Some((name, kanal_name)) = sitzungs_mitgliedschaft(&inner, &conn_id) {
            if let Some(mitglied) = inner
                .kanaele
                .get_mut(&kanal_name)
                .and_then(|k| k.mitglieder.get_mut(&name))
            {
                mitglied.muted = muted;
            }
        }

        self.broadcaster.signal(
            &conn_id,
            ServerNachricht::Muted {
                muted,
                source: Some(ADMIN_EIGENTUEMER.to_string()),
            },
        );
        tracing::info!(client = %client, muted, "Stummschaltung per Admin gesetzt");
        Ok(())
    }

    /// Wirft einen Client vom Server
    pub fn admin_kick(&self, client: &str) -> Result<()> {
        let conn_id = self.conn_von_name(client)?;
        let mut inner = self.inner.lock();
        self.sitzung_entfernen(
            &mut inner,
            &conn_id,
            Some(ServerNachricht::Kicked {
                message: KICK_MELDUNG.to_string(),
            }),
            true,
        );
        tracing::warn!(client = %client, "Client per Admin gekickt");
        Ok(())
    }

    /// Momentaufnahme fuer die Admin-Schnittstelle
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock();

        let mut clients: Vec<ClientSnapshot> = inner
            .sitzungen
            .values()
            .map(|s| {
                let mitglied = s
                    .kanal
                    .as_ref()
                    .zip(s.name.as_ref())
                    .and_then(|(k, n)| inner.kanaele.get(k).and_then(|k| k.mitglieder.get(n)));
                ClientSnapshot {
                    name: s.name.clone(),
                    channel: s.kanal.clone(),
                    muted: mitglied.map(|m| m.muted).unwrap_or(false),
                    talking: mitglied.map(|m| m.talking).unwrap_or(false),
                    queue_size: mitglied.map(|m| m.queue.len()).unwrap_or(0),
                    connected_secs: s.verbunden_seit.elapsed().as_secs(),
                }
            })
            .collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name));

        let mut channels: Vec<KanalSnapshot> = inner
            .kanaele
            .values()
            .map(|k| {
                let mut users: Vec<String> = k.mitglieder.keys().cloned().collect();
                users.sort();
                KanalSnapshot {
                    name: k.name.clone(),
                    owner: k.owner.clone(),
                    user_count: users.len(),
                    users,
                }
            })
            .collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));

        Snapshot {
            uptime: self.uptime_sek(),
            clients,
            channels,
        }
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    /// Uptime des Relays in Sekunden
    pub fn uptime_sek(&self) -> u64 {
        self.start_zeit.elapsed().as_secs()
    }

    /// Anzahl der verbundenen Clients
    pub fn klienten_anzahl(&self) -> usize {
        self.inner.lock().sitzungen.len()
    }

    /// Anzahl aller Kanaele
    pub fn kanal_anzahl(&self) -> usize {
        self.inner.lock().kanaele.len()
    }

    /// Anzahl der Kanaele mit laufendem Mixer
    pub fn aktive_kanal_anzahl(&self) -> usize {
        self.inner
            .lock()
            .kanaele
            .values()
            .filter(|k| k.mixer.laeuft())
            .count()
    }

    /// Mixer-Zustand eines Kanals (`None` wenn der Kanal fehlt)
    pub fn mixer_laeuft(&self, kanal: &str) -> Option<bool> {
        self.inner.lock().kanaele.get(kanal).map(|k| k.mixer.laeuft())
    }

    /// Momentaufnahme der Frame-Zaehler
    pub fn statistik(&self) -> StatistikSnapshot {
        StatistikSnapshot {
            frames_angenommen: self.statistik.frames_angenommen.load(Ordering::Relaxed),
            frames_verworfen: self.statistik.frames_verworfen.load(Ordering::Relaxed),
            frames_gemischt: self.statistik.frames_gemischt.load(Ordering::Relaxed),
        }
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsfunktionen
    // -----------------------------------------------------------------------

    /// Erster Treffer der Namenssuche; Namen sind global nicht eindeutig
    fn conn_von_name(&self, name: &str) -> Result<ConnId> {
        self.inner
            .lock()
            .sitzungen
            .values()
            .find(|s| s.name.as_deref() == Some(name))
            .map(|s| s.conn_id)
            .ok_or_else(|| FunkFehler::ClientNichtGefunden(name.to_string()))
    }

    fn kanal_anlegen_intern(
        &self,
        inner: &mut RelayInner,
        kanal: &str,
        owner: String,
    ) -> Result<()> {
        let kanal = kanal.trim();
        if kanal.is_empty() {
            return Err(FunkFehler::LeererName);
        }
        if inner.kanaele.contains_key(kanal) {
            return Err(FunkFehler::KanalExistiertBereits(kanal.to_string()));
        }

        inner
            .kanaele
            .insert(kanal.to_string(), Kanal::neu(kanal.to_string(), owner.clone()));
        tracing::info!(kanal = %kanal, owner = %owner, "Kanal angelegt");

        self.broadcaster.signal_an_alle(&ServerNachricht::ChannelCreated {
            channel: kanal.to_string(),
            owner,
        });
        self.kanaele_broadcast(inner);
        Ok(())
    }

    /// Entfernt einen Kanal samt allen Mitgliedschaften
    fn kanal_loeschen_intern(&self, inner: &mut RelayInner, kanal_name: &str) {
        let Some(mut kanal) = inner.kanaele.remove(kanal_name) else {
            return;
        };

        if let MixerZustand::Laeuft { stop } =
            std::mem::replace(&mut kanal.mixer, MixerZustand::Idle)
        {
            let _ = stop.send(true);
        }

        for mitglied in kanal.mitglieder.values() {
            if let Some(sitzung) = inner.sitzungen.get_mut(&mitglied.conn_id) {
                sitzung.kanal = None;
            }
            self.broadcaster.signal(
                &mitglied.conn_id,
                ServerNachricht::ChannelClosed {
                    channel: kanal_name.to_string(),
                },
            );
        }

        self.broadcaster.signal_an_alle(&ServerNachricht::ChannelDeleted {
            channel: kanal_name.to_string(),
        });
        self.kanaele_broadcast(inner);
    }

    /// Entfernt eine Mitgliedschaft und benachrichtigt den Restkanal
    ///
    /// Stoppt den Mixer, wenn der Kanal dadurch leer wird. Der
    /// Kanaleintrag selbst bleibt bestehen.
    fn mitglied_entfernen(&self, inner: &mut RelayInner, kanal_name: &str, name: &str) {
        let Some(kanal) = inner.kanaele.get_mut(kanal_name) else {
            return;
        };
        if kanal.mitglieder.remove(name).is_none() {
            return;
        }

        if kanal.mitglieder.is_empty() {
            if let MixerZustand::Laeuft { stop } =
                std::mem::replace(&mut kanal.mixer, MixerZustand::Idle)
            {
                let _ = stop.send(true);
            }
        }

        let verbleibende: Vec<ConnId> = kanal.mitglieder.values().map(|m| m.conn_id).collect();
        self.broadcaster.signal_an_viele(
            &verbleibende,
            &ServerNachricht::UserLeft {
                name: name.to_string(),
                channel: kanal_name.to_string(),
            },
        );
    }

    /// Baut eine Sitzung vollstaendig ab
    ///
    /// `abschied` wird vor allen anderen Nachrichten eingereiht;
    /// `schliessen` beendet zusaetzlich den Verbindungs-Task.
    fn sitzung_entfernen(
        &self,
        inner: &mut RelayInner,
        conn_id: &ConnId,
        abschied: Option<ServerNachricht>,
        schliessen: bool,
    ) {
        let Some(sitzung) = inner.sitzungen.remove(conn_id) else {
            return;
        };

        if let Some(nachricht) = abschied {
            self.broadcaster.signal(conn_id, nachricht);
        }

        if let (Some(name), Some(kanal_name)) = (sitzung.name, sitzung.kanal) {
            self.mitglied_entfernen(inner, &kanal_name, &name);
            self.kanaele_broadcast(inner);
        }

        if schliessen {
            self.broadcaster.schliessen(conn_id);
        }
        self.broadcaster.entfernen(conn_id);

        tracing::info!(conn = %conn_id, "Sitzung entfernt");
    }

    /// Kanalliste mit Nach-Aenderungs-Stand an alle Verbindungen
    fn kanaele_broadcast(&self, inner: &RelayInner) {
        self.broadcaster.signal_an_alle(&ServerNachricht::Channels {
            list: kanal_infos(inner),
        });
    }
}

// ---------------------------------------------------------------------------
// Freie Hilfsfunktionen
// ---------------------------------------------------------------------------

/// Registrierten Namen einer Verbindung nachschlagen
fn registrierter_name(inner: &RelayInner, conn_id: &ConnId) -> Result<String> {
    inner
        .sitzungen
        .get(conn_id)
        .and_then(|s| s.name.clone())
        .ok_or(FunkFehler::NichtRegistriert)
}

/// (Name, Kanalname) einer Verbindung, falls sie in einem Kanal ist
fn sitzungs_mitgliedschaft(inner: &RelayInner, conn_id: &ConnId) -> Option<(String, String)> {
    let sitzung = inner.sitzungen.get(conn_id)?;
    Some((sitzung.name.clone()?, sitzung.kanal.clone()?))
}

/// Sortierte Kanalliste fuer Antworten und Broadcasts
fn kanal_infos(inner: &RelayInner) -> Vec<KanalInfo> {
    let mut liste: Vec<KanalInfo> = inner
        .kanaele
        .values()
        .map(|k| {
            let mut users: Vec<String> = k.mitglieder.keys().cloned().collect();
            users.sort();
            KanalInfo {
                name: k.name.clone(),
                owner: k.owner.clone(),
                users,
            }
        })
        .collect();
    liste.sort_by(|a, b| a.name.cmp(&b.name));
    liste
}

/// `joined`-Antwort mit den anderen Mitgliedern des Kanals
fn joined_antwort(kanal: &Kanal, beitretender: &str) -> ServerNachricht {
    let mut users: Vec<String> = kanal
        .mitglieder
        .keys()
        .filter(|n| n.as_str() != beitretender)
        .cloned()
        .collect();
    users.sort();
    ServerNachricht::Joined {
        channel: kanal.name.clone(),
        owner: kanal.owner.clone(),
        users,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sprechfunk_protocol::frame::{FRAME_BYTES, FRAME_SAMPLES};

    /// Leert eine Empfangs-Queue
    fn abfluss(rx: &mut mpsc::Receiver<Ausgehend>) -> Vec<Ausgehend> {
        let mut raus = Vec::new();
        while let Ok(n) = rx.try_recv() {
            raus.push(n);
        }
        raus
    }

    /// Nur die Signalisierungs-Nachrichten einer Empfangs-Queue
    fn signale(rx: &mut mpsc::Receiver<Ausgehend>) -> Vec<ServerNachricht> {
        abfluss(rx)
            .into_iter()
            .filter_map(|a| match a {
                Ausgehend::Signal(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    /// Verbindet und registriert einen Client, Queue geleert
    fn klient(relay: &Arc<Relay>, name: &str) -> (ConnId, mpsc::Receiver<Ausgehend>) {
        let (conn, mut rx) = relay.verbinden();
        relay.registrieren(&conn, name).unwrap();
        abfluss(&mut rx);
        (conn, rx)
    }

    /// PCM16-Frame mit konstantem Samplewert
    fn pcm_frame(wert: i16) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FRAME_BYTES);
        for _ in 0..FRAME_SAMPLES {
            bytes.extend_from_slice(&wert.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn registrieren_antwortet_mit_kanalliste() {
        let relay = Relay::neu();
        let (conn, mut rx) = relay.verbinden();
        relay.registrieren(&conn, "anna").unwrap();

        let nachrichten = signale(&mut rx);
        assert_eq!(
            nachrichten,
            vec![ServerNachricht::Registered {
                name: "anna".into(),
                channels: vec![],
            }]
        );
    }

    #[test]
    fn registrieren_trimmt_und_validiert() {
        let relay = Relay::neu();
        let (conn, mut rx) = relay.verbinden();

        assert_eq!(relay.registrieren(&conn, "   "), Err(FunkFehler::LeererName));
        assert_eq!(relay.registrieren(&conn, ""), Err(FunkFehler::LeererName));

        relay.registrieren(&conn, "  anna  ").unwrap();
        match signale(&mut rx).first() {
            Some(ServerNachricht::Registered { name, .. }) => assert_eq!(name, "anna"),
            anderes => panic!("Registered erwartet, war {anderes:?}"),
        }
    }

    #[test]
    fn registrieren_admin_name_reserviert() {
        let relay = Relay::neu();
        let (conn, _rx) = relay.verbinden();
        assert_eq!(
            relay.registrieren(&conn, "admin"),
            Err(FunkFehler::NameReserviert("admin".into()))
        );
    }

    #[tokio::test]
    async fn umbenennen_nur_ausserhalb_eines_kanals() {
        let relay = Relay::neu();
        let (conn, mut rx) = klient(&relay, "anna");

        // Im Leerlauf ist Umbenennen erlaubt
        relay.registrieren(&conn, "anna2").unwrap();
        abfluss(&mut rx);

        relay.kanal_erstellen(&conn, "halle").unwrap();
        relay.beitreten(&conn, "halle").unwrap();
        assert_eq!(
            relay.registrieren(&conn, "anna3"),
            Err(FunkFehler::UmbenennenImKanal)
        );
    }

    #[tokio::test]
    async fn reihenfolge_bei_create_und_join() {
        let relay = Relay::neu();
        let (conn, mut rx) = relay.verbinden();

        relay.registrieren(&conn, "a").unwrap();
        relay.kanal_erstellen(&conn, "room").unwrap();
        relay.beitreten(&conn, "room").unwrap();

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

    #[test]
    fn kanal_erstellen_doppelt() {
        let relay = Relay::neu();
        let (conn, _rx) = klient(&relay, "anna");

        relay.kanal_erstellen(&conn, "halle").unwrap();
        assert_eq!(
            relay.kanal_erstellen(&conn, "halle"),
            Err(FunkFehler::KanalExistiertBereits("halle".into()))
        );
    }

    #[test]
    fn kanal_erstellen_erfordert_registrierung() {
        let relay = Relay::neu();
        let (conn, _rx) = relay.verbinden();
        assert_eq!(
            relay.kanal_erstellen(&conn, "halle"),
            Err(FunkFehler::NichtRegistriert)
        );
    }

    #[tokio::test]
    async fn beitreten_unbekannter_kanal() {
        let relay = Relay::neu();
        let (conn, _rx) = klient(&relay, "anna");
        assert_eq!(
            relay.beitreten(&conn, "nirgendwo"),
            Err(FunkFehler::KanalNichtGefunden("nirgendwo".into()))
        );
    }

    #[tokio::test]
    async fn gleicher_name_im_kanal_abgelehnt() {
        let relay = Relay::neu();
        let (conn_a, _rx_a) = klient(&relay, "anna");
        // Global sind doppelte Namen erlaubt ...
        let (conn_b, _rx_b) = klient(&relay, "anna");

        relay.kanal_erstellen(&conn_a, "halle").unwrap();
        relay.beitreten(&conn_a, "halle").unwrap();

        // ... aber nicht im selben Kanal
        assert_eq!(
            relay.beitreten(&conn_b, "halle"),
            Err(FunkFehler::NameImKanalVergeben {
                name: "anna".into(),
                kanal: "halle".into(),
            })
        );
    }

    #[tokio::test]
    async fn verlassen_ist_idempotent_und_kanal_bleibt() {
        let relay = Relay::neu();
        let (conn, mut rx) = klient(&relay, "anna");

        relay.kanal_erstellen(&conn, "halle").unwrap();
        relay.beitreten(&conn, "halle").unwrap();
        abfluss(&mut rx);

        relay.verlassen(&conn);
        let nachrichten = signale(&mut rx);
        assert!(matches!(&nachrichten[0], ServerNachricht::Left));

        // Ein blosses Leave loescht den Kanal nie
        let snap = relay.snapshot();
        assert_eq!(snap.channels.len(), 1);
        assert_eq!(snap.channels[0].user_count, 0);
        assert_eq!(snap.channels[0].owner, "anna");

        // Zweites Leave im Leerlauf: wieder nur Left
        relay.verlassen(&conn);
        assert!(matches!(signale(&mut rx)[0], ServerNachricht::Left));
    }

    #[tokio::test]
    async fn trennung_des_eigentuemers_laesst_kanal_bestehen() {
        let relay = Relay::neu();
        let (conn_a, _rx_a) = klient(&relay, "a");
        let (conn_b, mut rx_b) = klient(&relay, "b");

        relay.kanal_erstellen(&conn_a, "room").unwrap();
        relay.beitreten(&conn_a, "room").unwrap();
        relay.beitreten(&conn_b, "room").unwrap();
        abfluss(&mut rx_b);

        relay.trennen(&conn_a);

        let snap = relay.snapshot();
        assert_eq!(snap.channels.len(), 1);
        assert_eq!(snap.channels[0].owner, "a");
        assert_eq!(snap.channels[0].users, vec!["b".to_string()]);

        let nachrichten = signale(&mut rx_b);
        assert!(nachrichten.iter().any(|n| matches!(
            n,
            ServerNachricht::UserLeft { name, channel } if name == "a" && channel == "room"
        )));
    }

    #[tokio::test]
    async fn wechsel_in_den_aktuellen_kanal_ist_noop() {
        let relay = Relay::neu();
        let (conn_a, mut rx_a) = klient(&relay, "anna");
        let (conn_b, mut rx_b) = klient(&relay, "ben");

        relay.kanal_erstellen(&conn_a, "halle").unwrap();
        relay.beitreten(&conn_a, "halle").unwrap();
        relay.beitreten(&conn_b, "halle").unwrap();
        abfluss(&mut rx_a);
        abfluss(&mut rx_b);

        relay.beitreten(&conn_a, "halle").unwrap();

        // Frische joined-Antwort an den Anfragenden ...
        let an_a = signale(&mut rx_a);
        assert_eq!(an_a.len(), 1);
        assert!(matches!(
            &an_a[0],
            ServerNachricht::Joined { channel, users, .. }
                if channel == "halle" && users == &vec!["ben".to_string()]
        ));

        // ... und keinerlei Broadcasts an die anderen
        assert!(signale(&mut rx_b).is_empty());

        let snap = relay.snapshot();
        assert_eq!(snap.channels[0].user_count, 2);
    }

    #[tokio::test]
    async fn wechsel_verlaesst_quelle_und_betritt_ziel() {
        let relay = Relay::neu();
        let (conn_a, mut rx_a) = klient(&relay, "anna");
        let (conn_b, mut rx_b) = klient(&relay, "ben");

        relay.kanal_erstellen(&conn_a, "eins").unwrap();
        relay.kanal_erstellen(&conn_a, "zwei").unwrap();
        relay.beitreten(&conn_a, "eins").unwrap();
        relay.beitreten(&conn_b, "eins").unwrap();
        abfluss(&mut rx_a);
        abfluss(&mut rx_b);

        relay.beitreten(&conn_a, "zwei").unwrap();

        // Nie Mitglied in beiden Kanaelen
        let snap = relay.snapshot();
        let eins = snap.channels.iter().find(|k| k.name == "eins").unwrap();
        let zwei = snap.channels.iter().find(|k| k.name == "zwei").unwrap();
        assert_eq!(eins.users, vec!["ben".to_string()]);
        assert_eq!(zwei.users, vec!["anna".to_string()]);

        // Beobachter im Quellkanal sehen user_left
        assert!(signale(&mut rx_b).iter().any(|n| matches!(
            n,
            ServerNachricht::UserLeft { name, channel } if name == "anna" && channel == "eins"
        )));

        // Der Wechselnde bekommt die joined-Antwort des Ziels
        assert!(signale(&mut rx_a).iter().any(|n| matches!(
            n,
            ServerNachricht::Joined { channel, .. } if channel == "zwei"
        )));
    }

    #[tokio::test]
    async fn kanal_schliessen_nur_durch_eigentuemer() {
        let relay = Relay::neu();
        let (conn_a, _rx_a) = klient(&relay, "anna");
        let (conn_b, _rx_b) = klient(&relay, "ben");

        relay.kanal_erstellen(&conn_a, "halle").unwrap();
        relay.beitreten(&conn_b, "halle").unwrap();

        assert_eq!(
            relay.kanal_schliessen(&conn_b, "halle"),
            Err(FunkFehler::NichtEigentuemer("halle".into()))
        );
        assert_eq!(relay.snapshot().channels.len(), 1, "Kanal muss intakt bleiben");

        relay.kanal_schliessen(&conn_a, "halle").unwrap();
        assert!(relay.snapshot().channels.is_empty());
    }

    #[tokio::test]
    async fn kanal_schliessen_benachrichtigt_mitglieder() {
        let relay = Relay::neu();
        let (conn_a, _rx_a) = klient(&relay, "anna");
        let (conn_b, mut rx_b) = klient(&relay, "ben");

        relay.kanal_erstellen(&conn_a, "halle").unwrap();
        relay.beitreten(&conn_b, "halle").unwrap();
        abfluss(&mut rx_b);

        relay.kanal_schliessen(&conn_a, "halle").unwrap();

        let an_b = signale(&mut rx_b);
        assert!(an_b.iter().any(|n| matches!(
            n,
            ServerNachricht::ChannelClosed { channel } if channel == "halle"
        )));
        assert!(an_b.iter().any(|n| matches!(
            n,
            ServerNachricht::ChannelDeleted { channel } if channel == "halle"
        )));

        // Mitgliedschaft und Sitzungs-Rueckverweis sind geloescht
        let snap = relay.snapshot();
        let ben = snap.clients.iter().find(|c| c.name.as_deref() == Some("ben")).unwrap();
        assert_eq!(ben.channel, None);
    }

    #[tokio::test]
    async fn mixer_laeuft_genau_mit_mitgliedern() {
        let relay = Relay::neu();
        let (conn, _rx) = klient(&relay, "anna");

        relay.kanal_erstellen(&conn, "halle").unwrap();
        assert_eq!(relay.mixer_laeuft("halle"), Some(false));

        relay.beitreten(&conn, "halle").unwrap();
        assert_eq!(relay.mixer_laeuft("halle"), Some(true));
        assert_eq!(relay.aktive_kanal_anzahl(), 1);

        relay.verlassen(&conn);
        assert_eq!(relay.mixer_laeuft("halle"), Some(false));
        assert_eq!(relay.aktive_kanal_anzahl(), 0);

        // Erneuter Join startet den Mixer wieder
        relay.beitreten(&conn, "halle").unwrap();
        assert_eq!(relay.mixer_laeuft("halle"), Some(true));
    }

    #[tokio::test]
    async fn frame_gating() {
        let relay = Relay::neu();
        let (conn, _rx) = klient(&relay, "anna");
        relay.kanal_erstellen(&conn, "halle").unwrap();
        relay.beitreten(&conn, "halle").unwrap();

        let queue_size = |relay: &Arc<Relay>| {
            relay.snapshot().clients[0].queue_size
        };

        // Ohne talking wird verworfen
        relay.frame_einspeisen(&conn, &pcm_frame(100));
        assert_eq!(queue_size(&relay), 0);

        relay.sprechen_setzen(&conn, true);
        relay.frame_einspeisen(&conn, &pcm_frame(100));
        assert_eq!(queue_size(&relay), 1);

        // Falsche Laengen werden verworfen, Queue unveraendert
        relay.frame_einspeisen(&conn, &vec![0u8; 639]);
        relay.frame_einspeisen(&conn, &vec![0u8; 641]);
        assert_eq!(queue_size(&relay), 1);

        // Gemutet wird verworfen
        relay.stumm_setzen(&conn, true);
        relay.frame_einspeisen(&conn, &pcm_frame(100));
        assert_eq!(queue_size(&relay), 1);

        relay.stumm_setzen(&conn, false);

        // Kapazitaet 10: der elfte Frame faellt weg
        for _ in 0..12 {
            relay.frame_einspeisen(&conn, &pcm_frame(100));
        }
        assert_eq!(queue_size(&relay), 10);
    }

    #[tokio::test]
    async fn stille_wird_nach_vorlauf_weitergereicht() {
        let relay = Relay::neu();
        let (conn_a, mut rx_a) = klient(&relay, "a");
        let (conn_b, mut rx_b) = klient(&relay, "b");

        relay.kanal_erstellen(&conn_a, "room").unwrap();
        relay.beitreten(&conn_a, "room").unwrap();
        relay.beitreten(&conn_b, "room").unwrap();
        relay.sprechen_setzen(&conn_a, true);
        abfluss(&mut rx_a);
        abfluss(&mut rx_b);

        // Ein Frame reicht nicht (Jitter-Vorlauf von 2 Frames)
        relay.frame_einspeisen(&conn_a, &pcm_frame(0));
        assert!(relay.mix_tick("room"));
        assert!(abfluss(&mut rx_b).is_empty());

        // Mit zwei Frames kommt beim naechsten Tick genau ein Frame an
        relay.frame_einspeisen(&conn_a, &pcm_frame(0));
        assert!(relay.mix_tick("room"));

        let an_b = abfluss(&mut rx_b);
        assert_eq!(an_b.len(), 1);
        match &an_b[0] {
            Ausgehend::Audio(bytes) => {
                assert_eq!(bytes.len(), FRAME_BYTES);
                assert!(bytes.iter().all(|&b| b == 0), "Stille muss Stille bleiben");
            }
            anderes => panic!("Audio erwartet, war {anderes:?}"),
        }

        // Der Sprecher selbst bekommt nichts (Mix-Minus)
        assert!(abfluss(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn drei_sprecher_mit_duck_gain() {
        let relay = Relay::neu();
        let werte: [(&str, i16); 3] = [("a", 1000), ("b", 2000), ("c", 4000)];
        let mut conns = Vec::new();
        let mut rxs = Vec::new();

        let (conn_a, rx) = klient(&relay, "a");
        relay.kanal_erstellen(&conn_a, "room").unwrap();
        conns.push(conn_a);
        rxs.push(rx);
        for name in ["b", "c"] {
            let (conn, rx) = klient(&relay, name);
            conns.push(conn);
            rxs.push(rx);
        }

        for (conn, (_, wert)) in conns.iter().zip(werte.iter()) {
            relay.beitreten(conn, "room").unwrap();
            relay.sprechen_setzen(conn, true);
            relay.frame_einspeisen(conn, &pcm_frame(*wert));
            relay.frame_einspeisen(conn, &pcm_frame(*wert));
        }
        for rx in &mut rxs {
            abfluss(rx);
        }

        assert!(relay.mix_tick("room"));

        // Jeder hoert die anderen beiden mit gain = 0.7/2 = 0.35 und Soft-Clip
        for (i, rx) in rxs.iter_mut().enumerate() {
            let andere_summe: f32 = werte
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, (_, w))| *w as f32 / 32768.0)
                .sum();
            let erwartet = ((andere_summe * 0.35).tanh() * 32767.0).round() as i16;

            let frames: Vec<Vec<u8>> = abfluss(rx)
                .into_iter()
                .filter_map(|a| match a {
                    Ausgehend::Audio(b) => Some(b),
                    _ => None,
                })
                .collect();
            assert_eq!(frames.len(), 1, "Hoerer {i} muss genau einen Frame bekommen");

            let sample = i16::from_le_bytes([frames[0][0], frames[0][1]]);
            assert!(
                (sample - erwartet).abs() <= 1,
                "Hoerer {i}: erwartet {erwartet}, war {sample}"
            );
        }
    }

    #[tokio::test]
    async fn mix_tick_endet_bei_leerem_kanal() {
        let relay = Relay::neu();
        let (conn, _rx) = klient(&relay, "anna");
        relay.kanal_erstellen(&conn, "halle").unwrap();

        // Leerer Kanal: Tick meldet Stopp
        assert!(!relay.mix_tick("halle"));
        // Unbekannter Kanal ebenso
        assert!(!relay.mix_tick("nirgendwo"));
    }

    #[tokio::test]
    async fn watchdog_eviziert_nur_abgelaufene() {
        let relay = Relay::neu();
        let (conn_a, mut rx_a) = klient(&relay, "a");
        let (conn_b, mut rx_b) = klient(&relay, "b");

        relay.kanal_erstellen(&conn_a, "room").unwrap();
        relay.beitreten(&conn_a, "room").unwrap();
        relay.beitreten(&conn_b, "room").unwrap();
        abfluss(&mut rx_a);
        abfluss(&mut rx_b);

        tokio::time::sleep(Duration::from_millis(80)).await;
        // b meldet sich rechtzeitig, a bleibt stumm
        relay.ping(&conn_b);

        assert_eq!(relay.abgelaufene_evizieren(Duration::from_millis(70)), 1);

        let snap = relay.snapshot();
        assert_eq!(snap.clients.len(), 1);
        assert_eq!(snap.clients[0].name.as_deref(), Some("b"));
        // Der Kanal der entfernten Sitzung bekommt user_left
        assert!(signale(&mut rx_b).iter().any(|n| matches!(
            n,
            ServerNachricht::UserLeft { name, .. } if name == "a"
        )));
        // Der Transport der entfernten Sitzung wird geschlossen
        assert!(abfluss(&mut rx_a).contains(&Ausgehend::Schliessen));

        // Idempotent mit Client-seitiger Trennung
        relay.trennen(&conn_a);
        assert_eq!(relay.abgelaufene_evizieren(Duration::from_millis(70)), 0);
    }

    #[tokio::test]
    async fn ping_haelt_sitzung_am_leben() {
        let relay = Relay::neu();
        let (conn, mut rx) = klient(&relay, "anna");

        tokio::time::sleep(Duration::from_millis(40)).await;
        relay.ping(&conn);
        assert!(matches!(signale(&mut rx)[0], ServerNachricht::Pong));

        assert_eq!(relay.abgelaufene_evizieren(Duration::from_millis(30)), 0);
        assert_eq!(relay.klienten_anzahl(), 1);
    }

    #[tokio::test]
    async fn admin_kick_trennt_und_benachrichtigt() {
        let relay = Relay::neu();
        let (conn_a, mut rx_a) = klient(&relay, "a");
        let (conn_b, mut rx_b) = klient(&relay, "b");

        relay.kanal_erstellen(&conn_a, "room").unwrap();
        relay.beitreten(&conn_a, "room").unwrap();
        relay.beitreten(&conn_b, "room").unwrap();
        abfluss(&mut rx_a);
        abfluss(&mut rx_b);

        relay.admin_kick("a").unwrap();

        let an_a = abfluss(&mut rx_a);
        assert_eq!(
            an_a[0],
            Ausgehend::Signal(ServerNachricht::Kicked {
                message: "Disconnected by an administrator".into(),
            })
        );
        assert!(an_a.contains(&Ausgehend::Schliessen));

        assert!(signale(&mut rx_b).iter().any(|n| matches!(
            n,
            ServerNachricht::UserLeft { name, channel } if name == "a" && channel == "room"
        )));
        assert_eq!(relay.klienten_anzahl(), 1);

        let _ = conn_a;
    }

    #[tokio::test]
    async fn admin_stummschaltung_mit_quelle() {
        let relay = Relay::neu();
        let (conn, mut rx) = klient(&relay, "anna");
        relay.kanal_erstellen(&conn, "halle").unwrap();
        relay.beitreten(&conn, "halle").unwrap();
        abfluss(&mut rx);

        relay.admin_stumm_erzwingen("anna", true).unwrap();

        assert!(signale(&mut rx).iter().any(|n| matches!(
            n,
            ServerNachricht::Muted { muted: true, source: Some(s) } if s == "admin"
        )));
        assert!(relay.snapshot().clients[0].muted);
    }

    #[tokio::test]
    async fn admin_kanal_mit_sentinel_eigentuemer() {
        let relay = Relay::neu();
        relay.admin_kanal_erstellen("lobby").unwrap();

        let snap = relay.snapshot();
        assert_eq!(snap.channels[0].owner, "admin");

        // Loeschen ohne Eigentuemer-Pruefung
        relay.admin_kanal_loeschen("lobby").unwrap();
        assert!(relay.snapshot().channels.is_empty());
        assert_eq!(
            relay.admin_kanal_loeschen("lobby"),
            Err(FunkFehler::KanalNichtGefunden("lobby".into()))
        );
    }

    #[tokio::test]
    async fn admin_beitritt_und_verlassen_erzwingen() {
        let relay = Relay::neu();
        let (_conn, mut rx) = klient(&relay, "anna");
        relay.admin_kanal_erstellen("lobby").unwrap();
        abfluss(&mut rx);

        relay.admin_beitritt_erzwingen("anna", "lobby").unwrap();
        assert!(signale(&mut rx).iter().any(|n| matches!(
            n,
            ServerNachricht::Joined { channel, .. } if channel == "lobby"
        )));

        relay.admin_verlassen_erzwingen("anna").unwrap();
        assert!(matches!(signale(&mut rx)[0], ServerNachricht::Left));

        assert_eq!(
            relay.admin_kick("niemand"),
            Err(FunkFehler::ClientNichtGefunden("niemand".into()))
        );
    }
}
