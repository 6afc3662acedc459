//! sprechfunk-relay – Der Kern des Sprachrelays
//!
//! Dieser Crate haelt den gesamten veraenderlichen Zustand des Relays und
//! alle periodischen Aufgaben:
//!
//! ```text
//! Relay (ein exklusiver Mutex ueber Kanaele + Sitzungen)
//!     |
//!     +-- registry    – Kanalregister, Sitzungstabelle, alle Mutationen
//!     +-- jitter_buffer – begrenzte FIFO pro Mitgliedschaft (Kapazitaet 10)
//!     +-- mixer       – 20-ms-Takt pro aktivem Kanal, Mix-Minus pro Hoerer
//!     +-- watchdog    – 5-s-Sweep, wirft stumme Sitzungen nach 25 s raus
//!     +-- broadcast   – Send-Queues aller Verbindungen (try_send, nie blockierend)
//! ```
//!
//! Alle Mutationen – Nachrichten-Handler, Mixer-Ticks, Watchdog-Sweeps und
//! Admin-Aufrufe – laufen unter demselben Mutex. Der Lock wird nie ueber
//! einen Await-Punkt gehalten; die einzigen Suspensionspunkte sind die
//! Timer und die Transport-Schreibseite hinter den mpsc-Queues.

pub mod broadcast;
pub mod jitter_buffer;
pub mod mixer;
pub mod registry;
pub mod watchdog;

// Bequeme Re-Exporte
pub use broadcast::{Ausgehend, Broadcaster, ClientSender};
pub use jitter_buffer::JitterBuffer;
pub use registry::{Relay, Snapshot};
pub use watchdog::WatchdogConfig;
