//! sprechfunk-protocol – Wire-Format des Relays
//!
//! Zwei Frame-Arten laufen ueber die WebSocket-Verbindung:
//! - **Textframes**: JSON-Signalisierung mit `type`-Diskriminator ([`control`])
//! - **Binaerframes**: rohe 640-Byte-PCM-Frames, 16 kHz mono ([`frame`])

pub mod control;
pub mod frame;

// Bequeme Re-Exporte
pub use control::{ClientNachricht, KanalInfo, ParseErgebnis, ServerNachricht};
pub use frame::{FRAME_BYTES, FRAME_DAUER_MS, FRAME_SAMPLES};
