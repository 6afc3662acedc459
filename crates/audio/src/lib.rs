//! sprechfunk-audio – Misch-Arithmetik des Relays
//!
//! Alles rechnet in f32 im Bereich [-1, 1]; die Konvertierung von und zu
//! PCM16 uebernimmt `sprechfunk_protocol::frame`.

pub mod mix;

pub use mix::{mischen, verstaerkung};
