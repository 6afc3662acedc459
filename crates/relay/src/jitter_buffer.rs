//! Jitter Buffer fuer eingehende Audio-Frames
//!
//! Eine begrenzte FIFO pro Kanalmitglied. Der Transport liefert in
//! Reihenfolge, deshalb gibt es keine Sequenznummern und kein Umsortieren –
//! der Buffer glaettet nur die Ankunftszeiten.
//!
//! ## Semantik
//! - Kapazitaet 10 Frames; bei Ueberlauf wird der NEUESTE Frame verworfen
//!   (drop-oldest wuerde die wahrgenommene Latenz unter Last verschlechtern)
//! - Ein Mitglied gilt erst ab 2 gepufferten Frames als Sprecher-Kandidat
//!   (~40 ms Vorlauf gegen Ankunfts-Jitter); gemischt wird trotzdem nur
//!   ein Frame pro Pop

use std::collections::VecDeque;

/// Maximale Anzahl gepufferter Frames
pub const KAPAZITAET: usize = 10;

/// Mindestfuellstand, ab dem ein Mitglied als Sprecher zaehlt
pub const MINDESTFUELLUNG: usize = 2;

/// Zaehler des Jitter Buffers (Snapshot)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JitterBufferStatistik {
    /// Angenommene Frames gesamt
    pub angenommen: u64,
    /// Wegen Ueberlauf verworfene Frames
    pub verworfen: u64,
}

/// Begrenzte Frame-FIFO eines Kanalmitglieds
///
/// Nicht thread-safe; die Synchronisation uebernimmt der Registry-Mutex.
#[derive(Debug, Default)]
pub struct JitterBuffer {
    frames: VecDeque<Vec<f32>>,
    statistik: JitterBufferStatistik,
}

impl JitterBuffer {
    /// Erstellt einen leeren Buffer
    pub fn neu() -> Self {
        Self {
            frames: VecDeque::with_capacity(KAPAZITAET),
            statistik: JitterBufferStatistik::default(),
        }
    }

    /// Fuegt einen Frame hinten an
    ///
    /// Bei vollem Buffer wird der neue Frame verworfen und `false`
    /// zurueckgegeben; der Bufferinhalt bleibt unveraendert.
    pub fn push(&mut self, frame: Vec<f32>) -> bool {
        if self.frames.len() >= KAPAZITAET {
            self.statistik.verworfen += 1;
            return false;
        }
        self.frames.push_back(frame);
        self.statistik.angenommen += 1;
        true
    }

    /// Entnimmt den aeltesten Frame
    pub fn pop(&mut self) -> Option<Vec<f32>> {
        self.frames.pop_front()
    }

    /// Aktueller Fuellstand
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True wenn der Buffer leer ist
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True wenn genug Frames fuer die Sprecher-Eignung gepuffert sind
    pub fn bereit(&self) -> bool {
        self.frames.len() >= MINDESTFUELLUNG
    }

    /// Gibt die aktuellen Zaehler zurueck
    pub fn statistik(&self) -> JitterBufferStatistik {
        self.statistik
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(wert: f32) -> Vec<f32> {
        vec![wert; 4]
    }

    #[test]
    fn fifo_reihenfolge() {
        let mut buf = JitterBuffer::neu();
        buf.push(frame(1.0));
        buf.push(frame(2.0));
        buf.push(frame(3.0));

        assert_eq!(buf.pop().unwrap()[0], 1.0);
        assert_eq!(buf.pop().unwrap()[0], 2.0);
        assert_eq!(buf.pop().unwrap()[0], 3.0);
        assert!(buf.pop().is_none());
    }

    #[test]
    fn ueberlauf_verwirft_den_neuesten() {
        let mut buf = JitterBuffer::neu();
        for i in 0..KAPAZITAET {
            assert!(buf.push(frame(i as f32)));
        }

        // Der elfte Frame wird verworfen, der Inhalt bleibt unveraendert
        assert!(!buf.push(frame(99.0)));
        assert_eq!(buf.len(), KAPAZITAET);
        assert_eq!(buf.pop().unwrap()[0], 0.0);
        assert_eq!(buf.statistik().verworfen, 1);
        assert_eq!(buf.statistik().angenommen, KAPAZITAET as u64);
    }

    #[test]
    fn bereitschaft_ab_mindestfuellung() {
        let mut buf = JitterBuffer::neu();
        assert!(!buf.bereit());

        buf.push(frame(0.0));
        assert!(!buf.bereit(), "Ein Frame reicht nicht");

        buf.push(frame(0.0));
        assert!(buf.bereit(), "Zwei Frames sind das Minimum");

        buf.pop();
        assert!(!buf.bereit(), "Nach dem Pop wieder unter der Schwelle");
    }

    #[test]
    fn leerer_buffer() {
        let mut buf = JitterBuffer::neu();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
        assert!(buf.pop().is_none());
    }
}
