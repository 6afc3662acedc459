//! Additives Mischen mit Duck-Gain und Soft-Clip
//!
//! Die Beitraege aller Sprecher werden elementweise summiert. Damit die
//! Amplitude nicht mit der Sprecherzahl davonlaeuft, wird die Summe ab
//! zwei Beitraegen auf `0.7 / k` heruntergeregelt; ein einzelner Sprecher
//! bleibt bei Verstaerkung 1.0 praktisch unveraendert. Anschliessend
//! begrenzt ein tanh-Soft-Clip statt einer harten Kappung.

use sprechfunk_protocol::frame::FRAME_SAMPLES;

/// Zielpegel der Duck-Mischung bei mehreren Sprechern
pub const DUCK_PEGEL: f32 = 0.7;

/// Verstaerkungsfaktor fuer `k` Beitraege
///
/// `1.0` fuer hoechstens einen Beitrag, sonst `0.7 / k`.
pub fn verstaerkung(beitraege: usize) -> f32 {
    if beitraege <= 1 {
        1.0
    } else {
        DUCK_PEGEL / beitraege as f32
    }
}

/// Mischt die Beitraege elementweise und wendet Gain plus Soft-Clip an
///
/// Jeder Beitrag ist ein Frame von [`FRAME_SAMPLES`] normalisierten
/// Samples. Das Ergebnis hat dieselbe Laenge; ohne Beitraege ist es leer.
pub fn mischen(beitraege: &[Vec<f32>]) -> Vec<f32> {
    if beitraege.is_empty() {
        return Vec::new();
    }

    let gain = verstaerkung(beitraege.len());
    let mut summe = vec![0.0f32; FRAME_SAMPLES];

    for frame in beitraege {
        for (ziel, &sample) in summe.iter_mut().zip(frame.iter()) {
            *ziel += sample;
        }
    }

    for sample in &mut summe {
        *sample = (*sample * gain).tanh();
    }

    summe
}
