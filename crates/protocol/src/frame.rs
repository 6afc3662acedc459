//! PCM-Frame-Codec
//!
//! Ein Audio-Frame ist exakt 640 Bytes: 320 Samples, 16 Bit signed
//! little-endian, mono, 16 kHz – also 20 ms Audio. Frames jeder anderen
//! Laenge werden vom Aufrufer stillschweigend verworfen.
//!
//! Intern rechnet das Relay in f32 im Bereich [-1, 1]; dieses Modul
//! uebernimmt die Normalisierung in beide Richtungen.

/// Frame-Laenge auf dem Draht in Bytes
pub const FRAME_BYTES: usize = 640;
/// Samples pro Frame (mono)
pub const FRAME_SAMPLES: usize = 320;
/// Abtastrate in Hz
pub const SAMPLE_RATE_HZ: u32 = 16_000;
/// Frame-Dauer in Millisekunden (Takt des Mischers)
pub const FRAME_DAUER_MS: u64 = 20;

/// Dekodiert einen 640-Byte-Frame zu 320 normalisierten f32-Samples
///
/// Gibt `None` zurueck wenn die Laenge nicht exakt [`FRAME_BYTES`] ist.
pub fn dekodieren(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() != FRAME_BYTES {
        return None;
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|paar| i16::from_le_bytes([paar[0], paar[1]]) as f32 / 32768.0)
        .collect();
    Some(samples)
}

/// Kodiert normalisierte f32-Samples zu einem PCM16-LE-Frame
///
/// Saettigt bei ±32767 statt hart ueberzulaufen.
pub fn kodieren(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let wert = (s * 32767.0).round().clamp(-32767.0, 32767.0) as i16;
        bytes.extend_from_slice(&wert.to_le_bytes());
    }
    bytes
}
