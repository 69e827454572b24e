/// Normalized RMS energy of a PCM16 little-endian buffer, in `0.0..=1.0`.
///
/// A trailing odd byte is ignored. Empty input yields `0.0`.
pub fn rms_energy(pcm16le: &[u8]) -> f32 {
    let samples = pcm16le.len() / 2;
    if samples == 0 {
        return 0.0;
    }

    let sum_squares: f64 = pcm16le
        .chunks_exact(2)
        .map(|pair| {
            let sample = i16::from_le_bytes([pair[0], pair[1]]) as f64 / 32768.0;
            sample * sample
        })
        .sum();

    ((sum_squares / samples as f64).sqrt() as f32).clamp(0.0, 1.0)
}
