//! Conversions between ticks, seconds, tempo and beats per minute.
//!
//! Tempo is always in microseconds per beat, as stored by `set_tempo` meta events.

/// Convert a number of ticks into seconds.
pub fn tick2second(ticks: f64, ticks_per_beat: u16, tempo: u32) -> f64 {
    let scale = tempo as f64 * 1e-6 / ticks_per_beat as f64;
    ticks * scale
}

/// Convert seconds into the nearest whole number of ticks.
pub fn second2tick(seconds: f64, ticks_per_beat: u16, tempo: u32) -> i64 {
    let scale = tempo as f64 * 1e-6 / ticks_per_beat as f64;
    (seconds / scale).round() as i64
}

/// Convert beats per minute into a tempo, counting beats in units of the time signature
/// `denominator`.
///
/// ```
/// assert_eq!(midiwire::bpm2tempo(120.0, 4), 500_000);
/// assert_eq!(midiwire::bpm2tempo(120.0, 8), 1_000_000);
/// ```
pub fn bpm2tempo(bpm: f64, denominator: u8) -> u32 {
    (60.0 * 1e6 / bpm * denominator as f64 / 4.0).round() as u32
}

/// Convert a tempo into beats per minute, counting beats in units of the time signature
/// `denominator`.
pub fn tempo2bpm(tempo: u32, denominator: u8) -> f64 {
    60.0 * 1e6 / tempo as f64 * denominator as f64 / 4.0
}
