//! Probe identifiers and the display rounding rule.

/// The two DS18B20 probes on the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    /// Mixed supply line.
    Primary,
    /// The bolus itself; this is the probe shown on screen and reported to the host.
    Secondary,
}

/// Round a reading for display and for the host reply.
///
/// The value is truncated to tenths, then a tenths digit above 5 rounds the
/// whole degree up and anything else (including exactly 5) drops the tenths.
/// Hardware displays and host software already depend on this tie-break.
pub fn round_to_half_degree(celsius: f32) -> f32 {
    let tenths = (celsius * 10.0) as i32;
    let mut whole = tenths / 10;
    let remainder = tenths % 10;

    if remainder > 5 {
        whole += 1;
    }

    whole as f32
}

/// Format a rounded reading with exactly one decimal.
pub fn format_celsius(celsius: f32) -> String {
    format!("{:.1}", round_to_half_degree(celsius))
}
