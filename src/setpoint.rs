//! Target temperature values.

use std::fmt;

use crate::error::RigError;

/// Lowest active setpoint in degrees Celsius.
pub const MIN_TEMP: i32 = 10;
/// Highest active setpoint in degrees Celsius.
pub const MAX_TEMP: i32 = 50;

/// A validated target temperature.
///
/// Either CLOSED (0, no flow) or ACTIVE (`MIN_TEMP..=MAX_TEMP`). Any other
/// value cannot be constructed, so an invalid setpoint never reaches the valves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Setpoint(i32);

impl Setpoint {
    /// Valves fully closed.
    pub const CLOSED: Setpoint = Setpoint(0);

    /// Validate a raw Celsius value.
    ///
    /// # Errors
    /// Returns [`RigError::InvalidSetpoint`] for anything other than 0 or `10..=50`.
    pub fn new(celsius: i32) -> Result<Self, RigError> {
        if Self::is_valid(celsius) {
            Ok(Self(celsius))
        } else {
            Err(RigError::InvalidSetpoint {
                value: celsius,
                min: MIN_TEMP,
                max: MAX_TEMP,
            })
        }
    }

    /// Whether `celsius` is CLOSED or ACTIVE.
    pub fn is_valid(celsius: i32) -> bool {
        celsius == 0 || (MIN_TEMP..=MAX_TEMP).contains(&celsius)
    }

    /// Map a raw potentiometer reading linearly onto the active range.
    ///
    /// Integer arithmetic truncates the same way the panel firmware always has:
    /// `MIN + raw * (MAX - MIN) / native_max`. Readings above `native_max` clamp.
    pub fn from_potentiometer(raw: u16, native_max: u16) -> Self {
        let native_max = i32::from(native_max.max(1));
        let raw = i32::from(raw).min(native_max);
        Self(MIN_TEMP + raw * (MAX_TEMP - MIN_TEMP) / native_max)
    }

    /// The setpoint in degrees Celsius.
    pub fn celsius(self) -> i32 {
        self.0
    }

    /// Whether this is the CLOSED sentinel.
    pub fn is_closed(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<i32> for Setpoint {
    type Error = RigError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Setpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
