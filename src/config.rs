//! Rig configuration.
//!
//! Both firmware revisions of the rig differ only in these values, so the
//! controller logic is shared and the revision is selected by configuration.

use std::time::Duration;

/// Servo calibration for one ball valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoRange {
    /// Servo angle at which the valve is fully closed.
    pub closed: u8,
    /// Servo angle at which the valve is fully open.
    pub open: u8,
}

/// Servo calibration for both valves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValveCalibration {
    /// Hot supply valve.
    pub hot: ServoRange,
    /// Cold supply valve.
    pub cold: ServoRange,
}

impl Default for ValveCalibration {
    fn default() -> Self {
        Self {
            hot: ServoRange { closed: 0, open: 105 },
            cold: ServoRange { closed: 0, open: 105 },
        }
    }
}

/// Timing and calibration constants for the rig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigConfig {
    /// How long the power switch must be held before shutdown.
    pub power_hold_threshold: Duration,
    /// Reset the power-hold timer when the switch is released.
    ///
    /// The original panel firmware never reset it, so a short press left a
    /// stale timer that made the next press shut down immediately.
    pub reset_power_timer_on_release: bool,
    /// Pacing delay between control cycles.
    pub cycle_interval: Duration,
    /// Wait after power-on for the valves to reach the closed position.
    pub valve_settle_delay: Duration,
    /// Wait between showing the shutdown message and releasing the relay.
    pub shutdown_settle_delay: Duration,
    /// Highest raw value the potentiometer ADC reports.
    pub potentiometer_max: u16,
    /// Host link baud rate.
    pub baud_rate: u32,
    /// Servo calibration.
    pub valves: ValveCalibration,
}

impl RigConfig {
    /// Default power-hold threshold.
    pub const POWER_HOLD_THRESHOLD: Duration = Duration::from_millis(3000);
    /// Default control cycle interval.
    pub const CYCLE_INTERVAL: Duration = Duration::from_millis(100);
    /// Default valve settle delay at startup.
    pub const VALVE_SETTLE_DELAY: Duration = Duration::from_millis(3000);
    /// Default shutdown settle delay.
    pub const SHUTDOWN_SETTLE_DELAY: Duration = Duration::from_millis(4000);
    /// Native maximum of a 10-bit ADC.
    pub const POTENTIOMETER_MAX: u16 = 1023;
    /// Default host link baud rate.
    pub const BAUD_RATE: u32 = 9600;

    /// The earlier firmware revision: 2 s hold threshold and a power timer
    /// that is never reset on release.
    pub fn legacy() -> Self {
        Self {
            power_hold_threshold: Duration::from_millis(2000),
            reset_power_timer_on_release: false,
            ..Self::default()
        }
    }
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            power_hold_threshold: Self::POWER_HOLD_THRESHOLD,
            reset_power_timer_on_release: true,
            cycle_interval: Self::CYCLE_INTERVAL,
            valve_settle_delay: Self::VALVE_SETTLE_DELAY,
            shutdown_settle_delay: Self::SHUTDOWN_SETTLE_DELAY,
            potentiometer_max: Self::POTENTIOMETER_MAX,
            baud_rate: Self::BAUD_RATE,
            valves: ValveCalibration::default(),
        }
    }
}
