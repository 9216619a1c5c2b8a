//! Controller run-time state.

use crate::modes::Mode;
use crate::setpoint::Setpoint;

/// The authoritative run-time state of the rig.
///
/// Created once at power-on and mutated only by [`advance`](crate::advance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    /// Mode read on the most recent cycle.
    pub current_mode: Mode,
    /// Last setpoint taken from the potentiometer (manual mode only).
    pub manual_setpoint: Option<Setpoint>,
    /// Last setpoint accepted from the host; kept across manual excursions.
    pub computer_setpoint: Option<Setpoint>,
    /// The potentiometer is parked at zero and the valves were already closed for it.
    pub zero_latched_manual: bool,
    /// The host requested 0 and the valves were already closed for it.
    pub zero_latched_computer: bool,
}

impl ControllerState {
    /// Fresh state for the initial switch position.
    pub fn new(mode: Mode) -> Self {
        Self {
            current_mode: mode,
            manual_setpoint: None,
            computer_setpoint: None,
            zero_latched_manual: false,
            zero_latched_computer: false,
        }
    }

    /// The setpoint currently driving the valves, chosen by the mode.
    pub fn live_setpoint(&self) -> Option<Setpoint> {
        match self.current_mode {
            Mode::Manual => self.manual_setpoint,
            Mode::Computer => self.computer_setpoint,
        }
    }
}
