//! Valve actuation.
//!
//! The state machine only ever asks for "closed" or "open toward N °C". How a
//! Celsius target becomes a servo angle is the business of the [`ValveDriver`],
//! and how the target is split between the hot and cold supplies is the
//! business of a [`MixingStrategy`].

use log::trace;

use crate::error::RigError;
use crate::setpoint::Setpoint;

/// One of the two supply valves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Valve {
    /// Hot supply.
    Hot,
    /// Cold supply.
    Cold,
}

/// Logical valve position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValvePosition {
    /// No flow.
    Closed,
    /// Open toward the position that corresponds to this setpoint.
    OpenToward(Setpoint),
}

/// Drives a physical valve.
pub trait ValveDriver {
    /// Move `valve` to `position`.
    fn set_valve(&mut self, valve: Valve, position: ValvePosition) -> Result<(), RigError>;
}

/// Splits an active setpoint into hot and cold valve positions.
pub trait MixingStrategy {
    /// Positions for `(hot, cold)` when the target is `setpoint`.
    fn positions(&self, setpoint: Setpoint) -> (ValvePosition, ValvePosition);
}

/// Opens both valves toward the same target.
///
/// There is no closed-loop mixing yet, so both supplies get the same request.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualMix;

impl MixingStrategy for EqualMix {
    fn positions(&self, setpoint: Setpoint) -> (ValvePosition, ValvePosition) {
        let position = ValvePosition::OpenToward(setpoint);
        (position, position)
    }
}

/// Translates setpoints into valve commands.
#[derive(Debug, Clone, Default)]
pub struct ValveActuator<M = EqualMix> {
    mixing: M,
}

impl<M: MixingStrategy> ValveActuator<M> {
    /// Create an actuator using `mixing` for active setpoints.
    pub fn new(mixing: M) -> Self {
        Self { mixing }
    }

    /// Close both valves.
    pub fn close_all(&self, driver: &mut impl ValveDriver) -> Result<(), RigError> {
        trace!("closing both valves");
        driver.set_valve(Valve::Cold, ValvePosition::Closed)?;
        driver.set_valve(Valve::Hot, ValvePosition::Closed)
    }

    /// Drive the valves for `setpoint`; CLOSED always closes both.
    pub fn apply(&self, driver: &mut impl ValveDriver, setpoint: Setpoint) -> Result<(), RigError> {
        if setpoint.is_closed() {
            return self.close_all(driver);
        }

        let (hot, cold) = self.mixing.positions(setpoint);
        trace!("opening valves toward {}: hot={:?}, cold={:?}", setpoint, hot, cold);
        driver.set_valve(Valve::Cold, cold)?;
        driver.set_valve(Valve::Hot, hot)
    }
}
