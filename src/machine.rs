//! Per-cycle setpoint state machine.
//!
//! [`advance`] is the only code that mutates [`ControllerState`]. It does no I/O:
//! it returns the [`Action`]s the controller must carry out, in order.

use log::{debug, info};

use crate::modes::{Mode, Transition, detect_transition};
use crate::protocol::ParseResult;
use crate::setpoint::Setpoint;
use crate::state::ControllerState;

/// Inputs sampled for one control cycle.
///
/// The variant is the mode switch position; each mode samples only its own source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleInput {
    /// Manual mode with the raw potentiometer reading.
    Manual {
        /// Raw ADC value; 0 means "no setpoint".
        potentiometer: u16,
    },
    /// Computer mode with whatever the host link delivered.
    Computer {
        /// Decoded host frame for this cycle.
        command: ParseResult,
    },
}

impl CycleInput {
    /// Mode implied by this input.
    pub fn mode(&self) -> Mode {
        match self {
            CycleInput::Manual { .. } => Mode::Manual,
            CycleInput::Computer { .. } => Mode::Computer,
        }
    }
}

/// Side effects requested by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Close both valves.
    CloseValves,
    /// Open the valves toward an active setpoint.
    OpenValves(Setpoint),
    /// Redraw the status screen; `None` shows no setpoint.
    Render(Option<Setpoint>),
    /// Acknowledge an applied host setpoint.
    Echo(Setpoint),
    /// Answer a `#?` query with the bolus temperature.
    ReplyTemperature,
}

/// Run one cycle of the state machine.
///
/// Updates are edge-triggered: nothing is emitted while the live setpoint is
/// unchanged, except that the first evaluation after a mode switch always redraws.
pub fn advance(
    state: &mut ControllerState,
    input: CycleInput,
    potentiometer_max: u16,
) -> Vec<Action> {
    let mut actions = Vec::new();

    let mode = input.mode();
    let transition = detect_transition(state.current_mode, mode);
    state.current_mode = mode;

    if let Some(transition) = transition {
        info!("mode switched to {}", mode);
        debug!("transition: {:?}", transition);
    }

    match input {
        CycleInput::Manual { potentiometer } => {
            manual_cycle(state, potentiometer, potentiometer_max, &mut actions);
        }
        CycleInput::Computer { command } => {
            // manual state never survives outside manual mode
            state.manual_setpoint = None;
            state.zero_latched_manual = false;

            if transition == Some(Transition::EnteredComputer) {
                // Nothing stored means the host never spoke: go back to closed.
                let restored = state.computer_setpoint.take().unwrap_or(Setpoint::CLOSED);
                state.zero_latched_computer = false;
                debug!("restoring computer setpoint {}", restored);
                apply_computer(state, restored, false, &mut actions);
            }

            computer_cycle(state, command, &mut actions);
        }
    }

    actions
}

fn manual_cycle(
    state: &mut ControllerState,
    potentiometer: u16,
    potentiometer_max: u16,
    actions: &mut Vec<Action>,
) {
    if potentiometer == 0 {
        if !state.zero_latched_manual {
            info!("potentiometer at zero, closing valves");
            state.zero_latched_manual = true;
            state.manual_setpoint = None;
            actions.push(Action::CloseValves);
            actions.push(Action::Render(None));
        }
        return;
    }

    state.zero_latched_manual = false;
    let setpoint = Setpoint::from_potentiometer(potentiometer, potentiometer_max);
    if state.manual_setpoint != Some(setpoint) {
        info!("manual setpoint {}", setpoint);
        state.manual_setpoint = Some(setpoint);
        actions.push(Action::OpenValves(setpoint));
        actions.push(Action::Render(Some(setpoint)));
    }
}

fn computer_cycle(state: &mut ControllerState, command: ParseResult, actions: &mut Vec<Action>) {
    match command {
        ParseResult::SetpointRequest(value) => match Setpoint::new(value) {
            Ok(setpoint) => apply_computer(state, setpoint, true, actions),
            Err(err) => debug!("ignoring setpoint request: {}", err),
        },
        ParseResult::Query => actions.push(Action::ReplyTemperature),
        ParseResult::NoInput | ParseResult::Invalid(_) => {}
    }
}

fn apply_computer(
    state: &mut ControllerState,
    setpoint: Setpoint,
    echo: bool,
    actions: &mut Vec<Action>,
) {
    if setpoint.is_closed() {
        if state.zero_latched_computer {
            return;
        }
        info!("host setpoint closed");
        state.zero_latched_computer = true;
        state.computer_setpoint = Some(setpoint);
        actions.push(Action::CloseValves);
        actions.push(Action::Render(None));
    } else {
        state.zero_latched_computer = false;
        if state.computer_setpoint == Some(setpoint) {
            return;
        }
        info!("host setpoint {}", setpoint);
        state.computer_setpoint = Some(setpoint);
        actions.push(Action::OpenValves(setpoint));
        actions.push(Action::Render(Some(setpoint)));
    }

    if echo {
        actions.push(Action::Echo(setpoint));
    }
}
