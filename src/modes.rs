//! Mode selection switch.

use std::fmt;

/// Who owns the setpoint: the front-panel potentiometer or the host computer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Setpoint comes from the potentiometer.
    Manual,
    /// Setpoint comes from the host link.
    Computer,
}

impl Mode {
    /// Interpret the raw selection switch level (high = manual).
    pub fn from_switch(level: bool) -> Self {
        if level { Mode::Manual } else { Mode::Computer }
    }

    /// Short tag shown on the status screen.
    pub fn tag(self) -> &'static str {
        match self {
            Mode::Manual => "MAN",
            Mode::Computer => "COMP",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Manual => "manual",
            Mode::Computer => "computer",
        })
    }
}

/// An edge on the selection switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Switched from computer to manual control.
    EnteredManual,
    /// Switched back from manual to computer control.
    EnteredComputer,
}

/// Compare the previous and current switch positions.
///
/// Fires once per edge; steady positions yield `None`.
pub fn detect_transition(previous: Mode, current: Mode) -> Option<Transition> {
    match (previous, current) {
        (Mode::Computer, Mode::Manual) => Some(Transition::EnteredManual),
        (Mode::Manual, Mode::Computer) => Some(Transition::EnteredComputer),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_edges() {
        assert_eq!(
            detect_transition(Mode::Computer, Mode::Manual),
            Some(Transition::EnteredManual)
        );
        assert_eq!(
            detect_transition(Mode::Manual, Mode::Computer),
            Some(Transition::EnteredComputer)
        );
        assert_eq!(detect_transition(Mode::Manual, Mode::Manual), None);
        assert_eq!(detect_transition(Mode::Computer, Mode::Computer), None);
    }

    #[test]
    fn test_switch_level() {
        assert_eq!(Mode::from_switch(true), Mode::Manual);
        assert_eq!(Mode::from_switch(false), Mode::Computer);
        assert_eq!(Mode::Manual.tag(), "MAN");
        assert_eq!(Mode::Computer.tag(), "COMP");
    }
}
