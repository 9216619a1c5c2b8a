//! Mock rig hardware for testing.

use std::collections::VecDeque;

use crate::actuator::{Valve, ValveDriver, ValvePosition};
use crate::controller::{DisplaySink, FrontPanel, HostLink, PowerRelay, TemperatureSensor};
use crate::display::Screen;
use crate::error::RigError;
use crate::modes::Mode;
use crate::temperature::Probe;

/// Something the controller did to the mock hardware.
#[derive(Debug, Clone, PartialEq)]
pub enum RigEvent {
    /// A valve was commanded.
    Valve(Valve, ValvePosition),
    /// The display was redrawn.
    Screen(Screen),
    /// A line was sent to the host.
    Sent(String),
    /// The power relay was energised or released.
    PowerHold(bool),
}

/// A mock rig for testing.
///
/// Inputs are plain public fields; outputs are recorded as [`RigEvent`]s in
/// the order the controller produced them.
///
/// # Example
///
/// ```
/// use bolus_core::{FrontPanel, HostLink, MockRig, Mode};
///
/// let mut rig = MockRig::new(Mode::Manual);
/// rig.potentiometer = 512;
/// assert_eq!(rig.read_potentiometer(), 512);
///
/// rig.push_frame("#?");
/// assert_eq!(rig.poll_frame().as_deref(), Some(&b"#?"[..]));
/// assert_eq!(rig.poll_frame(), None);
/// ```
#[derive(Debug, Clone)]
pub struct MockRig {
    /// Selection switch position.
    pub mode: Mode,
    /// Raw potentiometer reading.
    pub potentiometer: u16,
    /// Power switch held down.
    pub power_pressed: bool,
    /// Primary probe reading.
    pub primary_celsius: f32,
    /// Secondary (bolus) probe reading.
    pub secondary_celsius: f32,
    /// Fail the next command sent to this valve.
    pub fail_valve: Option<Valve>,
    /// Host link is down; every send fails with [`RigError::LinkClosed`].
    pub link_down: bool,
    inbox: VecDeque<Vec<u8>>,
    events: Vec<RigEvent>,
}

impl MockRig {
    /// Create a mock rig with the selection switch in `mode`.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            potentiometer: 0,
            power_pressed: false,
            primary_celsius: 20.0,
            secondary_celsius: 20.0,
            fail_valve: None,
            link_down: false,
            inbox: VecDeque::new(),
            events: Vec::new(),
        }
    }

    /// Queue a frame from the host.
    pub fn push_frame(&mut self, frame: impl AsRef<[u8]>) {
        self.inbox.push_back(frame.as_ref().to_vec());
    }

    /// Everything recorded so far.
    pub fn events(&self) -> &[RigEvent] {
        &self.events
    }

    /// Drain the recorded events.
    pub fn take_events(&mut self) -> Vec<RigEvent> {
        std::mem::take(&mut self.events)
    }

    /// Valve commands recorded so far.
    pub fn valve_commands(&self) -> Vec<(Valve, ValvePosition)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RigEvent::Valve(valve, position) => Some((*valve, *position)),
                _ => None,
            })
            .collect()
    }

    /// Screens drawn so far.
    pub fn screens(&self) -> Vec<&Screen> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RigEvent::Screen(screen) => Some(screen),
                _ => None,
            })
            .collect()
    }

    /// Lines sent to the host so far.
    pub fn sent(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RigEvent::Sent(line) => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Default for MockRig {
    fn default() -> Self {
        Self::new(Mode::Computer)
    }
}

impl FrontPanel for MockRig {
    fn read_mode(&mut self) -> Mode {
        self.mode
    }

    fn read_potentiometer(&mut self) -> u16 {
        self.potentiometer
    }

    fn power_switch_pressed(&mut self) -> bool {
        self.power_pressed
    }
}

impl TemperatureSensor for MockRig {
    fn read_celsius(&mut self, probe: Probe) -> f32 {
        match probe {
            Probe::Primary => self.primary_celsius,
            Probe::Secondary => self.secondary_celsius,
        }
    }
}

impl DisplaySink for MockRig {
    fn show(&mut self, screen: &Screen) -> Result<(), RigError> {
        self.events.push(RigEvent::Screen(screen.clone()));
        Ok(())
    }
}

impl HostLink for MockRig {
    fn poll_frame(&mut self) -> Option<Vec<u8>> {
        self.inbox.pop_front()
    }

    fn send_line(&mut self, line: &str) -> Result<(), RigError> {
        if self.link_down {
            return Err(RigError::LinkClosed);
        }
        self.events.push(RigEvent::Sent(line.to_string()));
        Ok(())
    }
}

impl PowerRelay for MockRig {
    fn set_power_hold(&mut self, energized: bool) -> Result<(), RigError> {
        self.events.push(RigEvent::PowerHold(energized));
        Ok(())
    }
}

impl ValveDriver for MockRig {
    fn set_valve(&mut self, valve: Valve, position: ValvePosition) -> Result<(), RigError> {
        if self.fail_valve == Some(valve) {
            self.fail_valve = None;
            return Err(std::io::Error::other("servo did not respond").into());
        }
        self.events.push(RigEvent::Valve(valve, position));
        Ok(())
    }
}
