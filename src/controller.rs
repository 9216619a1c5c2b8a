//! Rig controller and its hardware collaborators.

use crate::actuator::{EqualMix, MixingStrategy, ValveActuator, ValveDriver};
use crate::config::RigConfig;
use crate::display::Screen;
use crate::error::RigError;
use crate::machine::{Action, CycleInput, advance};
use crate::modes::Mode;
use crate::power::{PowerAction, PowerSequencer};
use crate::protocol::{ParseResult, format_echo, format_temperature_reply, parse};
use crate::setpoint::Setpoint;
use crate::state::ControllerState;
use crate::temperature::Probe;

use log::{debug, info, trace, warn};
use std::time::Duration;

// =============================================================================
// Hardware Collaborators
// =============================================================================

/// Front-panel switches and the setpoint potentiometer.
///
/// All reads are direct and unbuffered; the switches are not debounced.
pub trait FrontPanel {
    /// Read the manual/computer selection switch.
    fn read_mode(&mut self) -> Mode;

    /// Read the raw potentiometer value (`0..=RigConfig::potentiometer_max`).
    fn read_potentiometer(&mut self) -> u16;

    /// Whether the power switch is currently pressed.
    fn power_switch_pressed(&mut self) -> bool;
}

/// Temperature probes.
pub trait TemperatureSensor {
    /// Trigger a conversion and return the reading in degrees Celsius.
    ///
    /// A disconnected probe returns whatever sentinel the driver uses; it is
    /// displayed and reported as-is.
    fn read_celsius(&mut self, probe: Probe) -> f32;
}

/// The 16x2 panel display.
pub trait DisplaySink {
    /// Replace the display contents.
    fn show(&mut self, screen: &Screen) -> Result<(), RigError>;
}

/// Line-oriented link to the host computer.
pub trait HostLink {
    /// Take the next complete frame, if one is pending.
    fn poll_frame(&mut self) -> Option<Vec<u8>>;

    /// Send one line to the host.
    fn send_line(&mut self, line: &str) -> Result<(), RigError>;
}

/// The relay that keeps the rig powered after the power switch is released.
pub trait PowerRelay {
    /// Energise (`true`) or release (`false`) the relay.
    fn set_power_hold(&mut self, energized: bool) -> Result<(), RigError>;
}

/// Everything the controller talks to.
pub trait RigHardware:
    FrontPanel + TemperatureSensor + DisplaySink + HostLink + PowerRelay + ValveDriver
{
}

impl<T> RigHardware for T where
    T: FrontPanel + TemperatureSensor + DisplaySink + HostLink + PowerRelay + ValveDriver
{
}

// =============================================================================
// RigController
// =============================================================================

/// Result of one control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Keep cycling.
    Running,
    /// The power switch was held long enough. Wait `settle`, then call
    /// [`RigController::power_off`].
    ShutdownRequested {
        /// Time to leave the shutdown message up before cutting power.
        settle: Duration,
    },
}

/// The rig controller.
///
/// Owns the hardware collaborators and the [`ControllerState`]. It never
/// sleeps: every wait is handed back to the caller as a [`Duration`], so a
/// driver loop decides how time passes.
///
/// # Example
///
/// ```
/// use bolus_core::{CycleOutcome, MockRig, Mode, RigConfig, RigController};
/// use std::time::Duration;
///
/// let mut rig = MockRig::new(Mode::Computer);
/// rig.push_frame("#30");
///
/// let mut controller = RigController::new(RigConfig::default(), rig);
/// let settle = controller.power_on()?;
/// assert_eq!(settle, Duration::from_secs(3));
/// controller.initialize()?;
///
/// assert_eq!(controller.cycle(Duration::ZERO)?, CycleOutcome::Running);
/// assert_eq!(controller.hardware().sent(), ["30"]);
/// # Ok::<(), bolus_core::RigError>(())
/// ```
pub struct RigController<H, M = EqualMix> {
    config: RigConfig,
    hardware: H,
    actuator: ValveActuator<M>,
    power: PowerSequencer,
    state: Option<ControllerState>,
    powered_off: bool,
}

impl<H: RigHardware> RigController<H, EqualMix> {
    /// Create a controller that opens both valves equally for active setpoints.
    pub fn new(config: RigConfig, hardware: H) -> Self {
        Self::with_mixing(config, hardware, EqualMix)
    }
}

impl<H: RigHardware, M: MixingStrategy> RigController<H, M> {
    /// Create a controller with a custom hot/cold mixing strategy.
    pub fn with_mixing(config: RigConfig, hardware: H, mixing: M) -> Self {
        let power = PowerSequencer::new(
            config.power_hold_threshold,
            config.reset_power_timer_on_release,
        );

        Self {
            config,
            hardware,
            actuator: ValveActuator::new(mixing),
            power,
            state: None,
            powered_off: false,
        }
    }

    /// First half of startup: latch power, close the valves and show the
    /// splash screen.
    ///
    /// Returns how long to wait for the valves before calling
    /// [`initialize`](Self::initialize).
    pub fn power_on(&mut self) -> Result<Duration, RigError> {
        info!("powering on");
        self.hardware.set_power_hold(true)?;
        self.hardware.show(&Screen::starting())?;
        self.actuator.close_all(&mut self.hardware)?;
        Ok(self.config.valve_settle_delay)
    }

    /// Second half of startup: read the initial mode and draw the status screen.
    pub fn initialize(&mut self) -> Result<(), RigError> {
        let mode = self.hardware.read_mode();
        info!("starting in {} mode", mode);

        self.state = Some(ControllerState::new(mode));
        self.render(mode, None)
    }

    /// Run one control cycle at uptime `now`.
    ///
    /// A failed valve command stops the cycle's remaining actions and puts the
    /// setpoint state back as it was, so the same request is applied again when
    /// it is repeated. Other failed actions are skipped. Either way the power
    /// switch is still polled, and a shutdown request wins over the error.
    ///
    /// # Errors
    ///
    /// - [`RigError::PoweredOff`] after [`power_off`](Self::power_off)
    /// - the first error raised by a hardware collaborator this cycle
    pub fn cycle(&mut self, now: Duration) -> Result<CycleOutcome, RigError> {
        if self.powered_off {
            return Err(RigError::PoweredOff);
        }

        let input = match self.hardware.read_mode() {
            Mode::Manual => CycleInput::Manual {
                potentiometer: self.hardware.read_potentiometer(),
            },
            Mode::Computer => CycleInput::Computer {
                command: self
                    .hardware
                    .poll_frame()
                    .map_or(ParseResult::NoInput, |frame| parse(&frame)),
            },
        };
        trace!("cycle input: {:?}", input);

        // a missing initialize() call takes the mode from this first read
        let mode = input.mode();
        let state = self
            .state
            .get_or_insert_with(|| ControllerState::new(mode));
        let previous = state.clone();
        let actions = advance(state, input, self.config.potentiometer_max);

        let mut failure = None;
        for action in actions {
            if let Err(err) = self.perform(mode, action) {
                warn!("{:?} failed: {}", action, err);
                if matches!(action, Action::CloseValves | Action::OpenValves(_)) {
                    warn!("valves not driven, keeping previous setpoint");
                    self.state = Some(previous);
                    failure = Some(err);
                    break;
                }
                if failure.is_none() {
                    failure = Some(err);
                }
            }
        }

        let pressed = self.hardware.power_switch_pressed();
        match self.power.poll(pressed, now) {
            PowerAction::None => match failure {
                Some(err) => Err(err),
                None => Ok(CycleOutcome::Running),
            },
            PowerAction::Shutdown => {
                warn!("power off requested");
                if let Err(err) = self.hardware.show(&Screen::power_off()) {
                    warn!("failed to show power off screen: {}", err);
                }
                Ok(CycleOutcome::ShutdownRequested {
                    settle: self.config.shutdown_settle_delay,
                })
            }
        }
    }

    /// Release the power relay. The rig loses power; no further cycles run.
    pub fn power_off(&mut self) -> Result<(), RigError> {
        info!("releasing power relay");
        self.powered_off = true;
        self.hardware.set_power_hold(false)
    }

    fn perform(&mut self, mode: Mode, action: Action) -> Result<(), RigError> {
        match action {
            Action::CloseValves => self.actuator.close_all(&mut self.hardware),
            Action::OpenValves(setpoint) => self.actuator.apply(&mut self.hardware, setpoint),
            Action::Render(setpoint) => self.render(mode, setpoint),
            Action::Echo(setpoint) => self.hardware.send_line(&format_echo(setpoint)),
            Action::ReplyTemperature => {
                let celsius = self.hardware.read_celsius(Probe::Secondary);
                let reply = format_temperature_reply(celsius);
                debug!("query reply: {}", reply);
                self.hardware.send_line(&reply)
            }
        }
    }

    fn render(&mut self, mode: Mode, setpoint: Option<Setpoint>) -> Result<(), RigError> {
        let bolus = self.hardware.read_celsius(Probe::Secondary);
        self.hardware.show(&Screen::status(mode, setpoint, bolus))
    }

    /// Current controller state, once initialised.
    pub fn state(&self) -> Option<&ControllerState> {
        self.state.as_ref()
    }

    /// Configuration in use.
    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    /// The hardware collaborators.
    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Mutable access to the hardware collaborators.
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    /// Whether the relay has been released.
    pub fn is_powered_off(&self) -> bool {
        self.powered_off
    }
}
