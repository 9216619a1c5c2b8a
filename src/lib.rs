//! Control core for a hot/cold bolus mixing rig.
//!
//! The rig mixes a hot and a cold supply through two servo-driven ball valves
//! to hold a bolus at a target temperature. The operator picks the target
//! either with the front-panel potentiometer (manual mode) or from a host
//! computer over a serial line (computer mode), chosen by a panel switch.
//!
//! This crate holds the parts with real state: mode arbitration, the setpoint
//! state machine, the host command protocol and the power-switch sequencer.
//! Hardware is reached through small collaborator traits ([`FrontPanel`],
//! [`TemperatureSensor`], [`DisplaySink`], [`HostLink`], [`PowerRelay`],
//! [`ValveDriver`]), and nothing in here sleeps, so the whole controller runs
//! in tests without real time passing.
//!
//! # Host protocol
//!
//! - `#NN` sets the target to `NN` °C, where `NN` is `0` (close valves) or `10`-`50`.
//!   Accepted values are echoed back once applied.
//! - `#?` asks for the bolus temperature; the reply is `#T.t`.
//! - Anything else is ignored.
//!
//! # Example
//!
//! ```no_run
//! use bolus_core::{CycleOutcome, RigConfig, RigController, RigHardware};
//! use std::time::Instant;
//!
//! fn run<H: RigHardware>(hardware: H) -> Result<(), bolus_core::RigError> {
//!     let config = RigConfig::default();
//!     let interval = config.cycle_interval;
//!     let mut controller = RigController::new(config, hardware);
//!
//!     std::thread::sleep(controller.power_on()?);
//!     controller.initialize()?;
//!
//!     let boot = Instant::now();
//!     loop {
//!         std::thread::sleep(interval);
//!         if let CycleOutcome::ShutdownRequested { settle } = controller.cycle(boot.elapsed())? {
//!             std::thread::sleep(settle);
//!             return controller.power_off();
//!         }
//!     }
//! }
//! ```
//!
//! # Testing
//!
//! Use [`MockRig`] to drive the controller without hardware:
//!
//! ```
//! use bolus_core::{MockRig, Mode, RigConfig, RigController};
//! use std::time::Duration;
//!
//! let mut rig = MockRig::new(Mode::Computer);
//! rig.secondary_celsius = 36.7;
//! rig.push_frame("#?");
//!
//! let mut controller = RigController::new(RigConfig::default(), rig);
//! controller.initialize().unwrap();
//! controller.cycle(Duration::ZERO).unwrap();
//! assert_eq!(controller.hardware().sent(), ["#37.0"]);
//! ```

#![warn(missing_docs)]

mod actuator;
mod config;
mod controller;
mod display;
mod error;
mod machine;
mod mock;
mod modes;
mod power;
mod protocol;
mod setpoint;
mod state;
mod temperature;

// Re-export public API
pub use actuator::{EqualMix, MixingStrategy, Valve, ValveActuator, ValveDriver, ValvePosition};
pub use config::{RigConfig, ServoRange, ValveCalibration};
pub use controller::{
    CycleOutcome, DisplaySink, FrontPanel, HostLink, PowerRelay, RigController, RigHardware,
    TemperatureSensor,
};
pub use display::{COLUMNS, Screen};
pub use error::RigError;
pub use machine::{Action, CycleInput, advance};
pub use mock::{MockRig, RigEvent};
pub use modes::{Mode, Transition, detect_transition};
pub use power::{PowerAction, PowerSequencer, PowerState};
pub use protocol::{FrameError, ParseResult, format_echo, format_temperature_reply, parse};
pub use setpoint::{MAX_TEMP, MIN_TEMP, Setpoint};
pub use state::ControllerState;
pub use temperature::{Probe, format_celsius, round_to_half_degree};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn started(rig: MockRig, config: RigConfig) -> RigController<MockRig> {
        init_logging();
        let mut controller = RigController::new(config, rig);
        controller.power_on().unwrap();
        controller.initialize().unwrap();
        controller.hardware_mut().take_events();
        controller
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn open_both(celsius: i32) -> Vec<(Valve, ValvePosition)> {
        let position = ValvePosition::OpenToward(Setpoint::new(celsius).unwrap());
        vec![(Valve::Cold, position), (Valve::Hot, position)]
    }

    fn closed_both() -> Vec<(Valve, ValvePosition)> {
        vec![
            (Valve::Cold, ValvePosition::Closed),
            (Valve::Hot, ValvePosition::Closed),
        ]
    }

    #[test]
    fn test_power_on_sequence() {
        init_logging();
        let mut controller = RigController::new(RigConfig::default(), MockRig::new(Mode::Manual));

        let settle = controller.power_on().unwrap();
        assert_eq!(settle, RigConfig::VALVE_SETTLE_DELAY);
        assert_eq!(controller.state(), None);

        controller.initialize().unwrap();
        assert_eq!(
            controller.state().map(|s| s.current_mode),
            Some(Mode::Manual)
        );

        let events = controller.hardware().events();
        assert_eq!(events[0], RigEvent::PowerHold(true));
        assert_eq!(events[1], RigEvent::Screen(Screen::starting()));
        assert_eq!(controller.hardware().valve_commands(), closed_both());

        let status = controller.hardware().screens().last().cloned().cloned();
        assert_eq!(status.unwrap().top(), "SetV (--)  MAN  ");
    }

    #[test]
    fn test_host_setpoint_end_to_end() {
        let mut rig = MockRig::new(Mode::Computer);
        rig.push_frame("  #30\n");
        let mut controller = started(rig, RigConfig::default());

        controller.cycle(ms(100)).unwrap();

        let rig = controller.hardware();
        assert_eq!(rig.valve_commands(), open_both(30));
        assert_eq!(rig.sent(), ["30"]);
        assert_eq!(rig.screens().len(), 1);
        assert_eq!(rig.screens()[0].top(), "SetV (30)   COMP");
    }

    #[test]
    fn test_duplicate_request_is_noop() {
        let mut rig = MockRig::new(Mode::Computer);
        rig.push_frame("#30");
        rig.push_frame("#30");
        let mut controller = started(rig, RigConfig::default());

        controller.cycle(ms(100)).unwrap();
        controller.cycle(ms(200)).unwrap();

        let rig = controller.hardware();
        assert_eq!(rig.valve_commands(), open_both(30));
        assert_eq!(rig.sent(), ["30"]);
    }

    #[test]
    fn test_query_reply_does_not_touch_setpoint() {
        let mut rig = MockRig::new(Mode::Computer);
        rig.secondary_celsius = 23.6;
        rig.push_frame("#25");
        rig.push_frame("#?");
        let mut controller = started(rig, RigConfig::default());

        controller.cycle(ms(100)).unwrap();
        controller.hardware_mut().take_events();
        controller.cycle(ms(200)).unwrap();

        assert_eq!(
            controller.hardware().events(),
            [RigEvent::Sent("#24.0".into())]
        );
        assert_eq!(
            controller.state().and_then(|s| s.computer_setpoint),
            Some(Setpoint::new(25).unwrap())
        );
    }

    #[test]
    fn test_invalid_frames_are_silent() {
        let mut rig = MockRig::new(Mode::Computer);
        for frame in ["garbage", "#51", "#-5", "#9", "#abc"] {
            rig.push_frame(frame);
        }
        let mut controller = started(rig, RigConfig::default());

        for t in 1..=5 {
            controller.cycle(ms(t * 100)).unwrap();
        }

        assert!(controller.hardware().events().is_empty());
    }

    #[test]
    fn test_mode_restoration_forces_redraw() {
        let mut rig = MockRig::new(Mode::Computer);
        rig.push_frame("#30");
        let mut controller = started(rig, RigConfig::default());
        controller.cycle(ms(100)).unwrap();

        let rig = controller.hardware_mut();
        rig.mode = Mode::Manual;
        rig.potentiometer = 800;
        controller.cycle(ms(200)).unwrap();
        assert_eq!(
            controller.state().and_then(|s| s.live_setpoint()),
            Some(Setpoint::from_potentiometer(800, 1023))
        );

        controller.hardware_mut().mode = Mode::Computer;
        controller.hardware_mut().take_events();
        controller.cycle(ms(300)).unwrap();

        let rig = controller.hardware();
        assert_eq!(rig.valve_commands(), open_both(30));
        assert_eq!(rig.screens().len(), 1);
        assert_eq!(rig.screens()[0].top(), "SetV (30)   COMP");
        assert!(rig.sent().is_empty());
        assert_eq!(
            controller.state().and_then(|s| s.live_setpoint()),
            Some(Setpoint::new(30).unwrap())
        );
    }

    #[test]
    fn test_manual_zero_latch() {
        let mut controller = started(MockRig::new(Mode::Manual), RigConfig::default());

        controller.cycle(ms(100)).unwrap();
        assert_eq!(controller.hardware().valve_commands(), closed_both());

        controller.hardware_mut().take_events();
        controller.cycle(ms(200)).unwrap();
        assert!(controller.hardware().valve_commands().is_empty());

        controller.hardware_mut().potentiometer = 383;
        controller.cycle(ms(300)).unwrap();
        assert_eq!(controller.hardware().valve_commands(), open_both(24));
    }

    #[test]
    fn test_manual_mode_ignores_host() {
        let mut rig = MockRig::new(Mode::Manual);
        rig.potentiometer = 512;
        rig.push_frame("#40");
        let mut controller = started(rig, RigConfig::default());

        controller.cycle(ms(100)).unwrap();
        assert_eq!(controller.hardware().valve_commands(), open_both(30));
        assert!(controller.hardware().sent().is_empty());

        // the frame waits until the host owns the setpoint again
        controller.hardware_mut().mode = Mode::Computer;
        controller.hardware_mut().take_events();
        controller.cycle(ms(200)).unwrap();
        assert_eq!(controller.hardware().sent(), ["40"]);
    }

    #[test]
    fn test_long_power_press_shuts_down_once() {
        let mut controller = started(MockRig::new(Mode::Computer), RigConfig::default());
        controller.hardware_mut().power_pressed = true;

        let mut shutdowns = 0;
        for t in 1..=50 {
            if let CycleOutcome::ShutdownRequested { settle } = controller.cycle(ms(t * 100)).unwrap()
            {
                assert_eq!(settle, RigConfig::SHUTDOWN_SETTLE_DELAY);
                shutdowns += 1;
            }
        }
        assert_eq!(shutdowns, 1);
        assert_eq!(
            controller.hardware().screens().last().map(|s| s.top()),
            Some("Power Off ..... ")
        );

        controller.power_off().unwrap();
        assert_eq!(
            controller.hardware().events().last(),
            Some(&RigEvent::PowerHold(false))
        );
        assert!(matches!(
            controller.cycle(ms(6000)),
            Err(RigError::PoweredOff)
        ));
    }

    #[test]
    fn test_failed_valve_command_is_retried() {
        let mut rig = MockRig::new(Mode::Computer);
        rig.push_frame("#30");
        rig.push_frame("#30");
        let mut controller = started(rig, RigConfig::default());
        controller.hardware_mut().fail_valve = Some(Valve::Hot);

        assert!(matches!(
            controller.cycle(ms(100)),
            Err(RigError::Io(_))
        ));
        assert_eq!(controller.state().and_then(|s| s.computer_setpoint), None);
        assert!(controller.hardware().screens().is_empty());
        assert!(controller.hardware().sent().is_empty());

        controller.hardware_mut().take_events();
        assert_eq!(controller.cycle(ms(200)).unwrap(), CycleOutcome::Running);

        let rig = controller.hardware();
        assert_eq!(rig.valve_commands(), open_both(30));
        assert_eq!(rig.sent(), ["30"]);
        assert_eq!(rig.screens()[0].top(), "SetV (30)   COMP");
    }

    #[test]
    fn test_link_failure_does_not_stop_cycling() {
        let mut rig = MockRig::new(Mode::Computer);
        rig.link_down = true;
        rig.push_frame("#30");
        rig.push_frame("#?");
        let mut controller = started(rig, RigConfig::default());

        // valves moved, only the echo was lost
        assert!(matches!(
            controller.cycle(ms(100)),
            Err(RigError::LinkClosed)
        ));
        assert_eq!(controller.hardware().valve_commands(), open_both(30));
        assert_eq!(
            controller.state().and_then(|s| s.computer_setpoint),
            Some(Setpoint::new(30).unwrap())
        );

        assert!(matches!(
            controller.cycle(ms(200)),
            Err(RigError::LinkClosed)
        ));

        controller.hardware_mut().link_down = false;
        controller.hardware_mut().push_frame("#?");
        assert_eq!(controller.cycle(ms(300)).unwrap(), CycleOutcome::Running);
        assert_eq!(controller.hardware().sent(), ["#20.0"]);
    }

    #[test]
    fn test_shutdown_wins_over_failed_action() {
        let mut controller = started(MockRig::new(Mode::Computer), RigConfig::default());
        controller.hardware_mut().power_pressed = true;

        for t in 1..=31 {
            assert_eq!(controller.cycle(ms(t * 100)).unwrap(), CycleOutcome::Running);
        }

        controller.hardware_mut().link_down = true;
        controller.hardware_mut().push_frame("#?");
        assert_eq!(
            controller.cycle(ms(3200)).unwrap(),
            CycleOutcome::ShutdownRequested {
                settle: RigConfig::SHUTDOWN_SETTLE_DELAY
            }
        );
    }

    fn short_press_then_tap(config: RigConfig) -> usize {
        let mut controller = started(MockRig::new(Mode::Computer), config);
        let mut shutdowns = 0;
        let mut step = |controller: &mut RigController<MockRig>, pressed: bool, t: u64| {
            controller.hardware_mut().power_pressed = pressed;
            if controller.cycle(ms(t)).unwrap() != CycleOutcome::Running {
                shutdowns += 1;
            }
        };

        for t in (100..=1500).step_by(100) {
            step(&mut controller, true, t);
        }
        for t in (1600..=10_000).step_by(100) {
            step(&mut controller, false, t);
        }
        step(&mut controller, true, 10_100);
        shutdowns
    }

    #[test]
    fn test_short_press_resets_by_default() {
        assert_eq!(short_press_then_tap(RigConfig::default()), 0);
    }

    #[test]
    fn test_short_press_legacy_stale_timer() {
        assert_eq!(short_press_then_tap(RigConfig::legacy()), 1);
    }

    #[test]
    fn test_custom_mixing_strategy() {
        struct ColdFirst;

        impl MixingStrategy for ColdFirst {
            fn positions(&self, _setpoint: Setpoint) -> (ValvePosition, ValvePosition) {
                (ValvePosition::Closed, ValvePosition::OpenToward(Setpoint::new(10).unwrap()))
            }
        }

        let mut rig = MockRig::new(Mode::Computer);
        rig.push_frame("#45");
        let mut controller = RigController::with_mixing(RigConfig::default(), rig, ColdFirst);
        controller.initialize().unwrap();
        controller.hardware_mut().take_events();
        controller.cycle(ms(100)).unwrap();

        assert_eq!(
            controller.hardware().valve_commands(),
            vec![
                (Valve::Cold, ValvePosition::OpenToward(Setpoint::new(10).unwrap())),
                (Valve::Hot, ValvePosition::Closed),
            ]
        );
    }
}
