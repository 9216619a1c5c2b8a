use std::{
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{Context, Result, anyhow, bail};
use bolus_core::{
    DisplaySink, FrontPanel, HostLink, MAX_TEMP, MIN_TEMP, Mode, PowerRelay, Probe, RigError,
    Screen, ServoRange, TemperatureSensor, Valve, ValveCalibration, ValveDriver, ValvePosition,
};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::link::ChannelLink;

/// Front panel inputs as set from the console.
#[derive(Debug, Clone)]
pub struct PanelState {
    pub mode: Mode,
    pub potentiometer: u16,
    pub power_pressed: bool,
    pub primary_celsius: f32,
    pub secondary_celsius: f32,
}

impl PanelState {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            potentiometer: 0,
            power_pressed: false,
            primary_celsius: 20.0,
            secondary_celsius: 20.0,
        }
    }

    pub fn apply(&mut self, command: PanelCommand) {
        match command {
            PanelCommand::Mode(mode) => self.mode = mode,
            PanelCommand::Potentiometer(raw) => self.potentiometer = raw,
            PanelCommand::Power(pressed) => self.power_pressed = pressed,
            PanelCommand::Temperature(Probe::Primary, celsius) => self.primary_celsius = celsius,
            PanelCommand::Temperature(Probe::Secondary, celsius) => {
                self.secondary_celsius = celsius
            }
            PanelCommand::Status | PanelCommand::Help => {}
        }
    }
}

/// A console command that moves one of the emulated panel controls.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelCommand {
    Mode(Mode),
    Potentiometer(u16),
    Power(bool),
    Temperature(Probe, f32),
    Status,
    Help,
}

pub const HELP: &str = "\
commands:
  mode manual|computer      flip the selection switch
  pot <0-1023>              turn the potentiometer
  power press|release       hold or let go of the power switch
  temp primary|bolus <C>    set a probe reading
  status                    show the panel inputs";

impl FromStr for PanelCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let command = words.next().context("empty command")?;
        let arg = words.next();

        let parsed = match (command, arg) {
            ("mode", Some("manual" | "man")) => PanelCommand::Mode(Mode::Manual),
            ("mode", Some("computer" | "comp")) => PanelCommand::Mode(Mode::Computer),
            ("pot", Some(raw)) => PanelCommand::Potentiometer(
                raw.parse()
                    .with_context(|| format!("bad potentiometer value {raw}"))?,
            ),
            ("power", Some("press" | "on")) => PanelCommand::Power(true),
            ("power", Some("release" | "off")) => PanelCommand::Power(false),
            ("temp", Some(probe)) => {
                let probe = match probe {
                    "primary" => Probe::Primary,
                    "bolus" | "secondary" => Probe::Secondary,
                    other => bail!("unknown probe {other}"),
                };
                let raw = words.next().context("missing temperature")?;
                let celsius = raw
                    .parse()
                    .with_context(|| format!("bad temperature {raw}"))?;
                PanelCommand::Temperature(probe, celsius)
            }
            ("status", None) => PanelCommand::Status,
            ("help", None) => PanelCommand::Help,
            _ => return Err(anyhow!("unknown command: {line}")),
        };

        if let Some(extra) = words.next() {
            bail!("unexpected argument {extra}");
        }

        Ok(parsed)
    }
}

/// Read panel commands from stdin until it closes.
pub async fn read_commands(panel: Arc<Mutex<PanelState>>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{HELP}");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<PanelCommand>() {
            Ok(command) => command,
            Err(err) => {
                println!("error: {err:#}");
                continue;
            }
        };

        let mut panel = lock(&panel);
        match command {
            PanelCommand::Help => println!("{HELP}"),
            PanelCommand::Status => println!("{:?}", *panel),
            command => {
                info!("panel: {:?}", command);
                panel.apply(command);
            }
        }
    }

    Ok(())
}

fn lock(panel: &Mutex<PanelState>) -> MutexGuard<'_, PanelState> {
    panel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Servo angle for a logical valve position.
///
/// Active setpoints are spread linearly from one step past the closed angle
/// up to the open angle, so even the lowest setpoint leaves the valve cracked.
/// `open` may be below `closed` for a servo mounted the other way round.
pub fn servo_angle(range: ServoRange, position: ValvePosition) -> u8 {
    match position {
        ValvePosition::Closed => range.closed,
        ValvePosition::OpenToward(setpoint) => {
            let (closed, open) = (i32::from(range.closed), i32::from(range.open));
            let step = (open - closed).signum();
            let span = (setpoint.celsius() - MIN_TEMP).clamp(0, MAX_TEMP - MIN_TEMP);
            let angle = closed + step + (open - closed - step) * span / (MAX_TEMP - MIN_TEMP);
            angle.clamp(0, i32::from(u8::MAX)) as u8
        }
    }
}

/// The emulated rig: console-driven panel, printed LCD, logged servos and a
/// real host link.
pub struct EmulatedRig {
    panel: Arc<Mutex<PanelState>>,
    link: ChannelLink,
    valves: ValveCalibration,
    servo_angles: [u8; 2],
    power_held: bool,
}

impl EmulatedRig {
    pub fn new(panel: Arc<Mutex<PanelState>>, link: ChannelLink, valves: ValveCalibration) -> Self {
        Self {
            panel,
            link,
            valves,
            servo_angles: [valves.hot.closed, valves.cold.closed],
            power_held: false,
        }
    }

    pub fn is_power_held(&self) -> bool {
        self.power_held
    }
}

impl FrontPanel for EmulatedRig {
    fn read_mode(&mut self) -> Mode {
        lock(&self.panel).mode
    }

    fn read_potentiometer(&mut self) -> u16 {
        lock(&self.panel).potentiometer
    }

    fn power_switch_pressed(&mut self) -> bool {
        lock(&self.panel).power_pressed
    }
}

impl TemperatureSensor for EmulatedRig {
    fn read_celsius(&mut self, probe: Probe) -> f32 {
        let panel = lock(&self.panel);
        match probe {
            Probe::Primary => panel.primary_celsius,
            Probe::Secondary => panel.secondary_celsius,
        }
    }
}

impl DisplaySink for EmulatedRig {
    fn show(&mut self, screen: &Screen) -> Result<(), RigError> {
        println!("+----------------+");
        println!("|{}|", screen.top());
        println!("|{}|", screen.bottom());
        println!("+----------------+");
        Ok(())
    }
}

impl HostLink for EmulatedRig {
    fn poll_frame(&mut self) -> Option<Vec<u8>> {
        self.link.poll_frame()
    }

    fn send_line(&mut self, line: &str) -> Result<(), RigError> {
        self.link.send_line(line)
    }
}

impl PowerRelay for EmulatedRig {
    fn set_power_hold(&mut self, energized: bool) -> Result<(), RigError> {
        if energized {
            info!("power relay energised");
        } else {
            warn!("power relay released");
        }
        self.power_held = energized;
        Ok(())
    }
}

impl ValveDriver for EmulatedRig {
    fn set_valve(&mut self, valve: Valve, position: ValvePosition) -> Result<(), RigError> {
        let (range, slot) = match valve {
            Valve::Hot => (self.valves.hot, 0),
            Valve::Cold => (self.valves.cold, 1),
        };

        let angle = servo_angle(range, position);
        if self.servo_angles[slot] != angle {
            info!("{:?} valve servo -> {} ({:?})", valve, angle, position);
            self.servo_angles[slot] = angle;
        }
        Ok(())
    }
}
