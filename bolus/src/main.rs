use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use tokio::time::{Instant, MissedTickBehavior};
use url::Url;

use bolus_core::{
    CycleOutcome, Mode, RigConfig, RigController, RigHardware, ServoRange, ValveCalibration,
};

use crate::{
    link::Port,
    panel::{EmulatedRig, PanelState},
};

mod link;
mod panel;

/// Bench emulator for the bolus mixing rig.
///
/// Runs the rig controller against a real host link; the front panel is
/// driven from stdin and the LCD is printed to stdout.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Host link, e.g. serial:///dev/ttyUSB0 or tcp+raw://127.0.0.1:4001
    port: Url,

    /// Host link baud rate (serial only)
    #[arg(long, default_value_t = RigConfig::BAUD_RATE)]
    baud: u32,

    /// Use the earlier firmware revision's timings
    #[arg(long)]
    legacy: bool,

    /// How long the power switch must be held before shutdown
    #[arg(long)]
    hold_threshold_ms: Option<u64>,

    /// Keep the power-hold timer running across releases
    #[arg(long)]
    keep_stale_power_timer: bool,

    /// Control cycle interval
    #[arg(long)]
    cycle_ms: Option<u64>,

    /// Wait for the valves to close at power-on
    #[arg(long)]
    valve_settle_ms: Option<u64>,

    /// Wait between the shutdown message and releasing power
    #[arg(long)]
    shutdown_settle_ms: Option<u64>,

    /// Start with the selection switch in manual
    #[arg(long)]
    manual: bool,

    /// Servo angle for a closed valve
    #[arg(long)]
    closed_angle: Option<u8>,

    /// Servo angle for a fully open valve
    #[arg(long)]
    open_angle: Option<u8>,
}

impl Args {
    fn config(&self) -> RigConfig {
        let mut config = if self.legacy {
            RigConfig::legacy()
        } else {
            RigConfig::default()
        };

        config.baud_rate = self.baud;

        if let Some(ms) = self.hold_threshold_ms {
            config.power_hold_threshold = Duration::from_millis(ms);
        }
        if self.keep_stale_power_timer {
            config.reset_power_timer_on_release = false;
        }
        if let Some(ms) = self.cycle_ms {
            config.cycle_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.valve_settle_ms {
            config.valve_settle_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.shutdown_settle_ms {
            config.shutdown_settle_delay = Duration::from_millis(ms);
        }

        let defaults = ValveCalibration::default();
        let range = ServoRange {
            closed: self.closed_angle.unwrap_or(defaults.hot.closed),
            open: self.open_angle.unwrap_or(defaults.hot.open),
        };
        config.valves = ValveCalibration {
            hot: range,
            cold: range,
        };

        config
    }

    fn initial_mode(&self) -> Mode {
        if self.manual {
            Mode::Manual
        } else {
            Mode::Computer
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.config();
    info!("{:?}", config);

    let link = Port::open(&args.port, config.baud_rate)
        .await
        .with_context(|| format!("failed to open host link {}", args.port))?
        .attach();

    let panel = Arc::new(Mutex::new(PanelState::new(args.initial_mode())));
    tokio::spawn({
        let panel = panel.clone();
        async move {
            if let Err(err) = panel::read_commands(panel).await {
                error!("console: {err:#}");
            }
        }
    });

    let rig = EmulatedRig::new(panel, link, config.valves);
    let mut controller = RigController::new(config, rig);

    run(&mut controller).await?;

    info!(
        "powered off (relay held: {})",
        controller.hardware().is_power_held()
    );

    Ok(())
}

/// Power the rig on and cycle it until the power switch shuts it down.
///
/// A failed cycle is logged and the next tick runs as usual; only the
/// shutdown sequence ends the loop.
async fn run<H: RigHardware>(controller: &mut RigController<H>) -> Result<()> {
    tokio::time::sleep(controller.power_on()?).await;
    controller.initialize()?;

    let boot = Instant::now();
    let mut ticker = tokio::time::interval(controller.config().cycle_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match controller.cycle(boot.elapsed()) {
            Ok(CycleOutcome::Running) => {}
            Ok(CycleOutcome::ShutdownRequested { settle }) => {
                tokio::time::sleep(settle).await;
                controller.power_off()?;
                return Ok(());
            }
            Err(err) => error!("control cycle failed: {err}"),
        }
    }
}
