//! Two-line LCD screens.

use std::fmt;

use crate::modes::Mode;
use crate::setpoint::Setpoint;
use crate::temperature::format_celsius;

/// Character columns on the panel LCD.
pub const COLUMNS: usize = 16;

/// Contents of the 16x2 panel display.
///
/// Both lines are always exactly [`COLUMNS`] characters; the display does no
/// wrapping, so longer text is cut off and shorter text is padded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    lines: [String; 2],
}

impl Screen {
    /// Build a screen from two lines of text.
    pub fn new(top: &str, bottom: &str) -> Self {
        Self {
            lines: [fit(top), fit(bottom)],
        }
    }

    /// Shown while the valves settle after power-on.
    pub fn starting() -> Self {
        Self::new("Starting.....", "")
    }

    /// Shown before the power relay is released.
    pub fn power_off() -> Self {
        Self::new("Power Off .....", "")
    }

    /// The normal status screen.
    pub fn status(mode: Mode, setpoint: Option<Setpoint>, bolus_celsius: f32) -> Self {
        let target = match setpoint {
            Some(setpoint) if !setpoint.is_closed() => format!("{:>2}", setpoint.celsius()),
            _ => "--".to_string(),
        };
        let top = match mode {
            Mode::Manual => format!("SetV ({target})  {}", mode.tag()),
            Mode::Computer => format!("SetV ({target})   {}", mode.tag()),
        };
        let bottom = format!("Bolus {}", format_celsius(bolus_celsius));
        Self::new(&top, &bottom)
    }

    /// Top line.
    pub fn top(&self) -> &str {
        &self.lines[0]
    }

    /// Bottom line.
    pub fn bottom(&self) -> &str {
        &self.lines[1]
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}|{}]", self.lines[0], self.lines[1])
    }
}

fn fit(text: &str) -> String {
    format!("{:<width$.width$}", text, width = COLUMNS)
}
