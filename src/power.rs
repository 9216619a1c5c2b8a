//! Power switch hold detection.

use std::time::Duration;

use log::{debug, warn};

/// Power sequencer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    /// Switch not being held (or the hold was abandoned).
    Idle,
    /// Switch first seen pressed at this uptime.
    Holding(Duration),
    /// Shutdown has fired; nothing further happens.
    ShutDown,
}

/// What the caller must do after polling the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    /// Keep running.
    None,
    /// Run the shutdown sequence now.
    Shutdown,
}

/// Detects a sustained press of the power switch.
///
/// Timestamps are uptimes supplied by the caller, so the sequencer never
/// reads a clock itself.
#[derive(Debug, Clone)]
pub struct PowerSequencer {
    state: PowerState,
    hold_threshold: Duration,
    reset_on_release: bool,
}

impl PowerSequencer {
    /// Create a sequencer with the given hold threshold and release policy.
    pub fn new(hold_threshold: Duration, reset_on_release: bool) -> Self {
        Self {
            state: PowerState::Idle,
            hold_threshold,
            reset_on_release,
        }
    }

    /// Current state.
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Feed one switch sample taken at uptime `now`.
    ///
    /// Fires [`PowerAction::Shutdown`] exactly once, on the first sample where the
    /// switch has been held for strictly longer than the threshold.
    pub fn poll(&mut self, pressed: bool, now: Duration) -> PowerAction {
        match (self.state, pressed) {
            (PowerState::ShutDown, _) => PowerAction::None,

            (PowerState::Idle, true) => {
                debug!("power switch pressed at {:?}", now);
                self.state = PowerState::Holding(now);
                PowerAction::None
            }

            (PowerState::Holding(started_at), true) => {
                if now.saturating_sub(started_at) > self.hold_threshold {
                    warn!(
                        "power switch held for {:?}, shutting down",
                        now.saturating_sub(started_at)
                    );
                    self.state = PowerState::ShutDown;
                    PowerAction::Shutdown
                } else {
                    PowerAction::None
                }
            }

            (PowerState::Holding(_), false) => {
                if self.reset_on_release {
                    debug!("power switch released before threshold");
                    self.state = PowerState::Idle;
                }
                PowerAction::None
            }

            (PowerState::Idle, false) => PowerAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_millis(3000);

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    /// Poll every 100 ms from `from` to `to` (inclusive) with the same switch level.
    fn hold(seq: &mut PowerSequencer, pressed: bool, from: u64, to: u64) -> usize {
        (from..=to)
            .step_by(100)
            .filter(|&t| seq.poll(pressed, ms(t)) == PowerAction::Shutdown)
            .count()
    }

    #[test]
    fn test_long_press_fires_once() {
        let mut seq = PowerSequencer::new(THRESHOLD, true);
        assert_eq!(hold(&mut seq, true, 0, 10_000), 1);
        assert_eq!(seq.state(), PowerState::ShutDown);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut seq = PowerSequencer::new(THRESHOLD, true);
        assert_eq!(seq.poll(true, ms(1000)), PowerAction::None);
        assert_eq!(seq.poll(true, ms(4000)), PowerAction::None);
        assert_eq!(seq.poll(true, ms(4001)), PowerAction::Shutdown);
    }

    #[test]
    fn test_short_press_with_reset() {
        let mut seq = PowerSequencer::new(THRESHOLD, true);
        assert_eq!(hold(&mut seq, true, 0, 2000), 0);
        assert_eq!(hold(&mut seq, false, 2100, 20_000), 0);
        assert_eq!(seq.state(), PowerState::Idle);

        // a fresh short press starts a fresh timer
        assert_eq!(hold(&mut seq, true, 20_100, 21_000), 0);
    }

    #[test]
    fn test_short_press_with_stale_timer() {
        let mut seq = PowerSequencer::new(THRESHOLD, false);
        assert_eq!(hold(&mut seq, true, 0, 2000), 0);
        assert_eq!(hold(&mut seq, false, 2100, 20_000), 0);
        assert_eq!(seq.state(), PowerState::Holding(ms(0)));

        // the next tap shuts down immediately because the old timer is still armed
        assert_eq!(seq.poll(true, ms(20_100)), PowerAction::Shutdown);
    }
}
