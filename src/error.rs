//! Error types for the rig controller.

/// Errors raised by the controller or its hardware collaborators.
///
/// Malformed host commands are not errors; they surface as
/// [`ParseResult::Invalid`](crate::ParseResult::Invalid) and are dropped.
#[derive(Debug, thiserror::Error)]
pub enum RigError {
    /// A setpoint value was neither CLOSED (0) nor inside the active range.
    #[error("Invalid setpoint {value} (expected 0 or {min}-{max})")]
    InvalidSetpoint {
        /// The rejected value.
        value: i32,
        /// Lowest active setpoint.
        min: i32,
        /// Highest active setpoint.
        max: i32,
    },

    /// The host link went away while a reply was being sent.
    #[error("Host link closed")]
    LinkClosed,

    /// An I/O error occurred while talking to the hardware.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The controller was used after the power relay was released.
    #[error("Controller has been powered off")]
    PoweredOff,
}
