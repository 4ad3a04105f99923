use thiserror::Error;

/// Reasons a model is rejected while it is being built.
///
/// These are raised by the construction API so that a malformed model can
/// never reach the solver. Solve outcomes such as infeasibility are reported
/// through [`Status`](crate::Status) instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid bounds for variable {name}: [{lower}, {upper}]")]
    InvalidBounds { name: String, lower: f64, upper: f64 },
    #[error("Binary variable {name} has bounds [{lower}, {upper}] outside [0, 1]")]
    BinaryBounds { name: String, lower: f64, upper: f64 },
    #[error("Duplicate variable name: {0}")]
    DuplicateVariable(String),
    #[error("Unknown variable index: {0}")]
    UnknownVariable(usize),
    #[error("Non-finite value in {0}")]
    NonFinite(String),
}
