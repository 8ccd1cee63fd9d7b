use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QcError {
    /// Caller-supplied data is malformed (mask dimensions, material parameters,
    /// confidences, calibration scale).
    #[error("Input error: {0}")]
    Input(String),

    /// Static configuration cannot serve the request (thickness outside every
    /// bracket, standards table or config failed to load or validate).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl QcError {
    pub fn input(msg: impl Into<String>) -> Self {
        QcError::Input(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        QcError::Configuration(msg.into())
    }
}

impl From<QcError> for String {
    fn from(err: QcError) -> Self {
        err.to_string()
    }
}
