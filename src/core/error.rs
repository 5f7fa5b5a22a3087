use thiserror::Error;

/// Errors raised by the subscription model. Every model function is pure, so
/// a failure on given inputs fails identically on retry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("division error: {0}")]
    Division(String),
}

impl ModelError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn division(msg: impl Into<String>) -> Self {
        Self::Division(msg.into())
    }
}
