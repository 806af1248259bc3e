use thiserror::Error;

pub type NlResult<T> = Result<T, NlError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NlError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Invariant violated: {what}")]
    Invariant { what: &'static str },

    #[error("Configuration error: {what}")]
    Configuration { what: String },

    #[error("Numerical failure: {what}")]
    Numerical { what: String },
}
