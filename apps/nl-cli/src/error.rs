//! CLI error type.

use nl_links::LinkError;
use nl_network::NetworkError;
use nl_solver::SolverError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("scenario parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("report encode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("scenario error: {what}")]
    Scenario { what: String },

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Solver(#[from] SolverError),
}

impl CliError {
    pub fn scenario(what: impl Into<String>) -> Self {
        Self::Scenario { what: what.into() }
    }
}

pub type CliResult<T> = Result<T, CliError>;
