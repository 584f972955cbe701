// Crate-level error umbrella
// Surfaces every phase's error through one type for callers that do not
// want to match on phases individually.

use thiserror::Error;

use crate::component::schema::ParamError;
use crate::config::ConfigError;
use crate::deploy::DeployError;
use crate::execution::executor::ExecutionError;
use crate::graph::builder::GraphConstructionError;
use crate::graph::compile::GraphValidationError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Construction(#[from] GraphConstructionError),

    #[error(transparent)]
    Validation(#[from] GraphValidationError),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
