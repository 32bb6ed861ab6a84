use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Reasoning service error: {0}")]
    ServiceError(#[from] dharmaloops_agent::ServiceError),

    #[error("Invalid session settings: {0}")]
    InvalidSettings(String),
}
