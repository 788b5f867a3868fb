use thiserror::Error;

use crate::config::ConfigError;
use crate::dlq::DlqError;
use crate::domain::PolicyError;
use crate::ports::TransportError;
use crate::queue::QueueError;

/// Crate-level error for callers that do not care which component failed.
#[derive(Debug, Error)]
pub enum CourierError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Dlq(#[from] DlqError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Build(#[from] crate::app::BuildError),
}
