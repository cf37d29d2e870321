//! Error taxonomy for the simulation core
//!
//! Nothing here is fatal to the simulation loop: callers log and abort the
//! single operation that failed.

use thiserror::Error;

use crate::physics::BodyHandle;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("maze size {width}x{height} is outside the supported 3..=101 range")]
    InvalidSize { width: usize, height: usize },

    #[error("droplet capacity of {cap} reached")]
    CapacityExceeded { cap: usize },

    #[error("non-finite geometry: {0}")]
    InvalidGeometry(&'static str),

    #[error("body {0:?} is no longer in the physics world")]
    StaleReference(BodyHandle),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("settings could not be parsed: {0}")]
    Settings(#[from] serde_json::Error),
}

impl SimError {
    /// Stale references are expected after removals and are treated as no-ops
    pub fn is_stale(&self) -> bool {
        matches!(self, SimError::StaleReference(_))
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
