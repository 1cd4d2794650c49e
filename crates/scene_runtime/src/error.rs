//! Crate-level error types
//!
//! Expected, recoverable conditions travel as `Result`s. Broken traversal
//! invariants (unbalanced stacks) are panics and never show up here.

use thiserror::Error;

use crate::config::ConfigError;
use crate::resources::ResourceError;

/// Malformed node or resource parameters, rejected at construction or setter time
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A morph resource needs at least two targets
    #[error("morph geometry needs at least 2 targets, got {0}")]
    TooFewTargets(usize),

    /// Keys and targets must pair up one to one
    #[error("morph geometry has {targets} targets but {keys} keys")]
    KeyCountMismatch {
        /// Number of targets supplied
        targets: usize,
        /// Number of keys supplied
        keys: usize,
    },

    /// Keys must be finite and non-decreasing
    #[error("morph key {index} ({value}) is not finite or is lower than the key before it")]
    KeyOrder {
        /// Index of the offending key
        index: usize,
        /// Value of the offending key
        value: f32,
    },

    /// An attribute channel holds a partial item
    #[error("channel {channel} of target {target} has {len} floats, not a multiple of {components}")]
    ChannelLength {
        /// Index of the target
        target: usize,
        /// Channel name
        channel: &'static str,
        /// Number of floats supplied
        len: usize,
        /// Components per item for the channel
        components: usize,
    },

    /// Blend factors must be finite
    #[error("blend factor {0} is not finite")]
    Factor(f32),

    /// Projection parameters outside their valid range
    #[error("invalid optics: {0}")]
    Optics(String),
}

/// Top-level error for runtime operations and bus listeners
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration file could not be loaded or saved
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Node or resource parameters were rejected
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Resource lookup, allocation or loading failed
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// A traversal operation needs an activated surface
    #[error("No surface has been activated")]
    NoActiveSurface,

    /// Application-defined listener failure
    #[error("Listener error: {0}")]
    Listener(String),
}

/// Result alias used across the runtime
pub type CoreResult<T> = Result<T, CoreError>;
