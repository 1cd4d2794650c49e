//! Per-surface GPU resource management
//!
//! Resources are bundles of morph-target attribute buffers cached by id
//! within one surface:
//! - `geometry`: CPU-side source data and its validation
//! - `cache`: transactional allocation, reuse by key and destruction
//! - `loader`: streamed sources completed through a channel

pub mod geometry;
pub mod cache;
pub mod loader;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gpu::AllocationError;
use crate::surface::SurfaceId;
use crate::ValidationError;

pub use geometry::{GeometrySource, MorphGeometryData, MorphTarget, TargetData};
pub use cache::{CreateOutcome, ResourceCache, ResourceEntry};
pub use loader::{GeometryLoader, LoadCompletion, LoadTicket, StreamSource};

/// Identifier of a resource, unique within its surface
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create an id from any string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Reference to a cached resource held by scene nodes
///
/// Handles do not own the resource; the surface registry does.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    /// Surface whose cache holds the resource
    pub surface: SurfaceId,
    /// Resource id within that surface
    pub id: ResourceId,
}

/// Resource Manager errors
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The id is absent from a live surface cache
    #[error("Resource '{id}' not found on surface '{surface}'")]
    NotFound {
        /// Surface that was searched
        surface: SurfaceId,
        /// Missing resource id
        id: ResourceId,
    },

    /// A buffer allocation failed; everything allocated before it was released
    #[error("Allocation failed for resource '{id}' (target {target}, {channel}): {source}")]
    AllocationFailed {
        /// Resource being created
        id: ResourceId,
        /// Target index that failed
        target: usize,
        /// Channel that failed
        channel: &'static str,
        /// Backend failure
        #[source]
        source: AllocationError,
    },

    /// A streamed source was given but no loader is configured
    #[error("No geometry loader available for streamed resource '{0}'")]
    NoLoader(ResourceId),

    /// The loader reported a failure
    #[error("Loading resource '{id}' failed: {reason}")]
    LoadFailed {
        /// Resource being loaded
        id: ResourceId,
        /// Loader message
        reason: String,
    },

    /// Source data was rejected
    #[error("Invalid resource data: {0}")]
    Invalid(#[from] ValidationError),
}
