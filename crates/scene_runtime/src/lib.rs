//! # Scene Runtime
//!
//! Run-time core of a retained-mode scene-graph renderer.
//!
//! ## Features
//!
//! - **Command Bus**: Priority-ordered, synchronous lifecycle events
//! - **Surface Registry**: Per-surface resource caches and traversal stacks
//! - **Morph Resources**: Transactional multi-buffer allocation with keyframe blending
//! - **Traversal Stacks**: Scoped "nearest enclosing node" state during compile
//! - **Memoized Projections**: Lazily rebuilt camera matrices
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_runtime::prelude::*;
//! # fn run(surface: Surface, shader: &mut dyn ShaderSubmission) -> CoreResult<()> {
//! let mut runtime = SceneRuntime::new(RuntimeConfig::default())?;
//! runtime.activate_surface(surface)?;
//!
//! let mut root = Group::new(NodeId(1))
//!     .with_child(Box::new(ProjectionNode::new(NodeId(2), Optics::default())?));
//! runtime.render_frame(&mut root, shader)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod events;
pub mod gpu;
pub mod surface;
pub mod resources;
pub mod traversal;
pub mod render;
pub mod scene;

mod error;
mod runtime;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{CoreError, CoreResult, ValidationError};
pub use runtime::SceneRuntime;

/// Common imports for runtime users
pub mod prelude {
    pub use crate::{
        CoreError, CoreResult, ValidationError, SceneRuntime,
        config::{Config, ConfigError, RuntimeConfig},
        events::{CommandBus, Event, EventArg, EventKind, SubscriptionKey},
        gpu::{AllocationError, BufferDescriptor, GpuBuffer, GpuContext},
        surface::{Surface, SurfaceId, SurfaceRegistry},
        resources::{
            GeometryLoader, GeometrySource, LoadCompletion, LoadTicket, MorphGeometryData,
            ResourceError, ResourceHandle, ResourceId, StreamSource, TargetData,
        },
        traversal::{CompileContext, TraversalStack},
        render::{BlendState, ShaderSubmission},
        scene::{DrawNode, Group, MorphGeometryNode, NodeId, Optics, ProjectionNode, SceneNode},
    };
}
