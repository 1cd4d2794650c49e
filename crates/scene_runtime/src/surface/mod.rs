//! Rendering surfaces and their per-surface state
//!
//! Every surface gets its own resource cache and traversal stacks, created
//! lazily the first time it is activated and dropped on global reset.

mod registry;

pub use registry::SurfaceRegistry;

use std::fmt;
use std::rc::Rc;

use crate::gpu::GpuContext;
use crate::render::MorphStack;
use crate::resources::ResourceCache;
use crate::scene::ProjectionFrame;
use crate::traversal::TraversalStack;

/// Stable identifier of a rendering surface
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(String);

impl SurfaceId {
    /// Create a surface id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SurfaceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SurfaceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A rendering surface: its id plus the GPU context that draws into it
#[derive(Debug, Clone)]
pub struct Surface {
    id: SurfaceId,
    context: Rc<dyn GpuContext>,
}

impl Surface {
    /// Wrap a GPU context as a surface
    pub fn new(id: impl Into<SurfaceId>, context: Rc<dyn GpuContext>) -> Self {
        Self {
            id: id.into(),
            context,
        }
    }

    /// Surface id
    pub fn id(&self) -> &SurfaceId {
        &self.id
    }

    /// GPU context of this surface
    pub fn context(&self) -> &Rc<dyn GpuContext> {
        &self.context
    }

    /// Whether the context was destroyed externally
    pub fn is_lost(&self) -> bool {
        self.context.is_lost()
    }
}

/// Everything the runtime keeps for one surface
#[derive(Debug)]
pub struct SurfaceState {
    pub(crate) surface: Surface,
    pub(crate) resources: ResourceCache,
    pub(crate) morph: MorphStack,
    pub(crate) projections: TraversalStack<ProjectionFrame>,
}

impl SurfaceState {
    /// Fresh state for a surface
    pub fn new(surface: Surface, id_prefix: &str, stack_capacity: usize) -> Self {
        let resources = ResourceCache::new(surface.id().clone(), Rc::clone(surface.context()), id_prefix);
        Self {
            surface,
            resources,
            morph: MorphStack::new(stack_capacity),
            projections: TraversalStack::with_capacity("projection", stack_capacity),
        }
    }

    /// Surface this state belongs to
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Surface id
    pub fn id(&self) -> &SurfaceId {
        self.surface.id()
    }

    /// Resource cache
    pub fn resources(&self) -> &ResourceCache {
        &self.resources
    }

    /// Mutable resource cache
    pub fn resources_mut(&mut self) -> &mut ResourceCache {
        &mut self.resources
    }

    /// Morph render state
    pub fn morph(&self) -> &MorphStack {
        &self.morph
    }

    /// Projection stack
    pub fn projections(&self) -> &TraversalStack<ProjectionFrame> {
        &self.projections
    }

    /// Start a compile pass: apply finished loads and reset the stacks
    ///
    /// Returns how many streamed resources became ready.
    ///
    /// # Panics
    /// Panics if a stack still holds frames from the previous pass.
    pub fn begin_pass(&mut self) -> usize {
        let loaded = self.resources.poll_loads();
        self.morph.begin_pass();
        self.projections.begin_pass();
        loaded
    }

    /// Finish a compile pass
    ///
    /// # Panics
    /// Panics if any traversal push was left without its pop.
    pub fn end_pass(&self) {
        self.morph.end_pass();
        self.projections.end_pass();
    }

    /// Drop frames left open by a pass that stopped on an error
    pub fn abort_pass(&mut self) -> usize {
        self.morph.unwind() + self.projections.unwind()
    }
}
