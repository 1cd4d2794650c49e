//! Morph geometry node
//!
//! Binds a morph resource on every surface it is compiled on and makes it
//! the current morph for its subtree. Resources are allocated lazily on the
//! first pass that needs them; streamed sources stay unbound (and push
//! nothing) until their load has been applied.

use std::collections::HashMap;

use crate::resources::{
    CreateOutcome, GeometrySource, LoadTicket, MorphGeometryData, ResourceHandle, ResourceId, StreamSource,
};
use crate::scene::{NodeId, SceneNode};
use crate::surface::{SurfaceId, SurfaceRegistry};
use crate::traversal::CompileContext;
use crate::{CoreResult, ValidationError};

#[derive(Debug, Clone, PartialEq)]
enum Binding {
    Pending(LoadTicket),
    Ready(ResourceId),
}

/// Scene node blending between keyframe targets of a morph resource
///
/// The node holds one user of its resource on every surface it was compiled
/// on. Call [`MorphGeometryNode::release`] before dropping it; a dropped node
/// keeps those users alive until the surface is reset.
pub struct MorphGeometryNode {
    id: NodeId,
    source: GeometrySource,
    resource_id: Option<ResourceId>,
    factor: f32,
    bindings: HashMap<SurfaceId, Binding>,
    pushed: bool,
    children: Vec<Box<dyn SceneNode>>,
}

impl MorphGeometryNode {
    /// Node with inline geometry, validated here
    pub fn new(id: NodeId, data: MorphGeometryData) -> Result<Self, ValidationError> {
        data.validate()?;
        Ok(Self::with_source(id, GeometrySource::Inline(data)))
    }

    /// Node whose geometry comes from a loader
    pub fn streamed(id: NodeId, source: StreamSource) -> Self {
        Self::with_source(id, GeometrySource::Stream(source))
    }

    fn with_source(id: NodeId, source: GeometrySource) -> Self {
        Self {
            id,
            source,
            resource_id: None,
            factor: 0.0,
            bindings: HashMap::new(),
            pushed: false,
            children: Vec::new(),
        }
    }

    /// Share the resource with every node using the same id (builder pattern)
    pub fn with_resource_id(mut self, id: impl Into<ResourceId>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    /// Set the initial blend factor (builder pattern)
    pub fn with_factor(mut self, factor: f32) -> Result<Self, ValidationError> {
        self.set_factor(factor)?;
        Ok(self)
    }

    /// Add a child (builder pattern)
    pub fn with_child(mut self, child: Box<dyn SceneNode>) -> Self {
        self.children.push(child);
        self
    }

    /// Current blend factor
    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Move along the key axis; values outside the keys are clamped when drawn
    pub fn set_factor(&mut self, factor: f32) -> Result<(), ValidationError> {
        if !factor.is_finite() {
            return Err(ValidationError::Factor(factor));
        }
        self.factor = factor;
        Ok(())
    }

    /// Resource bound on a surface, if it is ready
    pub fn handle(&self, surface: &SurfaceId) -> Option<ResourceHandle> {
        match self.bindings.get(surface) {
            Some(Binding::Ready(id)) => Some(ResourceHandle {
                surface: surface.clone(),
                id: id.clone(),
            }),
            _ => None,
        }
    }

    /// Whether a streamed load is still outstanding on a surface
    pub fn is_pending(&self, surface: &SurfaceId) -> bool {
        matches!(self.bindings.get(surface), Some(Binding::Pending(_)))
    }

    /// Give up every binding: release resources and cancel loads
    ///
    /// Returns how many resources were destroyed because this node was their
    /// last user. Every binding is given up even when one release fails; the
    /// first failure is returned afterwards.
    pub fn release(&mut self, registry: &mut SurfaceRegistry) -> CoreResult<usize> {
        let mut destroyed = 0;
        let mut first_error = None;
        for (surface, binding) in self.bindings.drain() {
            match binding {
                Binding::Ready(id) => match registry.release_resource(&ResourceHandle { surface, id }) {
                    Ok(true) => destroyed += 1,
                    Ok(false) => {}
                    Err(error) => {
                        log::warn!("Releasing {} failed: {}", self.id, error);
                        first_error.get_or_insert(error);
                    }
                },
                Binding::Pending(ticket) => {
                    registry.cancel_load(&surface, ticket);
                }
            }
        }
        match first_error {
            Some(error) => Err(error.into()),
            None => Ok(destroyed),
        }
    }

    /// Bring this surface's binding up to date; returns the ready handle
    fn bind(&mut self, ctx: &mut CompileContext<'_>) -> CoreResult<Option<ResourceHandle>> {
        let surface = ctx.surface_id().clone();

        let binding = match self.bindings.remove(&surface) {
            Some(Binding::Ready(id)) if ctx.resources().contains(&id) => Binding::Ready(id),
            Some(Binding::Pending(ticket)) if ctx.is_tracking(ticket) => match ctx.resolve(ticket) {
                Some(Ok(handle)) => Binding::Ready(handle.id),
                Some(Err(error)) => return Err(error.into()),
                None => Binding::Pending(ticket),
            },
            // Unbound, or the surface state was reset since the last pass.
            _ => match ctx.create_resource(self.resource_id.clone(), self.source.clone())? {
                CreateOutcome::Ready(handle) => Binding::Ready(handle.id),
                CreateOutcome::Pending(ticket) => Binding::Pending(ticket),
            },
        };

        let handle = match &binding {
            Binding::Ready(id) => Some(ResourceHandle {
                surface: surface.clone(),
                id: id.clone(),
            }),
            Binding::Pending(_) => None,
        };
        self.bindings.insert(surface, binding);
        Ok(handle)
    }
}

impl SceneNode for MorphGeometryNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn enter(&mut self, ctx: &mut CompileContext<'_>) -> CoreResult<()> {
        self.pushed = false;
        if let Some(handle) = self.bind(ctx)? {
            ctx.push_morph(self.id, &handle, self.factor)?;
            self.pushed = true;
        }
        Ok(())
    }

    fn exit(&mut self, ctx: &mut CompileContext<'_>) -> CoreResult<()> {
        if self.pushed {
            ctx.pop_morph();
            self.pushed = false;
        }
        Ok(())
    }

    fn children_mut(&mut self) -> &mut [Box<dyn SceneNode>] {
        &mut self.children
    }
}

impl std::fmt::Debug for MorphGeometryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MorphGeometryNode")
            .field("id", &self.id)
            .field("resource_id", &self.resource_id)
            .field("factor", &self.factor)
            .field("bindings", &self.bindings)
            .field("children", &self.children.len())
            .finish()
    }
}
