//! Compile context
//!
//! Passed explicitly through a compile pass. It borrows the current surface's
//! state, the shader sink and the optional loader for the duration of the
//! pass, so nodes never reach for global state.

use crate::render::{MorphFrame, ShaderSubmission};
use crate::resources::{
    CreateOutcome, GeometryLoader, GeometrySource, LoadTicket, ResourceCache, ResourceError, ResourceHandle,
    ResourceId,
};
use crate::scene::{NodeId, ProjectionFrame, ProjectionTransform};
use crate::surface::{SurfaceId, SurfaceState};

/// Per-pass view of the current surface
pub struct CompileContext<'a> {
    surface: &'a mut SurfaceState,
    shader: &'a mut dyn ShaderSubmission,
    loader: Option<&'a dyn GeometryLoader>,
    frame: u64,
}

impl<'a> CompileContext<'a> {
    /// Create a context for one compile pass
    pub fn new(
        surface: &'a mut SurfaceState,
        shader: &'a mut dyn ShaderSubmission,
        loader: Option<&'a dyn GeometryLoader>,
        frame: u64,
    ) -> Self {
        Self {
            surface,
            shader,
            loader,
            frame,
        }
    }

    /// Surface being compiled
    pub fn surface_id(&self) -> &SurfaceId {
        self.surface.id()
    }

    /// Frame number of this pass
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Resource cache of the surface
    pub fn resources(&self) -> &ResourceCache {
        &self.surface.resources
    }

    /// Create or join a resource on the surface
    pub fn create_resource(
        &mut self,
        id: Option<ResourceId>,
        source: GeometrySource,
    ) -> Result<CreateOutcome, ResourceError> {
        self.surface.resources.create(id, source, self.loader)
    }

    /// Collect the outcome of a finished streamed load
    pub fn resolve(&mut self, ticket: LoadTicket) -> Option<Result<ResourceHandle, ResourceError>> {
        self.surface.resources.resolve(ticket)
    }

    /// Whether the surface still knows about a load ticket
    pub fn is_tracking(&self, ticket: LoadTicket) -> bool {
        self.surface.resources.is_tracking(ticket)
    }

    /// Make a resource the current morph for the subtree
    ///
    /// The handle must belong to this surface and still be cached.
    pub fn push_morph(&mut self, owner: NodeId, handle: &ResourceHandle, factor: f32) -> Result<(), ResourceError> {
        if handle.surface != *self.surface.id() || !self.surface.resources.contains(&handle.id) {
            return Err(ResourceError::NotFound {
                surface: self.surface.id().clone(),
                id: handle.id.clone(),
            });
        }
        self.surface.morph.push(MorphFrame {
            owner,
            resource: handle.id.clone(),
            factor,
        });
        Ok(())
    }

    /// Restore the enclosing morph
    ///
    /// # Panics
    /// Panics without a matching [`CompileContext::push_morph`].
    pub fn pop_morph(&mut self) -> MorphFrame {
        self.surface.morph.pop()
    }

    /// Innermost morph frame
    pub fn current_morph(&self) -> Option<&MorphFrame> {
        self.surface.morph.top()
    }

    /// Enter a projection scope and announce it to the shader layer
    pub fn push_projection(&mut self, owner: NodeId, transform: ProjectionTransform) {
        self.shader.push_projection(owner, &transform);
        self.surface.projections.push(ProjectionFrame { owner, transform });
    }

    /// Leave the innermost projection scope
    ///
    /// # Panics
    /// Panics without a matching [`CompileContext::push_projection`].
    pub fn pop_projection(&mut self) -> ProjectionFrame {
        let frame = self.surface.projections.pop();
        self.shader.pop_projection();
        frame
    }

    /// Innermost projection frame
    pub fn current_projection(&self) -> Option<&ProjectionFrame> {
        self.surface.projections.top()
    }

    /// Issue a draw: bring the shader's morph state up to date
    pub fn draw(&mut self, owner: NodeId) -> Result<(), ResourceError> {
        let SurfaceState { resources, morph, .. } = &mut *self.surface;
        let submitted = morph.flush(resources, &mut *self.shader)?;
        log::trace!("Draw {} (frame {}, blend submitted: {})", owner, self.frame, submitted);
        Ok(())
    }

    /// Current morph nesting depth
    pub fn morph_depth(&self) -> usize {
        self.surface.morph.depth()
    }

    /// Current projection nesting depth
    pub fn projection_depth(&self) -> usize {
        self.surface.projections.depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::GpuContext;
    use crate::scene::Optics;
    use crate::surface::Surface;
    use crate::test_support::{three_target_data, RecordingShader, ShaderCall, TestContext};
    use std::rc::Rc;

    fn state(context: &Rc<TestContext>) -> SurfaceState {
        let surface = Surface::new("canvas", Rc::clone(context) as Rc<dyn GpuContext>);
        let mut state = SurfaceState::new(surface, "m", 4);
        state.begin_pass();
        state
    }

    fn transform() -> ProjectionTransform {
        let optics = Optics::default();
        ProjectionTransform {
            matrix: optics.matrix(),
            optics,
        }
    }

    #[test]
    fn test_push_morph_rejects_foreign_and_missing_handles() {
        let context = TestContext::new();
        let mut state = state(&context);
        let mut shader = RecordingShader::default();
        let mut ctx = CompileContext::new(&mut state, &mut shader, None, 0);

        let CreateOutcome::Ready(handle) = ctx
            .create_resource(None, GeometrySource::Inline(three_target_data()))
            .unwrap()
        else {
            panic!("inline create should be ready");
        };

        let foreign = ResourceHandle {
            surface: SurfaceId::new("other"),
            id: handle.id.clone(),
        };
        assert!(matches!(ctx.push_morph(NodeId(1), &foreign, 0.5), Err(ResourceError::NotFound { .. })));

        let missing = ResourceHandle {
            surface: handle.surface.clone(),
            id: ResourceId::new("nope"),
        };
        assert!(ctx.push_morph(NodeId(1), &missing, 0.5).is_err());
        assert_eq!(ctx.morph_depth(), 0);

        ctx.push_morph(NodeId(1), &handle, 0.5).unwrap();
        assert_eq!(ctx.current_morph().map(|frame| frame.owner), Some(NodeId(1)));
        ctx.pop_morph();
    }

    #[test]
    fn test_projection_scopes_forward_to_shader() {
        let context = TestContext::new();
        let mut state = state(&context);
        let mut shader = RecordingShader::default();
        {
            let mut ctx = CompileContext::new(&mut state, &mut shader, None, 3);
            ctx.push_projection(NodeId(1), transform());
            ctx.push_projection(NodeId(2), transform());
            assert_eq!(ctx.current_projection().map(|frame| frame.owner), Some(NodeId(2)));
            assert_eq!(ctx.pop_projection().owner, NodeId(2));
            assert_eq!(ctx.current_projection().map(|frame| frame.owner), Some(NodeId(1)));
            ctx.pop_projection();
            assert_eq!(ctx.projection_depth(), 0);
        }
        state.end_pass();

        assert_eq!(
            shader.calls,
            vec![
                ShaderCall::PushProjection { owner: NodeId(1) },
                ShaderCall::PushProjection { owner: NodeId(2) },
                ShaderCall::PopProjection,
                ShaderCall::PopProjection,
            ]
        );
    }

    #[test]
    fn test_draw_without_morph_clears_blend_once() {
        let context = TestContext::new();
        let mut state = state(&context);
        let mut shader = RecordingShader::default();
        let mut ctx = CompileContext::new(&mut state, &mut shader, None, 0);

        ctx.draw(NodeId(9)).unwrap();
        ctx.draw(NodeId(9)).unwrap();
        drop(ctx);
        assert_eq!(shader.calls, vec![ShaderCall::ClearBlend]);
    }
}
