//! Frame driver
//!
//! Owns the command bus and the surface registry, wires them together and
//! runs compile passes over an application-owned scene tree.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::events::{CommandBus, Event, EventArg, EventKind, SubscriptionKey};
use crate::render::ShaderSubmission;
use crate::resources::{GeometryLoader, ResourceHandle};
use crate::scene::{compile_node, SceneNode};
use crate::surface::{Surface, SurfaceRegistry};
use crate::traversal::CompileContext;
use crate::{CoreError, CoreResult};

/// Scene runtime
///
/// Lifecycle events are published on [`SceneRuntime::bus`], where the
/// application can subscribe alongside the registry.
pub struct SceneRuntime {
    bus: CommandBus,
    registry: Rc<RefCell<SurfaceRegistry>>,
    config: RuntimeConfig,
    loader: Option<Rc<dyn GeometryLoader>>,
    recompile_requested: Rc<Cell<bool>>,
    frame: u64,
    subscriptions: Vec<SubscriptionKey>,
}

impl SceneRuntime {
    /// Create a runtime and publish [`EventKind::FrameworkInit`]
    pub fn new(config: RuntimeConfig) -> CoreResult<Self> {
        log::info!("Initializing scene runtime...");

        let bus = CommandBus::new();
        let registry = Rc::new(RefCell::new(SurfaceRegistry::new(&config)));
        let mut subscriptions = SurfaceRegistry::attach(&registry, &bus);

        let recompile_requested = Rc::new(Cell::new(false));
        let flag = Rc::clone(&recompile_requested);
        subscriptions.push(bus.subscribe(EventKind::RecompileRequested, move |_, _| {
            flag.set(true);
            Ok(())
        }));

        bus.publish_empty(EventKind::FrameworkInit)?;
        log::info!("Scene runtime ready ({} core listeners)", subscriptions.len());

        Ok(Self {
            bus,
            registry,
            config,
            loader: None,
            recompile_requested,
            frame: 0,
            subscriptions,
        })
    }

    /// Use a loader for streamed geometry (builder pattern)
    pub fn with_loader(mut self, loader: Rc<dyn GeometryLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Command bus carrying the lifecycle events
    pub fn bus(&self) -> &CommandBus {
        &self.bus
    }

    /// Shared surface registry
    pub fn registry(&self) -> Ref<'_, SurfaceRegistry> {
        self.registry.borrow()
    }

    /// Mutable surface registry
    ///
    /// # Panics
    /// Panics if called from inside a bus listener while the registry is
    /// handling the same dispatch.
    pub fn registry_mut(&self) -> RefMut<'_, SurfaceRegistry> {
        self.registry.borrow_mut()
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Number of the next frame to render
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Listeners the runtime registered on its own bus
    pub fn subscriptions(&self) -> &[SubscriptionKey] {
        &self.subscriptions
    }

    /// Make a surface current
    pub fn activate_surface(&mut self, surface: Surface) -> CoreResult<()> {
        log::debug!("Activating surface '{}'", surface.id());
        let event = Event::new().with_arg("surface", EventArg::Surface(surface));
        self.bus.publish(EventKind::SurfaceActivated, event)?;
        Ok(())
    }

    /// Run one compile pass over `root` on the current surface
    ///
    /// On error the pass is abandoned: open traversal scopes are discarded so
    /// the next pass starts clean, and the error is returned.
    pub fn compile(&mut self, root: &mut dyn SceneNode, shader: &mut dyn ShaderSubmission) -> CoreResult<()> {
        if self.registry.borrow().current().is_none() {
            return Err(CoreError::NoActiveSurface);
        }

        let frame = self.frame;
        self.bus
            .publish(EventKind::CompileBegin, Event::new().with_arg("frame", EventArg::Frame(frame)))?;

        let result = {
            let mut registry = self.registry.borrow_mut();
            let state = registry.current_mut().ok_or(CoreError::NoActiveSurface)?;
            let mut ctx = CompileContext::new(state, shader, self.loader.as_deref(), frame);
            let result = compile_node(root, &mut ctx);
            drop(ctx);
            if let Err(error) = &result {
                let discarded = state.abort_pass();
                log::warn!("Compile pass {} aborted ({} open scope(s) discarded): {}", frame, discarded, error);
            }
            result
        };

        let ended = self
            .bus
            .publish(EventKind::CompileEnd, Event::new().with_arg("frame", EventArg::Frame(frame)));
        result?;
        ended?;
        Ok(())
    }

    /// Render one frame: `RenderBegin`, a compile pass, `RenderEnd`
    pub fn render_frame(&mut self, root: &mut dyn SceneNode, shader: &mut dyn ShaderSubmission) -> CoreResult<()> {
        let frame = self.frame;
        log::trace!("Rendering frame {}", frame);

        self.bus
            .publish(EventKind::RenderBegin, Event::new().with_arg("frame", EventArg::Frame(frame)))?;
        self.compile(root, shader)?;
        self.bus
            .publish(EventKind::RenderEnd, Event::new().with_arg("frame", EventArg::Frame(frame)))?;

        self.frame += 1;
        Ok(())
    }

    /// Whether streamed resources became ready since the last call
    pub fn take_recompile_request(&self) -> bool {
        self.recompile_requested.replace(false)
    }

    /// Tear down every surface and cached resource
    ///
    /// Returns the number of resources destroyed.
    pub fn reset(&mut self) -> CoreResult<usize> {
        let event = self.bus.publish(EventKind::FrameworkReset, Event::new())?;
        self.recompile_requested.set(false);
        Ok(event.get_count().unwrap_or(0))
    }

    /// Destroy a resource through its handle
    pub fn destroy_resource(&self, handle: &ResourceHandle) -> CoreResult<()> {
        self.registry.borrow_mut().destroy_resource(handle)?;
        Ok(())
    }
}

impl std::fmt::Debug for SceneRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRuntime")
            .field("frame", &self.frame)
            .field("surfaces", &self.registry.borrow().surface_count())
            .field("bus", &self.bus)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::GpuContext;
    use crate::resources::{ResourceError, StreamSource};
    use crate::scene::{DrawNode, Group, MorphGeometryNode, NodeId, Optics, ProjectionNode};
    use crate::test_support::{three_target_data, ManualLoader, RecordingShader, ShaderCall, TestContext};
    use approx::assert_relative_eq;

    fn runtime_on(context: &Rc<TestContext>) -> SceneRuntime {
        let mut runtime = SceneRuntime::new(RuntimeConfig::default()).unwrap();
        runtime
            .activate_surface(Surface::new("canvas", Rc::clone(context) as Rc<dyn GpuContext>))
            .unwrap();
        runtime
    }

    fn morph(id: u64, factor: f32) -> MorphGeometryNode {
        MorphGeometryNode::new(NodeId(id), three_target_data())
            .unwrap()
            .with_factor(factor)
            .unwrap()
    }

    #[test]
    fn test_compile_without_surface_fails() {
        let mut runtime = SceneRuntime::new(RuntimeConfig::default()).unwrap();
        let mut shader = RecordingShader::default();
        let result = runtime.render_frame(&mut Group::new(NodeId(1)), &mut shader);
        assert!(matches!(result, Err(CoreError::NoActiveSurface)));
    }

    #[test]
    fn test_frame_hands_projection_and_blend_to_shader() {
        let context = TestContext::new();
        let mut runtime = runtime_on(&context);
        let mut shader = RecordingShader::default();

        let mut root = ProjectionNode::new(NodeId(1), Optics::default())
            .unwrap()
            .with_child(Box::new(morph(2, 0.2).with_child(Box::new(DrawNode::new(NodeId(3))))));
        runtime.render_frame(&mut root, &mut shader).unwrap();

        assert_eq!(shader.calls.len(), 3);
        assert_eq!(shader.calls[0], ShaderCall::PushProjection { owner: NodeId(1) });
        let ShaderCall::Blend { owner, factor, lower, upper } = shader.calls[1] else {
            panic!("expected blend, got {:?}", shader.calls[1]);
        };
        assert_eq!((owner, lower, upper), (NodeId(2), 0, 1));
        assert_relative_eq!(factor, 0.4);
        assert_eq!(shader.calls[2], ShaderCall::PopProjection);
        assert_eq!(runtime.frame(), 1);
    }

    #[test]
    fn test_nested_morphs_restore_outer_state() {
        let context = TestContext::new();
        let mut runtime = runtime_on(&context);
        let mut shader = RecordingShader::default();

        let inner = morph(2, 0.2).with_child(Box::new(DrawNode::new(NodeId(3))));
        let mut root = morph(1, 1.5)
            .with_child(Box::new(inner))
            .with_child(Box::new(DrawNode::new(NodeId(4))));
        runtime.render_frame(&mut root, &mut shader).unwrap();

        assert!(matches!(shader.calls[0], ShaderCall::Blend { owner: NodeId(2), lower: 0, upper: 1, .. }));
        let ShaderCall::Blend { owner, factor, lower, upper } = shader.calls[1] else {
            panic!("expected blend, got {:?}", shader.calls[1]);
        };
        assert_eq!((owner, lower, upper), (NodeId(1), 1, 2));
        assert_relative_eq!(factor, 1.0);
        assert_eq!(shader.calls.len(), 2);
        assert_eq!(context.allocations(), 6);
    }

    #[test]
    fn test_lifecycle_events_in_order() {
        let context = TestContext::new();
        let mut runtime = runtime_on(&context);
        let seen = Rc::new(RefCell::new(Vec::new()));
        for kind in [EventKind::RenderBegin, EventKind::CompileBegin, EventKind::CompileEnd, EventKind::RenderEnd] {
            let seen = Rc::clone(&seen);
            runtime.bus().subscribe(kind, move |_, event| {
                seen.borrow_mut().push((kind, event.get_frame()));
                Ok(())
            });
        }

        let mut shader = RecordingShader::default();
        runtime.render_frame(&mut Group::new(NodeId(1)), &mut shader).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![
                (EventKind::RenderBegin, Some(0)),
                (EventKind::CompileBegin, Some(0)),
                (EventKind::CompileEnd, Some(0)),
                (EventKind::RenderEnd, Some(0)),
            ]
        );
    }

    #[test]
    fn test_listener_error_aborts_frame() {
        let context = TestContext::new();
        let mut runtime = runtime_on(&context);
        runtime
            .bus()
            .subscribe(EventKind::RenderBegin, |_, _| Err(CoreError::Listener("host not ready".into())));

        let mut shader = RecordingShader::default();
        let result = runtime.render_frame(&mut Group::new(NodeId(1)), &mut shader);
        assert!(matches!(result, Err(CoreError::Listener(_))));
        assert_eq!(runtime.frame(), 0);
    }

    #[test]
    fn test_failed_node_leaves_stacks_clean_for_next_pass() {
        let context = TestContext::new();
        let mut runtime = runtime_on(&context);
        let mut shader = RecordingShader::default();

        // Streamed geometry without a loader fails inside the projection scope.
        let mut broken = ProjectionNode::new(NodeId(1), Optics::default())
            .unwrap()
            .with_child(Box::new(MorphGeometryNode::streamed(NodeId(2), StreamSource::new("mesh://x"))));
        let result = runtime.render_frame(&mut broken, &mut shader);
        assert!(matches!(result, Err(CoreError::Resource(ResourceError::NoLoader(_)))));
        assert_eq!(runtime.registry().current().unwrap().projections().depth(), 0);

        let mut fine = morph(3, 0.5).with_child(Box::new(DrawNode::new(NodeId(4))));
        runtime.render_frame(&mut fine, &mut shader).unwrap();
    }

    #[test]
    fn test_streamed_resource_requests_recompile() {
        let context = TestContext::new();
        let loader = Rc::new(ManualLoader::default());
        let mut runtime = runtime_on(&context).with_loader(Rc::clone(&loader) as Rc<dyn GeometryLoader>);
        let mut shader = RecordingShader::default();

        let mut root = MorphGeometryNode::streamed(NodeId(1), StreamSource::new("mesh://blob"))
            .with_child(Box::new(DrawNode::new(NodeId(2))));
        runtime.render_frame(&mut root, &mut shader).unwrap();
        assert_eq!(loader.requested(), 1);
        assert!(!runtime.take_recompile_request());
        assert_eq!(shader.calls, vec![ShaderCall::ClearBlend]);

        assert!(loader.complete_next(three_target_data()));
        runtime.render_frame(&mut root, &mut shader).unwrap();
        assert!(runtime.take_recompile_request());
        assert!(!runtime.take_recompile_request());
        assert!(matches!(shader.calls[1], ShaderCall::Blend { owner: NodeId(1), .. }));
    }

    #[test]
    fn test_reset_releases_every_surface() {
        let context = TestContext::new();
        let mut runtime = runtime_on(&context);
        let mut shader = RecordingShader::default();

        let mut scene = Group::new(NodeId(1))
            .with_child(Box::new(morph(2, 0.0)))
            .with_child(Box::new(morph(3, 0.0)));
        runtime.render_frame(&mut scene, &mut shader).unwrap();
        runtime
            .activate_surface(Surface::new("second", Rc::clone(&context) as Rc<dyn GpuContext>))
            .unwrap();
        runtime.render_frame(&mut scene, &mut shader).unwrap();
        assert_eq!(context.live_buffers(), 12);

        assert_eq!(runtime.reset().unwrap(), 4);
        assert_eq!(context.live_buffers(), 0);
        assert_eq!(runtime.registry().surface_count(), 0);

        let result = runtime.render_frame(&mut scene, &mut shader);
        assert!(matches!(result, Err(CoreError::NoActiveSurface)));
    }

    #[test]
    fn test_projection_derived_once_across_frames() {
        let context = TestContext::new();
        let mut runtime = runtime_on(&context);
        let mut shader = RecordingShader::default();
        let mut camera = ProjectionNode::from_config(NodeId(1), runtime.config()).unwrap();

        for _ in 0..3 {
            runtime.render_frame(&mut camera, &mut shader).unwrap();
        }
        assert_eq!(camera.recompute_count(), 1);

        camera.set_aspect(1.5).unwrap();
        runtime.render_frame(&mut camera, &mut shader).unwrap();
        assert_eq!(camera.recompute_count(), 2);
    }

    #[test]
    fn test_destroy_through_runtime() {
        let context = TestContext::new();
        let mut runtime = runtime_on(&context);
        let mut shader = RecordingShader::default();
        let mut node = morph(1, 0.0);
        runtime.render_frame(&mut node, &mut shader).unwrap();

        let handle = node.handle(&"canvas".into()).unwrap();
        runtime.destroy_resource(&handle).unwrap();
        assert!(matches!(
            runtime.destroy_resource(&handle),
            Err(CoreError::Resource(ResourceError::NotFound { .. }))
        ));
    }
}
