//! Morph demo application
//!
//! Runs the scene runtime headless: a camera above a morphing blob, drawn
//! into a surface whose GPU context only counts bytes. The blend factor
//! sweeps across the keyframes and every evaluated blend is logged.
//!
//! Usage: `morph_demo [config.toml|config.ron]`

use std::cell::Cell;
use std::rc::Rc;

use scene_runtime::foundation::logging;
use scene_runtime::gpu::{AllocationError, BufferDescriptor, GpuBuffer, GpuContext};
use scene_runtime::prelude::*;
use scene_runtime::scene::ProjectionTransform;
use thiserror::Error;

const FRAMES: u32 = 8;

#[derive(Debug, Error)]
enum DemoError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Runtime error: {0}")]
    Core(#[from] CoreError),

    #[error("Invalid scene: {0}")]
    Scene(#[from] ValidationError),
}

/// GPU context that tracks how many bytes are resident
#[derive(Debug, Default)]
struct CountingContext {
    resident: Rc<Cell<usize>>,
}

#[derive(Debug)]
struct CountingBuffer {
    bytes: usize,
    resident: Rc<Cell<usize>>,
}

impl GpuBuffer for CountingBuffer {
    fn byte_len(&self) -> usize {
        self.bytes
    }

    fn destroy(self: Box<Self>) {
        self.resident.set(self.resident.get() - self.bytes);
    }
}

impl GpuContext for CountingContext {
    fn is_lost(&self) -> bool {
        false
    }

    fn allocate(&self, descriptor: &BufferDescriptor<'_>) -> Result<Box<dyn GpuBuffer>, AllocationError> {
        let bytes = descriptor.as_bytes().len();
        self.resident.set(self.resident.get() + bytes);
        Ok(Box::new(CountingBuffer {
            bytes,
            resident: Rc::clone(&self.resident),
        }))
    }
}

/// Shader layer that logs what it receives
#[derive(Debug, Default)]
struct LoggingShader {
    blends: usize,
}

impl ShaderSubmission for LoggingShader {
    fn set_blend_state(&mut self, owner: NodeId, state: BlendState<'_>) {
        self.blends += 1;
        log::info!(
            "{}: blend targets {} -> {} at {:.2} ({} bytes of positions)",
            owner,
            state.lower,
            state.upper,
            state.factor,
            state
                .target_a
                .buffer(scene_runtime::gpu::AttributeChannel::Position)
                .map_or(0, |buffer| buffer.byte_len())
        );
    }

    fn clear_blend_state(&mut self) {
        log::info!("blend cleared");
    }

    fn push_projection(&mut self, owner: NodeId, transform: &ProjectionTransform) {
        log::debug!("{}: projection {:?}", owner, transform.optics);
    }

    fn pop_projection(&mut self) {}
}

fn blob() -> Result<MorphGeometryData, ValidationError> {
    let square = |scale: f32| {
        TargetData::from_positions(vec![
            -scale, -scale, 0.0, scale, -scale, 0.0, scale, scale, 0.0, -scale, scale, 0.0,
        ])
        .with_normals(vec![0.0, 0.0, 1.0].repeat(4))
    };
    MorphGeometryData::new(vec![0.0, 0.5, 1.0], vec![square(1.0), square(1.5), square(0.5)])
}

fn main() -> Result<(), DemoError> {
    let config = match std::env::args().nth(1) {
        Some(path) => RuntimeConfig::load_from_file(&path)?,
        None => RuntimeConfig::default(),
    };
    logging::init_with_config(&config);
    log::info!("Starting morph demo...");

    let context = Rc::new(CountingContext::default());
    let resident = Rc::clone(&context.resident);
    let mut runtime = SceneRuntime::new(config)?;
    runtime.activate_surface(Surface::new("main", context as Rc<dyn GpuContext>))?;

    let camera = ProjectionNode::from_config(NodeId(2), runtime.config())?
        .with_child(Box::new(DrawNode::new(NodeId(3))));
    let mut root = MorphGeometryNode::new(NodeId(1), blob()?)?.with_child(Box::new(camera));

    let mut shader = LoggingShader::default();
    for frame in 0..FRAMES {
        root.set_factor(frame as f32 / (FRAMES - 1) as f32)?;
        runtime.render_frame(&mut root, &mut shader)?;
    }
    log::info!("{} blends evaluated, {} bytes resident", shader.blends, resident.get());

    let destroyed = runtime.reset()?;
    log::info!("Reset destroyed {} resource(s), {} bytes resident", destroyed, resident.get());
    Ok(())
}
