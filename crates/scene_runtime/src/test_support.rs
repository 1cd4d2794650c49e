//! Test doubles for the external collaborators

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::gpu::{AllocationError, BufferDescriptor, GpuBuffer, GpuContext};
use crate::render::{BlendState, ShaderSubmission};
use crate::resources::{GeometryLoader, LoadCompletion, MorphGeometryData, StreamSource, TargetData};
use crate::scene::{NodeId, ProjectionTransform};

/// Three position-only targets keyed at 0, 0.5 and 1
pub fn three_target_data() -> MorphGeometryData {
    MorphGeometryData::new(
        vec![0.0, 0.5, 1.0],
        (0..3)
            .map(|i| TargetData::from_positions(vec![i as f32; 9]))
            .collect(),
    )
    .expect("valid test geometry")
}

#[derive(Debug, Default)]
struct Counters {
    allocations: Cell<usize>,
    destroyed: Cell<usize>,
}

/// GPU context counting buffers, with failure injection and context loss
#[derive(Debug, Default)]
pub struct TestContext {
    counters: Rc<Counters>,
    lost: Cell<bool>,
    fail_after: Cell<Option<usize>>,
    failure: RefCell<Option<AllocationError>>,
}

impl TestContext {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Let `successes` more allocations through, then fail with `error`
    pub fn fail_after(&self, successes: usize, error: AllocationError) {
        self.fail_after.set(Some(self.allocations() + successes));
        *self.failure.borrow_mut() = Some(error);
    }

    pub fn lose(&self) {
        self.lost.set(true);
    }

    /// Successful allocations so far
    pub fn allocations(&self) -> usize {
        self.counters.allocations.get()
    }

    pub fn destroyed(&self) -> usize {
        self.counters.destroyed.get()
    }

    pub fn live_buffers(&self) -> usize {
        self.allocations() - self.destroyed()
    }
}

impl GpuContext for TestContext {
    fn is_lost(&self) -> bool {
        self.lost.get()
    }

    fn allocate(&self, descriptor: &BufferDescriptor<'_>) -> Result<Box<dyn GpuBuffer>, AllocationError> {
        if self.is_lost() {
            return Err(AllocationError::ContextLost);
        }
        if self.fail_after.get() == Some(self.allocations()) {
            if let Some(error) = self.failure.borrow().clone() {
                return Err(error);
            }
        }
        self.counters.allocations.set(self.allocations() + 1);
        Ok(Box::new(TestBuffer {
            byte_len: descriptor.byte_len(),
            counters: Rc::clone(&self.counters),
        }))
    }
}

#[derive(Debug)]
struct TestBuffer {
    byte_len: usize,
    counters: Rc<Counters>,
}

impl GpuBuffer for TestBuffer {
    fn byte_len(&self) -> usize {
        self.byte_len
    }

    fn destroy(self: Box<Self>) {
        self.counters.destroyed.set(self.counters.destroyed.get() + 1);
    }
}

/// What a [`RecordingShader`] was told
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderCall {
    Blend {
        owner: NodeId,
        factor: f32,
        lower: usize,
        upper: usize,
    },
    ClearBlend,
    PushProjection {
        owner: NodeId,
    },
    PopProjection,
}

/// Shader sink that records every call
#[derive(Debug, Default)]
pub struct RecordingShader {
    pub calls: Vec<ShaderCall>,
}

impl ShaderSubmission for RecordingShader {
    fn set_blend_state(&mut self, owner: NodeId, state: BlendState<'_>) {
        self.calls.push(ShaderCall::Blend {
            owner,
            factor: state.factor,
            lower: state.lower,
            upper: state.upper,
        });
    }

    fn clear_blend_state(&mut self) {
        self.calls.push(ShaderCall::ClearBlend);
    }

    fn push_projection(&mut self, owner: NodeId, _transform: &ProjectionTransform) {
        self.calls.push(ShaderCall::PushProjection { owner });
    }

    fn pop_projection(&mut self) {
        self.calls.push(ShaderCall::PopProjection);
    }
}

/// Loader that holds completions until the test delivers them, oldest first
#[derive(Debug, Default)]
pub struct ManualLoader {
    queue: RefCell<Vec<(StreamSource, LoadCompletion)>>,
}

impl ManualLoader {
    pub fn requested(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn complete_next(&self, data: MorphGeometryData) -> bool {
        let (_, completion) = self.queue.borrow_mut().remove(0);
        completion.complete(data)
    }

    pub fn fail_next(&self, reason: &str) -> bool {
        let (_, completion) = self.queue.borrow_mut().remove(0);
        completion.fail(reason)
    }
}

impl GeometryLoader for ManualLoader {
    fn load(&self, source: &StreamSource, completion: LoadCompletion) {
        self.queue.borrow_mut().push((source.clone(), completion));
    }
}
