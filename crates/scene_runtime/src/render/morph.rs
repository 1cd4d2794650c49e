//! Morph render state
//!
//! Morph geometry nodes push a frame on entry and pop it on exit. The blend
//! for the innermost frame is only evaluated when something is drawn, and
//! only if the stack changed since the last evaluation.

use crate::render::{bracket, BlendState, ShaderSubmission};
use crate::resources::{ResourceCache, ResourceError, ResourceId};
use crate::scene::NodeId;
use crate::traversal::TraversalStack;
use crate::ValidationError;

/// Morph state contributed by one node
#[derive(Debug, Clone, PartialEq)]
pub struct MorphFrame {
    /// Node that pushed the frame
    pub owner: NodeId,
    /// Resource to blend, on the stack's surface
    pub resource: ResourceId,
    /// Blend factor on the resource's key axis
    pub factor: f32,
}

/// Stack of morph frames plus dirty tracking for lazy evaluation
#[derive(Debug, Clone)]
pub struct MorphStack {
    frames: TraversalStack<MorphFrame>,
    dirty: bool,
    evaluations: u64,
}

impl MorphStack {
    /// Create an empty stack
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: TraversalStack::with_capacity("morph", capacity),
            dirty: true,
            evaluations: 0,
        }
    }

    /// Enter a morph node's scope
    pub fn push(&mut self, frame: MorphFrame) {
        self.frames.push(frame);
        self.dirty = true;
    }

    /// Leave the innermost morph scope
    ///
    /// # Panics
    /// Panics on a pop without a matching push.
    pub fn pop(&mut self) -> MorphFrame {
        let frame = self.frames.pop();
        self.dirty = true;
        frame
    }

    /// Innermost morph frame
    pub fn top(&self) -> Option<&MorphFrame> {
        self.frames.top()
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.frames.depth()
    }

    /// Whether the shader state is out of date
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of blend states handed to the shader layer so far
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Start a compile pass; the first draw always submits state
    pub fn begin_pass(&mut self) {
        self.frames.begin_pass();
        self.dirty = true;
    }

    /// Finish a compile pass
    pub fn end_pass(&self) {
        self.frames.end_pass();
    }

    /// Discard frames left by an aborted pass
    pub fn unwind(&mut self) -> usize {
        self.dirty = true;
        self.frames.unwind()
    }

    /// Evaluate the innermost frame and hand it to the shader layer
    ///
    /// Does nothing unless the stack changed since the last flush. Returns
    /// whether state was submitted.
    pub fn flush(&mut self, cache: &ResourceCache, shader: &mut dyn ShaderSubmission) -> Result<bool, ResourceError> {
        if !self.dirty {
            return Ok(false);
        }

        let Some(frame) = self.frames.top() else {
            shader.clear_blend_state();
            self.dirty = false;
            return Ok(true);
        };

        let entry = cache.get(&frame.resource).ok_or_else(|| ResourceError::NotFound {
            surface: cache.surface().clone(),
            id: frame.resource.clone(),
        })?;
        let b = bracket(entry.keys(), frame.factor)
            .ok_or(ResourceError::Invalid(ValidationError::TooFewTargets(entry.keys().len())))?;

        log::trace!(
            "Morph '{}' at {}: keys {}..{} weight {}",
            frame.resource, frame.factor, b.lower, b.upper, b.factor
        );
        shader.set_blend_state(
            frame.owner,
            BlendState {
                factor: b.factor,
                lower: b.lower,
                upper: b.upper,
                target_a: &entry.targets()[b.lower],
                target_b: &entry.targets()[b.upper],
            },
        );
        self.evaluations += 1;
        self.dirty = false;
        Ok(true)
    }
}
