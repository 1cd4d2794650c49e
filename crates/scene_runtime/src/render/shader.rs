//! Shader submission interface
//!
//! The runtime never talks to a GPU pipeline directly. Evaluated render state
//! is pushed through [`ShaderSubmission`], implemented by the host's shader
//! layer.

use crate::resources::MorphTarget;
use crate::scene::{NodeId, ProjectionTransform};

/// Evaluated morph blend for the current draw
#[derive(Debug, Clone, Copy)]
pub struct BlendState<'a> {
    /// Weight of `target_b` in `[0, 1]`
    pub factor: f32,
    /// Index of the lower bracketing keyframe
    pub lower: usize,
    /// Index of the upper bracketing keyframe
    pub upper: usize,
    /// Buffers of the lower keyframe
    pub target_a: &'a MorphTarget,
    /// Buffers of the upper keyframe
    pub target_b: &'a MorphTarget,
}

/// Receiver of evaluated render state
pub trait ShaderSubmission {
    /// Bind a morph blend for subsequent draws
    fn set_blend_state(&mut self, owner: NodeId, state: BlendState<'_>);

    /// No morph applies to subsequent draws
    fn clear_blend_state(&mut self);

    /// Enter the scope of a projection
    fn push_projection(&mut self, owner: NodeId, transform: &ProjectionTransform);

    /// Leave the innermost projection scope
    fn pop_projection(&mut self);
}
