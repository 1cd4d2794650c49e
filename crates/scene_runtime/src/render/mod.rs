//! Render-phase state handed to the shader layer
//!
//! - `interpolate`: keyframe bracketing for blend factors
//! - `morph`: stacked morph state with lazy per-frame evaluation
//! - `shader`: the submission interface the runtime pushes state into

pub mod interpolate;
pub mod morph;
pub mod shader;

pub use interpolate::{bracket, Bracket};
pub use morph::{MorphFrame, MorphStack};
pub use shader::{BlendState, ShaderSubmission};
