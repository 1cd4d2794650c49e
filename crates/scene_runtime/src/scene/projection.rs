//! # Projection Nodes
//!
//! Camera optics as a scene node. The projection matrix is derived from the
//! optics on first use and cached in a [`Memo`] until the optics change.
//!
//! ## Conventions
//! - **View space**: right-handed, Y up, Z+ forward (away from the viewer)
//! - **Depth**: near plane maps to 0, far plane to 1
//! - **Angles**: `fovy` is given in degrees and converted internally

use serde::{Deserialize, Serialize};

use crate::config::RuntimeConfig;
use crate::foundation::math::{utils, Mat4, Mat4Ext};
use crate::foundation::memo::Memo;
use crate::scene::{NodeId, SceneNode};
use crate::traversal::CompileContext;
use crate::{CoreResult, ValidationError};

const DEFAULT_NEAR: f32 = 0.1;
const DEFAULT_FAR: f32 = 5000.0;

/// Camera optics
///
/// Serialized with a `type` tag naming the variant:
///
/// ```toml
/// type = "perspective"
/// fovy = 45.0
/// aspect = 1.5
/// near = 0.1
/// far = 100.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Optics {
    /// Symmetric perspective from a vertical field of view
    Perspective {
        /// Vertical field of view in degrees, in `(0, 180)`
        fovy: f32,
        /// Viewport width over height
        aspect: f32,
        /// Near plane distance
        near: f32,
        /// Far plane distance
        far: f32,
    },
    /// Orthographic projection of a view-space box
    Ortho {
        /// Left edge
        left: f32,
        /// Right edge
        right: f32,
        /// Bottom edge
        bottom: f32,
        /// Top edge
        top: f32,
        /// Near plane distance
        near: f32,
        /// Far plane distance
        far: f32,
    },
    /// Off-center perspective defined by its near-plane rectangle
    Frustum {
        /// Left edge at the near plane
        left: f32,
        /// Right edge at the near plane
        right: f32,
        /// Bottom edge at the near plane
        bottom: f32,
        /// Top edge at the near plane
        top: f32,
        /// Near plane distance
        near: f32,
        /// Far plane distance
        far: f32,
    },
}

impl Default for Optics {
    /// 60° perspective, square aspect, near 0.1, far 5000
    fn default() -> Self {
        Self::Perspective {
            fovy: 60.0,
            aspect: 1.0,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }
}

impl Optics {
    /// Validated perspective optics
    pub fn perspective(fovy: f32, aspect: f32, near: f32, far: f32) -> Result<Self, ValidationError> {
        let optics = Self::Perspective { fovy, aspect, near, far };
        optics.validate()?;
        Ok(optics)
    }

    /// Validated orthographic optics
    pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Result<Self, ValidationError> {
        let optics = Self::Ortho { left, right, bottom, top, near, far };
        optics.validate()?;
        Ok(optics)
    }

    /// Validated off-center perspective optics
    pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Result<Self, ValidationError> {
        let optics = Self::Frustum { left, right, bottom, top, near, far };
        optics.validate()?;
        Ok(optics)
    }

    /// Unit box orthographic optics (±1) with the default clip planes
    pub fn default_ortho() -> Self {
        Self::Ortho {
            left: -1.0,
            right: 1.0,
            bottom: -1.0,
            top: 1.0,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }

    /// Unit box frustum optics (±1) with the default clip planes
    pub fn default_frustum() -> Self {
        Self::Frustum {
            left: -1.0,
            right: 1.0,
            bottom: -1.0,
            top: 1.0,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }

    /// Parse tagged optics from RON and validate them
    pub fn from_ron(text: &str) -> Result<Self, ValidationError> {
        let optics: Self = ron::from_str(text).map_err(|e| ValidationError::Optics(e.to_string()))?;
        optics.validate()?;
        Ok(optics)
    }

    /// Check the parameters describe a usable projection
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |message: String| Err(ValidationError::Optics(message));

        let (near, far) = match *self {
            Self::Perspective { fovy, aspect, near, far } => {
                if !(fovy > 0.0 && fovy < 180.0) {
                    return invalid(format!("fovy {fovy} outside (0, 180)"));
                }
                if !(aspect > 0.0 && aspect.is_finite()) {
                    return invalid(format!("aspect {aspect} must be positive"));
                }
                (near, far)
            }
            Self::Ortho { left, right, bottom, top, near, far }
            | Self::Frustum { left, right, bottom, top, near, far } => {
                if !(right > left) || !(top > bottom) {
                    return invalid(format!("degenerate box [{left}, {right}] x [{bottom}, {top}]"));
                }
                (near, far)
            }
        };

        if !(near > 0.0) {
            return invalid(format!("near plane {near} must be positive"));
        }
        if !(far > near) || !far.is_finite() {
            return invalid(format!("far plane {far} must lie beyond near plane {near}"));
        }
        Ok(())
    }

    /// Projection matrix for these optics
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Self::Perspective { fovy, aspect, near, far } => {
                Mat4::perspective(utils::deg_to_rad(fovy), aspect, near, far)
            }
            Self::Ortho { left, right, bottom, top, near, far } => {
                Mat4::orthographic(left, right, bottom, top, near, far)
            }
            Self::Frustum { left, right, bottom, top, near, far } => {
                Mat4::frustum(left, right, bottom, top, near, far)
            }
        }
    }
}

/// Derived projection state handed to the shader layer
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionTransform {
    /// Optics the matrix was derived from
    pub optics: Optics,
    /// View-to-clip matrix
    pub matrix: Mat4,
}

impl ProjectionTransform {
    fn derive(optics: &Optics) -> Self {
        log::trace!("Deriving projection matrix for {:?}", optics);
        Self {
            optics: optics.clone(),
            matrix: optics.matrix(),
        }
    }
}

/// Projection stack frame: the nearest enclosing camera
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionFrame {
    /// Node that pushed the frame
    pub owner: NodeId,
    /// Its derived transform
    pub transform: ProjectionTransform,
}

/// Scene node establishing a projection for its subtree
pub struct ProjectionNode {
    id: NodeId,
    optics: Optics,
    memo: Memo<ProjectionTransform>,
    children: Vec<Box<dyn SceneNode>>,
}

impl ProjectionNode {
    /// Create a projection node
    ///
    /// # Arguments
    /// * `id` - Node id
    /// * `optics` - Camera optics, validated here
    ///
    /// # Errors
    /// [`ValidationError::Optics`] if the optics are unusable.
    pub fn new(id: NodeId, optics: Optics) -> Result<Self, ValidationError> {
        optics.validate()?;
        Ok(Self {
            id,
            optics,
            memo: Memo::new(),
            children: Vec::new(),
        })
    }

    /// Create a projection node with the configured default optics
    pub fn from_config(id: NodeId, config: &RuntimeConfig) -> Result<Self, ValidationError> {
        Self::new(id, config.default_optics.clone())
    }

    /// Add a child (builder pattern)
    pub fn with_child(mut self, child: Box<dyn SceneNode>) -> Self {
        self.children.push(child);
        self
    }

    /// Current optics
    pub fn optics(&self) -> &Optics {
        &self.optics
    }

    /// Replace the optics; the matrix is rebuilt on next use
    ///
    /// Invalid optics are rejected and leave the node unchanged.
    pub fn set_optics(&mut self, optics: Optics) -> Result<(), ValidationError> {
        optics.validate()?;
        self.optics = optics;
        self.memo.invalidate();
        Ok(())
    }

    /// Change the aspect ratio of perspective optics
    ///
    /// Box optics carry their aspect in their edges, so this is rejected for
    /// them.
    pub fn set_aspect(&mut self, aspect: f32) -> Result<(), ValidationError> {
        let Optics::Perspective { fovy, near, far, .. } = self.optics else {
            return Err(ValidationError::Optics(
                "aspect can only be set on perspective optics".to_string(),
            ));
        };
        self.set_optics(Optics::perspective(fovy, aspect, near, far)?)
    }

    /// Derived transform, rebuilt only if the optics changed
    pub fn derived(&mut self) -> &ProjectionTransform {
        let optics = &self.optics;
        self.memo.get_or_compute(|| ProjectionTransform::derive(optics))
    }

    /// Memo level of the derived transform
    pub fn memo_level(&self) -> u8 {
        self.memo.level()
    }

    /// Number of times the transform has been derived
    pub fn recompute_count(&self) -> u64 {
        self.memo.recompute_count()
    }
}

impl SceneNode for ProjectionNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn enter(&mut self, ctx: &mut CompileContext<'_>) -> CoreResult<()> {
        let transform = self.derived().clone();
        ctx.push_projection(self.id, transform);
        Ok(())
    }

    fn exit(&mut self, ctx: &mut CompileContext<'_>) -> CoreResult<()> {
        ctx.pop_projection();
        Ok(())
    }

    fn children_mut(&mut self) -> &mut [Box<dyn SceneNode>] {
        &mut self.children
    }
}

impl std::fmt::Debug for ProjectionNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionNode")
            .field("id", &self.id)
            .field("optics", &self.optics)
            .field("memo_level", &self.memo.level())
            .field("children", &self.children.len())
            .finish()
    }
}
