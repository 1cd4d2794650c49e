//! Math utilities and types
//!
//! Provides the matrix types used by transform-producing nodes. View space is
//! right-handed and Y-up with +Z pointing into the screen; every projection
//! maps depth into `[0, 1]`.

pub use nalgebra::{Vector3, Vector4, Matrix4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Clamp a value between min and max
    pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
        if value < min { min } else if value > max { max } else { value }
    }
}

/// Extension trait for Mat4 with projection constructors
pub trait Mat4Ext {
    /// Create a symmetric perspective projection matrix
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create an off-center perspective projection from the near-plane box
    fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Create an orthographic projection from a view-space box
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        // P = [a⁻¹/tan(φ/2)    0              0                    0           ]
        //     [0               1/tan(φ/2)     0                    0           ]
        //     [0               0              f/(f-n)              -nf/(f-n)   ]
        //     [0               0              1                    0           ]
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (far - near);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = 1.0;

        result
    }

    fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        // Same depth mapping as `perspective`; the box shifts the center of
        // projection so asymmetric bounds land on the NDC edges.
        let width = right - left;
        let height = top - bottom;

        let mut result = Mat4::zeros();
        result[(0, 0)] = 2.0 * near / width;
        result[(0, 2)] = -(right + left) / width;
        result[(1, 1)] = 2.0 * near / height;
        result[(1, 2)] = -(top + bottom) / height;
        result[(2, 2)] = far / (far - near);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = 1.0;

        result
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let width = right - left;
        let height = top - bottom;
        let depth = far - near;

        let mut result = Mat4::identity();
        result[(0, 0)] = 2.0 / width;
        result[(0, 3)] = -(right + left) / width;
        result[(1, 1)] = 2.0 / height;
        result[(1, 3)] = -(top + bottom) / height;
        result[(2, 2)] = 1.0 / depth;
        result[(2, 3)] = -near / depth;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn project(m: &Mat4, point: Vec3) -> Vec3 {
        let clip = m * Vec4::new(point.x, point.y, point.z, 1.0);
        Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
    }

    #[test]
    fn test_symmetric_frustum_matches_perspective() {
        let fov = utils::deg_to_rad(60.0);
        let near = 0.5;
        let far = 100.0;
        let aspect = 1.5;
        let top = near * (fov * 0.5).tan();
        let right = top * aspect;

        let a = Mat4::perspective(fov, aspect, near, far);
        let b = Mat4::frustum(-right, right, -top, top, near, far);
        assert_relative_eq!(a, b, epsilon = 1e-5);
    }

    #[test]
    fn test_frustum_maps_box_corners_to_ndc_edges() {
        let m = Mat4::frustum(-1.0, 3.0, -2.0, 1.0, 1.0, 10.0);

        let near_corner = project(&m, Vec3::new(3.0, 1.0, 1.0));
        assert_relative_eq!(near_corner, Vec3::new(1.0, 1.0, 0.0), epsilon = 1e-5);

        let far_corner = project(&m, Vec3::new(-10.0, -20.0, 10.0));
        assert_relative_eq!(far_corner, Vec3::new(-1.0, -1.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_orthographic_maps_box_to_unit_depth() {
        let m = Mat4::orthographic(-2.0, 2.0, -1.0, 1.0, 1.0, 11.0);

        assert_relative_eq!(project(&m, Vec3::new(2.0, 1.0, 1.0)), Vec3::new(1.0, 1.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(project(&m, Vec3::new(-2.0, -1.0, 11.0)), Vec3::new(-1.0, -1.0, 1.0), epsilon = 1e-6);
        assert_relative_eq!(project(&m, Vec3::new(0.0, 0.0, 6.0)), Vec3::new(0.0, 0.0, 0.5), epsilon = 1e-6);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(utils::clamp(1.5, 0.0, 1.0), 1.0);
        assert_eq!(utils::clamp(-0.5, 0.0, 1.0), 0.0);
        assert_eq!(utils::clamp(0.25, 0.0, 1.0), 0.25);
    }
}
