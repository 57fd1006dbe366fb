//! Math utilities and types
//!
//! Provides the fundamental math types used by the cull and sort stages.
//! Matrices follow the column-vector convention; every matrix snapshot
//! handed to a backend is flattened column-major
//! (`m00, m10, m20, m30, m01, m11, ...`).

pub use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Column-major flattened 4x4 matrix, ready for raw GPU consumption
pub type MatrixSnapshot = [f32; 16];

/// Identity matrix in flattened column-major form
pub const IDENTITY_SNAPSHOT: MatrixSnapshot = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

/// Flatten a matrix into column-major order.
///
/// nalgebra stores matrices column-major already, so this is a straight copy
/// of the backing slice.
pub fn to_column_major(matrix: &Mat4) -> MatrixSnapshot {
    let mut out = [0.0; 16];
    out.copy_from_slice(matrix.as_slice());
    out
}

/// Rebuild a matrix from a column-major snapshot
pub fn from_column_major(snapshot: &MatrixSnapshot) -> Mat4 {
    Mat4::from_column_slice(snapshot)
}

/// Reduce a world matrix to the form used by screen-space 2D rendering.
///
/// Only the X/Y translation and the independent X/Y scale survive. Rotation,
/// shear and every Z term are dropped; the Z scale is kept at one so the
/// result stays invertible.
pub fn reduce_to_2d(matrix: &Mat4) -> MatrixSnapshot {
    let mut out = IDENTITY_SNAPSHOT;
    out[0] = matrix[(0, 0)];
    out[5] = matrix[(1, 1)];
    out[12] = matrix[(0, 3)];
    out[13] = matrix[(1, 3)];
    out
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create a rotation matrix around the X axis
    fn rotation_x(angle: f32) -> Mat4;

    /// Create a rotation matrix around the Y axis
    fn rotation_y(angle: f32) -> Mat4;

    /// Create a rotation matrix around the Z axis
    fn rotation_z(angle: f32) -> Mat4;

    /// Create a right-handed perspective projection with a [-1, 1] depth range
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed orthographic projection with a [-1, 1] depth range
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix (world to eye)
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn rotation_x(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::x_axis(), angle)
    }

    fn rotation_y(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::y_axis(), angle)
    }

    fn rotation_z(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), angle)
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, near, far)
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_orthographic(left, right, bottom, top, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Pi / 4
    pub const QUARTER_PI: f32 = PI * 0.25;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_column_major_order() {
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let flat = to_column_major(&m);

        // translation lives in the last column
        assert_relative_eq!(flat[12], 1.0);
        assert_relative_eq!(flat[13], 2.0);
        assert_relative_eq!(flat[14], 3.0);
        assert_relative_eq!(flat[15], 1.0);
        assert_eq!(from_column_major(&flat), m);
    }

    #[test]
    fn test_reduce_to_2d_drops_rotation_and_z() {
        let m = Mat4::new_translation(&Vec3::new(4.0, 5.0, 6.0))
            * Mat4::rotation_z(constants::QUARTER_PI)
            * Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 3.0, 7.0));
        let reduced = reduce_to_2d(&m);

        assert_relative_eq!(reduced[12], 4.0);
        assert_relative_eq!(reduced[13], 5.0);
        assert_relative_eq!(reduced[14], 0.0);
        assert_relative_eq!(reduced[1], 0.0);
        assert_relative_eq!(reduced[4], 0.0);
        assert_relative_eq!(reduced[10], 1.0);
    }

    #[test]
    fn test_look_at_moves_target_onto_negative_z() {
        let view = Mat4::look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), Vec3::y());
        let p = view.transform_point(&Point3::origin());
        assert_relative_eq!(p.z, -10.0, epsilon = 1e-5);
    }
}
