//! Light and clip-plane snapshots taken during culling

use std::sync::Arc;

use crate::foundation::math::{from_column_major, Mat4, MatrixSnapshot};
use crate::scene::effects::{ClipPlane, Light};

/// An effect renderable paired with the transform that was current when the
/// cull stage collected it
#[derive(Debug)]
pub struct VisualDetails<T> {
    /// The effect
    pub renderable: Arc<T>,
    /// Column-major world transform at collection time
    pub transform: MatrixSnapshot,
}

/// Light snapshot
pub type LightDetails = VisualDetails<Light>;

/// Clip-plane snapshot
pub type ClipDetails = VisualDetails<ClipPlane>;

impl<T> Clone for VisualDetails<T> {
    fn clone(&self) -> Self {
        Self {
            renderable: Arc::clone(&self.renderable),
            transform: self.transform,
        }
    }
}

impl<T> VisualDetails<T> {
    /// Pair a renderable with a transform snapshot
    pub fn new(renderable: Arc<T>, transform: MatrixSnapshot) -> Self {
        Self { renderable, transform }
    }

    /// The snapshot as a matrix
    pub fn world_matrix(&self) -> Mat4 {
        from_column_major(&self.transform)
    }

    /// Raw bytes of the snapshot for direct upload
    pub fn transform_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.transform)
    }

    /// Same effect object collected under the same transform
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.renderable, &other.renderable) && self.transform == other.transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{to_column_major, Vec3, IDENTITY_SNAPSHOT};

    #[test]
    fn test_identity_requires_same_light_and_transform() {
        let light = Arc::new(Light::directional(Vec3::new(0.0, -1.0, 0.0)));
        let moved = to_column_major(&Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0)));

        let a = LightDetails::new(light.clone(), IDENTITY_SNAPSHOT);
        let b = LightDetails::new(light.clone(), IDENTITY_SNAPSHOT);
        let c = LightDetails::new(light, moved);
        let d = LightDetails::new(Arc::new(Light::directional(Vec3::new(0.0, -1.0, 0.0))), IDENTITY_SNAPSHOT);

        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
        assert!(!a.same_as(&d));
    }

    #[test]
    fn test_transform_bytes_length() {
        let clip = Arc::new(ClipPlane::new(crate::foundation::math::Vec4::new(0.0, 1.0, 0.0, 0.0)));
        let details = ClipDetails::new(clip, IDENTITY_SNAPSHOT);
        assert_eq!(details.transform_bytes().len(), 64);
        assert_eq!(details.world_matrix(), Mat4::identity());
    }
}
