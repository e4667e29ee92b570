//! Camera node content
//!
//! A camera contributes a perspective projection and, combined with its
//! node's global transform, the view frustum used for culling and the
//! unprojection of viewport touch points into global picking rays.

use crate::foundation::geometry::{Frustum, Ray};
use crate::foundation::math::{deg_to_rad, Mat4, TransformMatrix, Vec3, Vec4};

/// Perspective camera parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees
    pub field_of_view: f32,
    /// Near clip distance
    pub near_clip: f32,
    /// Far clip distance
    pub far_clip: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            field_of_view: 45.0,
            near_clip: 1.0,
            far_clip: 1000.0,
        }
    }
}

impl Camera {
    /// The perspective projection matrix for a viewport aspect ratio
    /// (width over height).
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::new_perspective(aspect, deg_to_rad(self.field_of_view), self.near_clip, self.far_clip)
    }

    /// The view matrix: the inverse of the camera node's global
    /// transform.
    pub fn view_matrix(&self, camera_global: &TransformMatrix) -> Mat4 {
        *camera_global.inverted().matrix()
    }

    /// Build the culling frustum from the camera's global transform and
    /// the viewport aspect ratio.
    pub fn frustum(&self, camera_global: &TransformMatrix, aspect: f32) -> Frustum {
        let vp = self.projection_matrix(aspect) * self.view_matrix(camera_global);
        Frustum::from_matrix(&vp)
    }

    /// Unproject a viewport point (origin top-left, pixels) into a
    /// global picking ray originating at the camera.
    pub fn unproject(
        &self,
        camera_global: &TransformMatrix,
        viewport: (u32, u32),
        point: (f32, f32),
    ) -> Ray {
        let (width, height) = (viewport.0 as f32, viewport.1 as f32);
        let aspect = if height > 0.0 { width / height } else { 1.0 };
        // Viewport pixel to normalized device coordinates, flipping Y.
        let ndc_x = 2.0 * point.0 / width.max(1.0) - 1.0;
        let ndc_y = 1.0 - 2.0 * point.1 / height.max(1.0);

        let inv_proj = self
            .projection_matrix(aspect)
            .try_inverse()
            .unwrap_or_else(Mat4::identity);
        let eye = inv_proj * Vec4::new(ndc_x, ndc_y, -1.0, 1.0);
        let eye_dir = Vec3::new(eye.x / eye.w, eye.y / eye.w, eye.z / eye.w);

        let origin = camera_global.translation();
        let direction = camera_global.transform_direction(eye_dir).normalize();
        Ray::new(origin, direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use approx::assert_relative_eq;

    #[test]
    fn frustum_culls_beyond_far_plane() {
        let camera = Camera {
            field_of_view: 60.0,
            near_clip: 1.0,
            far_clip: 50.0,
        };
        // Camera at origin facing -Z (the identity orientation).
        let global = TransformMatrix::identity();
        let frustum = camera.frustum(&global, 1.0);
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -10.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -100.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 10.0)));
    }

    #[test]
    fn center_of_viewport_unprojects_along_the_view_axis() {
        let camera = Camera::default();
        let global = TransformMatrix::from_trs(
            Vec3::new(0.0, 0.0, 10.0),
            Quat::identity(),
            Vec3::new(1.0, 1.0, 1.0),
        );
        let ray = camera.unproject(&global, (800, 600), (400.0, 300.0));
        assert_relative_eq!(ray.origin.z, 10.0, epsilon = 1e-5);
        assert_relative_eq!(ray.direction.z, -1.0, epsilon = 1e-4);
        assert_relative_eq!(ray.direction.x, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn top_of_viewport_unprojects_upwards() {
        let camera = Camera::default();
        let global = TransformMatrix::identity();
        let ray = camera.unproject(&global, (800, 600), (400.0, 0.0));
        assert!(ray.direction.y > 0.0);
        assert!(ray.direction.z < 0.0);
    }
}
