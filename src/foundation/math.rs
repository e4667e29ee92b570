//! Math utilities and types
//!
//! Provides the fundamental math types for the scene graph. All linear
//! algebra is delegated to nalgebra; this module adds the affine
//! `TransformMatrix` with rigidity tracking used throughout transform
//! propagation.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

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

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Convert degrees to radians
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees * constants::DEG_TO_RAD
}

/// Convert radians to degrees
pub fn rad_to_deg(radians: f32) -> f32 {
    radians * constants::RAD_TO_DEG
}

/// 4x4 affine transformation matrix that tracks whether it is rigid.
///
/// A matrix is rigid when it is composed only of rotations and
/// translations. Rigidity is preserved through composition of rigid
/// matrices and lost when a non-unit scale enters the product. A rigid
/// matrix can be inverted cheaply by transposing its rotation component
/// and negating the rotated translation; non-rigid matrices fall back to
/// a full inversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformMatrix {
    matrix: Mat4,
    is_rigid: bool,
}

impl Default for TransformMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl TransformMatrix {
    /// The identity transform. Identity is rigid.
    pub fn identity() -> Self {
        Self {
            matrix: Mat4::identity(),
            is_rigid: true,
        }
    }

    /// Build from translation, rotation and scale, applied in TRS order.
    ///
    /// The result is rigid iff `scale` is exactly `(1, 1, 1)`.
    pub fn from_trs(location: Vec3, rotation: Quat, scale: Vec3) -> Self {
        let matrix = Mat4::new_translation(&location)
            * rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&scale);
        Self {
            matrix,
            is_rigid: scale == Vec3::new(1.0, 1.0, 1.0),
        }
    }

    /// Wrap an arbitrary matrix, declaring its rigidity explicitly.
    ///
    /// Callers that build matrices by hand are responsible for the flag;
    /// rigidity is a property of the matrix, not a tolerance test.
    pub fn from_matrix(matrix: Mat4, is_rigid: bool) -> Self {
        Self { matrix, is_rigid }
    }

    /// The raw 4x4 matrix.
    pub fn matrix(&self) -> &Mat4 {
        &self.matrix
    }

    /// Whether this matrix contains only rotation and translation.
    pub fn is_rigid(&self) -> bool {
        self.is_rigid
    }

    /// Compose `self * other`. Rigid iff both inputs are rigid.
    pub fn concat(&self, other: &Self) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
            is_rigid: self.is_rigid && other.is_rigid,
        }
    }

    /// The translation component.
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.matrix.m14, self.matrix.m24, self.matrix.m34)
    }

    /// Transform a point (w = 1).
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.matrix
            .transform_point(&Point3::new(p.x, p.y, p.z))
            .coords
    }

    /// Transform a direction (w = 0). Translation does not apply.
    pub fn transform_direction(&self, v: Vec3) -> Vec3 {
        self.matrix.transform_vector(&v)
    }

    /// Transform a homogeneous 4-vector.
    pub fn transform_homogeneous(&self, v: Vec4) -> Vec4 {
        self.matrix * v
    }

    /// Invert this transform.
    ///
    /// Rigid matrices invert by transposing the rotation block and
    /// negating the rotated translation. Non-rigid matrices use a full
    /// inverse; a singular matrix (zero scale on some axis) yields
    /// identity, logged as a warning.
    pub fn inverted(&self) -> Self {
        if self.is_rigid {
            let r = self.matrix.fixed_view::<3, 3>(0, 0).transpose();
            let t = -(r * self.translation());
            let mut m = Mat4::identity();
            m.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
            m.m14 = t.x;
            m.m24 = t.y;
            m.m34 = t.z;
            Self {
                matrix: m,
                is_rigid: true,
            }
        } else {
            match self.matrix.try_inverse() {
                Some(inv) => Self {
                    matrix: inv,
                    is_rigid: false,
                },
                None => {
                    log::warn!("attempted to invert a singular transform matrix");
                    Self::identity()
                }
            }
        }
    }
}

/// Build a quaternion that orients the local -Z axis toward `forward`,
/// keeping `reference_up` as close to local +Y as the geometry allows.
///
/// `forward` must be non-zero; callers validate before reaching here.
pub fn quat_looking_along(forward: Vec3, reference_up: Vec3) -> Quat {
    let f = forward.normalize();
    let mut right = f.cross(&reference_up);
    if right.magnitude_squared() < 1e-12 {
        // Forward is collinear with up; pick an arbitrary perpendicular.
        right = f.cross(&Vec3::x());
        if right.magnitude_squared() < 1e-12 {
            right = f.cross(&Vec3::y());
        }
    }
    let right = right.normalize();
    let up = right.cross(&f);
    // Columns (right, up, -f) form a proper rotation with -Z looking
    // along `forward`.
    let rot = Mat3::from_columns(&[right, up, -f]);
    Quat::from_rotation_matrix(&nalgebra::Rotation3::from_matrix_unchecked(rot))
}

/// Extract Euler angles (degrees, applied in Y-X-Z order) from a quaternion.
pub fn quat_to_euler_degrees(q: &Quat) -> Vec3 {
    let (roll, pitch, yaw) = q.euler_angles();
    Vec3::new(rad_to_deg(roll), rad_to_deg(pitch), rad_to_deg(yaw))
}

/// Build a quaternion from Euler angles in degrees.
pub fn quat_from_euler_degrees(degrees: Vec3) -> Quat {
    Quat::from_euler_angles(
        deg_to_rad(degrees.x),
        deg_to_rad(degrees.y),
        deg_to_rad(degrees.z),
    )
}
