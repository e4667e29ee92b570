//! Node bounding volumes
//!
//! A bounding volume is defined in the owner node's local frame and
//! derived into a global form from the node's transform. The global
//! form is cached on the node and invalidated whenever the transform
//! is rebuilt. `Null` volumes bound nothing: they never cull their
//! node and are ignored by ray picking.

use crate::foundation::geometry::{Aabb, Frustum, Ray, Sphere};
use crate::foundation::math::{TransformMatrix, Vec3};

/// A conservative shape enclosing a node's content.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BoundingVolume {
    /// No bounds: never culled, never picked
    #[default]
    Null,
    /// A sphere
    Sphere(Sphere),
    /// An axis-aligned box
    Box(Aabb),
    /// A sequence of volumes; a hit on any member is a hit
    Composite(Vec<BoundingVolume>),
}

impl BoundingVolume {
    /// A sphere enclosing the given points, centered at their centroid.
    pub fn sphere_from_points(points: &[Vec3]) -> Self {
        BoundingVolume::Sphere(Sphere::from_points(points))
    }

    /// A box enclosing the given points.
    pub fn box_from_points(points: &[Vec3]) -> Self {
        BoundingVolume::Box(Aabb::from_points(points))
    }

    /// Whether this volume participates in culling and picking.
    pub fn is_null(&self) -> bool {
        matches!(self, BoundingVolume::Null)
    }

    /// Derive the global form under `transform`, inflated by `padding`.
    ///
    /// Sphere radii scale by the largest axis scale of the transform so
    /// the result stays conservative under non-uniform scale.
    pub fn transformed_by(&self, transform: &TransformMatrix, padding: f32) -> BoundingVolume {
        match self {
            BoundingVolume::Null => BoundingVolume::Null,
            BoundingVolume::Sphere(s) => {
                let center = transform.transform_point(s.center);
                let m = *transform.matrix();
                let scale = [0, 1, 2]
                    .map(|c| m.fixed_view::<3, 1>(0, c).norm())
                    .into_iter()
                    .fold(0.0f32, f32::max);
                BoundingVolume::Sphere(Sphere {
                    center,
                    radius: s.radius * scale + padding,
                })
            }
            BoundingVolume::Box(b) => {
                BoundingVolume::Box(b.transformed_by(transform).padded(padding))
            }
            BoundingVolume::Composite(members) => BoundingVolume::Composite(
                members
                    .iter()
                    .map(|m| m.transformed_by(transform, padding))
                    .collect(),
            ),
        }
    }

    /// Whether `point` lies inside the volume.
    pub fn contains_point(&self, point: Vec3) -> bool {
        match self {
            BoundingVolume::Null => false,
            BoundingVolume::Sphere(s) => s.contains_point(point),
            BoundingVolume::Box(b) => b.contains_point(point),
            BoundingVolume::Composite(members) => members.iter().any(|m| m.contains_point(point)),
        }
    }

    /// The nearest forward intersection of `ray` with the volume, as a
    /// distance along the ray, or `None` for a miss (always `None` for
    /// `Null`).
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        match self {
            BoundingVolume::Null => None,
            BoundingVolume::Sphere(s) => s.intersect_ray(ray),
            BoundingVolume::Box(b) => b.intersect_ray(ray),
            BoundingVolume::Composite(members) => members
                .iter()
                .filter_map(|m| m.intersect_ray(ray))
                .min_by(|a, b| a.total_cmp(b)),
        }
    }

    /// Whether any part of the volume lies inside `frustum`. `Null`
    /// reports true so unbounded nodes are never culled.
    pub fn intersects_frustum(&self, frustum: &Frustum) -> bool {
        match self {
            BoundingVolume::Null => true,
            BoundingVolume::Sphere(s) => frustum.intersects_sphere(s),
            BoundingVolume::Box(b) => frustum.intersects_aabb(b),
            BoundingVolume::Composite(members) => {
                members.iter().any(|m| m.intersects_frustum(frustum))
            }
        }
    }

    /// Whether two volumes overlap. Conservative: mixed shape pairs are
    /// tested sphere-versus-sphere on their enclosing spheres.
    pub fn intersects(&self, other: &BoundingVolume) -> bool {
        match (self, other) {
            (BoundingVolume::Null, _) | (_, BoundingVolume::Null) => false,
            (BoundingVolume::Sphere(a), BoundingVolume::Sphere(b)) => a.intersects(b),
            (BoundingVolume::Box(a), BoundingVolume::Box(b)) => a.intersects(b),
            (BoundingVolume::Composite(members), other)
            | (other, BoundingVolume::Composite(members)) => {
                members.iter().any(|m| m.intersects(other))
            }
            (a, b) => a.enclosing_sphere().intersects(&b.enclosing_sphere()),
        }
    }

    /// A sphere enclosing this volume.
    pub fn enclosing_sphere(&self) -> Sphere {
        match self {
            BoundingVolume::Null => Sphere {
                center: Vec3::zeros(),
                radius: 0.0,
            },
            BoundingVolume::Sphere(s) => *s,
            BoundingVolume::Box(b) => Sphere {
                center: b.center(),
                radius: b.extents().norm(),
            },
            BoundingVolume::Composite(members) => {
                let spheres: Vec<Sphere> = members.iter().map(Self::enclosing_sphere).collect();
                if spheres.is_empty() {
                    return Sphere {
                        center: Vec3::zeros(),
                        radius: 0.0,
                    };
                }
                let center = spheres.iter().map(|s| s.center).sum::<Vec3>() / spheres.len() as f32;
                let radius = spheres
                    .iter()
                    .map(|s| (s.center - center).norm() + s.radius)
                    .fold(0.0f32, f32::max);
                Sphere { center, radius }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{deg_to_rad, Quat, Vec3};
    use approx::assert_relative_eq;

    fn unit_sphere() -> BoundingVolume {
        BoundingVolume::Sphere(Sphere {
            center: Vec3::zeros(),
            radius: 1.0,
        })
    }

    #[test]
    fn null_volume_bounds_nothing() {
        let null = BoundingVolume::Null;
        assert!(!null.contains_point(Vec3::zeros()));
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(null.intersect_ray(&ray).is_none());
    }

    #[test]
    fn sphere_scales_by_largest_axis() {
        let t = TransformMatrix::from_trs(
            Vec3::new(10.0, 0.0, 0.0),
            Quat::identity(),
            Vec3::new(2.0, 3.0, 1.0),
        );
        let BoundingVolume::Sphere(global) = unit_sphere().transformed_by(&t, 0.0) else {
            panic!("expected a sphere");
        };
        assert_relative_eq!(global.center.x, 10.0, epsilon = 1e-5);
        assert_relative_eq!(global.radius, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn padding_inflates_the_global_form() {
        let t = TransformMatrix::identity();
        let BoundingVolume::Sphere(global) = unit_sphere().transformed_by(&t, 0.5) else {
            panic!("expected a sphere");
        };
        assert_relative_eq!(global.radius, 1.5, epsilon = 1e-5);
    }

    #[test]
    fn box_transforms_to_enclosing_aabb() {
        let volume = BoundingVolume::Box(Aabb::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, 1.0),
        ));
        let t = TransformMatrix::from_trs(
            Vec3::zeros(),
            Quat::from_axis_angle(&nalgebra::Unit::new_normalize(Vec3::y()), deg_to_rad(45.0)),
            Vec3::new(1.0, 1.0, 1.0),
        );
        let BoundingVolume::Box(global) = volume.transformed_by(&t, 0.0) else {
            panic!("expected a box");
        };
        // A rotated unit cube's AABB grows to sqrt(2) along X and Z.
        assert_relative_eq!(global.max.x, 2.0f32.sqrt(), epsilon = 1e-4);
        assert_relative_eq!(global.max.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn composite_hits_when_any_member_hits() {
        let composite = BoundingVolume::Composite(vec![
            BoundingVolume::Sphere(Sphere {
                center: Vec3::new(-5.0, 0.0, 0.0),
                radius: 1.0,
            }),
            BoundingVolume::Sphere(Sphere {
                center: Vec3::new(5.0, 0.0, 0.0),
                radius: 1.0,
            }),
        ]);
        let ray = Ray::new(Vec3::new(5.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(composite.intersect_ray(&ray).unwrap(), 9.0, epsilon = 1e-4);
        assert!(composite.contains_point(Vec3::new(-5.0, 0.5, 0.0)));
        assert!(!composite.contains_point(Vec3::zeros()));
    }
}
