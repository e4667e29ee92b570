//! Geometric primitives for bounding, culling, and picking
//!
//! Rays, planes, axis-aligned boxes, spheres, frusta, and the triangle
//! records used by the mesh face cache. The frustum plane extraction uses
//! the Gribb-Hartmann method; ray-triangle intersection uses
//! Möller-Trumbore.

use crate::foundation::math::{Mat4, TransformMatrix, Vec3};

/// Sentinel face index meaning "edge has no neighbouring face".
pub const NO_NEIGHBOUR: u32 = u32::MAX;

/// A ray with an origin and a (not necessarily unit) direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Ray origin
    pub origin: Vec3,
    /// Ray direction
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// The point at parameter `t` along the ray.
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Transform this ray by a matrix (origin as point, direction as vector).
    pub fn transformed_by(&self, m: &TransformMatrix) -> Self {
        Self {
            origin: m.transform_point(self.origin),
            direction: m.transform_direction(self.direction),
        }
    }
}

/// Plane defined by a unit normal and distance from the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create from a normal and a distance, normalizing the normal.
    pub fn new(normal: Vec3, distance: f32) -> Self {
        let len = normal.magnitude();
        Self {
            normal: normal / len,
            distance: distance / len,
        }
    }

    /// Create from a point on the plane and a normal.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            distance: -normal.dot(&point),
        }
    }

    /// Create from three points in counter-clockwise winding.
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self::from_point_normal(a, (b - a).cross(&(c - a)))
    }

    /// Signed distance from the plane to a point (positive = in front).
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }

    /// Parameter `t` where the ray crosses the plane, or `None` when the
    /// ray is parallel to it.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let denom = self.normal.dot(&ray.direction);
        if denom.abs() < 1e-9 {
            return None;
        }
        Some(-self.distance_to_point(ray.origin) / denom)
    }
}

/// Axis-Aligned Bounding Box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given half-extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// The smallest AABB containing every point in `points`.
    ///
    /// Returns a degenerate box at the origin for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut min = Vec3::repeat(f32::INFINITY);
        let mut max = Vec3::repeat(f32::NEG_INFINITY);
        for p in points {
            min = min.inf(p);
            max = max.sup(p);
        }
        if points.is_empty() {
            return Self::new(Vec3::zeros(), Vec3::zeros());
        }
        Self { min, max }
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// The eight corner points.
    pub fn corners(&self) -> [Vec3; 8] {
        let (n, x) = (self.min, self.max);
        [
            Vec3::new(n.x, n.y, n.z),
            Vec3::new(x.x, n.y, n.z),
            Vec3::new(n.x, x.y, n.z),
            Vec3::new(x.x, x.y, n.z),
            Vec3::new(n.x, n.y, x.z),
            Vec3::new(x.x, n.y, x.z),
            Vec3::new(n.x, x.y, x.z),
            Vec3::new(x.x, x.y, x.z),
        ]
    }

    /// Grow the box outward by `padding` on every axis.
    pub fn padded(&self, padding: f32) -> Self {
        let pad = Vec3::repeat(padding);
        Self {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    /// The union of this box and another.
    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Test ray intersection using the slab method.
    ///
    /// Returns the distance to the entry point if the ray intersects
    /// (0 when the origin is inside the box), `None` otherwise.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let inv_dir = Vec3::new(
            if ray.direction.x != 0.0 { 1.0 / ray.direction.x } else { f32::INFINITY },
            if ray.direction.y != 0.0 { 1.0 / ray.direction.y } else { f32::INFINITY },
            if ray.direction.z != 0.0 { 1.0 / ray.direction.z } else { f32::INFINITY },
        );

        let t1 = (self.min.x - ray.origin.x) * inv_dir.x;
        let t2 = (self.max.x - ray.origin.x) * inv_dir.x;
        let t3 = (self.min.y - ray.origin.y) * inv_dir.y;
        let t4 = (self.max.y - ray.origin.y) * inv_dir.y;
        let t5 = (self.min.z - ray.origin.z) * inv_dir.z;
        let t6 = (self.max.z - ray.origin.z) * inv_dir.z;

        let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
        let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

        if tmax >= tmin && tmax >= 0.0 {
            Some(tmin.max(0.0))
        } else {
            None
        }
    }

    /// The AABB of this box transformed by `m` (box of the 8 transformed
    /// corners, conservative for rotations).
    pub fn transformed_by(&self, m: &TransformMatrix) -> Self {
        let corners = self.corners().map(|c| m.transform_point(c));
        Self::from_points(&corners)
    }
}

/// A sphere described by center and radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Sphere center
    pub center: Vec3,
    /// Sphere radius
    pub radius: f32,
}

impl Sphere {
    /// Create a new sphere
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// The smallest sphere centered on the centroid containing `points`.
    pub fn from_points(points: &[Vec3]) -> Self {
        if points.is_empty() {
            return Self::new(Vec3::zeros(), 0.0);
        }
        let centroid = points.iter().sum::<Vec3>() / points.len() as f32;
        let radius = points
            .iter()
            .map(|p| (p - centroid).magnitude())
            .fold(0.0f32, f32::max);
        Self::new(centroid, radius)
    }

    /// Check whether a point lies inside or on the sphere.
    pub fn contains_point(&self, point: Vec3) -> bool {
        (point - self.center).magnitude_squared() <= self.radius * self.radius
    }

    /// Check whether two spheres overlap.
    pub fn intersects(&self, other: &Sphere) -> bool {
        let r = self.radius + other.radius;
        (other.center - self.center).magnitude_squared() <= r * r
    }

    /// Distance along the ray to the nearest intersection, if any.
    ///
    /// Returns 0 when the ray origin is inside the sphere.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let oc = ray.origin - self.center;
        let a = ray.direction.magnitude_squared();
        if a == 0.0 {
            return None;
        }
        let half_b = oc.dot(&ray.direction);
        let c = oc.magnitude_squared() - self.radius * self.radius;
        let disc = half_b * half_b - a * c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let t0 = (-half_b - sqrt_disc) / a;
        let t1 = (-half_b + sqrt_disc) / a;
        if t0 >= 0.0 {
            Some(t0)
        } else if t1 >= 0.0 {
            Some(0.0)
        } else {
            None
        }
    }
}

/// View frustum expressed as six inward-facing half-space planes.
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Six planes in the order left, right, bottom, top, near, far
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract frustum planes from a view-projection matrix using the
    /// Gribb-Hartmann method. Assumes GL clip conventions
    /// (`-w <= x,y,z <= w`).
    pub fn from_matrix(vp: &Mat4) -> Self {
        let row = |i: usize| {
            Vec3::new(vp[(i, 0)], vp[(i, 1)], vp[(i, 2)])
        };
        let roww = |i: usize| vp[(i, 3)];
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        let (w0, w1, w2, w3) = (roww(0), roww(1), roww(2), roww(3));

        let planes = [
            Plane::new(r3 + r0, w3 + w0), // left
            Plane::new(r3 - r0, w3 - w0), // right
            Plane::new(r3 + r1, w3 + w1), // bottom
            Plane::new(r3 - r1, w3 - w1), // top
            Plane::new(r3 + r2, w3 + w2), // near
            Plane::new(r3 - r2, w3 - w2), // far
        ];
        Self { planes }
    }

    /// Test if a point is inside the frustum.
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|p| p.distance_to_point(point) >= 0.0)
    }

    /// Test if a sphere intersects the frustum.
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.planes
            .iter()
            .all(|p| p.distance_to_point(sphere.center) >= -sphere.radius)
    }

    /// Check if an AABB is inside or intersects the frustum.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            // The corner of the AABB farthest along the plane normal.
            let mut p = aabb.min;
            if plane.normal.x >= 0.0 {
                p.x = aabb.max.x;
            }
            if plane.normal.y >= 0.0 {
                p.y = aabb.max.y;
            }
            if plane.normal.z >= 0.0 {
                p.z = aabb.max.z;
            }
            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }
        true
    }
}

/// The three corner positions of a mesh face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Corner positions in winding order
    pub vertices: [Vec3; 3],
}

impl Face {
    /// Create a face from three positions
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { vertices: [a, b, c] }
    }

    /// The centroid of the face.
    pub fn center(&self) -> Vec3 {
        (self.vertices[0] + self.vertices[1] + self.vertices[2]) / 3.0
    }

    /// The unit normal implied by the winding order.
    pub fn normal(&self) -> Vec3 {
        let [a, b, c] = self.vertices;
        (b - a).cross(&(c - a)).normalize()
    }

    /// The plane containing the face.
    pub fn plane(&self) -> Plane {
        let [a, b, c] = self.vertices;
        Plane::from_points(a, b, c)
    }

    /// Barycentric weights of `point` with respect to this face.
    ///
    /// The weights sum to 1 for any point in the face's plane.
    pub fn barycentric_weights(&self, point: Vec3) -> Vec3 {
        let [a, b, c] = self.vertices;
        let v0 = b - a;
        let v1 = c - a;
        let v2 = point - a;
        let d00 = v0.dot(&v0);
        let d01 = v0.dot(&v1);
        let d11 = v1.dot(&v1);
        let d20 = v2.dot(&v0);
        let d21 = v2.dot(&v1);
        let denom = d00 * d11 - d01 * d01;
        if denom.abs() < 1e-12 {
            return Vec3::new(1.0, 0.0, 0.0);
        }
        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        Vec3::new(1.0 - v - w, v, w)
    }
}

/// The three vertex indices of a mesh face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceIndices {
    /// Vertex indices in winding order
    pub indices: [u32; 3],
}

impl FaceIndices {
    /// Create from three indices
    pub fn new(a: u32, b: u32, c: u32) -> Self {
        Self { indices: [a, b, c] }
    }
}

/// Per-edge neighbouring face indices of a mesh face.
///
/// Entry `i` names the face sharing the edge from corner `i` to corner
/// `i + 1`, or [`NO_NEIGHBOUR`] when the edge is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceNeighbours {
    /// Neighbouring face index per edge
    pub edges: [u32; 3],
}

impl Default for FaceNeighbours {
    fn default() -> Self {
        Self {
            edges: [NO_NEIGHBOUR; 3],
        }
    }
}

/// Result of a ray-triangle intersection test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Distance along the ray (in units of the ray direction length)
    pub distance: f32,
    /// Barycentric weights of the hit point
    pub barycentric: Vec3,
    /// Whether the triangle was hit from behind its winding order
    pub was_back_face: bool,
}

/// Möller-Trumbore ray-triangle intersection.
///
/// Hits behind the ray origin (negative distance) are reported; callers
/// filter by sign when they only want forward hits.
pub fn intersect_ray_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<TriangleHit> {
    let edge1 = b - a;
    let edge2 = c - a;
    let pvec = ray.direction.cross(&edge2);
    let det = edge1.dot(&pvec);
    if det.abs() < 1e-9 {
        return None; // Ray parallel to triangle plane.
    }
    let was_back_face = det < 0.0;
    let inv_det = 1.0 / det;
    let tvec = ray.origin - a;
    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(&edge1);
    let v = ray.direction.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(&qvec) * inv_det;
    Some(TriangleHit {
        distance: t,
        barycentric: Vec3::new(1.0 - u - v, u, v),
        was_back_face,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn aabb_contains_point() {
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(aabb.contains_point(Vec3::zeros()));
        assert!(aabb.contains_point(Vec3::new(0.5, 0.5, 0.5)));
        assert!(!aabb.contains_point(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn aabb_ray_hits_from_outside_and_inside() {
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let outside = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(aabb.intersect_ray(&outside).unwrap(), 4.0, epsilon = 1e-5);

        let inside = Ray::new(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(aabb.intersect_ray(&inside).unwrap(), 0.0);

        let miss = Ray::new(Vec3::new(0.0, 5.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(aabb.intersect_ray(&miss).is_none());
    }

    #[test]
    fn sphere_ray_from_behind_misses() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0);
        let away = Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, 1.0));
        assert!(sphere.intersect_ray(&away).is_none());

        let toward = Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(sphere.intersect_ray(&toward).unwrap(), 9.0, epsilon = 1e-5);
    }

    #[test]
    fn frustum_from_perspective_culls_behind_far_plane() {
        let proj = Mat4::new_perspective(1.0, std::f32::consts::FRAC_PI_3, 1.0, 50.0);
        // Camera at origin looking down -Z: view is identity in nalgebra's
        // right-handed convention.
        let frustum = Frustum::from_matrix(&proj);
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -10.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -100.0)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, -100.0), 1.0)));
    }

    #[test]
    fn moller_trumbore_reports_back_faces() {
        let a = Vec3::new(-1.0, -1.0, 0.0);
        let b = Vec3::new(1.0, -1.0, 0.0);
        let c = Vec3::new(0.0, 1.0, 0.0);

        let front = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = intersect_ray_triangle(&front, a, b, c).unwrap();
        assert!(!hit.was_back_face);
        assert_relative_eq!(hit.distance, 5.0, epsilon = 1e-5);

        let behind = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let hit = intersect_ray_triangle(&behind, a, b, c).unwrap();
        assert!(hit.was_back_face);
    }

    #[test]
    fn barycentric_weights_sum_to_one() {
        let face = Face::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        );
        let w = face.barycentric_weights(Vec3::new(0.5, 0.5, 0.0));
        assert_relative_eq!(w.x + w.y + w.z, 1.0, epsilon = 1e-5);
        assert_relative_eq!(face.center().x, 2.0 / 3.0, epsilon = 1e-5);
    }
}
