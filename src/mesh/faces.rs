//! Face queries and local-space ray intersection
//!
//! Faces are derived from the mesh's drawing mode: triangle lists yield
//! one face per index triple, strips and fans one per vertex past the
//! second (with the strip's alternating winding corrected). Derived data
//! (centers, normals, planes, edge neighbours) is computed on demand and
//! optionally cached per mesh.

use std::collections::HashMap;

use crate::foundation::geometry::{
    intersect_ray_triangle, Face, FaceIndices, FaceNeighbours, Plane, Ray,
};
use crate::foundation::math::Vec3;
use crate::render::DrawMode;

use super::mesh::Mesh;
use super::MeshError;

/// Lazily built per-face data, invalidated whenever vertex or index
/// content changes.
#[derive(Debug, Default)]
pub struct FaceArray {
    centers: Option<Vec<Vec3>>,
    normals: Option<Vec<Vec3>>,
    planes: Option<Vec<Plane>>,
    neighbours: Option<Vec<FaceNeighbours>>,
}

impl FaceArray {
    /// Drop all cached face data.
    pub fn invalidate(&mut self) {
        self.centers = None;
        self.normals = None;
        self.planes = None;
        self.neighbours = None;
    }
}

/// A hit between a ray and one face of a mesh, in mesh-local space.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshIntersection {
    /// Index of the intersected face
    pub face_index: usize,
    /// The face's corner positions
    pub face: Face,
    /// The plane containing the face
    pub plane: Plane,
    /// The intersection point
    pub location: Vec3,
    /// Signed distance along the ray (negative when behind the origin)
    pub distance: f32,
    /// Barycentric weights of the intersection within the face
    pub barycentric: Vec3,
    /// Whether the face was struck from behind its winding order
    pub was_back_face: bool,
}

impl Mesh {
    fn drawn_element_count(&self) -> usize {
        if self.index_stream().is_some() {
            self.vertex_index_count()
        } else {
            self.vertex_count()
        }
    }

    /// The number of faces implied by the drawing mode and the in-use
    /// vertex (or index) count.
    pub fn face_count(&self) -> usize {
        let n = self.drawn_element_count();
        match self.drawing_mode {
            DrawMode::Triangles => n / 3,
            DrawMode::TriangleStrip | DrawMode::TriangleFan => n.saturating_sub(2),
            _ => 0,
        }
    }

    fn check_face(&self, face_index: usize) -> Result<(), MeshError> {
        if face_index >= self.face_count() {
            return Err(MeshError::IndexOutOfRange {
                index: face_index,
                count: self.face_count(),
            });
        }
        Ok(())
    }

    fn drawn_vertex_index(&self, position: usize) -> Result<u32, MeshError> {
        if self.index_stream().is_some() {
            self.vertex_index(position)
        } else {
            Ok(position as u32)
        }
    }

    /// The vertex indices of face `face_index`, honoring the drawing
    /// mode's assembly rules.
    pub fn face_indices_at(&self, face_index: usize) -> Result<FaceIndices, MeshError> {
        self.check_face(face_index)?;
        let (a, b, c) = match self.drawing_mode {
            DrawMode::Triangles => {
                let base = face_index * 3;
                (base, base + 1, base + 2)
            }
            DrawMode::TriangleStrip => {
                // Odd faces swap two corners to keep a consistent winding.
                if face_index % 2 == 0 {
                    (face_index, face_index + 1, face_index + 2)
                } else {
                    (face_index, face_index + 2, face_index + 1)
                }
            }
            DrawMode::TriangleFan => (0, face_index + 1, face_index + 2),
            _ => {
                return Err(MeshError::IndexOutOfRange {
                    index: face_index,
                    count: 0,
                })
            }
        };
        Ok(FaceIndices::new(
            self.drawn_vertex_index(a)?,
            self.drawn_vertex_index(b)?,
            self.drawn_vertex_index(c)?,
        ))
    }

    /// The corner positions of face `face_index`.
    pub fn face_at(&self, face_index: usize) -> Result<Face, MeshError> {
        let fi = self.face_indices_at(face_index)?;
        Ok(Face::new(
            self.vertex_location(fi.indices[0] as usize)?,
            self.vertex_location(fi.indices[1] as usize)?,
            self.vertex_location(fi.indices[2] as usize)?,
        ))
    }

    /// The centroid of face `face_index`, cached when face caching is on.
    pub fn face_center_at(&mut self, face_index: usize) -> Result<Vec3, MeshError> {
        self.check_face(face_index)?;
        if !self.should_cache_faces {
            return Ok(self.face_at(face_index)?.center());
        }
        if self.faces.centers.is_none() {
            let centers = self
                .all_faces()?
                .iter()
                .map(Face::center)
                .collect();
            self.faces.centers = Some(centers);
        }
        Ok(self.faces.centers.as_ref().map_or(Vec3::zeros(), |c| c[face_index]))
    }

    /// The normal of face `face_index`, cached when face caching is on.
    pub fn face_normal_at(&mut self, face_index: usize) -> Result<Vec3, MeshError> {
        self.check_face(face_index)?;
        if !self.should_cache_faces {
            return Ok(self.face_at(face_index)?.normal());
        }
        if self.faces.normals.is_none() {
            let normals = self
                .all_faces()?
                .iter()
                .map(Face::normal)
                .collect();
            self.faces.normals = Some(normals);
        }
        Ok(self.faces.normals.as_ref().map_or(Vec3::zeros(), |n| n[face_index]))
    }

    /// The plane of face `face_index`, cached when face caching is on.
    pub fn face_plane_at(&mut self, face_index: usize) -> Result<Plane, MeshError> {
        self.check_face(face_index)?;
        if !self.should_cache_faces {
            return Ok(self.face_at(face_index)?.plane());
        }
        if self.faces.planes.is_none() {
            let planes = self
                .all_faces()?
                .iter()
                .map(Face::plane)
                .collect();
            self.faces.planes = Some(planes);
        }
        Ok(self
            .faces
            .planes
            .as_ref()
            .map_or(Plane::from_point_normal(Vec3::zeros(), Vec3::y()), |p| {
                p[face_index]
            }))
    }

    /// The neighbouring faces across each edge of face `face_index`.
    ///
    /// Neighbours are derived in one pass over all faces by matching
    /// shared edges, then cached when face caching is on.
    pub fn face_neighbours_at(&mut self, face_index: usize) -> Result<FaceNeighbours, MeshError> {
        self.check_face(face_index)?;
        if let Some(cached) = &self.faces.neighbours {
            return Ok(cached[face_index]);
        }
        let neighbours = self.build_face_neighbours()?;
        let result = neighbours[face_index];
        if self.should_cache_faces {
            self.faces.neighbours = Some(neighbours);
        }
        Ok(result)
    }

    fn all_faces(&self) -> Result<Vec<Face>, MeshError> {
        (0..self.face_count()).map(|i| self.face_at(i)).collect()
    }

    fn build_face_neighbours(&self) -> Result<Vec<FaceNeighbours>, MeshError> {
        let face_count = self.face_count();
        let mut neighbours = vec![FaceNeighbours::default(); face_count];
        // Map each undirected edge to the faces that reference it.
        let mut edge_faces: HashMap<(u32, u32), Vec<(usize, usize)>> = HashMap::new();
        for f in 0..face_count {
            let fi = self.face_indices_at(f)?;
            for e in 0..3 {
                let a = fi.indices[e];
                let b = fi.indices[(e + 1) % 3];
                let key = (a.min(b), a.max(b));
                edge_faces.entry(key).or_default().push((f, e));
            }
        }
        for users in edge_faces.values() {
            for (f, e) in users {
                for (other, _) in users {
                    if other != f {
                        neighbours[*f].edges[*e] = *other as u32;
                        break;
                    }
                }
            }
        }
        Ok(neighbours)
    }

    /// Intersect a mesh-local ray against every face.
    ///
    /// Returns up to `max_hits` intersections in face order (unsorted;
    /// callers needing nearest-first sort by `distance`). Back-face hits
    /// and hits behind the ray origin are filtered unless accepted.
    pub fn find_intersections_of_local_ray(
        &self,
        ray: &Ray,
        max_hits: usize,
        accept_back_faces: bool,
        accept_behind_ray: bool,
    ) -> Result<Vec<MeshIntersection>, MeshError> {
        let mut hits = Vec::new();
        for face_index in 0..self.face_count() {
            if hits.len() >= max_hits {
                break;
            }
            let face = self.face_at(face_index)?;
            let [a, b, c] = face.vertices;
            let Some(hit) = intersect_ray_triangle(ray, a, b, c) else {
                continue;
            };
            if hit.was_back_face && !accept_back_faces {
                continue;
            }
            if hit.distance < 0.0 && !accept_behind_ray {
                continue;
            }
            hits.push(MeshIntersection {
                face_index,
                face,
                plane: face.plane(),
                location: ray.point_at(hit.distance),
                distance: hit.distance,
                barycentric: hit.barycentric,
                was_back_face: hit.was_back_face,
            });
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::geometry::NO_NEIGHBOUR;
    use crate::mesh::{ElementType, VertexContent};
    use approx::assert_relative_eq;

    /// Two triangles in the z = 0 plane sharing the edge (1, 2).
    fn quad_mesh() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.set_vertex_content(VertexContent::LOCATION);
        mesh.set_allocated_vertex_capacity(4).unwrap();
        mesh.set_vertex_count(4);
        mesh.set_vertex_location(0, Vec3::new(0.0, 0.0, 0.0)).unwrap();
        mesh.set_vertex_location(1, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        mesh.set_vertex_location(2, Vec3::new(0.0, 1.0, 0.0)).unwrap();
        mesh.set_vertex_location(3, Vec3::new(1.0, 1.0, 0.0)).unwrap();
        mesh.set_allocated_vertex_index_capacity(6, ElementType::UnsignedShort)
            .unwrap();
        mesh.set_vertex_index_count(6);
        for (i, v) in [0u32, 1, 2, 2, 1, 3].iter().enumerate() {
            mesh.set_vertex_index(i, *v).unwrap();
        }
        mesh
    }

    #[test]
    fn face_count_per_drawing_mode() {
        let mut mesh = quad_mesh();
        assert_eq!(mesh.face_count(), 2);
        mesh.drawing_mode = DrawMode::TriangleStrip;
        assert_eq!(mesh.face_count(), 4);
        mesh.drawing_mode = DrawMode::Lines;
        assert_eq!(mesh.face_count(), 0);
    }

    #[test]
    fn strip_faces_alternate_winding() {
        let mut mesh = quad_mesh();
        mesh.drawing_mode = DrawMode::TriangleStrip;
        mesh.set_vertex_index_count(4);
        for (i, v) in [0u32, 1, 2, 3].iter().enumerate() {
            mesh.set_vertex_index(i, *v).unwrap();
        }
        assert_eq!(mesh.face_indices_at(0).unwrap(), FaceIndices::new(0, 1, 2));
        assert_eq!(mesh.face_indices_at(1).unwrap(), FaceIndices::new(1, 3, 2));
        // Both faces keep the same facing despite the strip's alternation.
        let n0 = mesh.face_at(0).unwrap().normal();
        let n1 = mesh.face_at(1).unwrap().normal();
        assert_relative_eq!(n0.dot(&n1), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn fan_faces_pivot_on_first_vertex() {
        let mut mesh = quad_mesh();
        mesh.drawing_mode = DrawMode::TriangleFan;
        mesh.set_vertex_index_count(4);
        for (i, v) in [0u32, 1, 3, 2].iter().enumerate() {
            mesh.set_vertex_index(i, *v).unwrap();
        }
        assert_eq!(mesh.face_indices_at(0).unwrap(), FaceIndices::new(0, 1, 3));
        assert_eq!(mesh.face_indices_at(1).unwrap(), FaceIndices::new(0, 3, 2));
    }

    #[test]
    fn neighbours_found_across_shared_edge() {
        let mut mesh = quad_mesh();
        let n0 = mesh.face_neighbours_at(0).unwrap();
        let n1 = mesh.face_neighbours_at(1).unwrap();
        assert!(n0.edges.contains(&1));
        assert!(n1.edges.contains(&0));
        // The quad's outer edges are open.
        assert_eq!(n0.edges.iter().filter(|&&e| e == NO_NEIGHBOUR).count(), 2);
    }

    #[test]
    fn cached_face_data_survives_until_vertex_change() {
        let mut mesh = quad_mesh();
        mesh.should_cache_faces = true;
        let before = mesh.face_center_at(0).unwrap();
        assert_relative_eq!(before.x, 1.0 / 3.0, epsilon = 1e-5);
        // Moving a vertex invalidates the cache.
        mesh.set_vertex_location(0, Vec3::new(3.0, 0.0, 0.0)).unwrap();
        let after = mesh.face_center_at(0).unwrap();
        assert_relative_eq!(after.x, 4.0 / 3.0, epsilon = 1e-5);
    }

    #[test]
    fn local_ray_hits_front_face_only_by_default() {
        let mesh = quad_mesh();
        let front = Ray::new(Vec3::new(0.25, 0.25, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let hits = mesh
            .find_intersections_of_local_ray(&front, usize::MAX, false, false)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].distance, 5.0, epsilon = 1e-5);
        assert_relative_eq!(hits[0].location.z, 0.0, epsilon = 1e-5);
        assert!(!hits[0].was_back_face);

        let behind = Ray::new(Vec3::new(0.25, 0.25, -5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(mesh
            .find_intersections_of_local_ray(&behind, usize::MAX, true, false)
            .unwrap()
            .is_empty());
        let past = mesh
            .find_intersections_of_local_ray(&behind, usize::MAX, true, true)
            .unwrap();
        assert_eq!(past.len(), 1);
        assert_relative_eq!(past[0].distance, -5.0, epsilon = 1e-5);
    }

    #[test]
    fn back_face_hits_are_flagged() {
        let mesh = quad_mesh();
        let from_behind = Ray::new(Vec3::new(0.25, 0.25, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(mesh
            .find_intersections_of_local_ray(&from_behind, usize::MAX, false, false)
            .unwrap()
            .is_empty());
        let hits = mesh
            .find_intersections_of_local_ray(&from_behind, usize::MAX, true, false)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].was_back_face);
    }

    #[test]
    fn max_hits_caps_the_result() {
        let mesh = quad_mesh();
        let ray = Ray::new(Vec3::new(0.5, 0.5, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let hits = mesh
            .find_intersections_of_local_ray(&ray, 1, true, false)
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
