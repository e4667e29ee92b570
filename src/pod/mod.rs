//! Imported-scene data model
//!
//! The structure a model loader hands to the core: cameras, lights,
//! meshes, materials, texture names, and a node tree with per-frame
//! animation tracks. Parsing model files is the loader's job; this
//! module owns the data model and the construction of an equivalent
//! scene graph from it.
//!
//! Texture names resolve against the scene's texture cache at build
//! time. Loading the texture files themselves happens before the
//! build, since it needs a GL context.

use thiserror::Error;

use crate::foundation::math::{Quat, Vec3};
use crate::mesh::Mesh;
use crate::scene::{
    Animation, Camera, Light, Material, Node, NodeError, NodeId, Scene,
};

/// Errors from scene construction.
#[derive(Debug, Error)]
pub enum PodError {
    /// A node referenced a parent index outside the node list.
    #[error("node {node} references missing parent index {parent}")]
    InvalidParentIndex {
        /// The referencing node's index
        node: usize,
        /// The out-of-range parent index
        parent: usize,
    },
    /// A node referenced a mesh index outside the mesh list.
    #[error("node {node} references missing mesh index {mesh}")]
    InvalidMeshIndex {
        /// The referencing node's index
        node: usize,
        /// The out-of-range mesh index
        mesh: usize,
    },
    /// A mesh node referenced a material index outside the material list.
    #[error("node {node} references missing material index {material}")]
    InvalidMaterialIndex {
        /// The referencing node's index
        node: usize,
        /// The out-of-range material index
        material: usize,
    },
    /// A node referenced a camera index outside the camera list.
    #[error("node {node} references missing camera index {camera}")]
    InvalidCameraIndex {
        /// The referencing node's index
        node: usize,
        /// The out-of-range camera index
        camera: usize,
    },
    /// A node referenced a light index outside the light list.
    #[error("node {node} references missing light index {light}")]
    InvalidLightIndex {
        /// The referencing node's index
        node: usize,
        /// The out-of-range light index
        light: usize,
    },
    /// A material referenced a texture index outside the texture list.
    #[error("material references missing texture index {texture}")]
    InvalidTextureIndex {
        /// The out-of-range texture index
        texture: usize,
    },
    /// The scene graph rejected a hierarchy operation.
    #[error(transparent)]
    Node(#[from] NodeError),
}

/// A material plus its texture reference by index into
/// [`PodScene::textures`].
#[derive(Debug, Clone)]
pub struct PodMaterial {
    /// Lighting colors, shininess, and blend functions
    pub material: Material,
    /// Index of the color texture, if any
    pub texture: Option<usize>,
}

/// Per-node keyframe tracks. Empty tracks mean the component is not
/// animated; tracks with one entry give the node's static pose.
#[derive(Debug, Clone, Default)]
pub struct PodAnimation {
    /// Per-frame locations
    pub locations: Vec<Vec3>,
    /// Per-frame rotations
    pub quaternions: Vec<Quat>,
    /// Per-frame scales
    pub scales: Vec<Vec3>,
}

impl PodAnimation {
    fn is_animated(&self) -> bool {
        self.locations.len() > 1 || self.quaternions.len() > 1 || self.scales.len() > 1
    }
}

/// What an imported node carries.
#[derive(Debug, Clone, Default)]
pub enum PodContent {
    /// Structural node
    #[default]
    None,
    /// Mesh node with an optional material
    Mesh {
        /// Index into [`PodScene::meshes`]
        mesh: usize,
        /// Index into [`PodScene::materials`]
        material: Option<usize>,
    },
    /// Camera node, index into [`PodScene::cameras`]
    Camera(usize),
    /// Light node, index into [`PodScene::lights`]
    Light(usize),
}

/// One imported node.
#[derive(Debug, Clone, Default)]
pub struct PodNode {
    /// Node name from the model file
    pub name: Option<String>,
    /// Index of the parent in [`PodScene::nodes`], root nodes have none
    pub parent: Option<usize>,
    /// The node's content
    pub content: PodContent,
    /// Keyframe tracks; frame zero is the rest pose
    pub animation: PodAnimation,
}

/// A complete imported scene, as produced by a model loader.
#[derive(Debug, Default)]
pub struct PodScene {
    /// Scene name
    pub name: Option<String>,
    /// Number of animation frames shared by all tracks
    pub frame_count: u32,
    /// Playback rate in frames per second
    pub frames_per_second: f32,
    /// Cameras referenced by camera nodes
    pub cameras: Vec<Camera>,
    /// Lights referenced by light nodes
    pub lights: Vec<Light>,
    /// Meshes referenced by mesh nodes
    pub meshes: Vec<Mesh>,
    /// Materials referenced by mesh nodes
    pub materials: Vec<PodMaterial>,
    /// Texture names, resolved against the scene's texture cache
    pub textures: Vec<String>,
    /// The node tree, parents referenced by index
    pub nodes: Vec<PodNode>,
}

/// The scene-graph nodes built from a [`PodScene`], in the order the
/// imported node list declared them, plus the playback parameters.
#[derive(Debug)]
pub struct BuiltPodScene {
    /// Arena key per imported node index
    pub nodes: Vec<NodeId>,
    /// Animation frame count
    pub frame_count: u32,
    /// Playback rate in frames per second
    pub frames_per_second: f32,
}

/// Construct an equivalent node hierarchy in `scene` from an imported
/// scene.
///
/// Meshes move into the scene's mesh arena. Nodes with no parent index
/// attach under the scene root. Frame zero of each animation track
/// poses the node; tracks with more than one frame stay bound to the
/// node for playback. The first camera node becomes the active camera
/// when the scene has none yet.
pub fn build_scene(pod: PodScene, scene: &mut Scene) -> Result<BuiltPodScene, PodError> {
    let mesh_ids: Vec<_> = pod.meshes.into_iter().map(|m| scene.add_mesh(m)).collect();

    let mut node_ids = Vec::with_capacity(pod.nodes.len());
    for (index, pod_node) in pod.nodes.iter().enumerate() {
        let mut node = match &pod_node.name {
            Some(name) => Node::named(name.clone()),
            None => Node::new(),
        };
        match pod_node.content {
            PodContent::None => {}
            PodContent::Mesh { mesh, material } => {
                let mesh_id = *mesh_ids
                    .get(mesh)
                    .ok_or(PodError::InvalidMeshIndex { node: index, mesh })?;
                let material = match material {
                    Some(m) => {
                        let pod_material = pod.materials.get(m).ok_or(
                            PodError::InvalidMaterialIndex { node: index, material: m },
                        )?;
                        resolve_material(pod_material, &pod.textures, scene)?
                    }
                    None => Material::default(),
                };
                node.set_mesh(mesh_id, material);
            }
            PodContent::Camera(camera) => {
                let params = pod
                    .cameras
                    .get(camera)
                    .ok_or(PodError::InvalidCameraIndex { node: index, camera })?;
                node.set_camera(params.clone());
            }
            PodContent::Light(light) => {
                let params = pod
                    .lights
                    .get(light)
                    .ok_or(PodError::InvalidLightIndex { node: index, light })?;
                node.set_light(params.clone());
            }
        }
        apply_rest_pose(&mut node, &pod_node.animation);
        if pod_node.animation.is_animated() {
            node.animation = Some(Animation {
                frame_count: pod.frame_count,
                locations: pod_node.animation.locations.clone(),
                quaternions: pod_node.animation.quaternions.clone(),
                scales: pod_node.animation.scales.clone(),
            });
        }
        node_ids.push(scene.add_node(node));
    }

    for (index, pod_node) in pod.nodes.iter().enumerate() {
        let parent = match pod_node.parent {
            Some(parent) => *node_ids.get(parent).ok_or(PodError::InvalidParentIndex {
                node: index,
                parent,
            })?,
            None => scene.root(),
        };
        scene.add_child(parent, node_ids[index])?;
    }

    if scene.active_camera().is_err() {
        let first_camera = pod
            .nodes
            .iter()
            .position(|n| matches!(n.content, PodContent::Camera(_)));
        if let Some(index) = first_camera {
            scene.set_active_camera(node_ids[index])?;
        }
    }

    Ok(BuiltPodScene {
        nodes: node_ids,
        frame_count: pod.frame_count,
        frames_per_second: pod.frames_per_second,
    })
}

fn resolve_material(
    pod_material: &PodMaterial,
    textures: &[String],
    scene: &Scene,
) -> Result<Material, PodError> {
    let mut material = pod_material.material.clone();
    if let Some(texture) = pod_material.texture {
        let name = textures
            .get(texture)
            .ok_or(PodError::InvalidTextureIndex { texture })?;
        // Unresolved names are tolerated: the file may not be preloaded.
        if let Some(texture) = scene.textures().texture_named(name) {
            material.textures.push(texture);
        } else {
            log::warn!("texture {name:?} not in cache; material binds without it");
        }
    }
    Ok(material)
}

fn apply_rest_pose(node: &mut Node, animation: &PodAnimation) {
    if let Some(&location) = animation.locations.first() {
        node.set_location(location);
    }
    if let Some(&quat) = animation.quaternions.first() {
        node.set_quaternion(quat);
    }
    if let Some(&scale) = animation.scales.first() {
        node.set_scale(scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexContent;
    use approx::assert_relative_eq;

    fn location_mesh() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.set_vertex_content(VertexContent::LOCATION);
        mesh.set_allocated_vertex_capacity(3).unwrap();
        mesh.set_vertex_count(3);
        mesh
    }

    fn two_node_pod() -> PodScene {
        PodScene {
            frame_count: 2,
            frames_per_second: 30.0,
            cameras: vec![Camera::default()],
            meshes: vec![location_mesh()],
            materials: vec![PodMaterial {
                material: Material::default(),
                texture: None,
            }],
            nodes: vec![
                PodNode {
                    name: Some("body".into()),
                    parent: None,
                    content: PodContent::Mesh {
                        mesh: 0,
                        material: Some(0),
                    },
                    animation: PodAnimation {
                        locations: vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
                        ..PodAnimation::default()
                    },
                },
                PodNode {
                    name: Some("eye".into()),
                    parent: Some(0),
                    content: PodContent::Camera(0),
                    ..PodNode::default()
                },
            ],
            ..PodScene::default()
        }
    }

    #[test]
    fn builds_the_declared_hierarchy() {
        let mut scene = Scene::default();
        let built = build_scene(two_node_pod(), &mut scene).unwrap();
        assert_eq!(built.nodes.len(), 2);
        let body = built.nodes[0];
        let eye = built.nodes[1];
        assert_eq!(scene.node(body).unwrap().parent(), Some(scene.root()));
        assert_eq!(scene.node(eye).unwrap().parent(), Some(body));
        assert_eq!(scene.find_node_named("body"), Some(body));
    }

    #[test]
    fn rest_pose_and_animation_bind_from_the_tracks() {
        let mut scene = Scene::default();
        let built = build_scene(two_node_pod(), &mut scene).unwrap();
        let body = built.nodes[0];
        assert_relative_eq!(scene.node(body).unwrap().location().x, 1.0);
        let animation = scene.node(body).unwrap().animation.as_ref().unwrap();
        assert_eq!(animation.frame_count, 2);

        scene.node_mut(body).unwrap().establish_animation_frame(1);
        assert_relative_eq!(scene.node(body).unwrap().location().x, 2.0);
        assert_relative_eq!(built.frames_per_second, 30.0);
    }

    #[test]
    fn first_camera_node_becomes_active() {
        let mut scene = Scene::default();
        let built = build_scene(two_node_pod(), &mut scene).unwrap();
        assert_eq!(scene.active_camera().unwrap(), built.nodes[1]);
    }

    #[test]
    fn bad_parent_index_is_rejected() {
        let mut pod = two_node_pod();
        pod.nodes[1].parent = Some(9);
        let mut scene = Scene::default();
        assert!(matches!(
            build_scene(pod, &mut scene),
            Err(PodError::InvalidParentIndex { node: 1, parent: 9 })
        ));
    }

    #[test]
    fn bad_mesh_index_is_rejected() {
        let mut pod = two_node_pod();
        pod.nodes[0].content = PodContent::Mesh {
            mesh: 4,
            material: None,
        };
        let mut scene = Scene::default();
        assert!(matches!(
            build_scene(pod, &mut scene),
            Err(PodError::InvalidMeshIndex { node: 0, mesh: 4 })
        ));
    }
}
