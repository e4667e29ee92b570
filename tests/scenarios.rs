//! End-to-end scenarios exercising the full pipeline: transform
//! propagation, target tracking, culling, picking, the texture cache,
//! and interleaved mesh growth.

use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;

use arbor3d::foundation::geometry::{Ray, Sphere};
use arbor3d::foundation::math::Vec3;
use arbor3d::mesh::{Mesh, VertexContent};
use arbor3d::render::{GlStateCache, RecordingContext};
use arbor3d::scene::{BoundingVolume, Camera, Material, Node, NodeId, Scene};
use arbor3d::settings::SceneSettings;
use arbor3d::texture::{Texture, TextureCache};
use arbor3d::visit::{DrawVisitor, PunctureVisitor, UpdateVisitor};

#[test]
fn parent_child_transform_propagation() {
    let mut scene = Scene::default();
    let root = scene.root();

    let mut parent = Node::named("parent");
    parent.set_location(Vec3::new(10.0, 0.0, 0.0));
    parent.set_rotation(Vec3::new(0.0, 90.0, 0.0));
    let parent = scene.spawn_child(root, parent).unwrap();

    let mut child = Node::named("child");
    child.set_location(Vec3::new(0.0, 0.0, 5.0));
    let child = scene.spawn_child(parent, child).unwrap();

    let global = scene.global_location(child).unwrap();
    assert_relative_eq!(global.x, 15.0, epsilon = 1e-4);
    assert_relative_eq!(global.y, 0.0, epsilon = 1e-4);
    assert_relative_eq!(global.z, 0.0, epsilon = 1e-4);
}

#[test]
fn target_tracking_follows_a_moving_target() {
    let mut scene = Scene::default();
    let root = scene.root();
    let tracker = scene.spawn_child(root, Node::named("tracker")).unwrap();
    let mut target = Node::named("target");
    target.set_location(Vec3::new(0.0, 0.0, 10.0));
    let target = scene.spawn_child(root, target).unwrap();

    scene.set_target(tracker, target).unwrap();
    scene.set_should_track_target(tracker, true).unwrap();

    scene
        .node_mut(target)
        .unwrap()
        .set_location(Vec3::new(10.0, 0.0, 0.0));
    let mut updater = UpdateVisitor::new();
    updater.visit(&mut scene, 1.0 / 60.0);

    let node = scene.node(tracker).unwrap();
    let forward = node.forward_direction();
    assert_relative_eq!(forward.x, 1.0, epsilon = 1e-4);
    assert_relative_eq!(forward.y, 0.0, epsilon = 1e-4);
    assert_relative_eq!(forward.z, 0.0, epsilon = 1e-4);

    let up = node.rotator().up_direction();
    let right = node.rotator().right_direction();
    assert_relative_eq!(forward.dot(&up), 0.0, epsilon = 1e-5);
    assert_relative_eq!(forward.dot(&right), 0.0, epsilon = 1e-5);
    assert_relative_eq!(up.norm(), 1.0, epsilon = 1e-5);
    assert_relative_eq!(right.norm(), 1.0, epsilon = 1e-5);
}

fn buffered_triangle(ctx: &mut RecordingContext, state: &mut GlStateCache) -> Mesh {
    let mut mesh = Mesh::new();
    mesh.set_vertex_content(VertexContent::LOCATION);
    mesh.set_allocated_vertex_capacity(3).unwrap();
    mesh.set_vertex_count(3);
    mesh.set_vertex_location(0, Vec3::new(-1.0, 0.0, 0.0)).unwrap();
    mesh.set_vertex_location(1, Vec3::new(1.0, 0.0, 0.0)).unwrap();
    mesh.set_vertex_location(2, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    mesh.create_gl_buffers(ctx, state).unwrap();
    mesh
}

#[test]
fn drawing_culls_a_node_beyond_the_far_plane() {
    let mut ctx = RecordingContext::new();
    let mut state = GlStateCache::new();
    let mut scene = Scene::default();
    scene.set_viewport(800, 600);
    let root = scene.root();

    let mut camera = Node::named("camera");
    camera.set_camera(Camera {
        field_of_view: 60.0,
        near_clip: 1.0,
        far_clip: 50.0,
    });
    let camera = scene.spawn_child(root, camera).unwrap();
    scene.set_active_camera(camera).unwrap();

    let mesh = buffered_triangle(&mut ctx, &mut state);
    let mesh = scene.add_mesh(mesh);
    let mut distant = Node::named("distant");
    distant.set_mesh(mesh, Material::default());
    distant.set_location(Vec3::new(0.0, 0.0, -100.0));
    distant.set_bounding_volume(BoundingVolume::Sphere(Sphere {
        center: Vec3::zeros(),
        radius: 1.0,
    }));
    scene.spawn_child(root, distant).unwrap();

    let mut visitor = DrawVisitor::new();
    let stats = visitor.draw(&mut scene, &mut ctx, &mut state).unwrap();
    assert_eq!(stats.drawn, 0);
    assert_eq!(stats.culled, 1);
    assert_eq!(ctx.draw_call_count(), 0);
}

#[test]
fn ray_picking_selects_the_nearer_of_two_volumes() {
    let mut scene = Scene::default();
    let root = scene.root();

    let mut unit_sphere_node = |location: Vec3, name: &str| -> NodeId {
        let mut node = Node::named(name);
        node.set_location(location);
        node.set_bounding_volume(BoundingVolume::Sphere(Sphere {
            center: Vec3::zeros(),
            radius: 1.0,
        }));
        scene.spawn_child(root, node).unwrap()
    };
    let left = unit_sphere_node(Vec3::new(-2.0, 0.0, 0.0), "left");
    let _right = unit_sphere_node(Vec3::new(2.0, 0.0, 0.0), "right");

    let origin = Vec3::new(0.0, 0.0, 10.0);
    let direction = (Vec3::new(-2.0, 0.0, 0.0) - origin).normalize();
    let ray = Ray::new(origin, direction);

    let mut visitor = PunctureVisitor::new();
    visitor.visit(&mut scene, &ray).unwrap();
    assert_eq!(visitor.closest_punctured_node(), Some(left));
    let puncture = &visitor.punctures()[0];
    assert_relative_eq!(puncture.distance, 104.0_f32.sqrt() - 1.0, epsilon = 1e-4);
    assert!(!puncture.was_back_face);
}

#[test]
fn texture_cache_weak_and_preloading_semantics() {
    let mut ctx = RecordingContext::new();
    let mut state = GlStateCache::new();
    let settings = SceneSettings::default();
    let mut cache = TextureCache::new();

    let pixels = vec![255u8; 4 * 4 * 4];
    let texture = Texture::from_rgba8(
        &mut ctx,
        &mut state,
        &settings,
        "brick",
        4,
        4,
        pixels.clone(),
    )
    .unwrap();
    let texture = Rc::new(RefCell::new(texture));
    cache.add(&texture).unwrap();

    let fetched = cache.texture_named("brick").unwrap();
    assert!(Rc::ptr_eq(&fetched, &texture));
    drop(fetched);
    drop(texture);
    assert!(cache.texture_named("brick").is_none());

    // Preloaded textures survive the caller dropping its reference.
    cache.set_preloading(true);
    let texture = Texture::from_rgba8(&mut ctx, &mut state, &settings, "stone", 4, 4, pixels)
        .unwrap();
    let texture = Rc::new(RefCell::new(texture));
    cache.add(&texture).unwrap();
    drop(texture);
    assert!(cache.texture_named("stone").is_some());
}

#[test]
fn interleaved_mesh_growth_preserves_written_vertices() {
    let mut mesh = Mesh::new();
    mesh.should_interleave_vertices = true;
    mesh.set_vertex_content(VertexContent::LOCATION | VertexContent::NORMAL);
    mesh.set_allocated_vertex_capacity(10).unwrap();
    mesh.set_vertex_count(10);
    for i in 0..10 {
        let v = Vec3::new(i as f32, 0.0, 0.0);
        mesh.set_vertex_location(i, v).unwrap();
        mesh.set_vertex_normal(i, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    }

    let grew = mesh.ensure_vertex_capacity(11).unwrap();
    assert!(grew);
    assert!(mesh.allocated_vertex_capacity() >= 14);
    for i in 0..10 {
        assert_relative_eq!(mesh.vertex_location(i).unwrap().x, i as f32);
        assert_relative_eq!(mesh.vertex_normal(i).unwrap().y, 1.0);
    }
}
