//! Cross-module scenarios: streaming, hydration round-trips, save/load

use std::collections::HashMap;

use glam::{IVec2, Vec2};

use strata::materials::{MaterialId, MaterialRegistry};
use strata::object::{
    Aabb, LiveObject, ObjectDescriptor, ObjectHandle, ObjectHost, ObjectKind, XForm,
};
use strata::physics::{PhysicsBackend, RapierBackend};
use strata::world::{from_bytes, to_bytes, GridLayout, Streamer, Tile, WorldGrid};

/// Object system stand-in: live objects are just their descriptors plus
/// streaming-relevant flags
#[derive(Default)]
struct TestHost {
    live: HashMap<ObjectHandle, TestObject>,
    hydrated_total: usize,
}

struct TestObject {
    desc: ObjectDescriptor,
    dynamic: bool,
    parented: bool,
    persistent: bool,
}

impl TestHost {
    fn move_object(&mut self, handle: ObjectHandle, position: Vec2) {
        self.live
            .get_mut(&handle)
            .expect("moving a live object")
            .desc
            .xform
            .position = position;
    }

    fn set_persistent(&mut self, handle: ObjectHandle) {
        self.live.get_mut(&handle).unwrap().persistent = true;
    }
}

impl ObjectHost for TestHost {
    fn hydrate(&mut self, desc: &ObjectDescriptor) -> bool {
        assert!(
            !self.live.contains_key(&desc.handle),
            "hydrating an already-live handle"
        );
        self.live.insert(
            desc.handle,
            TestObject {
                desc: desc.clone(),
                dynamic: !desc.kind.is_static(),
                parented: false,
                persistent: false,
            },
        );
        self.hydrated_total += 1;
        true
    }

    fn is_live(&self, handle: ObjectHandle) -> bool {
        self.live.contains_key(&handle)
    }

    fn live_objects(&self) -> Vec<LiveObject> {
        self.live
            .values()
            .map(|o| LiveObject {
                handle: o.desc.handle,
                kind: o.desc.kind,
                center: o.desc.xform.position,
                bounds: Aabb::from_center_size(o.desc.xform.position, o.desc.size),
                dynamic: o.dynamic,
                parented: o.parented,
                persistent: o.persistent,
            })
            .collect()
    }

    fn capture(&mut self, handle: ObjectHandle) -> Option<ObjectDescriptor> {
        self.live.remove(&handle).map(|o| o.desc)
    }

    fn destroy(&mut self, handle: ObjectHandle) {
        self.live.remove(&handle);
    }
}

fn small_layout() -> GridLayout {
    GridLayout {
        grid_width: 2,
        patch_size: 4,
        layer_count: 1,
    }
}

fn big_layout() -> GridLayout {
    GridLayout {
        grid_width: 6,
        patch_size: 8,
        layer_count: 1,
    }
}

#[test]
fn test_save_clear_load_keeps_descriptor() {
    let layout = small_layout();
    let mut grid = WorldGrid::new(layout.clone());
    let handle = grid
        .spawn_descriptor(
            ObjectKind::Prop,
            XForm::from_position(Vec2::new(5.0, 5.0)),
            Vec2::ONE,
            "hp=3".to_string(),
        )
        .unwrap();

    let bytes = to_bytes(&grid).unwrap();
    // "Clear the grid": start over from nothing, then load
    drop(grid);
    let mut loaded = from_bytes(&bytes, &layout).unwrap();

    {
        let all: Vec<&ObjectDescriptor> =
            loaded.patches().flat_map(|p| p.descriptors()).collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].handle, handle);
        assert_eq!(all[0].xform.position, Vec2::new(5.0, 5.0));
        assert_eq!(all[0].attributes, "hp=3");
    }

    // Fresh handles never collide with the saved one
    assert!(loaded.allocate_handle() > handle);
}

#[test]
fn test_tile_array_roundtrip_identity() {
    let layout = small_layout();
    let mut grid = WorldGrid::new(layout.clone());
    grid.fill_rect(IVec2::new(0, 0), IVec2::new(7, 3), 0, MaterialId::ROCK, 0);
    grid.resurface_line(Vec2::new(-0.5, 3.5), Vec2::new(8.5, 4.5), 0);

    let bytes = to_bytes(&grid).unwrap();
    let loaded = from_bytes(&bytes, &layout).unwrap();
    for (a, b) in grid.patches().zip(loaded.patches()) {
        assert_eq!(a.tiles(), b.tiles());
    }
}

#[test]
fn test_window_invariant_after_steps() {
    let layout = big_layout();
    let mut grid = WorldGrid::new(layout.clone());
    grid.fill_rect(IVec2::new(0, 0), IVec2::new(47, 10), 0, MaterialId::ROCK, 0);

    let mut backend = RapierBackend::new();
    let mut host = TestHost::default();
    let materials = MaterialRegistry::new();
    let mut streamer = Streamer::new(1);

    for focus in [
        Vec2::new(4.0, 4.0),
        Vec2::new(20.0, 12.0),
        Vec2::new(44.0, 44.0),
        Vec2::new(12.0, 28.0),
    ] {
        streamer.set_focus(focus);
        streamer.step(&mut grid, &mut backend, &mut host, &materials);

        let window = streamer.window(&layout);
        for patch in grid.patches() {
            let inside = window.contains_patch(patch.origin);
            assert_eq!(
                patch.physics_active(),
                inside,
                "patch {:?} vs window {:?}..{:?} after focus {:?}",
                patch.origin,
                window.patch_min,
                window.patch_max,
                focus
            );
            assert_eq!(patch.body().is_some(), inside);
        }
    }
}

#[test]
fn test_repeated_steps_are_idempotent() {
    let layout = big_layout();
    let mut grid = WorldGrid::new(layout.clone());
    grid.fill_rect(IVec2::new(0, 0), IVec2::new(47, 10), 0, MaterialId::ROCK, 0);

    let mut backend = RapierBackend::new();
    let mut host = TestHost::default();
    let materials = MaterialRegistry::new();
    let mut streamer = Streamer::new(1);
    streamer.set_focus(Vec2::new(20.0, 8.0));

    streamer.step(&mut grid, &mut backend, &mut host, &materials);
    let shapes = backend.total_shapes();
    let bodies = backend.body_count();

    for _ in 0..3 {
        streamer.step(&mut grid, &mut backend, &mut host, &materials);
    }
    assert_eq!(backend.total_shapes(), shapes);
    assert_eq!(backend.body_count(), bodies);
}

#[test]
fn test_hydrate_dehydrate_cycle_moves_descriptor() {
    let layout = big_layout();
    let mut grid = WorldGrid::new(layout.clone());
    let mut backend = RapierBackend::new();
    let mut host = TestHost::default();
    let materials = MaterialRegistry::new();
    let mut streamer = Streamer::new(1);

    // A prop in the middle of patch (1, 1)
    let handle = grid
        .spawn_descriptor(
            ObjectKind::Prop,
            XForm::from_position(Vec2::new(12.0, 12.0)),
            Vec2::ONE,
            "crate".to_string(),
        )
        .unwrap();

    streamer.set_focus(Vec2::new(12.0, 12.0));
    streamer.step(&mut grid, &mut backend, &mut host, &materials);
    assert!(host.is_live(handle));
    assert!(grid.find_descriptor(handle).is_none(), "descriptor consumed");

    // The live object drifts into patch (3, 1), then the window leaves it
    host.move_object(handle, Vec2::new(28.0, 12.0));
    streamer.set_focus(Vec2::new(12.0, 12.0));
    streamer.step(&mut grid, &mut backend, &mut host, &materials);

    assert!(!host.is_live(handle), "object dehydrated");
    let (patch_idx, desc) = grid.find_descriptor(handle).unwrap();
    assert_eq!(patch_idx, IVec2::new(3, 1), "descriptor follows the object");
    assert_eq!(desc.xform.position, Vec2::new(28.0, 12.0));
    assert_eq!(desc.attributes, "crate");
}

#[test]
fn test_handles_stay_unique_across_cycles() {
    let layout = big_layout();
    let mut grid = WorldGrid::new(layout.clone());
    let mut backend = RapierBackend::new();
    let mut host = TestHost::default();
    let materials = MaterialRegistry::new();
    let mut streamer = Streamer::new(1);

    let mut handles = vec![];
    for i in 0..6 {
        handles.push(
            grid.spawn_descriptor(
                ObjectKind::Collectible,
                XForm::from_position(Vec2::new(10.0 + i as f32 * 2.0, 10.0)),
                Vec2::splat(0.5),
                String::new(),
            )
            .unwrap(),
        );
    }

    // Bounce the window on and off the objects several times
    for _ in 0..5 {
        streamer.set_focus(Vec2::new(12.0, 12.0));
        streamer.step(&mut grid, &mut backend, &mut host, &materials);
        streamer.set_focus(Vec2::new(44.0, 44.0));
        streamer.step(&mut grid, &mut backend, &mut host, &materials);
    }

    // Every handle still exists exactly once, as stub or live
    for &h in &handles {
        let stubbed = grid.find_descriptor(h).is_some();
        let live = host.is_live(h);
        assert!(stubbed ^ live, "handle {:?} stubbed={} live={}", h, stubbed, live);
    }
    // And no two descriptors anywhere share a handle
    let mut seen = std::collections::HashSet::new();
    for d in grid.patches().flat_map(|p| p.descriptors()) {
        assert!(seen.insert(d.handle), "duplicate handle {:?}", d.handle);
    }
    // Allocator never reissues
    let fresh = grid.allocate_handle();
    assert!(handles.iter().all(|&h| fresh > h));
}

#[test]
fn test_non_serializable_record_rehydrates() {
    let layout = big_layout();
    let mut grid = WorldGrid::new(layout.clone());
    let mut backend = RapierBackend::new();
    let mut host = TestHost::default();
    let materials = MaterialRegistry::new();
    let mut streamer = Streamer::new(1);

    let handle = grid
        .spawn_descriptor(
            ObjectKind::Emitter,
            XForm::from_position(Vec2::new(12.0, 12.0)),
            Vec2::ONE,
            "smoke".to_string(),
        )
        .unwrap();

    streamer.set_focus(Vec2::new(12.0, 12.0));
    streamer.step(&mut grid, &mut backend, &mut host, &materials);
    assert!(host.is_live(handle));
    // The placement record stays in the patch
    assert!(grid.find_descriptor(handle).is_some());
    assert_eq!(host.hydrated_total, 1);

    // Window leaves: the static emitter's center is outside, so it dies
    // without capture
    streamer.set_focus(Vec2::new(44.0, 44.0));
    streamer.step(&mut grid, &mut backend, &mut host, &materials);
    assert!(!host.is_live(handle));
    assert!(grid.find_descriptor(handle).is_some());

    // Window returns: same record hydrates again, same handle
    streamer.set_focus(Vec2::new(12.0, 12.0));
    streamer.step(&mut grid, &mut backend, &mut host, &materials);
    assert!(host.is_live(handle));
    assert_eq!(host.hydrated_total, 2);
}

#[test]
fn test_persistent_objects_survive_window_moves() {
    let layout = big_layout();
    let mut grid = WorldGrid::new(layout.clone());
    let mut backend = RapierBackend::new();
    let mut host = TestHost::default();
    let materials = MaterialRegistry::new();
    let mut streamer = Streamer::new(1);

    let handle = grid
        .spawn_descriptor(
            ObjectKind::Npc,
            XForm::from_position(Vec2::new(12.0, 12.0)),
            Vec2::ONE,
            String::new(),
        )
        .unwrap();

    streamer.set_focus(Vec2::new(12.0, 12.0));
    streamer.step(&mut grid, &mut backend, &mut host, &materials);
    assert!(host.is_live(handle));
    host.set_persistent(handle);

    streamer.set_focus(Vec2::new(44.0, 44.0));
    streamer.step(&mut grid, &mut backend, &mut host, &materials);
    assert!(host.is_live(handle), "persistent objects never dehydrate");
}

#[test]
fn test_edit_rebuild_happens_once_per_step() {
    let layout = big_layout();
    let mut grid = WorldGrid::new(layout.clone());
    grid.fill_rect(IVec2::new(8, 8), IVec2::new(15, 15), 0, MaterialId::ROCK, 0);

    let mut backend = RapierBackend::new();
    let mut host = TestHost::default();
    let materials = MaterialRegistry::new();
    let mut streamer = Streamer::new(1);
    streamer.set_focus(Vec2::new(12.0, 12.0));
    streamer.step(&mut grid, &mut backend, &mut host, &materials);

    // One solid block in patch (1,1): a single merged shape
    let body = grid.patch(IVec2::new(1, 1)).unwrap().body().unwrap();
    assert_eq!(backend.shape_count(body), 1);

    // Carve a notch; the shape set changes only after the next step
    grid.resurface_line(Vec2::new(7.5, 12.5), Vec2::new(10.5, 12.5), 0);
    assert_eq!(backend.shape_count(body), 1);

    streamer.step(&mut grid, &mut backend, &mut host, &materials);
    let body = grid.patch(IVec2::new(1, 1)).unwrap().body().unwrap();
    assert!(backend.shape_count(body) > 1);
}

#[test]
fn test_streaming_disabled_leaves_activation_alone() {
    let layout = big_layout();
    let mut grid = WorldGrid::new(layout.clone());
    let mut backend = RapierBackend::new();
    let mut host = TestHost::default();
    let materials = MaterialRegistry::new();
    let mut streamer = Streamer::new(1);

    streamer.set_focus(Vec2::new(12.0, 12.0));
    streamer.step(&mut grid, &mut backend, &mut host, &materials);
    let active_before: Vec<IVec2> = grid
        .patches()
        .filter(|p| p.physics_active())
        .map(|p| p.origin)
        .collect();

    streamer.enabled = false;
    streamer.set_focus(Vec2::new(44.0, 44.0));
    streamer.step(&mut grid, &mut backend, &mut host, &materials);

    let active_after: Vec<IVec2> = grid
        .patches()
        .filter(|p| p.physics_active())
        .map(|p| p.origin)
        .collect();
    assert_eq!(active_before, active_after);
}

#[test]
fn test_descriptor_survives_double_save() {
    // Undo/redo writes the same format repeatedly; nothing drifts
    let layout = small_layout();
    let mut grid = WorldGrid::new(layout.clone());
    grid.set_tile(IVec2::new(2, 2), 0, Tile::full(MaterialId::DIRT, 1));
    grid.spawn_descriptor(
        ObjectKind::Trigger,
        XForm::from_position(Vec2::new(2.5, 2.5)),
        Vec2::splat(2.0),
        "door".to_string(),
    )
    .unwrap();

    let once = to_bytes(&grid).unwrap();
    let reloaded = from_bytes(&once, &layout).unwrap();
    let twice = to_bytes(&reloaded).unwrap();
    assert_eq!(once, twice);
}
