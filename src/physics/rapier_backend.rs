//! Rapier-backed implementation of the physics seam
//!
//! Patch bodies are fixed rigid bodies; every synthesized shape becomes one
//! collider parented to its patch's body. Nothing here steps the
//! simulation; the surrounding engine owns the pipeline.

use ahash::AHashMap;
use glam::Vec2;
use rapier2d::prelude::*;

use super::{BodyHandle, PhysicsBackend, ShapeDef, SurfaceMaterial, PROXY_BUDGET};

pub struct RapierBackend {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    islands: IslandManager,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,

    /// Opaque handle -> rapier body
    handles: AHashMap<u64, RigidBodyHandle>,
    next_handle: u64,

    /// Proxy budget this backend enforces
    budget: usize,
}

impl RapierBackend {
    pub fn new() -> Self {
        Self::with_budget(PROXY_BUDGET)
    }

    pub fn with_budget(budget: usize) -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            islands: IslandManager::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            handles: AHashMap::new(),
            next_handle: 0,
            budget,
        }
    }

    fn rigid_body(&self, body: BodyHandle) -> RigidBodyHandle {
        *self
            .handles
            .get(&body.0)
            .unwrap_or_else(|| panic!("unknown physics body {:?}", body))
    }

    pub fn body_count(&self) -> usize {
        self.handles.len()
    }
}

impl Default for RapierBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsBackend for RapierBackend {
    fn create_body(&mut self, origin: Vec2) -> BodyHandle {
        let rb = RigidBodyBuilder::fixed()
            .translation(vector![origin.x, origin.y])
            .build();
        let rapier_handle = self.bodies.insert(rb);
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        self.handles.insert(handle.0, rapier_handle);
        handle
    }

    fn destroy_body(&mut self, body: BodyHandle) {
        let rapier_handle = self
            .handles
            .remove(&body.0)
            .unwrap_or_else(|| panic!("destroying unknown physics body {:?}", body));
        self.bodies.remove(
            rapier_handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    fn add_fixture(
        &mut self,
        body: BodyHandle,
        shape: &ShapeDef,
        material: SurfaceMaterial,
        tag: u64,
    ) -> bool {
        if self.colliders.len() >= self.budget {
            return false;
        }
        let rapier_handle = self.rigid_body(body);

        let builder = match shape {
            ShapeDef::Segment { a, b } => {
                ColliderBuilder::segment(point![a.x, a.y], point![b.x, b.y])
            }
            ShapeDef::Rect { min, max } => {
                let half = (*max - *min) * 0.5;
                let center = *min + half;
                ColliderBuilder::cuboid(half.x, half.y)
                    .translation(vector![center.x, center.y])
            }
            ShapeDef::Polygon { verts } => {
                let points: Vec<Point<Real>> =
                    verts.iter().map(|v| point![v.x, v.y]).collect();
                match ColliderBuilder::convex_hull(&points) {
                    Some(builder) => builder,
                    None => {
                        // Degenerate loop; drop the shape but keep emitting
                        log::debug!("Skipping degenerate polygon fixture ({} verts)", verts.len());
                        return true;
                    }
                }
            }
        };

        let collider = builder
            .friction(material.friction)
            .restitution(material.restitution)
            .user_data(tag as u128)
            .build();
        self.colliders
            .insert_with_parent(collider, rapier_handle, &mut self.bodies);
        true
    }

    fn shape_count(&self, body: BodyHandle) -> usize {
        self.handles
            .get(&body.0)
            .and_then(|h| self.bodies.get(*h))
            .map_or(0, |b| b.colliders().len())
    }

    fn total_shapes(&self) -> usize {
        self.colliders.len()
    }
}
