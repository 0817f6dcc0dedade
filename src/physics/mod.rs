//! Collision synthesis and the seam to the rigid-body backend

use glam::Vec2;
use smallvec::SmallVec;

mod rapier_backend;
mod synthesis;

pub use rapier_backend::RapierBackend;
pub use synthesis::{synthesize_layer, PatchShape, SynthesisMode};

/// Global cap on collision primitives across the whole grid. Synthesis
/// stops emitting once the backend reports the cap reached; the affected
/// tiles simply lack collision until shapes are freed elsewhere.
pub const PROXY_BUDGET: usize = 8192;

/// Opaque handle to a backend rigid body owned by one patch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub(crate) u64);

/// Collision primitive in patch-local coordinates
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeDef {
    /// Line segment for edge-mode collision
    Segment { a: Vec2, b: Vec2 },
    /// Axis-aligned box covering a merged run of solid tiles
    Rect { min: Vec2, max: Vec2 },
    /// Convex loop for a partially-solid tile, CCW wound
    Polygon { verts: SmallVec<[Vec2; 8]> },
}

/// Physics properties snapshotted per fixture at synthesis time.
/// Changing the tile afterwards requires a rebuild.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceMaterial {
    pub material_id: u8,
    pub friction: f32,
    pub restitution: f32,
}

/// The rigid-body collaborator. The terrain core drives it with bodies and
/// fixtures; it never steps the simulation itself.
pub trait PhysicsBackend {
    /// Create an empty static body at a world-space origin
    fn create_body(&mut self, origin: Vec2) -> BodyHandle;

    /// Destroy a body and every fixture attached to it
    fn destroy_body(&mut self, body: BodyHandle);

    /// Attach one collision shape. Returns false when the proxy budget is
    /// exhausted; the caller must stop emitting rather than treat this as
    /// an error.
    fn add_fixture(
        &mut self,
        body: BodyHandle,
        shape: &ShapeDef,
        material: SurfaceMaterial,
        tag: u64,
    ) -> bool;

    /// Number of fixtures currently attached to a body
    fn shape_count(&self, body: BodyHandle) -> usize;

    /// Total collision primitives alive across all bodies
    fn total_shapes(&self) -> usize;
}
