//! Object descriptors ("stubs") and the hydration seam to the object system
//!
//! The terrain core never owns live game objects. It owns lightweight
//! descriptors and hands them across the [`ObjectHost`] trait to whatever
//! object system the engine runs, keyed by process-wide unique handles.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Maximum byte length of a descriptor's attribute string
pub const MAX_ATTRIBUTES_LEN: usize = 256;

/// Process-wide unique object identity, stable across hydrate/dehydrate
/// cycles and across save/load. Allocated only by the world grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle(u32);

impl ObjectHandle {
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// 2D placement transform
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct XForm {
    pub position: Vec2,
    pub angle: f32,
}

impl XForm {
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            angle: 0.0,
        }
    }
}

/// Axis-aligned bounding box in world space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    #[inline]
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
    }

    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Distance from an interior point to the nearest box edge.
    /// Negative when the point lies outside.
    pub fn edge_distance(&self, p: Vec2) -> f32 {
        let dx = (p.x - self.min.x).min(self.max.x - p.x);
        let dy = (p.y - self.min.y).min(self.max.y - p.y);
        dx.min(dy)
    }
}

/// Closed set of object categories the terrain core can stub out.
///
/// Per-kind behavior lives in the object system; the core only needs the
/// streaming policy bits below, resolved by match rather than through a
/// registration table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Movable physical object, saved with its current state
    Prop,
    /// Pickup item, saved
    Collectible,
    /// Wandering actor, saved
    Npc,
    /// Static logic volume, saved
    Trigger,
    /// Particle/sound source; the placement record is the whole state
    Emitter,
    /// Cosmetic overlay; the placement record is the whole state
    Decal,
}

impl ObjectKind {
    /// Serializable kinds round-trip through descriptors carrying live
    /// state. Non-serializable kinds are rebuilt from their original
    /// placement record every time.
    pub fn is_serializable(self) -> bool {
        !matches!(self, ObjectKind::Emitter | ObjectKind::Decal)
    }

    /// Whether instances of this kind stay where they are placed
    pub fn is_static(self) -> bool {
        matches!(
            self,
            ObjectKind::Trigger | ObjectKind::Emitter | ObjectKind::Decal
        )
    }
}

/// Lightweight stand-in for a not-currently-live game object
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    pub kind: ObjectKind,
    pub xform: XForm,
    pub size: Vec2,
    pub attributes: String,
    pub handle: ObjectHandle,
}

impl ObjectDescriptor {
    pub fn new(
        kind: ObjectKind,
        xform: XForm,
        size: Vec2,
        attributes: String,
        handle: ObjectHandle,
    ) -> Self {
        Self {
            kind,
            xform,
            size,
            attributes: clamp_attributes(attributes),
            handle,
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_size(self.xform.position, self.size)
    }
}

fn clamp_attributes(mut s: String) -> String {
    if s.len() > MAX_ATTRIBUTES_LEN {
        let mut end = MAX_ATTRIBUTES_LEN;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        log::warn!(
            "Descriptor attributes truncated from {} to {} bytes",
            s.len(),
            end
        );
        s.truncate(end);
    }
    s
}

/// Snapshot of a live object as seen by the streaming controller
#[derive(Clone, Debug)]
pub struct LiveObject {
    pub handle: ObjectHandle,
    pub kind: ObjectKind,
    pub center: Vec2,
    pub bounds: Aabb,
    /// Moving objects dehydrate only once fully outside the window
    pub dynamic: bool,
    /// Attached to another object; never dehydrated on its own
    pub parented: bool,
    /// Exempt from streaming entirely (camera, player, terrain itself)
    pub persistent: bool,
}

/// The object-instantiation collaborator.
///
/// Hydration turns a descriptor into a concrete object that MUST take over
/// the descriptor's handle as its identity. Capture is the inverse: the
/// live object's current state is folded back into a fresh descriptor and
/// the live object destroyed.
pub trait ObjectHost {
    /// Instantiate a concrete object from a descriptor. Returns false when
    /// the object system refuses (the descriptor then stays in its patch).
    fn hydrate(&mut self, desc: &ObjectDescriptor) -> bool;

    /// Whether a live object with this handle currently exists
    fn is_live(&self, handle: ObjectHandle) -> bool;

    /// Snapshot every live, top-level object relevant to streaming
    fn live_objects(&self) -> Vec<LiveObject>;

    /// Serialize the live object's current state into a descriptor and
    /// destroy it. None if no such live object exists.
    fn capture(&mut self, handle: ObjectHandle) -> Option<ObjectDescriptor>;

    /// Destroy a live object without capturing its state
    fn destroy(&mut self, handle: ObjectHandle);
}
