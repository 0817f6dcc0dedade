//! Surface material definitions and registry

use crate::physics::SurfaceMaterial;

/// Built-in surface IDs
pub struct MaterialId;

impl MaterialId {
    /// No material. A tile side carrying VOID has no collision and no render surface.
    pub const VOID: u8 = 0;
    pub const ROCK: u8 = 1;
    pub const DIRT: u8 = 2;
    pub const METAL: u8 = 3;
    pub const WOOD: u8 = 4;
    pub const ICE: u8 = 5;
    pub const RUBBER: u8 = 6;
    pub const SAND: u8 = 7;
}

/// Definition of a surface material's properties
#[derive(Clone, Debug)]
pub struct MaterialDef {
    pub id: u8,
    pub name: &'static str,

    /// Sliding coefficient applied to collision fixtures
    pub friction: f32,
    /// Bounce applied to collision fixtures
    pub restitution: f32,
    /// Carving resistance (None = indestructible)
    pub hardness: Option<u8>,
}

/// Registry of all known surface materials
///
/// The physics synthesizer snapshots friction/restitution from here when a
/// patch body is built; later edits to a tile require a physics rebuild.
pub struct MaterialRegistry {
    defs: Vec<MaterialDef>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        let defs = vec![
            MaterialDef {
                id: MaterialId::VOID,
                name: "void",
                friction: 0.0,
                restitution: 0.0,
                hardness: None,
            },
            MaterialDef {
                id: MaterialId::ROCK,
                name: "rock",
                friction: 0.8,
                restitution: 0.1,
                hardness: Some(6),
            },
            MaterialDef {
                id: MaterialId::DIRT,
                name: "dirt",
                friction: 0.9,
                restitution: 0.05,
                hardness: Some(2),
            },
            MaterialDef {
                id: MaterialId::METAL,
                name: "metal",
                friction: 0.4,
                restitution: 0.2,
                hardness: None,
            },
            MaterialDef {
                id: MaterialId::WOOD,
                name: "wood",
                friction: 0.7,
                restitution: 0.15,
                hardness: Some(3),
            },
            MaterialDef {
                id: MaterialId::ICE,
                name: "ice",
                friction: 0.05,
                restitution: 0.1,
                hardness: Some(1),
            },
            MaterialDef {
                id: MaterialId::RUBBER,
                name: "rubber",
                friction: 1.0,
                restitution: 0.85,
                hardness: Some(4),
            },
            MaterialDef {
                id: MaterialId::SAND,
                name: "sand",
                friction: 1.0,
                restitution: 0.0,
                hardness: Some(1),
            },
        ];
        Self { defs }
    }

    /// Look up a material definition. Unknown IDs fall back to VOID rather
    /// than panicking so stale save data degrades instead of crashing.
    pub fn get(&self, id: u8) -> &MaterialDef {
        self.defs.get(id as usize).unwrap_or_else(|| {
            log::warn!("Unknown material id {}, substituting void", id);
            &self.defs[MaterialId::VOID as usize]
        })
    }

    /// Snapshot the per-fixture physics properties for a surface
    pub fn surface_material(&self, id: u8) -> SurfaceMaterial {
        let def = self.get(id);
        SurfaceMaterial {
            material_id: def.id,
            friction: def.friction,
            restitution: def.restitution,
        }
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::new()
    }
}
