//! Save/Load functionality for persisting a campaign
//!
//! Uses bincode for efficient binary serialization of the whole campaign.
//! Components are serialized per entity together with the entity's handle
//! bits, and each entity is respawned at the same handle on load, so every
//! cross-reference (hunters, prey, home bases, task rosters, appointment
//! payloads) still points at the right thing.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use hecs::{Entity, World};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::*;
use crate::config::GeoConfig;
use crate::geoscape::Shipment;
use crate::invasion::Overmind;
use crate::mission::Mission;
use crate::time::{AppointmentId, GeoTime};

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Invalid entity handle {0:#x} in save")]
    InvalidHandle(u64),
}

/// All possible components for an entity, serialized as optionals
#[derive(Serialize, Deserialize, Default)]
pub struct SerializableEntity {
    /// `Entity::to_bits`
    pub bits: u64,

    // Flying
    pub craft: Option<Craft>,
    pub ufo: Option<Ufo>,
    pub mission: Option<Mission>,

    // Ground
    pub site: Option<Site>,
    pub radar: Option<Radar>,
    pub stores: Option<Stores>,
}

/// Borrowed view written by `save_geoscape`; same layout as [`SaveData`]
#[derive(Serialize)]
struct SaveDataRef<'a> {
    version: u32,
    time: &'a GeoTime,
    overmind: &'a Overmind,
    rng: &'a ChaCha8Rng,
    config: &'a GeoConfig,
    shipments: &'a BTreeMap<AppointmentId, Shipment>,
    entities: Vec<SerializableEntity>,
}

/// Serializable snapshot of a campaign
#[derive(Deserialize)]
pub struct SaveData {
    pub version: u32,
    pub time: GeoTime,
    pub overmind: Overmind,
    pub rng: ChaCha8Rng,
    pub config: GeoConfig,
    pub shipments: BTreeMap<AppointmentId, Shipment>,
    pub entities: Vec<SerializableEntity>,
}

/// Extract all entities from a world into serializable form
fn serialize_entities(world: &World) -> Vec<SerializableEntity> {
    let mut entities = Vec::new();

    for entity_ref in world.iter() {
        let mut se = SerializableEntity {
            bits: entity_ref.entity().to_bits().get(),
            ..Default::default()
        };

        if let Some(c) = entity_ref.get::<&Craft>() {
            se.craft = Some((*c).clone());
        }
        if let Some(c) = entity_ref.get::<&Ufo>() {
            se.ufo = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Mission>() {
            se.mission = Some((*c).clone());
        }
        if let Some(c) = entity_ref.get::<&Site>() {
            se.site = Some((*c).clone());
        }
        if let Some(c) = entity_ref.get::<&Radar>() {
            se.radar = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Stores>() {
            se.stores = Some((*c).clone());
        }

        entities.push(se);
    }

    // Stable file contents for the same campaign
    entities.sort_by_key(|se| se.bits);
    entities
}

/// Rebuild a world from serialized entities, at their original handles
fn deserialize_entities(entities: Vec<SerializableEntity>) -> Result<World, SaveError> {
    let mut world = World::new();
    for se in entities {
        spawn_entity(&mut world, se)?;
    }
    Ok(world)
}

fn spawn_entity(world: &mut World, se: SerializableEntity) -> Result<(), SaveError> {
    let handle = Entity::from_bits(se.bits).ok_or(SaveError::InvalidHandle(se.bits))?;
    world.spawn_at(handle, ());

    if let Some(c) = se.craft {
        let _ = world.insert_one(handle, c);
    }
    if let Some(c) = se.ufo {
        let _ = world.insert_one(handle, c);
    }
    if let Some(c) = se.mission {
        let _ = world.insert_one(handle, c);
    }
    if let Some(c) = se.site {
        let _ = world.insert_one(handle, c);
    }
    if let Some(c) = se.radar {
        let _ = world.insert_one(handle, c);
    }
    if let Some(c) = se.stores {
        let _ = world.insert_one(handle, c);
    }
    Ok(())
}

/// Save the complete campaign to a writer
pub fn save_geoscape<W: Write>(
    writer: W,
    world: &World,
    time: &GeoTime,
    overmind: &Overmind,
    rng: &ChaCha8Rng,
    config: &GeoConfig,
    shipments: &BTreeMap<AppointmentId, Shipment>,
) -> Result<(), SaveError> {
    let save_data = SaveDataRef {
        version: SAVE_VERSION,
        time,
        overmind,
        rng,
        config,
        shipments,
        entities: serialize_entities(world),
    };

    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Load a campaign from a reader
pub fn load_geoscape<R: Read>(reader: R) -> Result<LoadedGeoscape, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    let world = deserialize_entities(save_data.entities)?;

    Ok(LoadedGeoscape {
        world,
        time: save_data.time,
        overmind: save_data.overmind,
        rng: save_data.rng,
        config: save_data.config,
        shipments: save_data.shipments,
    })
}

/// Result of loading a campaign
pub struct LoadedGeoscape {
    pub world: World,
    pub time: GeoTime,
    pub overmind: Overmind,
    pub rng: ChaCha8Rng,
    pub config: GeoConfig,
    pub shipments: BTreeMap<AppointmentId, Shipment>,
}
