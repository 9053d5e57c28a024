//! Inspection domain types
//!
//! The editable working state of an entity and the canonical reference
//! catalog it is reconciled against. Structural attributes (dimensions,
//! volumes, catalog codes) are kept as open JSON maps because their shape
//! belongs to the remote catalog, not to this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key of the room list inside a serialized inspection
pub const ROOMS_KEY: &str = "rooms";

/// Identifier of the business record being inspected
pub type EntityId = String;

/// Complete editable state of an entity at one point in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntitySnapshot {
    pub entity_id: EntityId,
    pub state: InspectionState,
    pub saved_at: DateTime<Utc>,
}

impl EntitySnapshot {
    /// Wrap a working state, stamping the current time
    pub fn new(entity_id: impl Into<EntityId>, state: InspectionState) -> Self {
        Self {
            entity_id: entity_id.into(),
            state,
            saved_at: Utc::now(),
        }
    }
}

/// Working state of one inspection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InspectionState {
    #[serde(default)]
    pub rooms: Vec<RoomState>,
    /// Remaining form fields (customer data, offer data, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl InspectionState {
    /// Merge the keys of a JSON object into the free-form fields
    ///
    /// A `rooms` key replaces the room list and must decode as rooms; it
    /// never lands in the free-form fields. Non-object values are stored
    /// under `data`.
    pub fn merge_fields(&mut self, data: &Value) -> Result<(), serde_json::Error> {
        match data {
            Value::Object(map) => {
                if let Some(rooms) = map.get(ROOMS_KEY) {
                    self.rooms = Vec::<RoomState>::deserialize(rooms)?;
                }
                for (key, value) in map {
                    if key != ROOMS_KEY {
                        self.fields.insert(key.clone(), value.clone());
                    }
                }
            }
            other => {
                self.fields.insert("data".to_string(), other.clone());
            }
        }
        Ok(())
    }

    pub fn room(&self, room_id: i64) -> Option<&RoomState> {
        self.rooms.iter().find(|room| room.id == room_id)
    }
}

/// One room of the inspection with its items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomState {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default)]
    pub items: Vec<ItemState>,
    #[serde(flatten)]
    pub structure: Map<String, Value>,
}

/// One catalog item inside a room with its field-edited values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemState {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub dismantle: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub packing: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(flatten)]
    pub structure: Map<String, Value>,
}

/// Canonical room from the reference catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogRoom {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub items: Vec<CatalogItem>,
    #[serde(flatten)]
    pub structure: Map<String, Value>,
}

/// Canonical item from the reference catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub structure: Map<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}
