//! # Catalog Reconciliation
//!
//! Builds the working snapshot used to resume editing an entity by merging
//! the canonical catalog from the remote system with the last local snapshot.
//!
//! ## Merge rules
//!
//! - **Structure from the catalog**: ids, names and structural attributes
//!   (dimensions, codes) always come from the canonical collection, so
//!   catalog edits propagate
//! - **Mutable fields from the local snapshot**: quantities, dismantle and
//!   packing flags and notes are projected from the matching local entry, so
//!   field edits survive a catalog refresh
//! - **Matching**: id and name first, then name only
//! - **Defaults**: catalog entries without a local match start at zero/false
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use fieldsync::offline::Reconciler;
//! # async fn example(reconciler: Reconciler) -> Result<(), fieldsync::shared::SyncError> {
//! let snapshot = reconciler.load_for_editing("entity-42").await?;
//! println!("{} rooms", snapshot.state.rooms.len());
//! # Ok(())
//! # }
//! ```

use crate::local_db::LocalDatabase;
use crate::remote::{RemoteApi, RemoteError};
use crate::shared::error::SyncError;
use crate::shared::types::{
    CatalogItem, CatalogRoom, EntitySnapshot, InspectionState, ItemState, RoomState,
};
use crate::sync::ConnectivityMonitor;
use std::sync::Arc;
use std::time::Duration;

/// Merge the canonical catalog with locally preserved mutable fields
///
/// Non-room fields of the local state are carried over unchanged. Local rooms
/// and items missing from the catalog are dropped.
pub fn reconcile(catalog: &[CatalogRoom], local: Option<&InspectionState>) -> InspectionState {
    let local_rooms = local.map(|state| state.rooms.as_slice()).unwrap_or_default();
    let mut room_matcher = Matcher::new(local_rooms, room_key);

    let rooms = catalog
        .iter()
        .map(|canonical| {
            let local_room = room_matcher.take(canonical.id, &canonical.name);
            reconcile_room(canonical, local_room)
        })
        .collect();

    InspectionState {
        rooms,
        fields: local.map(|state| state.fields.clone()).unwrap_or_default(),
    }
}

fn reconcile_room(canonical: &CatalogRoom, local: Option<&RoomState>) -> RoomState {
    let local_items = local.map(|room| room.items.as_slice()).unwrap_or_default();
    let mut item_matcher = Matcher::new(local_items, item_key);

    RoomState {
        id: canonical.id,
        name: canonical.name.clone(),
        notes: local.map(|room| room.notes.clone()).unwrap_or_default(),
        items: canonical
            .items
            .iter()
            .map(|item| reconcile_item(item, item_matcher.take(item.id, &item.name)))
            .collect(),
        structure: canonical.structure.clone(),
    }
}

fn reconcile_item(canonical: &CatalogItem, local: Option<&ItemState>) -> ItemState {
    let mut item = ItemState {
        id: canonical.id,
        name: canonical.name.clone(),
        quantity: 0,
        dismantle: false,
        packing: false,
        notes: String::new(),
        structure: canonical.structure.clone(),
    };

    if let Some(local) = local {
        item.quantity = local.quantity;
        item.dismantle = local.dismantle;
        item.packing = local.packing;
        item.notes = local.notes.clone();
    }
    item
}

fn room_key(room: &RoomState) -> (i64, &str) {
    (room.id, room.name.as_str())
}

fn item_key(item: &ItemState) -> (i64, &str) {
    (item.id, item.name.as_str())
}

/// Finds local entries by id+name, then by name, using each entry at most once
struct Matcher<'a, T> {
    entries: &'a [T],
    used: Vec<bool>,
    key: fn(&T) -> (i64, &str),
}

impl<'a, T> Matcher<'a, T> {
    fn new(entries: &'a [T], key: fn(&T) -> (i64, &str)) -> Self {
        Self {
            entries,
            used: vec![false; entries.len()],
            key,
        }
    }

    fn take(&mut self, id: i64, name: &str) -> Option<&'a T> {
        let key = self.key;
        let exact = self.position(|entry| key(entry) == (id, name));
        let index = exact.or_else(|| self.position(|entry| key(entry).1 == name))?;
        self.used[index] = true;
        let entries = self.entries;
        Some(&entries[index])
    }

    fn position(&self, predicate: impl Fn(&T) -> bool) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .position(|(i, entry)| !self.used[i] && predicate(entry))
    }
}

/// Read path that resumes editing an entity
#[derive(Clone)]
pub struct Reconciler {
    db: LocalDatabase,
    remote: Arc<dyn RemoteApi>,
    monitor: ConnectivityMonitor,
    request_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        db: LocalDatabase,
        remote: Arc<dyn RemoteApi>,
        monitor: ConnectivityMonitor,
        request_timeout: Duration,
    ) -> Self {
        Self {
            db,
            remote,
            monitor,
            request_timeout,
        }
    }

    /// Reconcile the entity against the catalog and save the result
    ///
    /// When the catalog cannot be fetched the last local snapshot is returned
    /// unchanged. Without a local snapshot the remote error propagates.
    pub async fn load_for_editing(&self, entity_id: &str) -> Result<EntitySnapshot, SyncError> {
        let local = self.db.load_snapshot(entity_id).await?;

        let catalog = match self.fetch_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                return match local {
                    Some(snapshot) => {
                        tracing::warn!(entity_id, error = %e, "catalog unavailable, using local snapshot");
                        Ok(snapshot)
                    }
                    None => Err(e.into()),
                };
            }
        };

        let state = reconcile(&catalog, local.as_ref().map(|snapshot| &snapshot.state));
        let snapshot = EntitySnapshot::new(entity_id, state);
        self.db.save_snapshot(&snapshot).await?;

        tracing::debug!(entity_id, rooms = snapshot.state.rooms.len(), "entity reconciled");
        Ok(snapshot)
    }

    async fn fetch_catalog(&self) -> Result<Vec<CatalogRoom>, RemoteError> {
        if !self.monitor.is_online() {
            return Err(RemoteError::Network("offline".to_string()));
        }
        tokio::time::timeout(self.request_timeout, self.remote.fetch_catalog())
            .await
            .unwrap_or(Err(RemoteError::Timeout(self.request_timeout)))
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
