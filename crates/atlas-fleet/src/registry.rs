//! [`WorldRegistry`] – per-device world model registry.
//!
//! Every agent in a session owns one [`WorldModel`] behind an
//! `Arc<Mutex<_>>`.  The agent's own control loop and the fleet coordinator
//! both reach it through the registry, so a coordinator pass never observes a
//! half-applied sensor update.
//!
//! # Example
//!
//! ```rust
//! use atlas_fleet::registry::{WorldRegistry, lock_world};
//! use atlas_perception::world_model::{WorldConfig, WorldModel};
//!
//! let mut registry = WorldRegistry::new();
//! let shared = registry.insert("robot_a", WorldModel::new(WorldConfig::default()));
//!
//! assert!(registry.contains("robot_a"));
//! assert_eq!(lock_world(&shared).exploration_fraction(), 0.0);
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use atlas_perception::world_model::WorldModel;
use tracing::warn;

/// A world model shared between an agent loop and the coordinator.
pub type SharedWorld = Arc<Mutex<WorldModel>>;

/// Lock `world`, recovering the guard if a previous holder panicked.
pub fn lock_world(world: &SharedWorld) -> MutexGuard<'_, WorldModel> {
    world.lock().unwrap_or_else(|poisoned| {
        warn!("world model lock was poisoned; continuing with inner state");
        poisoned.into_inner()
    })
}

/// Session-owned map from device id to [`SharedWorld`].
#[derive(Debug, Default, Clone)]
pub struct WorldRegistry {
    worlds: BTreeMap<String, SharedWorld>,
}

impl WorldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `world` under `device_id` and return its shared handle.  Any
    /// previously registered world with the same id is replaced.
    pub fn insert(&mut self, device_id: impl Into<String>, world: WorldModel) -> SharedWorld {
        let shared = Arc::new(Mutex::new(world));
        self.worlds.insert(device_id.into(), Arc::clone(&shared));
        shared
    }

    /// Register an existing handle.
    pub fn insert_shared(&mut self, device_id: impl Into<String>, world: SharedWorld) {
        self.worlds.insert(device_id.into(), world);
    }

    pub fn get(&self, device_id: &str) -> Option<SharedWorld> {
        self.worlds.get(device_id).cloned()
    }

    pub fn remove(&mut self, device_id: &str) -> Option<SharedWorld> {
        self.worlds.remove(device_id)
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.worlds.contains_key(device_id)
    }

    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    /// Device ids in ascending order.
    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.worlds.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_perception::world_model::WorldConfig;
    use atlas_types::{CellState, GridCoord};

    fn world() -> WorldModel {
        WorldModel::new(WorldConfig::default())
    }

    #[test]
    fn insert_and_lookup() {
        let mut registry = WorldRegistry::new();
        registry.insert("b", world());
        registry.insert("a", world());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.device_ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(registry.get("a").is_some());
        assert!(registry.get("zzz").is_none());
    }

    #[test]
    fn handles_share_state() {
        let mut registry = WorldRegistry::new();
        let handle = registry.insert("a", world());
        lock_world(&handle)
            .grid_mut()
            .observe(GridCoord::new(1, 1), CellState::Wall, 0.9, 1);
        let again = registry.get("a").unwrap();
        assert_eq!(
            lock_world(&again).grid().cell(GridCoord::new(1, 1)).unwrap().state,
            CellState::Wall
        );
    }

    #[test]
    fn re_registering_replaces_world() {
        let mut registry = WorldRegistry::new();
        let old = registry.insert("a", world());
        lock_world(&old)
            .grid_mut()
            .observe(GridCoord::new(1, 1), CellState::Wall, 0.9, 1);
        registry.insert("a", world());
        let current = registry.get("a").unwrap();
        assert_eq!(lock_world(&current).grid().known_count(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_drops_entry() {
        let mut registry = WorldRegistry::new();
        registry.insert("a", world());
        assert!(registry.remove("a").is_some());
        assert!(registry.is_empty());
        assert!(registry.remove("a").is_none());
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let mut registry = WorldRegistry::new();
        let handle = registry.insert("a", world());
        let clone = Arc::clone(&handle);
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("agent loop crashed");
        })
        .join();
        assert!(handle.is_poisoned());
        assert_eq!(lock_world(&handle).grid().known_count(), 0);
    }
}
