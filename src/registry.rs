//! Process-wide map of live rooms, keyed by name.
//!
//! Created once at startup and handed to everything that creates or looks up
//! rooms. Room actors remove their own entry when they shut down.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use crate::rooms::RoomHandle;

#[derive(Clone, Default)]
pub struct Rooms {
    inner: Arc<RwLock<HashMap<String, RoomHandle>>>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<RoomHandle> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registers `handle` under `name` unless the name is taken.
    ///
    /// Returns whether the handle was inserted; an existing room is never replaced.
    pub fn create(&self, name: &str, handle: RoomHandle) -> bool {
        let mut rooms = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if rooms.contains_key(name) {
            return false;
        }
        rooms.insert(name.to_owned(), handle);
        true
    }

    pub fn remove(&self, name: &str) -> Option<RoomHandle> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn handles(&self) -> Vec<RoomHandle> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
