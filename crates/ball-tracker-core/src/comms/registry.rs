//! Connection registry
//!
//! Tracks every live media connection together with the resources that
//! must be released with it. The registry is an explicit object injected
//! where it is needed, so several isolated registries can coexist in one
//! process.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::types::{ClientId, ConnectionId, MediaError, RegistryError};
use crate::{log_debug, log_error};

/// Resources owned by one registered connection
pub trait ConnectionResources: Send {
    /// Coordinate channel endpoint that created the connection, if any
    fn binding(&self) -> Option<ClientId>;

    /// Release everything. Must be safe to call more than once.
    fn release(&mut self) -> Result<(), MediaError>;
}

/// Live connections keyed by id
pub struct ConnectionRegistry<R> {
    entries: Mutex<HashMap<ConnectionId, R>>,
}

impl<R: ConnectionResources> ConnectionRegistry<R> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    /// Register resources under `id`. Fails if `id` is already present.
    pub fn register(&self, id: ConnectionId, resources: R) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&id) {
            return Err(RegistryError::DuplicateConnection(id));
        }
        entries.insert(id, resources);
        log_debug!("Registered connection {}", id);
        Ok(())
    }

    /// Remove an entry without releasing it
    pub fn unregister(&self, id: &ConnectionId) -> Option<R> {
        self.entries.lock().remove(id)
    }

    /// Visit every entry while holding the registry lock
    pub fn for_each(&self, mut f: impl FnMut(&ConnectionId, &R)) {
        for (id, resources) in self.entries.lock().iter() {
            f(id, resources);
        }
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no connection is registered
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove and release one connection. Returns `false` if it was not
    /// registered.
    pub fn release(&self, id: &ConnectionId) -> bool {
        match self.unregister(id) {
            Some(resources) => {
                release_logged(id, resources);
                true
            }
            None => false,
        }
    }

    /// Remove and release every connection created through `client`.
    /// Returns how many were released.
    pub fn remove_bound_to(&self, client: &ClientId) -> usize {
        let ids: Vec<ConnectionId> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, resources)| resources.binding().as_ref() == Some(client))
            .map(|(id, _)| *id)
            .collect();
        ids.iter().filter(|id| self.release(id)).count()
    }

    /// Release every registered connection.
    ///
    /// Works on a snapshot of ids; each entry is removed before it is
    /// released, so a concurrent `unregister` can neither be skipped nor
    /// processed twice. A failed release is logged and the sweep goes on.
    /// Returns how many entries this call released.
    pub fn cleanup_all(&self) -> usize {
        let snapshot: Vec<ConnectionId> = self.entries.lock().keys().copied().collect();
        snapshot.iter().filter(|id| self.release(id)).count()
    }
}

impl<R: ConnectionResources> Default for ConnectionRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn release_logged<R: ConnectionResources>(id: &ConnectionId, mut resources: R) {
    match resources.release() {
        Ok(()) => log_debug!("Released connection {}", id),
        Err(e) => log_error!("Failed to release connection {}: {}", id, e),
    }
}
