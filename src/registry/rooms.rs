//! Subscription table
//!
//! Rooms are keyed by the field-client identity being followed and hold the
//! monitor connections subscribed to it. Empty rooms are removed as soon as
//! their last member leaves.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::error::RegistryError;
use super::handle::{ClientHandle, HandleId};
use super::identity::ClientIdentity;

#[derive(Default)]
struct RoomMaps {
    rooms: HashMap<ClientIdentity, HashMap<HandleId, Arc<ClientHandle>>>,
    memberships: HashMap<HandleId, HashSet<ClientIdentity>>,
}

/// Table of monitor subscriptions, one room per followed identity
pub struct SubscriptionTable {
    maps: RwLock<RoomMaps>,
}

impl SubscriptionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(RoomMaps::default()),
        }
    }

    /// Add `handle` to the room for `target`
    ///
    /// Idempotent. Returns the room token (the target identity) on success.
    /// A handle that has already closed is refused so it cannot be left
    /// behind in a room after its disconnect cleanup ran.
    pub async fn subscribe(
        &self,
        handle: &Arc<ClientHandle>,
        target: &ClientIdentity,
    ) -> Result<ClientIdentity, RegistryError> {
        let mut maps = self.maps.write().await;

        if handle.is_closed() {
            return Err(RegistryError::HandleClosed(handle.id()));
        }

        let room = maps.rooms.entry(target.clone()).or_default();
        let added = room.insert(handle.id(), Arc::clone(handle)).is_none();
        let members = room.len();

        maps.memberships
            .entry(handle.id())
            .or_default()
            .insert(target.clone());

        if added {
            tracing::info!(
                room = %target,
                session_id = %handle.id(),
                subscribers = members,
                "Subscriber added"
            );
        }

        Ok(target.clone())
    }

    /// Remove `handle` from the room for `target`
    ///
    /// Returns whether the handle was a member.
    pub async fn unsubscribe(&self, handle: &ClientHandle, target: &ClientIdentity) -> bool {
        let mut maps = self.maps.write().await;

        let removed = match maps.rooms.get_mut(target) {
            Some(room) => {
                let removed = room.remove(&handle.id()).is_some();
                if room.is_empty() {
                    maps.rooms.remove(target);
                }
                removed
            }
            None => false,
        };

        if let Some(joined) = maps.memberships.get_mut(&handle.id()) {
            joined.remove(target);
            if joined.is_empty() {
                maps.memberships.remove(&handle.id());
            }
        }

        if removed {
            tracing::debug!(room = %target, session_id = %handle.id(), "Subscriber removed");
        }

        removed
    }

    /// Evict `handle` from every room it belongs to
    ///
    /// Returns the rooms it was removed from. Safe to call for handles that
    /// never subscribed and safe to call repeatedly.
    pub async fn remove_handle_everywhere(&self, handle: &ClientHandle) -> Vec<ClientIdentity> {
        let mut maps = self.maps.write().await;

        let Some(joined) = maps.memberships.remove(&handle.id()) else {
            return Vec::new();
        };

        let mut left = Vec::with_capacity(joined.len());
        for target in joined {
            if let Some(room) = maps.rooms.get_mut(&target) {
                if room.remove(&handle.id()).is_some() {
                    left.push(target.clone());
                }
                if room.is_empty() {
                    maps.rooms.remove(&target);
                }
            }
        }

        left
    }

    /// Snapshot of the monitors subscribed to `target`
    ///
    /// An unknown target yields an empty list.
    pub async fn members_of(&self, target: &ClientIdentity) -> Vec<Arc<ClientHandle>> {
        self.maps
            .read()
            .await
            .rooms
            .get(target)
            .map(|room| room.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Rooms `handle` is currently subscribed to
    pub async fn rooms_of(&self, handle: &ClientHandle) -> Vec<ClientIdentity> {
        self.maps
            .read()
            .await
            .memberships
            .get(&handle.id())
            .map(|joined| joined.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of non-empty rooms
    pub async fn room_count(&self) -> usize {
        self.maps.read().await.rooms.len()
    }

    /// Number of monitors subscribed to `target`
    pub async fn subscriber_count(&self, target: &ClientIdentity) -> usize {
        self.maps
            .read()
            .await
            .rooms
            .get(target)
            .map_or(0, HashMap::len)
    }
}

impl Default for SubscriptionTable {
    fn default() -> Self {
        Self::new()
    }
}
