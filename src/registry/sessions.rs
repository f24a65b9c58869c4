//! Session registry
//!
//! Maps field-client identities to the connection currently registered for
//! them. A reverse index by [`HandleId`] lets disconnect cleanup run without
//! the caller knowing which identities the connection claimed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::config::{RegistrationPolicy, RegistryConfig};
use super::error::RegistryError;
use super::handle::{ClientHandle, HandleId};
use super::identity::ClientIdentity;

/// Outcome of a successful field registration
#[derive(Debug, Clone)]
pub enum Registration {
    /// Identity was not registered before
    New,
    /// Identity was already registered to the same connection
    Refreshed,
    /// Identity moved from another connection, which is returned
    Replaced(Arc<ClientHandle>),
}

#[derive(Default)]
struct SessionMaps {
    by_identity: HashMap<ClientIdentity, Arc<ClientHandle>>,
    by_handle: HashMap<HandleId, HashSet<ClientIdentity>>,
}

impl SessionMaps {
    fn detach(&mut self, handle_id: HandleId, identity: &ClientIdentity) {
        if let Some(ids) = self.by_handle.get_mut(&handle_id) {
            ids.remove(identity);
            if ids.is_empty() {
                self.by_handle.remove(&handle_id);
            }
        }
    }
}

/// Registry of live field-client sessions
///
/// Both indexes live behind a single lock so every mutation is atomic with
/// respect to lookups.
pub struct SessionRegistry {
    maps: RwLock<SessionMaps>,
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Create a registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            maps: RwLock::new(SessionMaps::default()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Record `handle` as the live connection for `identity`
    ///
    /// What happens to a different connection already holding the identity
    /// depends on [`RegistrationPolicy`]. A handle that has already closed is
    /// refused so disconnect cleanup cannot be outrun.
    pub async fn register_field(
        &self,
        identity: &ClientIdentity,
        handle: &Arc<ClientHandle>,
    ) -> Result<Registration, RegistryError> {
        let mut maps = self.maps.write().await;

        if handle.is_closed() {
            return Err(RegistryError::HandleClosed(handle.id()));
        }

        let previous = maps.by_identity.get(identity).cloned();
        let registration = match previous {
            None => Registration::New,
            Some(prev) if prev.id() == handle.id() => return Ok(Registration::Refreshed),
            Some(prev) => {
                if self.config.registration_policy == RegistrationPolicy::RejectWhileLive
                    && !prev.is_closed()
                {
                    return Err(RegistryError::IdentityInUse(identity.clone()));
                }

                maps.detach(prev.id(), identity);

                if self.config.registration_policy == RegistrationPolicy::EvictPrevious {
                    prev.request_close();
                }

                tracing::info!(
                    user_id = %identity,
                    previous = %prev.id(),
                    session_id = %handle.id(),
                    policy = %self.config.registration_policy,
                    "Identity moved to new connection"
                );

                Registration::Replaced(prev)
            }
        };

        maps.by_identity.insert(identity.clone(), Arc::clone(handle));
        maps.by_handle
            .entry(handle.id())
            .or_default()
            .insert(identity.clone());

        Ok(registration)
    }

    /// Remove every identity registered to `handle`
    ///
    /// Returns the identities that were removed. Safe to call repeatedly.
    pub async fn unregister(&self, handle: &ClientHandle) -> Vec<ClientIdentity> {
        let mut maps = self.maps.write().await;

        let Some(ids) = maps.by_handle.remove(&handle.id()) else {
            return Vec::new();
        };

        let mut removed = Vec::with_capacity(ids.len());
        for identity in ids {
            let owned = maps
                .by_identity
                .get(&identity)
                .is_some_and(|h| h.id() == handle.id());
            if owned {
                maps.by_identity.remove(&identity);
                removed.push(identity);
            }
        }

        removed
    }

    /// Look up the live connection for `identity`
    pub async fn lookup(&self, identity: &ClientIdentity) -> Option<Arc<ClientHandle>> {
        self.maps.read().await.by_identity.get(identity).cloned()
    }

    /// Identities currently registered to `handle`
    pub async fn identities_of(&self, handle: &ClientHandle) -> Vec<ClientIdentity> {
        self.maps
            .read()
            .await
            .by_handle
            .get(&handle.id())
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of registered identities
    pub async fn field_count(&self) -> usize {
        self.maps.read().await.by_identity.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
