//! Registry error types
//!
//! Error types for session registry and subscription table operations.

use super::handle::HandleId;
use super::identity::ClientIdentity;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Identity is held by another live connection
    #[error("Identity already registered to a live connection: {0}")]
    IdentityInUse(ClientIdentity),
    /// Handle has already been closed and cleaned up
    #[error("Connection closed: {0}")]
    HandleClosed(HandleId),
}
