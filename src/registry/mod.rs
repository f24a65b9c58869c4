//! Connection registry for identity and room bookkeeping
//!
//! The registry binds field-client identities to live connections and tracks
//! which monitor connections follow which identity.
//!
//! # Architecture
//!
//! ```text
//!                            RelayState
//!          ┌──────────────────────┬──────────────────────────┐
//!          │ SessionRegistry      │ SubscriptionTable        │
//!          │  identity → handle   │  identity → {handles}    │
//!          │  handle → {identity} │  handle → {identity}     │
//!          └──────────┬───────────┴────────────┬─────────────┘
//!                     │                        │
//!     connect_user ───┘          request_listen┘
//!                                              │
//!     audio_chunk(u1) ──► members_of(u1) ──► ClientHandle::send() ──► queue ──► socket
//! ```
//!
//! Each structure keeps a forward and a reverse index behind one lock, so
//! disconnect cleanup is a single atomic removal by [`HandleId`].
//!
//! # Fan-out
//!
//! An outbound message is serialized once into an [`OutboundFrame`]
//! (`Arc<str>`); every recipient's queue receives a reference-counted clone.

pub mod config;
pub mod error;
pub mod handle;
pub mod identity;
pub mod presence;
pub mod rooms;
pub mod sessions;

pub use config::{RegistrationPolicy, RegistryConfig};
pub use error::RegistryError;
pub use handle::{ClientHandle, HandleId, OutboundFrame, SendOutcome};
pub use identity::ClientIdentity;
pub use presence::MonitorSet;
pub use rooms::SubscriptionTable;
pub use sessions::{Registration, SessionRegistry};
