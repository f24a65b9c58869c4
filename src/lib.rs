//! Real-time safety-alert relay
//!
//! Field clients stream audio chunks, location updates and safety alerts
//! over WebSocket; monitor clients subscribe to a field client's identity
//! and receive that client's stream as it arrives.
//!
//! # Overview
//!
//! ```text
//!  field client ──► connect_user / audio_chunk / location_update / panic
//!                              │
//!                              ▼
//!                        EventRouter ──► IncidentNotifier (panic, auto_dispatch)
//!                         │       │
//!          SessionRegistry         SubscriptionTable
//!                                         │
//!  monitor ◄── audio_chunk / location_update (room = identity)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use alert_relay::incident::MemoryIncidentLog;
//! use alert_relay::{RelayServer, ServerConfig};
//!
//! # async fn example() -> alert_relay::error::Result<()> {
//! let config = ServerConfig::with_addr("127.0.0.1:8765".parse().unwrap());
//! let server = RelayServer::new(config, MemoryIncidentLog::new());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod incident;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use incident::{IncidentNotifier, IncidentRecord};
pub use protocol::{InboundEvent, OutboundMessage};
pub use registry::{ClientHandle, ClientIdentity, RegistrationPolicy, RegistryConfig};
pub use router::{EventRouter, RelayConfig, RelayState};
pub use server::{RelayServer, ServerConfig};
