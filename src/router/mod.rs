//! Event routing
//!
//! The router is the single entry point for inbound events. It owns no
//! connection state of its own; everything shared lives in [`RelayState`],
//! which is passed in at construction.

pub mod config;
pub mod dispatch;
pub mod state;

pub use config::RelayConfig;
pub use dispatch::EventRouter;
pub use state::RelayState;
