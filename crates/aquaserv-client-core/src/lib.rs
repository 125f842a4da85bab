//! Authenticated access to the AquaServ backend. Every call goes through a
//! [`Client`] which attaches the access token, transparently refreshes an
//! expired session once per call and keeps the persisted session in sync.
//!
//! NB: No async runtime is started by this library, the futures returned can be
//! driven by whichever runtime the application uses

#![warn(unused_crate_dependencies)]


mod client;
mod configuration;
mod errors;
mod storage;

pub use client::{
    credentials::{AuthState, Session},
    request::{ApiRequest, ApiResponse},
    Client, LoginOutcome, SessionEvent, SessionListener,
};
pub use configuration::{get_configuration, get_configuration_from, ClientConfig, Environment};
pub use errors::ClientError;
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
