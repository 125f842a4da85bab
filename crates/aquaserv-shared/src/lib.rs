//! Code shared between the AquaServ clients and the tooling that stands in for
//! the backend

#![warn(unused_crate_dependencies)]


pub mod const_config;
pub mod errors;
pub mod id;
mod macros;
pub mod req_args;
pub mod telemetry;
pub mod token;
pub mod uac;
