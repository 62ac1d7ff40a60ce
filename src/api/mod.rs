//! HTTP API modules.
//!
//! # Purpose
//! Groups the host, public, support, and system endpoint handlers together
//! with the shared error and payload types.
pub mod error;
pub mod events;
pub mod openapi;
pub mod public;
pub mod requests;
pub mod support;
pub mod system;
pub mod types;
