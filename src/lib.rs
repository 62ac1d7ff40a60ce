//! Setlist service library crate.
//!
//! # Purpose
//! Exposes the HTTP API surface, the queue engine, fan-out, configuration,
//! and storage implementations for use by the binary and tests.
//!
//! # Notes
//! Module boundaries mirror the HTTP API, the domain engine, and the storage
//! backends for clarity.
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod engine;
pub mod fanout;
pub mod model;
pub mod observability;
pub mod playback;
pub mod store;
