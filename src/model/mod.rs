//! Domain model for the request-queue service.
//!
//! # Purpose
//! Re-exports the tenant/event/request models and derived statistics used by
//! the engine, store, and API layers.
mod event;
mod request;
mod stats;
mod tenant;

pub use event::{EventConfig, EventConfigPatch, EventStatus, LiveEvent};
pub use request::{queue_sort, RequestStatus, SongRequest, TrackRef};
pub use stats::QueueStats;
pub use tenant::{HostSession, Tenant};
