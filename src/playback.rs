//! Outbound playback boundary.
//!
//! Approving or replaying a request hands the track to whatever playback
//! system the venue runs. That system is outside this service's consistency
//! domain: enqueue failures are logged and must never roll back the request
//! transition that triggered them.
use crate::model::TrackRef;
use async_trait::async_trait;

#[async_trait]
pub trait PlaybackControl: Send + Sync {
    /// Hand a track to the playback queue. `play_next` is a forwarded hint
    /// that the track should jump the playback queue; this service does not
    /// track playback ordering itself.
    async fn enqueue(&self, tenant_id: &str, track: &TrackRef, play_next: bool);
}

/// Default implementation for deployments without a wired playback system.
/// Records the intent and does nothing else.
pub struct LogOnlyPlayback;

#[async_trait]
impl PlaybackControl for LogOnlyPlayback {
    async fn enqueue(&self, tenant_id: &str, track: &TrackRef, play_next: bool) {
        tracing::info!(
            tenant_id,
            track_id = %track.track_id,
            title = %track.title,
            play_next,
            "playback enqueue (no backend wired)"
        );
        metrics::counter!("setlist_playback_enqueued_total").increment(1);
    }
}
