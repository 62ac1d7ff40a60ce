//! Event model: status, configuration, and the optimistic version token.
//!
//! # Purpose
//! Defines the per-tenant event record owned by the event state machine.
//! Every tenant has at most one current event; it is created lazily in
//! `offline` and never hard-deleted.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Event lifecycle status.
///
/// The transition graph is fully connected except for identity transitions:
/// every status can reach every other status in one hop, but a transition
/// targeting the current status is rejected.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Offline,
    Standby,
    Live,
}

impl EventStatus {
    pub const ALL: [EventStatus; 3] = [EventStatus::Offline, EventStatus::Standby, EventStatus::Live];

    /// Statuses this status may legally transition to (all except itself).
    pub fn legal_targets(self) -> Vec<EventStatus> {
        Self::ALL.iter().copied().filter(|s| *s != self).collect()
    }

    /// Whether guests may submit requests in this status (page flag
    /// permitting).
    pub fn accepts_requests(self) -> bool {
        matches!(self, EventStatus::Standby | EventStatus::Live)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Offline => "offline",
            EventStatus::Standby => "standby",
            EventStatus::Live => "live",
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offline" => Ok(EventStatus::Offline),
            "standby" => Ok(EventStatus::Standby),
            "live" => Ok(EventStatus::Live),
            other => Err(format!("unknown event status: {other}")),
        }
    }
}

/// Closed configuration record for an event.
///
/// Fields are named and typed rather than an open map so additive settings
/// cannot bypass validation.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct EventConfig {
    /// Guests can open the submission page and submit requests.
    pub submission_page_enabled: bool,
    /// The public queue display page is visible.
    pub display_page_enabled: bool,
    pub welcome_text: Option<String>,
    pub display_notice: Option<String>,
    pub max_requests_per_guest: Option<u32>,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            submission_page_enabled: true,
            display_page_enabled: true,
            welcome_text: None,
            display_notice: None,
            max_requests_per_guest: None,
        }
    }
}

/// Partial config update; `None` fields are left unchanged.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct EventConfigPatch {
    pub submission_page_enabled: Option<bool>,
    pub display_page_enabled: Option<bool>,
    pub welcome_text: Option<String>,
    pub display_notice: Option<String>,
    pub max_requests_per_guest: Option<u32>,
}

impl EventConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.submission_page_enabled.is_none()
            && self.display_page_enabled.is_none()
            && self.welcome_text.is_none()
            && self.display_notice.is_none()
            && self.max_requests_per_guest.is_none()
    }

    /// Merge into an existing config, returning the merged copy.
    pub fn apply(&self, config: &EventConfig) -> EventConfig {
        EventConfig {
            submission_page_enabled: self
                .submission_page_enabled
                .unwrap_or(config.submission_page_enabled),
            display_page_enabled: self
                .display_page_enabled
                .unwrap_or(config.display_page_enabled),
            welcome_text: self.welcome_text.clone().or_else(|| config.welcome_text.clone()),
            display_notice: self
                .display_notice
                .clone()
                .or_else(|| config.display_notice.clone()),
            max_requests_per_guest: self
                .max_requests_per_guest
                .or(config.max_requests_per_guest),
        }
    }
}

/// The per-tenant event record.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct LiveEvent {
    pub event_id: String,
    pub tenant_id: String,
    pub status: EventStatus,
    /// Optimistic-concurrency token; incremented by exactly 1 on every
    /// successful mutation.
    pub version: i64,
    pub config: EventConfig,
    /// Which host session last mutated the event. Informational, not a lock.
    pub active_controller_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LiveEvent {
    /// Default offline event, created lazily on first access for a tenant.
    pub fn new_offline(tenant_id: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            status: EventStatus::Offline,
            version: 0,
            config: EventConfig::default(),
            active_controller_id: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_targets_exclude_self() {
        for status in EventStatus::ALL {
            let targets = status.legal_targets();
            assert_eq!(targets.len(), 2);
            assert!(!targets.contains(&status));
        }
    }

    #[test]
    fn only_standby_and_live_accept_requests() {
        assert!(!EventStatus::Offline.accepts_requests());
        assert!(EventStatus::Standby.accepts_requests());
        assert!(EventStatus::Live.accepts_requests());
    }

    #[test]
    fn patch_merges_without_clobbering() {
        let base = EventConfig {
            welcome_text: Some("welcome".to_string()),
            ..EventConfig::default()
        };
        let patch = EventConfigPatch {
            display_page_enabled: Some(false),
            ..EventConfigPatch::default()
        };
        let merged = patch.apply(&base);
        assert!(!merged.display_page_enabled);
        assert!(merged.submission_page_enabled);
        assert_eq!(merged.welcome_text.as_deref(), Some("welcome"));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in EventStatus::ALL {
            assert_eq!(status.as_str().parse::<EventStatus>(), Ok(status));
        }
        assert!("paused".parse::<EventStatus>().is_err());
    }
}
