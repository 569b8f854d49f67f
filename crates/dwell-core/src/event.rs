//! Raw host events fed to the tracker.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::types::{ResourceKey, SubjectId};

/// A signal from the host about subjects, window focus or user activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostEvent {
    /// A subject became the active one in its window.
    TabActivated {
        subject: SubjectId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// A subject's page changed or finished loading.
    TabUpdated {
        subject: SubjectId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default)]
        complete: bool,
        #[serde(default)]
        active: bool,
    },
    /// A subject was closed.
    TabRemoved { subject: SubjectId },
    /// The browser lost focus.
    WindowBlur,
    /// The browser regained focus; `subject` is its active tab when known.
    WindowFocus {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<SubjectId>,
    },
    /// Raw user input (mouse, keyboard, scroll) on a subject's page.
    UserInput { subject: SubjectId },
    /// The subject's activity detector saw input after being idle.
    UserActive { subject: SubjectId },
    /// The subject's activity detector went idle.
    UserInactive {
        subject: SubjectId,
        #[serde(default)]
        idle_ms: u64,
    },
    /// Periodic activity status from the subject's detector.
    ActivityStatus {
        subject: SubjectId,
        is_active: bool,
        /// Milliseconds since the Unix epoch.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_activity_at: Option<i64>,
    },
    /// The subject's page was hidden.
    PageHidden { subject: SubjectId },
    /// The subject's page became visible again.
    PageVisible { subject: SubjectId },
}

impl HostEvent {
    /// The subject this event refers to, if any.
    pub const fn subject(&self) -> Option<SubjectId> {
        match self {
            Self::TabActivated { subject, .. }
            | Self::TabUpdated { subject, .. }
            | Self::TabRemoved { subject }
            | Self::UserInput { subject }
            | Self::UserActive { subject }
            | Self::UserInactive { subject, .. }
            | Self::ActivityStatus { subject, .. }
            | Self::PageHidden { subject }
            | Self::PageVisible { subject } => Some(*subject),
            Self::WindowFocus { subject } => *subject,
            Self::WindowBlur => None,
        }
    }
}

/// Resource key for an optional page URL.
pub fn resource_for(url: Option<&str>) -> ResourceKey {
    ResourceKey::from_url(url)
}

/// Converts epoch milliseconds to local time, ignoring out-of-range values.
pub fn local_from_millis(millis: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(millis).single()
}
