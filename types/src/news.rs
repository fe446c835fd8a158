//! News, announcements and events (the `news_events` table) and event
//! registrations (the `event_registrations` table).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{AccountId, NewsId, ParseError, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsKind {
    News,
    Announcement,
    /// Something users can register for.
    Event,
}

impl NewsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Announcement => "announcement",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for NewsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NewsKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "news" => Ok(Self::News),
            "announcement" => Ok(Self::Announcement),
            "event" => Ok(Self::Event),
            other => Err(ParseError::UnknownNewsKind(other.to_string())),
        }
    }
}

/// Where an event stands relative to a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Ended,
}

/// A news item as submitted for publication. The store assigns the id and
/// the creation time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsDraft {
    pub kind: NewsKind,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub starts_at: Option<Timestamp>,
    #[serde(default)]
    pub ends_at: Option<Timestamp>,
    /// Registration cap for events. `None` means unlimited.
    #[serde(default)]
    pub max_attendees: Option<u32>,
    #[serde(default)]
    pub featured: bool,
}

impl NewsDraft {
    pub fn into_item(self, id: NewsId, now: Timestamp) -> NewsItem {
        NewsItem {
            id,
            kind: self.kind,
            title: self.title,
            description: self.description,
            content: self.content,
            image_url: self.image_url,
            location: self.location,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            max_attendees: self.max_attendees,
            featured: self.featured,
            created_at: now,
        }
    }
}

/// One published row of the `news_events` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: NewsId,
    pub kind: NewsKind,
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub location: Option<String>,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub max_attendees: Option<u32>,
    pub featured: bool,
    pub created_at: Timestamp,
}

impl NewsItem {
    pub fn is_event(&self) -> bool {
        self.kind == NewsKind::Event
    }

    /// Status of an event at `now`; `None` for plain news and announcements.
    /// An event without a start time counts as upcoming until it ends.
    pub fn event_status(&self, now: Timestamp) -> Option<EventStatus> {
        if !self.is_event() {
            return None;
        }
        if self.ends_at.is_some_and(|end| now > end) {
            return Some(EventStatus::Ended);
        }
        match self.starts_at {
            Some(start) if now >= start => Some(EventStatus::Ongoing),
            _ => Some(EventStatus::Upcoming),
        }
    }

    /// Whether `count` registrations fill the event.
    pub fn is_full(&self, count: u64) -> bool {
        self.max_attendees
            .is_some_and(|cap| count >= u64::from(cap))
    }
}

/// One user's registration for one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRegistration {
    pub event_id: NewsId,
    pub account: AccountId,
    pub registered_at: Timestamp,
}
