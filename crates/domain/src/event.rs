//! Event — a natural-event record from the remote catalog, and the page
//! envelope the catalog returns it in.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// A natural event (wildfire, storm, eruption, …) as reported by the provider.
///
/// `geometry` holds one entry per observed update of the event, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub closed: Option<Timestamp>,
    #[serde(default)]
    pub categories: Vec<EventCategory>,
    #[serde(default)]
    pub sources: Vec<EventSourceRef>,
    #[serde(default)]
    pub geometry: Vec<Geometry>,
}

/// Category tag attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCategory {
    pub id: String,
    pub title: String,
}

/// Upstream source that reported an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSourceRef {
    pub id: String,
    pub url: String,
}

/// One observation of an event's position or footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub date: Timestamp,
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub coordinates: Coordinates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude_unit: Option<String>,
}

/// Shape of a [`Geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    Polygon,
}

/// Raw coordinate payload, `[lon, lat]` ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinates {
    Position([f64; 2]),
    Ring(Vec<[f64; 2]>),
    Rings(Vec<Vec<[f64; 2]>>),
}

/// Where an event is drawn on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMarker {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub category: String,
}

impl Event {
    /// Whether the provider still reports the event as ongoing.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.closed.is_none()
    }

    /// First recorded observation.
    #[must_use]
    pub fn first_geometry(&self) -> Option<&Geometry> {
        self.geometry.first()
    }

    /// Most recent observation.
    #[must_use]
    pub fn latest_geometry(&self) -> Option<&Geometry> {
        self.geometry.last()
    }

    /// Number of observations the provider has recorded.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.geometry.len()
    }

    /// Map marker anchored on the first observation.
    ///
    /// Returns `None` unless that observation is a point.
    #[must_use]
    pub fn marker(&self) -> Option<EventMarker> {
        let geometry = self.first_geometry()?;
        let [longitude, latitude] = match (geometry.kind, &geometry.coordinates) {
            (GeometryKind::Point, Coordinates::Position(position)) => *position,
            _ => return None,
        };
        Some(EventMarker {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            latitude,
            longitude,
            category: self
                .categories
                .first()
                .map_or_else(|| "Unknown".to_string(), |c| c.title.clone()),
        })
    }
}

/// One page of the remote catalog.
///
/// The provider links to the following page either as `links.next` or as
/// `link.next`; a plain-string `link` is the page's own URL and is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawPage")]
pub struct EventPage {
    pub events: Vec<Event>,
    pub next: Option<String>,
}

#[derive(Deserialize)]
struct RawPage {
    #[serde(default)]
    events: Option<Vec<Event>>,
    #[serde(default)]
    link: Option<LinkField>,
    #[serde(default)]
    links: Option<PageLinks>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LinkField {
    Links(PageLinks),
    #[allow(dead_code)]
    SelfUrl(String),
}

#[derive(Deserialize)]
struct PageLinks {
    #[serde(default)]
    next: Option<String>,
}

impl From<RawPage> for EventPage {
    fn from(raw: RawPage) -> Self {
        let from_link = match raw.link {
            Some(LinkField::Links(links)) => links.next,
            _ => None,
        };
        let next = raw
            .links
            .and_then(|links| links.next)
            .or(from_link)
            .filter(|url| !url.is_empty());
        Self {
            events: raw.events.unwrap_or_default(),
            next,
        }
    }
}
