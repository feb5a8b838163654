//! Read-only snapshots of projects, parcels and sensor nodes.
//!
//! The server owns these records; the client keeps whatever one fetch
//! returned and derives display state (expiry, fire danger, node grouping)
//! from it.

use chrono::NaiveDate;
use serde::Serialize;
use url::Url;

use super::Coordinate;

/// FWI value at and above which a node is reported as dangerous.
pub const FWI_DANGER_THRESHOLD: f64 = 35.0;

/// A monitored land project with its validity window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    /// Server identifier, shared with the project's parcel polygon.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// First day of validity.
    pub starts_on: Option<NaiveDate>,
    /// Last day of validity.
    pub ends_on: Option<NaiveDate>,
    /// Server-relative path of the attached image.
    pub attachment: Option<String>,
}

impl Project {
    /// `true` once `today` is past the project's last day.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.ends_on.is_some_and(|end| end < today)
    }
}

/// Entry of the lighter per-client project listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientProject {
    /// Server identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// Fire danger classification for a sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FireDanger {
    /// No FWI reading was reported.
    Unknown,
    /// FWI below [`FWI_DANGER_THRESHOLD`].
    Normal,
    /// FWI at or above [`FWI_DANGER_THRESHOLD`].
    Danger,
}

impl FireDanger {
    /// Classify an optional FWI reading.
    pub fn from_fwi(fwi: Option<f64>) -> Self {
        match fwi {
            Some(value) if value >= FWI_DANGER_THRESHOLD => Self::Danger,
            Some(value) if value.is_finite() => Self::Normal,
            _ => Self::Unknown,
        }
    }
}

/// A field sensor node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorNode {
    /// Server identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Identifier of the parcel the node belongs to.
    pub parcel_id: Option<i64>,
    /// Latest fire weather index.
    pub fwi: Option<f64>,
    /// Node location, when reported.
    pub position: Option<Coordinate>,
}

impl SensorNode {
    /// Fire danger implied by the node's FWI.
    pub fn danger(&self) -> FireDanger {
        FireDanger::from_fwi(self.fwi)
    }
}

/// One parcel polygon returned for the map view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parcel {
    /// Parcel identifier, when the server provides one.
    pub id: Option<i64>,
    /// Boundary geometry as WKT.
    pub geometry: String,
}

/// Snapshot returned by the dashboard listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dashboard {
    /// Projects visible to the user.
    pub projects: Vec<Project>,
    /// Sensor nodes across those projects.
    pub nodes: Vec<SensorNode>,
}

/// Snapshot returned for one project's map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParcelMap {
    /// Parcel polygons to draw.
    pub parcels: Vec<Parcel>,
    /// Sensor nodes to mark.
    pub nodes: Vec<SensorNode>,
    /// City centre used when no parcel supplies a vertex.
    pub city_center: Option<Coordinate>,
}

/// A project together with the nodes placed on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectOverview {
    /// The project record.
    pub project: Project,
    /// Nodes whose parcel id matches the project id.
    pub nodes: Vec<SensorNode>,
    /// Whether the project's validity window has ended.
    pub expired: bool,
}

impl ProjectOverview {
    /// Group `nodes` under their projects, preserving listing order.
    ///
    /// # Examples
    /// ```
    /// use chrono::NaiveDate;
    /// use fieldwatch::domain::{Project, ProjectOverview, SensorNode};
    ///
    /// let today = NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date");
    /// let project = Project {
    ///     id: 7,
    ///     name: "North ridge".to_owned(),
    ///     description: String::new(),
    ///     starts_on: None,
    ///     ends_on: NaiveDate::from_ymd_opt(2024, 5, 31),
    ///     attachment: None,
    /// };
    /// let node = SensorNode {
    ///     id: 1,
    ///     name: "n1".to_owned(),
    ///     parcel_id: Some(7),
    ///     fwi: Some(40.0),
    ///     position: None,
    /// };
    ///
    /// let overview = ProjectOverview::build(vec![project], &[node], today);
    /// assert!(overview[0].expired);
    /// assert_eq!(overview[0].dangerous_nodes().count(), 1);
    /// ```
    pub fn build(projects: Vec<Project>, nodes: &[SensorNode], today: NaiveDate) -> Vec<Self> {
        projects
            .into_iter()
            .map(|project| {
                let project_nodes = nodes
                    .iter()
                    .filter(|node| node.parcel_id == Some(project.id))
                    .cloned()
                    .collect();
                let expired = project.is_expired(today);
                Self {
                    project,
                    nodes: project_nodes,
                    expired,
                }
            })
            .collect()
    }

    /// Nodes whose FWI warrants a danger alert.
    pub fn dangerous_nodes(&self) -> impl Iterator<Item = &SensorNode> {
        self.nodes
            .iter()
            .filter(|node| node.danger() == FireDanger::Danger)
    }
}

/// Resolve a server-relative attachment path against the API base URL.
///
/// # Errors
///
/// Returns [`url::ParseError`] when `path` cannot be joined onto `base`.
pub fn attachment_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    base.join(path)
}
