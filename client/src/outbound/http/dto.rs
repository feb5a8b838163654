//! DTOs for the field API's JSON payloads.
//!
//! The adapter decodes into these transport DTOs first, then maps them into
//! domain records in one pass. Field names follow the server, which mixes
//! French and English keys.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ClientProject, Coordinate, Dashboard, Parcel, ParcelMap, Project, SensorNode,
};

#[derive(Serialize)]
pub(super) struct LoginRequestDto<'a> {
    pub(super) username: &'a str,
    pub(super) password: &'a str,
}

#[derive(Serialize)]
pub(super) struct RefreshRequestDto<'a> {
    pub(super) refresh: &'a str,
}

#[derive(Deserialize)]
pub(super) struct LoginResponseDto {
    pub(super) access: String,
    pub(super) refresh: Option<String>,
    pub(super) pseudo: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct RefreshResponseDto {
    pub(super) access: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorBodyDto {
    pub(super) detail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct DashboardDto {
    #[serde(default)]
    projects: Vec<ProjectDto>,
    #[serde(default)]
    nodes: Vec<NodeDto>,
}

#[derive(Debug, Deserialize)]
struct ProjectDto {
    #[serde(default)]
    polygon_id: Option<i64>,
    #[serde(default)]
    id: Option<i64>,
    name: String,
    #[serde(default, alias = "descp")]
    description: Option<String>,
    #[serde(default, alias = "date_debut")]
    starts_on: Option<String>,
    #[serde(default, alias = "date_fin")]
    ends_on: Option<String>,
    #[serde(default, alias = "piece_joindre")]
    attachment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodeDto {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default, alias = "parcelle")]
    parcel_id: Option<i64>,
    #[serde(default, rename = "FWI", alias = "fwi")]
    fwi: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ClientProjectDto {
    id: i64,
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ParcelMapDto {
    #[serde(default, rename = "parcelles", alias = "parcels")]
    parcels: Vec<ParcelDto>,
    #[serde(default)]
    nodes: Vec<NodeDto>,
    #[serde(default)]
    city_data: Option<CityDto>,
}

#[derive(Debug, Deserialize)]
struct ParcelDto {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    polygon_id: Option<i64>,
    polygon: String,
}

#[derive(Debug, Deserialize)]
struct CityDto {
    latitude: f64,
    longitude: f64,
}

impl DashboardDto {
    pub(super) fn into_domain(self) -> Result<Dashboard, String> {
        let projects = self
            .projects
            .into_iter()
            .map(ProjectDto::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        let nodes = self.nodes.into_iter().map(NodeDto::into_domain).collect();
        Ok(Dashboard { projects, nodes })
    }
}

impl ProjectDto {
    fn into_domain(self) -> Result<Project, String> {
        // Nodes reference the polygon id, so it wins over the row id.
        let id = self
            .polygon_id
            .or(self.id)
            .ok_or_else(|| format!("project {:?} has no identifier", self.name))?;
        let starts_on = parse_optional_date(id, "start", self.starts_on.as_deref())?;
        let ends_on = parse_optional_date(id, "end", self.ends_on.as_deref())?;
        Ok(Project {
            id,
            name: self.name,
            description: self.description.unwrap_or_default(),
            starts_on,
            ends_on,
            attachment: self.attachment.filter(|path| !path.is_empty()),
        })
    }
}

impl NodeDto {
    fn into_domain(self) -> SensorNode {
        let position = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
            _ => None,
        };
        SensorNode {
            id: self.id,
            name: self.name,
            parcel_id: self.parcel_id,
            fwi: self.fwi,
            position,
        }
    }
}

impl ClientProjectDto {
    pub(super) fn into_domain(self) -> ClientProject {
        ClientProject {
            id: self.id,
            name: self.name,
            description: self.description.unwrap_or_default(),
        }
    }
}

impl ParcelMapDto {
    pub(super) fn into_domain(self) -> ParcelMap {
        ParcelMap {
            parcels: self
                .parcels
                .into_iter()
                .map(|parcel| Parcel {
                    id: parcel.polygon_id.or(parcel.id),
                    geometry: parcel.polygon,
                })
                .collect(),
            nodes: self.nodes.into_iter().map(NodeDto::into_domain).collect(),
            city_center: self
                .city_data
                .map(|city| Coordinate::new(city.latitude, city.longitude)),
        }
    }
}

/// Accept plain dates and full RFC 3339 timestamps; the date part wins.
fn parse_optional_date(
    project_id: i64,
    label: &str,
    raw: Option<&str>,
) -> Result<Option<NaiveDate>, String> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|stamp| stamp.date_naive()))
        .map(Some)
        .map_err(|error| format!("project {project_id} has an invalid {label} date {raw:?}: {error}"))
}
