//! Map-ready data assembled from one parcel fetch.

use serde::Serialize;
use tracing::warn;

use super::{
    Coordinate, FireDanger, GeometryParseError, MapRegion, Parcel, SensorNode,
    ViewportResolutionError, parse_wkt_polygon, resolve_region,
};

/// What to do when one parcel geometry fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolygonFailurePolicy {
    /// Drop the parcel, log it, and keep rendering the rest.
    #[default]
    Skip,
    /// Fail the whole scene on the first bad parcel.
    Abort,
}

/// A decoded parcel boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenePolygon {
    /// Parcel identifier, when known.
    pub parcel_id: Option<i64>,
    /// SRID declared by the geometry.
    pub srid: Option<u32>,
    /// Ring vertices.
    pub ring: Vec<Coordinate>,
}

/// A sensor marker placed on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorMarker {
    /// Sensor node identifier.
    pub node_id: i64,
    /// Display name.
    pub name: String,
    /// Marker position.
    pub position: Coordinate,
    /// Latest fire weather index.
    pub fwi: Option<f64>,
    /// Danger classification of `fwi`.
    pub danger: FireDanger,
}

/// A parcel left out of the scene under [`PolygonFailurePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedParcel {
    /// Position of the parcel in the fetched list.
    pub index: usize,
    /// Parcel identifier, when known.
    pub parcel_id: Option<i64>,
    /// Why decoding failed.
    pub error: GeometryParseError,
}

/// Errors raised while assembling a [`MapScene`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapSceneError {
    /// A parcel geometry failed under [`PolygonFailurePolicy::Abort`].
    #[error("parcel {index} has an invalid geometry: {source}")]
    Geometry {
        index: usize,
        #[source]
        source: GeometryParseError,
    },
    /// No usable centre for the initial region.
    #[error(transparent)]
    Viewport(#[from] ViewportResolutionError),
}

/// Polygons, markers and initial region for one project map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapScene {
    /// Initial map region.
    pub region: MapRegion,
    /// Decoded parcel boundaries.
    pub polygons: Vec<ScenePolygon>,
    /// Sensor markers with a finite position.
    pub markers: Vec<SensorMarker>,
    /// Parcels dropped because their geometry failed to decode.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedParcel>,
}

impl MapScene {
    /// Decode every parcel, place the sensor markers and resolve the region.
    ///
    /// # Examples
    /// ```
    /// use fieldwatch::domain::{Coordinate, MapScene, Parcel, PolygonFailurePolicy};
    ///
    /// let parcels = vec![
    ///     Parcel { id: Some(1), geometry: "SRID=4326;POLYGON((9.01 33.81, 9.02 33.82))".to_owned() },
    ///     Parcel { id: Some(2), geometry: "garbage".to_owned() },
    /// ];
    /// let scene = MapScene::assemble(&parcels, &[], None, PolygonFailurePolicy::Skip)?;
    /// assert_eq!(scene.polygons.len(), 1);
    /// assert_eq!(scene.skipped.len(), 1);
    /// assert_eq!(scene.region.center, Coordinate::new(33.81, 9.01));
    /// # Ok::<(), fieldwatch::domain::MapSceneError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`MapSceneError::Geometry`] for the first bad parcel under
    /// [`PolygonFailurePolicy::Abort`], and [`MapSceneError::Viewport`] when
    /// no centre can be resolved.
    pub fn assemble(
        parcels: &[Parcel],
        nodes: &[SensorNode],
        city_center: Option<Coordinate>,
        policy: PolygonFailurePolicy,
    ) -> Result<Self, MapSceneError> {
        let mut polygons = Vec::with_capacity(parcels.len());
        let mut skipped = Vec::new();

        for (index, parcel) in parcels.iter().enumerate() {
            match parse_wkt_polygon(&parcel.geometry) {
                Ok(decoded) => polygons.push(ScenePolygon {
                    parcel_id: parcel.id,
                    srid: decoded.srid,
                    ring: decoded.ring,
                }),
                Err(source) => match policy {
                    PolygonFailurePolicy::Abort => {
                        return Err(MapSceneError::Geometry { index, source });
                    }
                    PolygonFailurePolicy::Skip => {
                        warn!(
                            index,
                            parcel_id = ?parcel.id,
                            error = %source,
                            "skipping parcel with invalid geometry"
                        );
                        skipped.push(SkippedParcel {
                            index,
                            parcel_id: parcel.id,
                            error: source,
                        });
                    }
                },
            }
        }

        let rings: Vec<&[Coordinate]> = polygons
            .iter()
            .map(|polygon| polygon.ring.as_slice())
            .collect();
        let region = resolve_region(&rings, city_center)?;
        let markers = nodes.iter().filter_map(marker_for).collect();

        Ok(Self {
            region,
            polygons,
            markers,
            skipped,
        })
    }
}

fn marker_for(node: &SensorNode) -> Option<SensorMarker> {
    let position = node.position.filter(Coordinate::is_finite)?;
    Some(SensorMarker {
        node_id: node.id,
        name: node.name.clone(),
        position,
        fwi: node.fwi,
        danger: node.danger(),
    })
}
