//! Initial map viewport resolution.
//!
//! The map opens on the first vertex of the first non-empty parcel polygon.
//! When no polygon supplies a usable vertex the city centre returned by the
//! API is used instead. Non-finite candidates are skipped in that priority
//! order; running out of candidates is an error, never a silent default.

use serde::Serialize;

use super::Coordinate;

/// Latitude/longitude span of the initial map region, in degrees.
pub const DEFAULT_REGION_DELTA: f64 = 0.1;

/// Raised when no finite centre candidate is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ViewportResolutionError {
    /// Neither a polygon vertex nor a city centre was supplied.
    #[error("no polygon vertex or city centre available to centre the map")]
    Missing,
    /// Candidates were supplied but none had finite ordinates.
    #[error("no finite polygon vertex or city centre available to centre the map")]
    NonFinite,
}

/// Map region used to initialise a map surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRegion {
    /// Region centre.
    pub center: Coordinate,
    /// Latitude span in degrees.
    pub latitude_delta: f64,
    /// Longitude span in degrees.
    pub longitude_delta: f64,
}

impl MapRegion {
    /// Region of [`DEFAULT_REGION_DELTA`] degrees around `center`.
    pub const fn around(center: Coordinate) -> Self {
        Self {
            center,
            latitude_delta: DEFAULT_REGION_DELTA,
            longitude_delta: DEFAULT_REGION_DELTA,
        }
    }
}

/// Pick the point used to centre the map.
///
/// # Examples
/// ```
/// use fieldwatch::domain::{resolve_center, Coordinate};
///
/// let polygons: Vec<Vec<Coordinate>> = vec![];
/// let city = Coordinate::new(33.8, 9.1);
/// assert_eq!(resolve_center(&polygons, Some(city)), Ok(city));
/// assert!(resolve_center(&polygons, None).is_err());
/// ```
///
/// # Errors
///
/// Returns [`ViewportResolutionError`] when neither source yields a finite
/// coordinate.
pub fn resolve_center<P>(
    polygons: &[P],
    supplied: Option<Coordinate>,
) -> Result<Coordinate, ViewportResolutionError>
where
    P: AsRef<[Coordinate]>,
{
    let polygon_vertex = polygons
        .iter()
        .find_map(|polygon| polygon.as_ref().first().copied());
    let candidates = [polygon_vertex, supplied];

    if let Some(center) = candidates
        .iter()
        .flatten()
        .copied()
        .find(Coordinate::is_finite)
    {
        return Ok(center);
    }

    if candidates.iter().all(Option::is_none) {
        Err(ViewportResolutionError::Missing)
    } else {
        Err(ViewportResolutionError::NonFinite)
    }
}

/// Resolve the centre and wrap it in a default-sized [`MapRegion`].
///
/// # Errors
///
/// Propagates [`ViewportResolutionError`] from [`resolve_center`].
pub fn resolve_region<P>(
    polygons: &[P],
    supplied: Option<Coordinate>,
) -> Result<MapRegion, ViewportResolutionError>
where
    P: AsRef<[Coordinate]>,
{
    resolve_center(polygons, supplied).map(MapRegion::around)
}

#[cfg(test)]
mod tests {
    //! Regression coverage for centre derivation.

    use super::*;
    use rstest::rstest;

    const CITY: Coordinate = Coordinate::new(33.8, 9.1);
    const VERTEX: Coordinate = Coordinate::new(33.81, 9.01);

    fn ring() -> Vec<Coordinate> {
        vec![VERTEX, Coordinate::new(33.82, 9.02)]
    }

    #[test]
    fn falls_back_to_supplied_centre_without_polygons() {
        let polygons: Vec<Vec<Coordinate>> = Vec::new();
        assert_eq!(resolve_center(&polygons, Some(CITY)), Ok(CITY));
    }

    #[test]
    fn first_vertex_wins_over_supplied_centre() {
        assert_eq!(resolve_center(&[ring()], None), Ok(VERTEX));
        assert_eq!(resolve_center(&[ring()], Some(CITY)), Ok(VERTEX));
    }

    #[test]
    fn skips_leading_empty_polygons() {
        let polygons = vec![Vec::new(), ring()];
        assert_eq!(resolve_center(&polygons, Some(CITY)), Ok(VERTEX));
    }

    #[test]
    fn missing_candidates_are_an_error() {
        let polygons: Vec<Vec<Coordinate>> = vec![Vec::new()];
        assert_eq!(
            resolve_center(&polygons, None),
            Err(ViewportResolutionError::Missing)
        );
    }

    #[rstest]
    #[case::nan_latitude(Coordinate::new(f64::NAN, 9.01))]
    #[case::infinite_longitude(Coordinate::new(33.81, f64::INFINITY))]
    fn non_finite_vertex_falls_back_to_supplied_centre(#[case] vertex: Coordinate) {
        assert_eq!(resolve_center(&[vec![vertex]], Some(CITY)), Ok(CITY));
    }

    #[test]
    fn all_non_finite_candidates_are_an_error() {
        let vertex = Coordinate::new(f64::NAN, 9.01);
        let city = Coordinate::new(33.8, f64::NEG_INFINITY);
        assert_eq!(
            resolve_center(&[vec![vertex]], Some(city)),
            Err(ViewportResolutionError::NonFinite)
        );
    }

    #[test]
    fn region_uses_default_deltas() {
        let region = resolve_region(&[ring()], None).expect("region should resolve");
        assert_eq!(region.center, VERTEX);
        assert_eq!(region.latitude_delta, DEFAULT_REGION_DELTA);
        assert_eq!(region.longitude_delta, DEFAULT_REGION_DELTA);
    }
}
