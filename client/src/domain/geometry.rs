//! WKT polygon decoding for map rendering.
//!
//! Parcel boundaries arrive as `SRID=<n>;POLYGON((lon lat, lon lat, ...))`
//! strings. Decoding follows the WKT axis order (longitude first) and is
//! strict: one malformed vertex fails the whole polygon rather than producing
//! a partial ring.

use serde::{Deserialize, Serialize};

/// SRID of WGS84 geographic coordinates.
pub const WGS84_SRID: u32 = 4326;

const SRID_PREFIX: &str = "SRID=";
const POLYGON_KEYWORD: &str = "POLYGON";

/// A geographic coordinate in degrees.
///
/// # Examples
/// ```
/// use fieldwatch::domain::Coordinate;
///
/// let point = Coordinate::new(33.81, 9.01);
/// assert!(point.is_finite());
/// assert!(point.is_wgs84());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
}

impl Coordinate {
    /// Construct a coordinate from latitude and longitude.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both ordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Ordinates lie within WGS84 latitude and longitude ranges.
    pub fn is_wgs84(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Errors raised while decoding a WKT polygon.
///
/// Every variant carries the offending fragment of the input so callers can
/// report which geometry (or vertex) was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeometryParseError {
    /// The `POLYGON((...))` wrapper is missing or malformed.
    #[error("geometry is not a single-ring WKT polygon: {fragment}")]
    NotAPolygon { fragment: String },
    /// The `SRID=<digits>;` prefix could not be read.
    #[error("invalid SRID declaration: {fragment}")]
    InvalidSrid { fragment: String },
    /// A vertex did not contain exactly two ordinates.
    #[error("vertex must contain exactly two ordinates: '{fragment}'")]
    VertexArity { fragment: String },
    /// An ordinate was not a finite number.
    #[error("vertex contains a non-numeric ordinate: '{fragment}'")]
    NonNumeric { fragment: String },
    /// A WGS84 vertex fell outside latitude/longitude ranges.
    #[error("vertex lies outside WGS84 ranges: '{fragment}'")]
    OutOfRange { fragment: String },
}

impl GeometryParseError {
    /// The substring of the input that caused the failure.
    pub fn fragment(&self) -> &str {
        match self {
            Self::NotAPolygon { fragment }
            | Self::InvalidSrid { fragment }
            | Self::VertexArity { fragment }
            | Self::NonNumeric { fragment }
            | Self::OutOfRange { fragment } => fragment,
        }
    }
}

/// A decoded polygon: the declared SRID and its single ring of vertices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WktPolygon {
    /// SRID from the `SRID=<n>;` prefix, when present.
    pub srid: Option<u32>,
    /// Ring vertices in input order.
    pub ring: Vec<Coordinate>,
}

/// Decode a WKT polygon into its ring of coordinates.
///
/// # Examples
/// ```
/// use fieldwatch::domain::{decode_wkt_polygon, Coordinate};
///
/// let ring = decode_wkt_polygon("SRID=4326;POLYGON((9.01 33.81, 9.02 33.82))")?;
/// assert_eq!(ring, vec![Coordinate::new(33.81, 9.01), Coordinate::new(33.82, 9.02)]);
/// assert!(decode_wkt_polygon("POLYGON(())")?.is_empty());
/// assert!(decode_wkt_polygon("not a polygon").is_err());
/// # Ok::<(), fieldwatch::domain::GeometryParseError>(())
/// ```
///
/// # Errors
///
/// Returns [`GeometryParseError`] when the wrapper, SRID or any vertex is
/// malformed.
pub fn decode_wkt_polygon(wkt: &str) -> Result<Vec<Coordinate>, GeometryParseError> {
    parse_wkt_polygon(wkt).map(|polygon| polygon.ring)
}

/// Parse a WKT polygon, keeping the SRID alongside the ring.
///
/// # Errors
///
/// Returns [`GeometryParseError`] when the wrapper, SRID or any vertex is
/// malformed.
pub fn parse_wkt_polygon(wkt: &str) -> Result<WktPolygon, GeometryParseError> {
    let (srid, geometry) = split_srid(wkt.trim())?;
    let body = polygon_body(geometry)?;
    let check_ranges = srid.is_none_or(|code| code == WGS84_SRID);
    let ring = decode_ring(body, check_ranges)?;
    Ok(WktPolygon { srid, ring })
}

fn split_srid(wkt: &str) -> Result<(Option<u32>, &str), GeometryParseError> {
    let Some(rest) = strip_prefix_ignore_case(wkt, SRID_PREFIX) else {
        return Ok((None, wkt));
    };
    let invalid = || GeometryParseError::InvalidSrid {
        fragment: wkt.to_owned(),
    };
    let (digits, geometry) = rest.split_once(';').ok_or_else(invalid)?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }
    let srid = digits.parse::<u32>().map_err(|_| invalid())?;
    Ok((Some(srid), geometry.trim_start()))
}

fn polygon_body(geometry: &str) -> Result<&str, GeometryParseError> {
    let not_polygon = || GeometryParseError::NotAPolygon {
        fragment: geometry.to_owned(),
    };
    let rest = strip_prefix_ignore_case(geometry, POLYGON_KEYWORD).ok_or_else(not_polygon)?;
    let body = rest
        .trim_start()
        .strip_prefix("((")
        .and_then(|inner| inner.trim_end().strip_suffix("))"))
        .ok_or_else(not_polygon)?;
    // Interior rings and stray parentheses are not supported.
    if body.contains(['(', ')']) {
        return Err(not_polygon());
    }
    Ok(body)
}

fn decode_ring(body: &str, check_ranges: bool) -> Result<Vec<Coordinate>, GeometryParseError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    body.split(',')
        .map(|token| decode_vertex(token.trim(), check_ranges))
        .collect()
}

fn decode_vertex(fragment: &str, check_ranges: bool) -> Result<Coordinate, GeometryParseError> {
    let mut ordinates = fragment.split_whitespace();
    let (Some(raw_longitude), Some(raw_latitude), None) =
        (ordinates.next(), ordinates.next(), ordinates.next())
    else {
        return Err(GeometryParseError::VertexArity {
            fragment: fragment.to_owned(),
        });
    };

    let longitude = parse_ordinate(raw_longitude, fragment)?;
    let latitude = parse_ordinate(raw_latitude, fragment)?;
    let coordinate = Coordinate::new(latitude, longitude);
    if check_ranges && !coordinate.is_wgs84() {
        return Err(GeometryParseError::OutOfRange {
            fragment: fragment.to_owned(),
        });
    }
    Ok(coordinate)
}

fn parse_ordinate(raw: &str, fragment: &str) -> Result<f64, GeometryParseError> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| GeometryParseError::NonNumeric {
            fragment: fragment.to_owned(),
        })
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for WKT polygon decoding.

    use super::*;
    use rstest::rstest;

    #[test]
    fn decodes_srid_polygon_in_longitude_first_order() {
        let ring = decode_wkt_polygon("SRID=4326;POLYGON((9.01 33.81, 9.02 33.82, 9.03 33.80))")
            .expect("polygon should decode");

        assert_eq!(
            ring,
            vec![
                Coordinate::new(33.81, 9.01),
                Coordinate::new(33.82, 9.02),
                Coordinate::new(33.80, 9.03),
            ]
        );
    }

    #[test]
    fn keeps_declared_srid() {
        let polygon = parse_wkt_polygon("SRID=4326;POLYGON((9.01 33.81, 9.02 33.82))")
            .expect("polygon should decode");
        assert_eq!(polygon.srid, Some(WGS84_SRID));
        assert_eq!(polygon.ring.len(), 2);

        let bare = parse_wkt_polygon("POLYGON((9.01 33.81))").expect("polygon should decode");
        assert_eq!(bare.srid, None);
    }

    #[rstest]
    #[case::compact("POLYGON(())")]
    #[case::spaced("POLYGON (( ))")]
    #[case::with_srid("SRID=4326;POLYGON(())")]
    fn empty_ring_decodes_to_empty_sequence(#[case] wkt: &str) {
        let ring = decode_wkt_polygon(wkt).expect("empty ring is not an error");
        assert!(ring.is_empty());
    }

    #[rstest]
    #[case::server_spacing("SRID=4326;POLYGON ((9.01 33.81, 9.02 33.82))")]
    #[case::lowercase("srid=4326;polygon((9.01 33.81,9.02 33.82))")]
    #[case::padded("  POLYGON((9.01   33.81 ,  9.02 33.82))  ")]
    fn tolerates_spacing_and_case_variants(#[case] wkt: &str) {
        let ring = decode_wkt_polygon(wkt).expect("polygon should decode");
        assert_eq!(
            ring,
            vec![Coordinate::new(33.81, 9.01), Coordinate::new(33.82, 9.02)]
        );
    }

    #[rstest]
    #[case::prose("not a polygon", "not a polygon")]
    #[case::point("POINT(9.01 33.81)", "POINT(9.01 33.81)")]
    #[case::unclosed("POLYGON((9.01 33.81", "POLYGON((9.01 33.81")]
    #[case::holes(
        "POLYGON((0 0, 1 0, 1 1),(0.2 0.2, 0.3 0.2, 0.3 0.3))",
        "POLYGON((0 0, 1 0, 1 1),(0.2 0.2, 0.3 0.2, 0.3 0.3))"
    )]
    fn rejects_missing_polygon_wrapper(#[case] wkt: &str, #[case] fragment: &str) {
        let error = decode_wkt_polygon(wkt).expect_err("wrapper mismatch must fail");
        assert!(matches!(error, GeometryParseError::NotAPolygon { .. }));
        assert_eq!(error.fragment(), fragment);
    }

    #[rstest]
    #[case::no_digits("SRID=;POLYGON((9 33))")]
    #[case::letters("SRID=wgs;POLYGON((9 33))")]
    #[case::no_separator("SRID=4326 POLYGON((9 33))")]
    fn rejects_malformed_srid(#[case] wkt: &str) {
        let error = decode_wkt_polygon(wkt).expect_err("bad SRID must fail");
        assert!(matches!(error, GeometryParseError::InvalidSrid { .. }));
    }

    #[test]
    fn non_numeric_vertex_fails_whole_polygon() {
        let error = decode_wkt_polygon("POLYGON((9.01 33.81, nine 33.82, 9.03 33.80))")
            .expect_err("non-numeric vertex must fail");
        assert_eq!(
            error,
            GeometryParseError::NonNumeric {
                fragment: "nine 33.82".to_owned()
            }
        );
    }

    #[rstest]
    #[case::nan("POLYGON((NaN 33.81))")]
    #[case::infinite("POLYGON((9.01 inf))")]
    fn non_finite_ordinates_are_rejected(#[case] wkt: &str) {
        let error = decode_wkt_polygon(wkt).expect_err("non-finite ordinate must fail");
        assert!(matches!(error, GeometryParseError::NonNumeric { .. }));
    }

    #[rstest]
    #[case::single("POLYGON((9.01))", "9.01")]
    #[case::triple("POLYGON((9.01 33.81 120))", "9.01 33.81 120")]
    #[case::trailing_comma("POLYGON((9.01 33.81, ))", "")]
    fn vertex_arity_is_enforced(#[case] wkt: &str, #[case] fragment: &str) {
        let error = decode_wkt_polygon(wkt).expect_err("wrong arity must fail");
        assert!(matches!(error, GeometryParseError::VertexArity { .. }));
        assert_eq!(error.fragment(), fragment);
    }

    #[test]
    fn swapped_axis_order_is_caught_by_wgs84_ranges() {
        let error = decode_wkt_polygon("SRID=4326;POLYGON((33.81 120.5))")
            .expect_err("latitude above 90 must fail");
        assert!(matches!(error, GeometryParseError::OutOfRange { .. }));
    }

    #[test]
    fn projected_srids_skip_wgs84_range_checks() {
        let ring = decode_wkt_polygon("SRID=3857;POLYGON((1003000.5 4004000.25))")
            .expect("projected coordinates should decode");
        assert_eq!(ring, vec![Coordinate::new(4_004_000.25, 1_003_000.5)]);
    }

    #[test]
    fn decoding_is_idempotent() {
        let wkt = "SRID=4326;POLYGON((9.01 33.81, 9.02 33.82, 9.03 33.80, 9.01 33.81))";
        let first = decode_wkt_polygon(wkt).expect("first decode");
        let second = decode_wkt_polygon(wkt).expect("second decode");
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert!(first.iter().all(Coordinate::is_finite));
    }
}
