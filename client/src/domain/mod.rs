//! Domain primitives, services and ports for the field monitoring client.
//!
//! Purpose: decode parcel geometry, derive map viewports, and drive the
//! authenticated session against the remote API through ports so adapters
//! stay swappable.
//!
//! Public surface:
//! - `decode_wkt_polygon` / `parse_wkt_polygon`: WKT polygon decoding.
//! - `resolve_center` / `resolve_region`: initial map viewport.
//! - `MapScene`: polygons, markers and region for one project map.
//! - `Session`: login/refresh/logout state machine.
//! - `FieldClient`: service orchestrating API calls and token persistence.

pub mod auth;
pub mod field_client;
pub mod geometry;
pub mod map_scene;
pub mod ports;
pub mod project;
pub mod session;
pub mod viewport;

pub use self::auth::{LoginCredentials, LoginValidationError, PASSWORD_MIN_LEN};
pub use self::field_client::{ClientError, FieldClient};
pub use self::geometry::{
    Coordinate, GeometryParseError, WGS84_SRID, WktPolygon, decode_wkt_polygon, parse_wkt_polygon,
};
pub use self::map_scene::{
    MapScene, MapSceneError, PolygonFailurePolicy, ScenePolygon, SensorMarker, SkippedParcel,
};
pub use self::project::{
    ClientProject, Dashboard, FWI_DANGER_THRESHOLD, FireDanger, Parcel, ParcelMap, Project,
    ProjectOverview, SensorNode, attachment_url,
};
pub use self::session::{Session, SessionState, SessionTokens, SessionTransitionError};
pub use self::viewport::{
    DEFAULT_REGION_DELTA, MapRegion, ViewportResolutionError, resolve_center, resolve_region,
};
