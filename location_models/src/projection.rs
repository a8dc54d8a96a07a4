//! Transverse Mercator projection between WGS84 (lon, lat) and a local
//! planar CRS in metres.
//!
//! [`TransverseMercator`] is the serialisable parameter set; [`Projector`]
//! is the PROJ-style transform built from it. The default parameters are
//! ETRS-TM35FIN (EPSG:3067): GRS80 ellipsoid, central meridian 27°E,
//! scale 0.9996, false easting 500 km.

use proj4rs::{proj::Proj, transform::transform};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("invalid projection {definition:?}: {reason}")]
    Definition { definition: String, reason: String },

    #[error("cannot transform ({x}, {y}): {reason}")]
    Transform { x: f64, y: f64, reason: String },
}

/// Transverse Mercator parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransverseMercator {
    /// PROJ ellipsoid name
    pub ellipsoid: String,
    /// Central meridian (degrees)
    pub central_meridian: f64,
    /// Scale factor on the central meridian
    pub scale_factor: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl Default for TransverseMercator {
    fn default() -> Self {
        Self::etrs_tm35fin()
    }
}

impl TransverseMercator {
    /// ETRS-TM35FIN (EPSG:3067).
    pub fn etrs_tm35fin() -> Self {
        Self {
            ellipsoid: "GRS80".into(),
            central_meridian: 27.0,
            scale_factor: 0.9996,
            false_easting: 500_000.0,
            false_northing: 0.0,
        }
    }

    /// PROJ definition of the planar CRS.
    pub fn proj_string(&self) -> String {
        format!(
            "+proj=tmerc +lat_0=0 +lon_0={} +k={} +x_0={} +y_0={} +ellps={} +units=m +no_defs",
            self.central_meridian, self.scale_factor, self.false_easting, self.false_northing, self.ellipsoid
        )
    }

    /// PROJ definition of the geographic CRS on the same ellipsoid.
    pub fn geographic_string(&self) -> String {
        format!("+proj=longlat +ellps={} +no_defs", self.ellipsoid)
    }

    pub fn projector(&self) -> Result<Projector, ProjectionError> {
        Ok(Projector {
            planar: parse(&self.proj_string())?,
            geographic: parse(&self.geographic_string())?,
        })
    }
}

fn parse(definition: &str) -> Result<Proj, ProjectionError> {
    Proj::from_proj_string(definition).map_err(|err| ProjectionError::Definition {
        definition: definition.to_owned(),
        reason: format!("{err:?}"),
    })
}

/// Ready-to-use forward and inverse transform.
pub struct Projector {
    planar: Proj,
    geographic: Proj,
}

impl Projector {
    /// Project WGS84 degrees to planar (x = easting, y = northing).
    pub fn from_wgs84(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        run(&self.geographic, &self.planar, &mut point, (lon, lat))?;
        Ok((point.0, point.1))
    }

    /// Unproject planar (x, y) to WGS84 (lon, lat) degrees.
    pub fn to_wgs84(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        let mut point = (x, y, 0.0);
        run(&self.planar, &self.geographic, &mut point, (x, y))?;
        Ok((point.0.to_degrees(), point.1.to_degrees()))
    }
}

fn run(src: &Proj, dst: &Proj, point: &mut (f64, f64, f64), input: (f64, f64)) -> Result<(), ProjectionError> {
    let failed = |reason: String| ProjectionError::Transform {
        x: input.0,
        y: input.1,
        reason,
    };
    transform(src, dst, point).map_err(|err| failed(format!("{err:?}")))?;
    if !(point.0.is_finite() && point.1.is_finite()) {
        return Err(failed("non-finite result".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn projector() -> Projector {
        TransverseMercator::default().projector().unwrap()
    }

    #[test]
    fn default_is_epsg_3067() {
        assert_eq!(
            TransverseMercator::default().proj_string(),
            "+proj=tmerc +lat_0=0 +lon_0=27 +k=0.9996 +x_0=500000 +y_0=0 +ellps=GRS80 +units=m +no_defs"
        );
    }

    #[test]
    fn central_meridian_maps_to_false_easting() {
        let (x, y) = projector().from_wgs84(27.0, 60.0).unwrap();
        assert_abs_diff_eq!(x, 500_000.0, epsilon = 1e-3);
        // Meridian arc of GRS80 to 60°N is 6 654 072.82 m
        assert_abs_diff_eq!(y, 6_654_072.82 * 0.9996, epsilon = 0.05);
    }

    #[test]
    fn roundtrip_tampere() {
        let p = projector();
        let (x, y) = p.from_wgs84(23.761, 61.4978).unwrap();
        let (lon, lat) = p.to_wgs84(x, y).unwrap();
        assert_abs_diff_eq!(lon, 23.761, epsilon = 1e-7);
        assert_abs_diff_eq!(lat, 61.4978, epsilon = 1e-7);
    }

    #[test]
    fn planar_offsets_are_metric() {
        let p = projector();
        let (x, y) = p.from_wgs84(24.94, 60.17).unwrap();
        let (lon_a, lat_a) = p.to_wgs84(x, y).unwrap();
        let (lon_b, lat_b) = p.to_wgs84(x, y + 1000.0).unwrap();
        assert_abs_diff_eq!(lon_a, lon_b, epsilon = 1e-3);
        // 1 km north is roughly 0.009° of latitude
        assert_abs_diff_eq!(lat_b - lat_a, 0.009, epsilon = 0.0005);
    }
}
