use serde::{Deserialize, Serialize};

pub const NM_TO_KM: f64 = 1.852;
pub const KM_PER_DEG_LAT: f64 = 111.32;
/// Radius of the region in which radar and imagery are compared.
pub const DETECT_RANGE_NM: f64 = 60.0;
pub const DETECT_RANGE_KM: f64 = DETECT_RANGE_NM * NM_TO_KM;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// East/north displacement in kilometres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KmOffset {
    pub east_km: f64,
    pub north_km: f64,
}

impl KmOffset {
    /// Equirectangular displacement of `point` as seen from `origin`.
    pub fn between(origin: GeoPoint, point: GeoPoint) -> Self {
        let km_per_deg_lon = KM_PER_DEG_LAT * origin.lat.to_radians().cos();
        Self {
            east_km: (point.lon - origin.lon) * km_per_deg_lon,
            north_km: (point.lat - origin.lat) * KM_PER_DEG_LAT,
        }
    }

    /// Offset expressed as a fraction of `max_range_km` on each axis.
    pub fn normalized(&self, max_range_km: f64) -> (f64, f64) {
        (self.east_km / max_range_km, self.north_km / max_range_km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_has_zero_offset() {
        let p = GeoPoint::new(33.4, 126.9);
        assert_eq!(KmOffset::between(p, p), KmOffset::default());
    }

    #[test]
    fn one_degree_north_is_one_degree_of_latitude() {
        let origin = GeoPoint::new(33.0, 126.0);
        let offset = KmOffset::between(origin, GeoPoint::new(34.0, 126.0));
        assert!((offset.north_km - 111.32).abs() < 1e-9);
        assert!(offset.east_km.abs() < 1e-9);
    }

    #[test]
    fn longitude_shrinks_with_latitude_of_origin() {
        let origin = GeoPoint::new(60.0, 10.0);
        let offset = KmOffset::between(origin, GeoPoint::new(60.0, 11.0));
        assert!((offset.east_km - 55.66).abs() < 1e-6);
    }
}
