//! Haversine distance and the bounding-box candidate prefilter.

use geo::{Distance, Haversine};
use geo_types::Point;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let a = Point::new(lon1, lat1);
    let b = Point::new(lon2, lat2);
    Haversine.distance(a, b) / 1000.0
}

/// Latitude/longitude window that contains every point within a haversine
/// radius of the centre. Runs against the plain B-tree coordinate indexes
/// so the candidate query never needs a full spatial scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Box around a point for the given radius.
    ///
    /// The longitude half-span grows with 1/cos(lat); past 89 degrees the
    /// denominator collapses, so the span widens to the full longitude
    /// range and the exact distance filter prunes the excess.
    pub fn around(lat: f64, lon: f64, radius_km: f64) -> Self {
        let lat_delta = (radius_km / EARTH_RADIUS_KM).to_degrees();
        let min_lat = (lat - lat_delta).max(-90.0);
        let max_lat = (lat + lat_delta).min(90.0);

        if lat.abs() > 89.0 {
            return Self {
                min_lat,
                max_lat,
                min_lon: -180.0,
                max_lon: 180.0,
            };
        }

        let lon_delta = (radius_km / (EARTH_RADIUS_KM * lat.to_radians().cos())).to_degrees();
        Self {
            min_lat,
            max_lat,
            min_lon: (lon - lon_delta).max(-180.0),
            max_lon: (lon + lon_delta).min(180.0),
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        // Toronto city hall to the GeoNames Toronto point, roughly 6 km.
        let d = haversine_km(43.6532, -79.3832, 43.70011, -79.4163);
        assert!(d > 5.0 && d < 7.0, "got {}", d);
        assert!(haversine_km(0.0, 0.0, 0.0, 0.0) < 1e-9);
    }

    #[test]
    fn box_contains_its_radius_at_mid_latitude() {
        let b = BoundingBox::around(43.65, -79.38, 10.0);
        // Points ~9 km north and east stay inside the box.
        assert!(b.contains(43.73, -79.38));
        assert!(b.contains(43.65, -79.27));
        // The box is tight: about 0.09 degrees of latitude for 10 km.
        assert!(b.max_lat - b.min_lat < 0.2);
    }

    #[test]
    fn polar_box_widens_to_full_longitude_range() {
        let b = BoundingBox::around(89.9, 10.0, 10.0);
        assert_eq!(b.min_lon, -180.0);
        assert_eq!(b.max_lon, 180.0);
        assert!(b.max_lat <= 90.0);
        // A point on the far side of the pole still lands in the window.
        assert!(b.contains(89.95, -170.0));
    }

    #[test]
    fn latitude_span_is_clamped_at_the_poles() {
        let b = BoundingBox::around(-89.95, 0.0, 10.0);
        assert!(b.min_lat >= -90.0);
        assert_eq!(b.min_lon, -180.0);
    }
}
