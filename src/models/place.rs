//! Gazetteer-sourced place records and the admin-level hierarchy.

use serde::{Deserialize, Serialize};

/// Geographic point (lat/lon, WGS84 decimal degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Both coordinates inside the valid WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// A place parsed from a GeoNames dump row.
///
/// Field names follow the graph-store property names so a record can be
/// handed to the writer without renaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub geoname_id: i64,
    pub name: String,
    pub ascii_name: String,
    /// Split from the comma-separated `alternatenames` column, trimmed,
    /// empty tokens dropped.
    pub alternate_names: Vec<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Single uppercase letter (A, P, S, ...)
    pub feature_class: String,
    pub feature_code: String,
    pub country_code: String,
    pub admin1_code: String,
    pub admin2_code: String,
    pub admin3_code: String,
    pub admin4_code: String,
    pub population: i64,
    pub elevation: Option<i64>,
    pub timezone: String,
    pub modified_date: String,
}

impl Place {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude,
            lon: self.longitude,
        }
    }

    /// Qualified feature code, e.g. `S.CMTY`.
    pub fn full_feature_code(&self) -> String {
        format!("{}.{}", self.feature_class, self.feature_code)
    }

    /// Admin-division level if this place is itself an administrative
    /// division (feature class `A`, code ADM1..ADM4).
    pub fn admin_level(&self) -> Option<AdminLevel> {
        if self.feature_class == "A" {
            AdminLevel::from_feature_code(&self.feature_code)
        } else {
            None
        }
    }
}

/// A country derived from the ISO codes seen on places.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
}

/// GeoNames administrative levels, province (1) down to sub-county (4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AdminLevel {
    Admin1,
    Admin2,
    Admin3,
    Admin4,
}

impl AdminLevel {
    pub fn from_feature_code(code: &str) -> Option<Self> {
        match code {
            "ADM1" => Some(AdminLevel::Admin1),
            "ADM2" => Some(AdminLevel::Admin2),
            "ADM3" => Some(AdminLevel::Admin3),
            "ADM4" => Some(AdminLevel::Admin4),
            _ => None,
        }
    }

    pub fn feature_code(&self) -> &'static str {
        match self {
            AdminLevel::Admin1 => "ADM1",
            AdminLevel::Admin2 => "ADM2",
            AdminLevel::Admin3 => "ADM3",
            AdminLevel::Admin4 => "ADM4",
        }
    }

    pub fn depth(&self) -> u8 {
        match self {
            AdminLevel::Admin1 => 1,
            AdminLevel::Admin2 => 2,
            AdminLevel::Admin3 => 3,
            AdminLevel::Admin4 => 4,
        }
    }

    /// Relationship type for Place -> AdminDivision edges at this level.
    pub fn edge_type(&self) -> &'static str {
        match self {
            AdminLevel::Admin1 => "LOCATED_IN_ADMIN1",
            AdminLevel::Admin2 => "LOCATED_IN_ADMIN2",
            AdminLevel::Admin3 => "LOCATED_IN_ADMIN3",
            AdminLevel::Admin4 => "LOCATED_IN_ADMIN4",
        }
    }

    /// Admin-code property names that must be non-empty at this level,
    /// outermost first.
    pub fn code_properties(&self) -> &'static [&'static str] {
        static ALL: [&str; 4] = ["admin1Code", "admin2Code", "admin3Code", "admin4Code"];
        &ALL[..self.depth() as usize]
    }

    pub fn all() -> &'static [AdminLevel] {
        &[
            AdminLevel::Admin1,
            AdminLevel::Admin2,
            AdminLevel::Admin3,
            AdminLevel::Admin4,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_level_from_feature_code() {
        assert_eq!(AdminLevel::from_feature_code("ADM1"), Some(AdminLevel::Admin1));
        assert_eq!(AdminLevel::from_feature_code("ADM4"), Some(AdminLevel::Admin4));
        assert_eq!(AdminLevel::from_feature_code("ADMD"), None);
        assert_eq!(AdminLevel::from_feature_code("PPL"), None);
    }

    #[test]
    fn admin_level_code_properties() {
        assert_eq!(AdminLevel::Admin1.code_properties(), &["admin1Code"]);
        assert_eq!(
            AdminLevel::Admin3.code_properties(),
            &["admin1Code", "admin2Code", "admin3Code"]
        );
    }

    #[test]
    fn point_validity() {
        assert!(GeoPoint { lat: 43.65, lon: -79.38 }.is_valid());
        assert!(!GeoPoint { lat: 91.0, lon: 0.0 }.is_valid());
        assert!(!GeoPoint { lat: 0.0, lon: -180.5 }.is_valid());
    }
}
