//! Entity-type priority tables.
//!
//! Higher priority means a better target for historical-data linking; the
//! tables demote points-of-interest so the resolver prefers settlements
//! and administrative areas over the landmarks inside them.

/// Wikidata instance-of labels, matched as case-insensitive substrings in
/// table order. Entries whose names contain other entries (township /
/// town) are listed first so the longer form wins.
const WIKIDATA_TYPE_PRIORITY: &[(&str, i32)] = &[
    // Administrative divisions
    ("country", 100),
    ("province", 95),
    ("state", 95),
    ("county", 90),
    ("census division", 90),
    ("regional district", 90),
    ("township", 85),
    ("rural municipality", 85),
    ("municipality", 80),
    // Settlements
    ("city", 75),
    ("town", 70),
    ("village", 65),
    ("hamlet", 60),
    ("settlement", 60),
    ("unincorporated community", 55),
    // Sub-areas
    ("neighbourhood", 40),
    ("neighborhood", 40),
    ("district", 40),
    ("borough", 40),
    // Specific features; usually not what historical data refers to
    ("building", 20),
    ("landmark", 20),
    ("place of worship", 15),
    ("railway station", 15),
    ("tower", 10),
    ("monument", 10),
    ("park", 10),
    ("cemetery", 10),
    ("school", 10),
    ("hospital", 10),
];

/// GeoNames feature codes.
const FEATURE_CODE_PRIORITY: &[(&str, i32)] = &[
    // Administrative
    ("ADM1", 95),
    ("ADM2", 90),
    ("ADM3", 85),
    ("ADM4", 80),
    ("AREA", 75),
    // Populated places
    ("PPLC", 95),
    ("PPLA", 90),
    ("PPLA2", 85),
    ("PPLA3", 80),
    ("PPLA4", 75),
    ("PPL", 70),
    ("PPLL", 65),
    // Historical
    ("PPLH", 60),
    ("PPLQ", 55),
    // Sub-features
    ("PPLX", 40),
    // Points of interest
    ("CH", 15),
    ("SCH", 15),
    ("TOWR", 15),
    ("BLDG", 10),
    ("MUS", 10),
    ("MNMT", 10),
    ("HTL", 10),
];

pub const DEFAULT_PRIORITY: i32 = 30;

/// Priority of a Wikidata place from its instance-of label.
pub fn wikidata_priority(instance_of_label: Option<&str>) -> i32 {
    let label = match instance_of_label {
        Some(l) => l.to_lowercase(),
        None => return DEFAULT_PRIORITY,
    };
    for (needle, score) in WIKIDATA_TYPE_PRIORITY {
        if label.contains(needle) {
            return *score;
        }
    }
    DEFAULT_PRIORITY
}

/// Priority of a gazetteer place from its feature code, falling back to
/// its feature class.
pub fn geonames_priority(feature_code: &str, feature_class: &str) -> i32 {
    let code = feature_code.to_uppercase();
    for (known, score) in FEATURE_CODE_PRIORITY {
        if code == *known {
            return *score;
        }
    }
    match feature_class.to_uppercase().as_str() {
        "A" => 60,
        "P" => 50,
        "L" => 55,
        _ => DEFAULT_PRIORITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settlement_hierarchy() {
        assert_eq!(wikidata_priority(Some("city")), 75);
        assert_eq!(wikidata_priority(Some("big city")), 75);
        assert_eq!(wikidata_priority(Some("village")), 65);
        assert_eq!(wikidata_priority(None), DEFAULT_PRIORITY);
        assert_eq!(wikidata_priority(Some("asteroid")), DEFAULT_PRIORITY);
    }

    #[test]
    fn township_wins_over_town_substring() {
        assert_eq!(wikidata_priority(Some("geographic township")), 85);
        assert_eq!(wikidata_priority(Some("town")), 70);
    }

    #[test]
    fn pois_are_demoted() {
        assert_eq!(wikidata_priority(Some("observation tower")), 10);
        assert_eq!(wikidata_priority(Some("landmark")), 20);
        assert_eq!(geonames_priority("TOWR", "S"), 15);
        assert_eq!(geonames_priority("MNMT", "S"), 10);
    }

    #[test]
    fn feature_code_hierarchy() {
        assert_eq!(geonames_priority("PPLC", "P"), 95);
        assert_eq!(geonames_priority("PPLA", "P"), 90);
        assert_eq!(geonames_priority("PPL", "P"), 70);
        assert_eq!(geonames_priority("ADM1", "A"), 95);
    }

    #[test]
    fn class_fallbacks() {
        assert_eq!(geonames_priority("ADMD", "A"), 60);
        assert_eq!(geonames_priority("PPLF", "P"), 50);
        assert_eq!(geonames_priority("RGN", "L"), 55);
        assert_eq!(geonames_priority("STM", "H"), DEFAULT_PRIORITY);
    }
}
