//! Typed records extracted from the Wikidata JSON dump.
//!
//! The three record kinds have disjoint schemas; [`EntityRecord`] is the
//! discriminated union written to the output streams. Missing values are
//! serialised as `null` rather than omitted so downstream consumers see a
//! stable set of keys.

use serde::{Deserialize, Serialize};

/// A Wikidata entity carrying coordinates (P625).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WikidataPlace {
    pub qid: String,
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// First P31 value.
    pub instance_of_qid: Option<String>,
    pub country_qid: Option<String>,
    /// P1566; a decimal integer in string form when present.
    pub geonames_id: Option<String>,
    /// Union of non-primary labels and all aliases, deduplicated,
    /// first-seen order.
    pub alternate_names: Vec<String>,
    pub official_names: Vec<String>,
    pub native_label: Option<String>,
    pub nickname: Option<String>,
    pub population: Option<i64>,
    pub inception_date: Option<String>,
    pub dissolved_date: Option<String>,
    pub abolished_date: Option<String>,
    pub replaces_qid: Option<String>,
    pub replaced_by_qid: Option<String>,
    pub follows_qid: Option<String>,
    pub followed_by_qid: Option<String>,
    pub founded_by_qid: Option<String>,
    pub owned_by_qid: Option<String>,
    pub capital_of_qid: Option<String>,
    pub historic_county_qid: Option<String>,
    pub gnd_id: Option<String>,
    pub viaf_id: Option<String>,
    pub loc_id: Option<String>,
    pub tgn_id: Option<String>,
    pub osm_id: Option<String>,
    pub wof_id: Option<String>,
    pub official_website: Option<String>,
    pub wikipedia_url: Option<String>,
    pub is_historical: bool,
}

/// A human (P31=Q5) with at least one place tie.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WikidataPerson {
    pub qid: String,
    pub name: String,
    pub date_of_birth: Option<String>,
    pub date_of_death: Option<String>,
    pub birth_place_qid: Option<String>,
    pub death_place_qid: Option<String>,
    pub residence_qids: Vec<String>,
    pub work_location_qids: Vec<String>,
    pub citizenship_qid: Option<String>,
    pub occupation_qids: Vec<String>,
    pub position_qids: Vec<String>,
    pub employer_qids: Vec<String>,
    pub viaf_id: Option<String>,
    pub gnd_id: Option<String>,
    pub loc_id: Option<String>,
}

/// An organisation-class entity with at least one place tie.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WikidataOrganization {
    pub qid: String,
    pub name: String,
    pub founded: Option<String>,
    pub dissolved: Option<String>,
    pub founded_in_qid: Option<String>,
    pub headquarters_qid: Option<String>,
    pub located_in_qid: Option<String>,
    pub operating_area_qids: Vec<String>,
    pub founder_qids: Vec<String>,
    pub parent_org_qid: Option<String>,
    pub industry_qid: Option<String>,
    pub official_name: Option<String>,
}

/// Discriminated union of the filter's output kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityRecord {
    Place(WikidataPlace),
    Person(WikidataPerson),
    Organization(WikidataOrganization),
}

impl EntityRecord {
    pub fn qid(&self) -> &str {
        match self {
            EntityRecord::Place(p) => &p.qid,
            EntityRecord::Person(p) => &p.qid,
            EntityRecord::Organization(o) => &o.qid,
        }
    }
}

/// QID shape check: `Q` followed by decimal digits.
pub fn is_valid_qid(qid: &str) -> bool {
    let mut chars = qid.chars();
    chars.next() == Some('Q') && {
        let rest = &qid[1..];
        !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qid_shape() {
        assert!(is_valid_qid("Q172"));
        assert!(is_valid_qid("Q5"));
        assert!(!is_valid_qid("Q"));
        assert!(!is_valid_qid("P625"));
        assert!(!is_valid_qid("Q12x"));
        assert!(!is_valid_qid(""));
    }

    #[test]
    fn record_kind_discriminant() {
        let record = EntityRecord::Place(WikidataPlace {
            qid: "Q172".into(),
            name: "Toronto".into(),
            latitude: 43.65,
            longitude: -79.38,
            ..Default::default()
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "place");
        assert_eq!(json["qid"], "Q172");
        // Missing values are serialised as null, not omitted.
        assert!(json.get("geonamesId").is_some());
        assert!(json["geonamesId"].is_null());
    }
}
