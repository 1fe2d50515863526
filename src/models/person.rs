//! Event-centric person records reconstructed from CIDOC-CRM input.

use serde::{Deserialize, Serialize};

/// A time span attached to a birth, death, marriage or activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    /// Human-readable date as given in the source.
    pub display: Option<String>,
    /// ISO begin-of-the-begin.
    pub begin: Option<String>,
    /// ISO end-of-the-end.
    pub end: Option<String>,
}

impl TimeSpan {
    pub fn is_empty(&self) -> bool {
        self.display.is_none() && self.begin.is_none() && self.end.is_none()
    }
}

/// Reference to a place from an event fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaceRef {
    /// A GeoNames URL resolved to its integer id.
    Geonames { id: i64 },
    /// A Wikidata place URI resolved to its QID.
    Wikidata { qid: String },
    /// A source-internal place node, possibly with coordinates.
    Place {
        name: Option<String>,
        geonames_id: Option<i64>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    },
}

impl PlaceRef {
    /// GeoNames id if this reference resolves to one, directly or via the
    /// cached place node.
    pub fn geonames_id(&self) -> Option<i64> {
        match self {
            PlaceRef::Geonames { id } => Some(*id),
            PlaceRef::Place { geonames_id, .. } => *geonames_id,
            PlaceRef::Wikidata { .. } => None,
        }
    }
}

/// A birth or death event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeEvent {
    pub places: Vec<PlaceRef>,
    pub date: Option<String>,
    pub date_begin: Option<String>,
    pub date_end: Option<String>,
    pub mother_id: Option<String>,
    pub father_id: Option<String>,
}

impl LifeEvent {
    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
            && self.date.is_none()
            && self.date_begin.is_none()
            && self.date_end.is_none()
            && self.mother_id.is_none()
            && self.father_id.is_none()
    }
}

/// An occupational activity (role, location, agency, time).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupationFact {
    pub role: String,
    pub place: Option<PlaceRef>,
    pub agency: Option<String>,
    pub date: Option<String>,
    pub date_begin: Option<String>,
    pub date_end: Option<String>,
}

/// A person-to-person relationship fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Currently only "spouse" is produced by the fact reader.
    pub kind: String,
    pub person_id: String,
    pub date: Option<String>,
}

/// A person reconstructed from the RDF graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPerson {
    /// Source-scoped identifier, e.g. `viaf:123`, `wd:Q42`, `lincs:xyz`.
    pub person_id: String,
    /// Which authority the primary identifier came from.
    pub id_type: String,
    pub name: String,
    pub alternate_names: Vec<String>,
    pub wikidata_qid: Option<String>,
    pub viaf_id: Option<String>,
    pub birth_event: Option<LifeEvent>,
    pub death_event: Option<LifeEvent>,
    pub occupations: Vec<OccupationFact>,
    pub relationships: Vec<Relationship>,
}

impl HistoricalPerson {
    /// A person is emitted only if it carries something beyond its identity.
    pub fn has_biographical_data(&self) -> bool {
        self.birth_event.is_some()
            || self.death_event.is_some()
            || self.wikidata_qid.is_some()
            || !self.relationships.is_empty()
            || !self.occupations.is_empty()
    }
}

/// The document produced by the fact reader: metadata plus a persons array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonsDocument {
    pub metadata: PersonsMetadata,
    pub persons: Vec<HistoricalPerson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonsMetadata {
    pub source: String,
    pub total_persons: usize,
    pub persons_with_data: usize,
    pub rdf_triples: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_only_person_is_dropped() {
        let person = HistoricalPerson {
            person_id: "lincs:abc".into(),
            id_type: "LINCS".into(),
            name: "Unknown".into(),
            ..Default::default()
        };
        assert!(!person.has_biographical_data());
    }

    #[test]
    fn place_ref_geonames_resolution() {
        assert_eq!(PlaceRef::Geonames { id: 2643743 }.geonames_id(), Some(2643743));
        assert_eq!(
            PlaceRef::Place {
                name: Some("Halifax".into()),
                geonames_id: Some(6324729),
                latitude: None,
                longitude: None,
            }
            .geonames_id(),
            Some(6324729)
        );
        assert_eq!(PlaceRef::Wikidata { qid: "Q2141".into() }.geonames_id(), None);
    }
}
