//! Event-centric reconstruction over the CRM triple graph.
//!
//! Time-spans and places are separately-typed nodes in CRM, so both are
//! cached up front; event extraction then joins through the caches
//! instead of re-walking the graph per event.

use hashbrown::HashMap;
use regex::Regex;
use tracing::info;
use url::Url;

use super::graph::TripleGraph;
use super::vocab;
use crate::models::person::{PersonsDocument, PersonsMetadata};
use crate::models::{HistoricalPerson, LifeEvent, OccupationFact, PlaceRef, Relationship, TimeSpan};

/// Which authority a URI belongs to, by host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authority {
    Viaf(String),
    Wikidata(String),
    Lincs(String),
    Other,
}

fn host_of(uri: &str) -> Option<String> {
    Url::parse(uri)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
}

fn last_segment(uri: &str) -> &str {
    uri.trim_end_matches('/').rsplit('/').next().unwrap_or(uri)
}

/// Classify an external identifier URI by its host.
pub fn classify_identifier(uri: &str) -> Authority {
    let Some(host) = host_of(uri) else {
        return Authority::Other;
    };
    if host.ends_with("viaf.org") {
        Authority::Viaf(last_segment(uri).to_string())
    } else if host.ends_with("wikidata.org") {
        Authority::Wikidata(last_segment(uri).to_string())
    } else if host.ends_with("lincsproject.ca") {
        Authority::Lincs(last_segment(uri).to_string())
    } else {
        Authority::Other
    }
}

/// Numeric GeoNames id from a gazetteer URL, stripping any non-digit
/// suffix (some exports carry a trailing letter).
pub fn extract_geonames_id(uri: &str) -> Option<i64> {
    let host = host_of(uri)?;
    if !host.ends_with("geonames.org") {
        return None;
    }
    let digits: String = last_segment(uri).chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

#[derive(Debug, Clone, Default)]
struct CachedPlace {
    name: Option<String>,
    geonames_id: Option<i64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

pub struct FactReader {
    graph: TripleGraph,
    role_pattern: Regex,
    point_pattern: Regex,
}

impl FactReader {
    pub fn new(graph: TripleGraph) -> Self {
        Self {
            graph,
            role_pattern: Regex::new(r"^(.+?)\s+occupation\s+of").expect("static pattern"),
            point_pattern: Regex::new(r"POINT\(([-\d.]+)\s+([-\d.]+)\)").expect("static pattern"),
        }
    }

    fn cache_time_spans(&self) -> HashMap<String, TimeSpan> {
        let mut spans = HashMap::new();
        for uri in self.graph.subjects_of_type(vocab::E52_TIME_SPAN) {
            let span = TimeSpan {
                display: self
                    .graph
                    .first_literal(uri, vocab::P82_AT_SOME_TIME_WITHIN)
                    .map(str::to_string),
                begin: self
                    .graph
                    .first_literal(uri, vocab::P82A_BEGIN_OF_THE_BEGIN)
                    .map(str::to_string),
                end: self
                    .graph
                    .first_literal(uri, vocab::P82B_END_OF_THE_END)
                    .map(str::to_string),
            };
            spans.insert(uri.clone(), span);
        }
        spans
    }

    fn cache_places(&self) -> HashMap<String, CachedPlace> {
        let mut places = HashMap::new();
        for uri in self.graph.subjects_of_type(vocab::E53_PLACE) {
            let mut place = CachedPlace {
                name: self
                    .graph
                    .first_literal(uri, vocab::RDFS_LABEL)
                    .map(str::to_string),
                ..Default::default()
            };
            for target in self.graph.objects(uri, vocab::P89_FALLS_WITHIN) {
                if let Some(id) = target.as_iri().and_then(extract_geonames_id) {
                    place.geonames_id = Some(id);
                }
            }
            if let Some(wkt) = self.graph.first_literal(uri, vocab::P168_PLACE_IS_DEFINED_BY) {
                if let Some(caps) = self.point_pattern.captures(wkt) {
                    place.longitude = caps[1].parse().ok();
                    place.latitude = caps[2].parse().ok();
                }
            }
            places.insert(uri.clone(), place);
        }
        places
    }

    /// Primary identity of a person node from its own URI.
    fn person_identity(uri: &str) -> (String, String) {
        match classify_identifier(uri) {
            Authority::Viaf(id) => (format!("viaf:{}", id), "VIAF".to_string()),
            Authority::Wikidata(id) => (format!("wd:{}", id), "Wikidata".to_string()),
            Authority::Lincs(id) => (format!("lincs:{}", id), "LINCS".to_string()),
            Authority::Other => (uri.to_string(), "Other".to_string()),
        }
    }

    /// `owl:sameAs` links on the person and on any linguistic appellation
    /// reached via `P1_is_identified_by`.
    fn harvest_identifiers(&self, person_uri: &str) -> (Option<String>, Option<String>) {
        let mut wikidata_qid = None;
        let mut viaf_id = None;
        let mut scan = |subject: &str, graph: &TripleGraph| {
            for same_as in graph.objects(subject, vocab::OWL_SAME_AS) {
                if let Some(iri) = same_as.as_iri() {
                    match classify_identifier(iri) {
                        Authority::Wikidata(id) => wikidata_qid = Some(id),
                        Authority::Viaf(id) => viaf_id = Some(id),
                        _ => {}
                    }
                }
            }
        };
        scan(person_uri, &self.graph);
        for appellation in self.graph.objects(person_uri, vocab::P1_IS_IDENTIFIED_BY) {
            if let Some(key) = appellation.node_key() {
                scan(key, &self.graph);
            }
        }
        (wikidata_qid, viaf_id)
    }

    /// Resolve an event's `P7_took_place_at` target to a place reference.
    fn place_ref(&self, uri: &str, places: &HashMap<String, CachedPlace>) -> Option<PlaceRef> {
        if let Some(id) = extract_geonames_id(uri) {
            return Some(PlaceRef::Geonames { id });
        }
        if let Authority::Wikidata(qid) = classify_identifier(uri) {
            return Some(PlaceRef::Wikidata { qid });
        }
        places.get(uri).map(|place| PlaceRef::Place {
            name: place.name.clone(),
            geonames_id: place.geonames_id,
            latitude: place.latitude,
            longitude: place.longitude,
        })
    }

    fn event_span<'a>(
        &self,
        event_uri: &str,
        spans: &'a HashMap<String, TimeSpan>,
    ) -> Option<&'a TimeSpan> {
        self.graph
            .first_node(event_uri, vocab::P4_HAS_TIME_SPAN)
            .and_then(|ts| spans.get(ts))
    }

    fn life_event(
        &self,
        event_uri: &str,
        spans: &HashMap<String, TimeSpan>,
        places: &HashMap<String, CachedPlace>,
        person_ids: &HashMap<String, String>,
    ) -> LifeEvent {
        let mut event = LifeEvent::default();
        for target in self.graph.objects(event_uri, vocab::P7_TOOK_PLACE_AT) {
            if let Some(place) = target.node_key().and_then(|key| self.place_ref(key, places)) {
                event.places.push(place);
            }
        }
        if let Some(span) = self.event_span(event_uri, spans) {
            event.date = span.display.clone();
            event.date_begin = span.begin.clone();
            event.date_end = span.end.clone();
        }
        event.mother_id = self
            .graph
            .first_node(event_uri, vocab::P96_BY_MOTHER)
            .and_then(|uri| person_ids.get(uri).cloned());
        event.father_id = self
            .graph
            .first_node(event_uri, vocab::P97_FROM_FATHER)
            .and_then(|uri| person_ids.get(uri).cloned());
        event
    }

    /// Reconstruct all person records from the graph.
    pub fn extract(&self, source: &str) -> PersonsDocument {
        let spans = self.cache_time_spans();
        let places = self.cache_places();
        info!(
            "Cached {} time-spans and {} places from {} triples",
            spans.len(),
            places.len(),
            self.graph.len()
        );

        // Person pass: identity and names.
        let person_uris: Vec<String> = self.graph.subjects_of_type(vocab::E21_PERSON).to_vec();
        let mut person_ids: HashMap<String, String> = HashMap::new();
        let mut persons: HashMap<String, HistoricalPerson> = HashMap::new();
        for uri in &person_uris {
            let (person_id, id_type) = Self::person_identity(uri);
            let labels: Vec<String> = self
                .graph
                .objects(uri, vocab::RDFS_LABEL)
                .iter()
                .map(|t| t.lexical().to_string())
                .collect();
            let name = labels
                .first()
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            let (wikidata_qid, mut viaf_id) = self.harvest_identifiers(uri);
            if viaf_id.is_none() {
                if let Authority::Viaf(id) = classify_identifier(uri) {
                    viaf_id = Some(id);
                }
            }
            person_ids.insert(uri.clone(), person_id.clone());
            persons.insert(
                uri.clone(),
                HistoricalPerson {
                    person_id,
                    id_type,
                    name,
                    alternate_names: labels.into_iter().skip(1).collect(),
                    wikidata_qid,
                    viaf_id,
                    ..Default::default()
                },
            );
        }
        info!("Extracted {} persons", persons.len());

        // Birth events.
        for event_uri in self.graph.subjects_of_type(vocab::E67_BIRTH) {
            let Some(person_uri) = self.graph.first_node(event_uri, vocab::P98_BROUGHT_INTO_LIFE)
            else {
                continue;
            };
            if !persons.contains_key(person_uri) {
                continue;
            }
            let event = self.life_event(event_uri, &spans, &places, &person_ids);
            if !event.is_empty() {
                if let Some(person) = persons.get_mut(person_uri) {
                    person.birth_event = Some(event);
                }
            }
        }

        // Death events.
        for event_uri in self.graph.subjects_of_type(vocab::E69_DEATH) {
            let Some(person_uri) = self.graph.first_node(event_uri, vocab::P100_WAS_DEATH_OF)
            else {
                continue;
            };
            if !persons.contains_key(person_uri) {
                continue;
            }
            let event = self.life_event(event_uri, &spans, &places, &person_ids);
            if !event.is_empty() {
                if let Some(person) = persons.get_mut(person_uri) {
                    person.death_event = Some(event);
                }
            }
        }

        // Marriages: a SPOUSE_OF fact for every unordered pair of joined
        // persons.
        for event_uri in self.graph.subjects_of_type(vocab::E85_JOINING) {
            let spouses: Vec<String> = self
                .graph
                .objects(event_uri, vocab::P143_JOINED)
                .iter()
                .filter_map(|t| t.node_key())
                .filter(|uri| persons.contains_key(*uri))
                .map(str::to_string)
                .collect();
            if spouses.len() < 2 {
                continue;
            }
            let date = self
                .event_span(event_uri, &spans)
                .and_then(|span| span.display.clone());
            for uri in &spouses {
                let own_id = person_ids[uri].clone();
                if let Some(person) = persons.get_mut(uri) {
                    for other in &spouses {
                        let other_id = &person_ids[other];
                        if *other_id != own_id {
                            person.relationships.push(Relationship {
                                kind: "spouse".to_string(),
                                person_id: other_id.clone(),
                                date: date.clone(),
                            });
                        }
                    }
                }
            }
        }

        // Occupation activities.
        for event_uri in self.graph.subjects_of_type(vocab::E7_ACTIVITY) {
            let Some(person_uri) = self.graph.first_node(event_uri, vocab::P14_CARRIED_OUT_BY)
            else {
                continue;
            };
            if !persons.contains_key(person_uri) {
                continue;
            }
            let role = self
                .graph
                .first_literal(event_uri, vocab::RDFS_LABEL)
                .and_then(|label| {
                    self.role_pattern
                        .captures(label)
                        .map(|caps| caps[1].trim().to_string())
                })
                .unwrap_or_else(|| "Unknown".to_string());
            let place = self
                .graph
                .first_node(event_uri, vocab::P7_TOOK_PLACE_AT)
                .and_then(|uri| self.place_ref(uri, &places));
            let agency = self
                .graph
                .first_node(event_uri, vocab::P11_HAD_PARTICIPANT)
                .and_then(|uri| self.graph.first_literal(uri, vocab::RDFS_LABEL))
                .map(str::to_string);
            let mut fact = OccupationFact {
                role,
                place,
                agency,
                ..Default::default()
            };
            if let Some(span) = self.event_span(event_uri, &spans) {
                fact.date = span.display.clone();
                fact.date_begin = span.begin.clone();
                fact.date_end = span.end.clone();
            }
            if let Some(person) = persons.get_mut(person_uri) {
                person.occupations.push(fact);
            }
        }

        // Emit in person-discovery order; identity-only records drop out.
        let total_persons = person_uris.len();
        let kept: Vec<HistoricalPerson> = person_uris
            .iter()
            .filter_map(|uri| persons.remove(uri))
            .filter(HistoricalPerson::has_biographical_data)
            .collect();
        info!(
            "{} of {} persons carry biographical data",
            kept.len(),
            total_persons
        );

        PersonsDocument {
            metadata: PersonsMetadata {
                source: source.to_string(),
                total_persons,
                persons_with_data: kept.len(),
                rdf_triples: self.graph.len(),
            },
            persons: kept,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::turtle::parse_turtle;

    const FIXTURE: &str = r#"
        @prefix crm: <http://www.cidoc-crm.org/cidoc-crm/> .
        @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
        @prefix owl: <http://www.w3.org/2002/07/owl#> .
        @prefix lincs: <http://id.lincsproject.ca/> .
        @prefix geo: <https://sws.geonames.org/> .

        lincs:p1 a crm:E21_Person ;
            rdfs:label "John Cabot", "Giovanni Caboto" ;
            owl:sameAs <http://www.wikidata.org/entity/Q85642> .

        lincs:p2 a crm:E21_Person ;
            rdfs:label "Mathye Cabot" ;
            crm:P1_is_identified_by lincs:app2 .
        lincs:app2 owl:sameAs <http://viaf.org/viaf/123456> .

        lincs:p3 a crm:E21_Person ;
            rdfs:label "Identity Only" .

        lincs:birth1 a crm:E67_Birth ;
            crm:P98_brought_into_life lincs:p1 ;
            crm:P7_took_place_at <https://sws.geonames.org/3169070/> ;
            crm:P4_has_time-span lincs:ts1 .
        lincs:ts1 a crm:E52_Time-Span ;
            crm:P82_at_some_time_within "1450" ;
            crm:P82a_begin_of_the_begin "1450-01-01" ;
            crm:P82b_end_of_the_end "1450-12-31" .

        lincs:death1 a crm:E69_Death ;
            crm:P100_was_death_of lincs:p1 ;
            crm:P7_took_place_at lincs:place1 .
        lincs:place1 a crm:E53_Place ;
            rdfs:label "Atlantic Ocean" ;
            crm:P168_place_is_defined_by "POINT(-30.0 45.0)" .

        lincs:marriage1 a crm:E85_Joining ;
            crm:P143_joined lincs:p1, lincs:p2 ;
            crm:P4_has_time-span lincs:ts2 .
        lincs:ts2 a crm:E52_Time-Span ;
            crm:P82_at_some_time_within "1474" .

        lincs:act1 a crm:E7_Activity ;
            rdfs:label "Explorer occupation of Cabot, John starting in 1496" ;
            crm:P14_carried_out_by lincs:p1 ;
            crm:P7_took_place_at <https://sws.geonames.org/6098717l/> ;
            crm:P11_had_participant lincs:org1 .
        lincs:org1 rdfs:label "Crown of England" .
    "#;

    fn extract() -> PersonsDocument {
        let graph = TripleGraph::from_triples(parse_turtle(FIXTURE).unwrap());
        FactReader::new(graph).extract("fixture.ttl")
    }

    #[test]
    fn geonames_url_parsing() {
        assert_eq!(
            extract_geonames_id("https://sws.geonames.org/2643743/"),
            Some(2643743)
        );
        // Trailing non-digit suffix is stripped.
        assert_eq!(
            extract_geonames_id("https://sws.geonames.org/6098717l/"),
            Some(6098717)
        );
        assert_eq!(extract_geonames_id("http://www.wikidata.org/entity/Q42"), None);
        assert_eq!(extract_geonames_id("_:blank"), None);
    }

    #[test]
    fn identifier_classification_by_host() {
        assert_eq!(
            classify_identifier("http://viaf.org/viaf/123"),
            Authority::Viaf("123".into())
        );
        assert_eq!(
            classify_identifier("http://www.wikidata.org/entity/Q42"),
            Authority::Wikidata("Q42".into())
        );
        assert_eq!(
            classify_identifier("http://id.lincsproject.ca/abc"),
            Authority::Lincs("abc".into())
        );
        assert_eq!(classify_identifier("http://example.org/x"), Authority::Other);
    }

    #[test]
    fn birth_death_and_identifiers() {
        let doc = extract();
        assert_eq!(doc.metadata.total_persons, 3);
        // The identity-only person is dropped.
        assert_eq!(doc.metadata.persons_with_data, 2);

        let cabot = doc
            .persons
            .iter()
            .find(|p| p.person_id == "lincs:p1")
            .unwrap();
        assert_eq!(cabot.name, "John Cabot");
        assert_eq!(cabot.alternate_names, vec!["Giovanni Caboto"]);
        assert_eq!(cabot.wikidata_qid.as_deref(), Some("Q85642"));

        let birth = cabot.birth_event.as_ref().unwrap();
        assert_eq!(birth.places, vec![PlaceRef::Geonames { id: 3169070 }]);
        assert_eq!(birth.date.as_deref(), Some("1450"));
        assert_eq!(birth.date_begin.as_deref(), Some("1450-01-01"));

        let death = cabot.death_event.as_ref().unwrap();
        match &death.places[0] {
            PlaceRef::Place {
                name,
                latitude,
                longitude,
                ..
            } => {
                assert_eq!(name.as_deref(), Some("Atlantic Ocean"));
                assert_eq!(*latitude, Some(45.0));
                assert_eq!(*longitude, Some(-30.0));
            }
            other => panic!("expected cached place, got {:?}", other),
        }
    }

    #[test]
    fn appellation_identifiers_and_marriage() {
        let doc = extract();
        let mathye = doc
            .persons
            .iter()
            .find(|p| p.person_id == "lincs:p2")
            .unwrap();
        assert_eq!(mathye.viaf_id.as_deref(), Some("123456"));
        assert_eq!(mathye.relationships.len(), 1);
        assert_eq!(mathye.relationships[0].person_id, "lincs:p1");
        assert_eq!(mathye.relationships[0].date.as_deref(), Some("1474"));
    }

    #[test]
    fn occupation_role_location_and_agency() {
        let doc = extract();
        let cabot = doc
            .persons
            .iter()
            .find(|p| p.person_id == "lincs:p1")
            .unwrap();
        assert_eq!(cabot.occupations.len(), 1);
        let occupation = &cabot.occupations[0];
        assert_eq!(occupation.role, "Explorer");
        assert_eq!(occupation.place, Some(PlaceRef::Geonames { id: 6098717 }));
        assert_eq!(occupation.agency.as_deref(), Some("Crown of England"));
    }
}
