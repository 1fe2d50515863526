//! Single-pass dump filter: classify each entity as a geographic place, a
//! person, an organization, or discard it, and extract the fixed property
//! schema for the matching kind.

use std::path::{Path, PathBuf};

use anyhow::Result;
use hashbrown::HashSet;
use serde_json::Value;
use tracing::{info, warn};

use crate::models::{EntityRecord, WikidataOrganization, WikidataPerson, WikidataPlace};
use crate::wikidata::claims;
use crate::wikidata::sink::RecordSink;
use crate::wikidata::stream::DumpLines;

/// Historical entity kinds (P31 values). The source list carried
/// duplicates; the set is deduplicated on construction.
const HISTORICAL_TYPE_QIDS: &[&str] = &[
    "Q133156",   // colony
    "Q1750636",  // colonial trading post
    "Q57821",    // fortification
    "Q16748868", // historical country
    "Q3024240",  // historical country
    "Q28171280", // ancient city
    "Q839954",   // archaeological site
    "Q1266818",  // historical region
    "Q1620908",  // historical geographic location
    "Q15632617", // former administrative territorial entity
    "Q19953632", // former municipality
    "Q19730508", // historical administrative division
];

/// Organisation classes (P31 values).
const ORG_TYPE_QIDS: &[&str] = &[
    "Q43229",   // organization
    "Q4830453", // business
    "Q783794",  // company
    "Q6881511", // enterprise
    "Q891723",  // public company
    "Q166280",  // trading company
    "Q7210356", // government agency
    "Q16917",   // religious organization
    "Q1664720", // institute
    "Q31855",   // research institute
    "Q2659904", // government organization
];

const PERSON_PLACE_PROPERTIES: &[&str] = &["P19", "P20", "P551", "P937", "P27"];
const ORG_PLACE_PROPERTIES: &[&str] = &["P740", "P159", "P2541", "P131"];

const PROGRESS_INTERVAL: u64 = 100_000;

/// Counters reported per run and embedded in the final summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterStats {
    pub total_entities: u64,
    pub parse_errors: u64,
    pub with_coordinates: u64,
    pub with_geonames: u64,
    pub with_alternate_names: u64,
    pub historical_entities: u64,
    pub colonial_entities: u64,
    pub with_cross_db_ids: u64,
    pub people_found: u64,
    pub people_with_places: u64,
    pub orgs_found: u64,
    pub orgs_with_places: u64,
}

/// Paths of the three output streams.
#[derive(Debug, Clone)]
pub struct StreamPaths {
    pub places: PathBuf,
    pub persons: PathBuf,
    pub organizations: PathBuf,
}

impl StreamPaths {
    pub fn with_prefix(dir: &Path, prefix: &str) -> Self {
        Self {
            places: dir.join(format!("{}_places.jsonl.gz", prefix)),
            persons: dir.join(format!("{}_persons.jsonl.gz", prefix)),
            organizations: dir.join(format!("{}_organizations.jsonl.gz", prefix)),
        }
    }
}

pub struct DumpFilter {
    historical_types: HashSet<&'static str>,
    org_types: HashSet<&'static str>,
    stats: FilterStats,
}

impl Default for DumpFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl DumpFilter {
    pub fn new() -> Self {
        Self {
            historical_types: HISTORICAL_TYPE_QIDS.iter().copied().collect(),
            org_types: ORG_TYPE_QIDS.iter().copied().collect(),
            stats: FilterStats::default(),
        }
    }

    pub fn stats(&self) -> FilterStats {
        self.stats
    }

    /// Classify one entity. Geographic takes precedence over person, person
    /// over organization; anything else is discarded.
    pub fn classify(&mut self, entity: &Value) -> Option<EntityRecord> {
        let qid = entity.get("id")?.as_str()?;
        if let Some(place) = self.extract_place(entity, qid) {
            return Some(EntityRecord::Place(place));
        }

        let instance_of = claims::all_items(entity, "P31");
        if instance_of.iter().any(|q| q == "Q5") {
            self.stats.people_found += 1;
            if let Some(person) = self.extract_person(entity, qid) {
                self.stats.people_with_places += 1;
                return Some(EntityRecord::Person(person));
            }
            return None;
        }

        if instance_of.iter().any(|q| self.org_types.contains(q.as_str())) {
            self.stats.orgs_found += 1;
            if let Some(org) = self.extract_org(entity, qid) {
                self.stats.orgs_with_places += 1;
                return Some(EntityRecord::Organization(org));
            }
        }
        None
    }

    fn extract_place(&mut self, entity: &Value, qid: &str) -> Option<WikidataPlace> {
        let (latitude, longitude) = claims::first_coordinates(entity, "P625")?;
        self.stats.with_coordinates += 1;

        let name = claims::primary_label(entity, qid);
        let alternate_names = claims::alternate_names(entity, &name);
        if !alternate_names.is_empty() {
            self.stats.with_alternate_names += 1;
        }

        let instance_of = claims::all_items(entity, "P31");
        let is_historical = instance_of
            .iter()
            .any(|q| self.historical_types.contains(q.as_str()));
        if is_historical {
            self.stats.historical_entities += 1;
        }

        let geonames_id = claims::first_string(entity, "P1566");
        if geonames_id.is_some() {
            self.stats.with_geonames += 1;
        }

        let founded_by_qid = claims::first_item(entity, "P112");
        let owned_by_qid = claims::first_item(entity, "P127");
        if founded_by_qid.is_some() || owned_by_qid.is_some() {
            self.stats.colonial_entities += 1;
        }

        let gnd_id = claims::first_string(entity, "P227");
        let viaf_id = claims::first_string(entity, "P214");
        let loc_id = claims::first_string(entity, "P244");
        let tgn_id = claims::first_string(entity, "P1667");
        let osm_id = claims::first_string(entity, "P402");
        let wof_id = claims::first_string(entity, "P6766");
        if gnd_id.is_some()
            || viaf_id.is_some()
            || loc_id.is_some()
            || tgn_id.is_some()
            || osm_id.is_some()
            || wof_id.is_some()
        {
            self.stats.with_cross_db_ids += 1;
        }

        Some(WikidataPlace {
            qid: qid.to_string(),
            name,
            description: claims::english_description(entity),
            latitude,
            longitude,
            instance_of_qid: instance_of.first().cloned(),
            country_qid: claims::first_item(entity, "P17"),
            geonames_id,
            alternate_names,
            official_names: claims::string_list(entity, "P1448"),
            native_label: claims::first_string(entity, "P1705"),
            nickname: claims::first_string(entity, "P1449"),
            population: claims::first_quantity(entity, "P1082"),
            inception_date: claims::first_time(entity, "P571"),
            dissolved_date: claims::first_time(entity, "P576"),
            abolished_date: claims::first_time(entity, "P576"),
            replaces_qid: claims::first_item(entity, "P1365"),
            replaced_by_qid: claims::first_item(entity, "P1366"),
            follows_qid: claims::first_item(entity, "P155"),
            followed_by_qid: claims::first_item(entity, "P156"),
            founded_by_qid,
            owned_by_qid,
            capital_of_qid: claims::first_item(entity, "P1376"),
            historic_county_qid: claims::first_item(entity, "P7959"),
            gnd_id,
            viaf_id,
            loc_id,
            tgn_id,
            osm_id,
            wof_id,
            official_website: claims::first_string(entity, "P856"),
            wikipedia_url: claims::wikipedia_url(entity),
            is_historical,
        })
    }

    fn extract_person(&self, entity: &Value, qid: &str) -> Option<WikidataPerson> {
        if !PERSON_PLACE_PROPERTIES
            .iter()
            .any(|p| claims::has_property(entity, p))
        {
            return None;
        }
        let name = claims::english_label(entity)?;

        Some(WikidataPerson {
            qid: qid.to_string(),
            name,
            date_of_birth: claims::first_time(entity, "P569"),
            date_of_death: claims::first_time(entity, "P570"),
            birth_place_qid: claims::first_item(entity, "P19"),
            death_place_qid: claims::first_item(entity, "P20"),
            residence_qids: claims::item_list(entity, "P551", 5),
            work_location_qids: claims::item_list(entity, "P937", 5),
            citizenship_qid: claims::first_item(entity, "P27"),
            occupation_qids: claims::item_list(entity, "P106", 5),
            position_qids: claims::item_list(entity, "P39", 5),
            employer_qids: claims::item_list(entity, "P108", 3),
            viaf_id: claims::first_string(entity, "P214"),
            gnd_id: claims::first_string(entity, "P227"),
            loc_id: claims::first_string(entity, "P244"),
        })
    }

    fn extract_org(&self, entity: &Value, qid: &str) -> Option<WikidataOrganization> {
        if !ORG_PLACE_PROPERTIES
            .iter()
            .any(|p| claims::has_property(entity, p))
        {
            return None;
        }
        let name = claims::english_label(entity)?;

        Some(WikidataOrganization {
            qid: qid.to_string(),
            name,
            founded: claims::first_time(entity, "P571"),
            dissolved: claims::first_time(entity, "P576"),
            founded_in_qid: claims::first_item(entity, "P740"),
            headquarters_qid: claims::first_item(entity, "P159"),
            located_in_qid: claims::first_item(entity, "P131"),
            operating_area_qids: claims::item_list(entity, "P2541", 10),
            founder_qids: claims::item_list(entity, "P112", 5),
            parent_org_qid: claims::first_item(entity, "P749"),
            industry_qid: claims::first_item(entity, "P452"),
            official_name: claims::first_string(entity, "P1448"),
        })
    }

    /// Run the filter over a dump file, writing the three typed streams.
    pub fn run(
        &mut self,
        input: &Path,
        outputs: &StreamPaths,
        buffer_size: usize,
    ) -> Result<FilterStats> {
        let source = input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let mut places_sink = RecordSink::create(
            &outputs.places,
            &source,
            "P625 (coordinate location)",
            buffer_size,
        )?;
        let mut persons_sink = RecordSink::create(
            &outputs.persons,
            &source,
            "P31=Q5 with place connection",
            buffer_size,
        )?;
        let mut orgs_sink = RecordSink::create(
            &outputs.organizations,
            &source,
            "organization classes with place connection",
            buffer_size,
        )?;

        info!("Filtering {}", input.display());

        for line in DumpLines::open(input)? {
            let line = line?;
            self.stats.total_entities += 1;

            if self.stats.total_entities % PROGRESS_INTERVAL == 0 {
                info!(
                    "Processed {} entities: {} places, {} persons, {} organizations",
                    self.stats.total_entities,
                    places_sink.records_written(),
                    persons_sink.records_written(),
                    orgs_sink.records_written(),
                );
            }

            let entity: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(_) => {
                    self.stats.parse_errors += 1;
                    continue;
                }
            };

            match self.classify(&entity) {
                Some(record @ EntityRecord::Place(_)) => places_sink.push(&record)?,
                Some(record @ EntityRecord::Person(_)) => persons_sink.push(&record)?,
                Some(record @ EntityRecord::Organization(_)) => orgs_sink.push(&record)?,
                None => {}
            }
        }

        let places = places_sink.finish()?;
        let persons = persons_sink.finish()?;
        let orgs = orgs_sink.finish()?;

        info!(
            "Filter complete: {} entities scanned, {} places, {} persons, {} organizations, {} parse errors",
            self.stats.total_entities, places, persons, orgs, self.stats.parse_errors
        );
        if self.stats.parse_errors > 0 {
            warn!("{} malformed entity lines were skipped", self.stats.parse_errors);
        }

        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item_claim(id: &str) -> Value {
        json!({
            "mainsnak": {
                "snaktype": "value",
                "datavalue": { "type": "wikibase-entityid", "value": { "id": id } }
            }
        })
    }

    fn coord_claim(lat: f64, lon: f64) -> Value {
        json!({
            "mainsnak": {
                "snaktype": "value",
                "datavalue": {
                    "type": "globecoordinate",
                    "value": { "latitude": lat, "longitude": lon }
                }
            }
        })
    }

    fn string_claim(v: &str) -> Value {
        json!({
            "mainsnak": {
                "snaktype": "value",
                "datavalue": { "type": "string", "value": v }
            }
        })
    }

    #[test]
    fn entity_with_coordinates_becomes_place() {
        let entity = json!({
            "id": "Q172",
            "labels": { "en": { "value": "Toronto" } },
            "claims": {
                "P625": [ coord_claim(43.6532, -79.3832) ],
                "P31": [ item_claim("Q515") ],
                "P17": [ item_claim("Q16") ],
                "P1566": [ string_claim("6167865") ]
            }
        });
        let mut filter = DumpFilter::new();
        let record = filter.classify(&entity).unwrap();
        match record {
            EntityRecord::Place(p) => {
                assert_eq!(p.qid, "Q172");
                assert_eq!(p.name, "Toronto");
                assert_eq!(p.geonames_id.as_deref(), Some("6167865"));
                assert_eq!(p.country_qid.as_deref(), Some("Q16"));
                assert_eq!(p.instance_of_qid.as_deref(), Some("Q515"));
                assert!(!p.is_historical);
            }
            other => panic!("expected place, got {:?}", other),
        }
        assert_eq!(filter.stats().with_coordinates, 1);
        assert_eq!(filter.stats().with_geonames, 1);
    }

    #[test]
    fn coordinates_take_precedence_over_person() {
        // A human with a coordinate claim lands in the geographic stream.
        let entity = json!({
            "id": "Q1",
            "labels": { "en": { "value": "Oddity" } },
            "claims": {
                "P625": [ coord_claim(0.0, 0.0) ],
                "P31": [ item_claim("Q5") ],
                "P19": [ item_claim("Q172") ]
            }
        });
        let mut filter = DumpFilter::new();
        assert!(matches!(
            filter.classify(&entity),
            Some(EntityRecord::Place(_))
        ));
    }

    #[test]
    fn person_requires_place_tie() {
        let tied = json!({
            "id": "Q42",
            "labels": { "en": { "value": "Douglas Adams" } },
            "claims": {
                "P31": [ item_claim("Q5") ],
                "P19": [ item_claim("Q350") ],
                "P569": [ {
                    "mainsnak": {
                        "snaktype": "value",
                        "datavalue": { "type": "time", "value": { "time": "+1952-03-11T00:00:00Z" } }
                    }
                } ]
            }
        });
        let mut filter = DumpFilter::new();
        match filter.classify(&tied).unwrap() {
            EntityRecord::Person(p) => {
                assert_eq!(p.birth_place_qid.as_deref(), Some("Q350"));
                assert_eq!(p.date_of_birth.as_deref(), Some("1952-03-11"));
            }
            other => panic!("expected person, got {:?}", other),
        }

        let untied = json!({
            "id": "Q43",
            "labels": { "en": { "value": "Nobody" } },
            "claims": { "P31": [ item_claim("Q5") ] }
        });
        assert!(filter.classify(&untied).is_none());
        assert_eq!(filter.stats().people_found, 2);
        assert_eq!(filter.stats().people_with_places, 1);
    }

    #[test]
    fn organization_requires_class_and_place_tie() {
        let org = json!({
            "id": "Q190828",
            "labels": { "en": { "value": "Hudson's Bay Company" } },
            "claims": {
                "P31": [ item_claim("Q166280") ],
                "P159": [ item_claim("Q172") ],
                "P571": [ {
                    "mainsnak": {
                        "snaktype": "value",
                        "datavalue": { "type": "time", "value": { "time": "+1670-05-02T00:00:00Z" } }
                    }
                } ]
            }
        });
        let mut filter = DumpFilter::new();
        match filter.classify(&org).unwrap() {
            EntityRecord::Organization(o) => {
                assert_eq!(o.headquarters_qid.as_deref(), Some("Q172"));
                assert_eq!(o.founded.as_deref(), Some("1670-05-02"));
            }
            other => panic!("expected organization, got {:?}", other),
        }

        let not_org = json!({
            "id": "Q99",
            "labels": { "en": { "value": "A concept" } },
            "claims": { "P31": [ item_claim("Q151885") ] }
        });
        assert!(filter.classify(&not_org).is_none());
    }

    #[test]
    fn historical_and_colonial_flags() {
        let entity = json!({
            "id": "Q2036110",
            "labels": { "en": { "value": "Port Royal" } },
            "claims": {
                "P625": [ coord_claim(44.71, -65.61) ],
                "P31": [ item_claim("Q133156") ],
                "P112": [ item_claim("Q1226958") ]
            }
        });
        let mut filter = DumpFilter::new();
        match filter.classify(&entity).unwrap() {
            EntityRecord::Place(p) => {
                assert!(p.is_historical);
                assert_eq!(p.founded_by_qid.as_deref(), Some("Q1226958"));
            }
            other => panic!("expected place, got {:?}", other),
        }
        assert_eq!(filter.stats().historical_entities, 1);
        assert_eq!(filter.stats().colonial_entities, 1);
    }

    #[test]
    fn entity_with_single_axis_is_discarded() {
        let entity = json!({
            "id": "Q7",
            "labels": { "en": { "value": "Half" } },
            "claims": {
                "P625": [ {
                    "mainsnak": {
                        "snaktype": "value",
                        "datavalue": { "type": "globecoordinate", "value": { "latitude": 10.0 } }
                    }
                } ]
            }
        });
        let mut filter = DumpFilter::new();
        assert!(filter.classify(&entity).is_none());
    }

    #[test]
    fn end_to_end_stream_counts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dump.json");
        let mut lines = vec!["[".to_string()];
        for i in 0..10 {
            let entity = if i < 4 {
                json!({
                    "id": format!("Q{}", i),
                    "labels": { "en": { "value": format!("Place {}", i) } },
                    "claims": { "P625": [ coord_claim(i as f64, i as f64) ] }
                })
            } else {
                json!({ "id": format!("Q{}", i), "claims": {} })
            };
            lines.push(format!("{},", entity));
        }
        lines.push("not json at all,".to_string());
        lines.push("]".to_string());
        std::fs::write(&input, lines.join("\n")).unwrap();

        let outputs = StreamPaths::with_prefix(dir.path(), "out");
        let mut filter = DumpFilter::new();
        let stats = filter.run(&input, &outputs, 3).unwrap();

        assert_eq!(stats.total_entities, 11);
        assert_eq!(stats.with_coordinates, 4);
        assert_eq!(stats.parse_errors, 1);

        // One metadata line plus one line per matched entity.
        use flate2::read::GzDecoder;
        use std::io::BufRead;
        let reader = std::io::BufReader::new(GzDecoder::new(
            std::fs::File::open(&outputs.places).unwrap(),
        ));
        assert_eq!(reader.lines().count(), 5);
    }
}
