//! Batched, idempotent upserts of typed records into the graph store.

use anyhow::Result;
use neo4rs::{query, BoltType};
use tracing::{debug, info};

use super::bolt::{self, MapBuilder};
use super::GraphClient;
use crate::models::{Place, WikidataOrganization, WikidataPerson, WikidataPlace};

/// Default transaction sizes: gazetteer rows are small, Wikidata records
/// carry larger payloads.
pub const PLACE_BATCH_SIZE: usize = 10_000;
pub const ENTITY_BATCH_SIZE: usize = 1_000;

/// Initial bulk load may assume empty stores and CREATE for speed;
/// incremental runs MERGE on the identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Bulk,
    Incremental,
}

impl WriteMode {
    fn node_clause(&self, pattern: &str) -> String {
        match self {
            WriteMode::Bulk => format!("CREATE {}", pattern),
            WriteMode::Incremental => format!("MERGE {}", pattern),
        }
    }
}

/// Outcome of the coordinate sanity fix applied to Wikidata records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateFix {
    Valid(f64, f64),
    Swapped(f64, f64),
    Invalid,
}

/// Upstream dumps occasionally mislabel the axes. A latitude outside its
/// range that fits the longitude range (and vice versa) is swapped; a pair
/// that fits neither way is dropped.
pub fn sanitize_coordinates(lat: f64, lon: f64) -> CoordinateFix {
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        CoordinateFix::Valid(lat, lon)
    } else if (-90.0..=90.0).contains(&lon) && (-180.0..=180.0).contains(&lat) {
        CoordinateFix::Swapped(lon, lat)
    } else {
        CoordinateFix::Invalid
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteStats {
    pub written: u64,
    pub fixed_swapped: u64,
    pub skipped_invalid: u64,
}

pub struct EntityWriter {
    client: GraphClient,
    mode: WriteMode,
}

impl EntityWriter {
    pub fn new(client: GraphClient, mode: WriteMode) -> Self {
        Self { client, mode }
    }

    fn place_to_bolt(place: &Place) -> BoltType {
        MapBuilder::new()
            .put_i64("geonameId", place.geoname_id)
            .put_str("name", &place.name)
            .put_str("asciiName", &place.ascii_name)
            .put_string_list("alternateNames", &place.alternate_names)
            .put_f64("latitude", place.latitude)
            .put_f64("longitude", place.longitude)
            .put_str("featureClass", &place.feature_class)
            .put_str("featureCode", &place.feature_code)
            .put_str("countryCode", &place.country_code)
            .put_str("admin1Code", &place.admin1_code)
            .put_str("admin2Code", &place.admin2_code)
            .put_str("admin3Code", &place.admin3_code)
            .put_str("admin4Code", &place.admin4_code)
            .put_i64("population", place.population)
            .put_opt_i64("elevation", place.elevation)
            .put_str("timezone", &place.timezone)
            .put_str("modifiedDate", &place.modified_date)
            .build()
    }

    fn wikidata_place_to_bolt(place: &WikidataPlace, lat: f64, lon: f64) -> BoltType {
        MapBuilder::new()
            .put_str("qid", &place.qid)
            .put_str("name", &place.name)
            .put_opt_str("description", place.description.as_deref())
            .put_f64("latitude", lat)
            .put_f64("longitude", lon)
            .put_opt_str("instanceOfQid", place.instance_of_qid.as_deref())
            .put_opt_str("countryQid", place.country_qid.as_deref())
            .put_opt_str("geonamesId", place.geonames_id.as_deref())
            .put_string_list("alternateNames", &place.alternate_names)
            .put_string_list("officialNames", &place.official_names)
            .put_opt_str("nativeLabel", place.native_label.as_deref())
            .put_opt_str("nickname", place.nickname.as_deref())
            .put_opt_i64("population", place.population)
            .put_opt_str("inceptionDate", place.inception_date.as_deref())
            .put_opt_str("dissolvedDate", place.dissolved_date.as_deref())
            .put_opt_str("abolishedDate", place.abolished_date.as_deref())
            .put_opt_str("replacesQid", place.replaces_qid.as_deref())
            .put_opt_str("replacedByQid", place.replaced_by_qid.as_deref())
            .put_opt_str("followsQid", place.follows_qid.as_deref())
            .put_opt_str("followedByQid", place.followed_by_qid.as_deref())
            .put_opt_str("foundedByQid", place.founded_by_qid.as_deref())
            .put_opt_str("ownedByQid", place.owned_by_qid.as_deref())
            .put_opt_str("capitalOfQid", place.capital_of_qid.as_deref())
            .put_opt_str("historicCountyQid", place.historic_county_qid.as_deref())
            .put_opt_str("gndId", place.gnd_id.as_deref())
            .put_opt_str("viafId", place.viaf_id.as_deref())
            .put_opt_str("locId", place.loc_id.as_deref())
            .put_opt_str("tgnId", place.tgn_id.as_deref())
            .put_opt_str("osmId", place.osm_id.as_deref())
            .put_opt_str("wofId", place.wof_id.as_deref())
            .put_opt_str("officialWebsite", place.official_website.as_deref())
            .put_opt_str("wikipediaUrl", place.wikipedia_url.as_deref())
            .put_bool("isHistorical", place.is_historical)
            .build()
    }

    fn person_to_bolt(person: &WikidataPerson) -> BoltType {
        MapBuilder::new()
            .put_str("qid", &person.qid)
            .put_str("name", &person.name)
            .put_opt_str("dateOfBirth", person.date_of_birth.as_deref())
            .put_opt_str("dateOfDeath", person.date_of_death.as_deref())
            .put_opt_str("birthPlaceQid", person.birth_place_qid.as_deref())
            .put_opt_str("deathPlaceQid", person.death_place_qid.as_deref())
            .put_string_list("residenceQids", &person.residence_qids)
            .put_string_list("workLocationQids", &person.work_location_qids)
            .put_opt_str("citizenshipQid", person.citizenship_qid.as_deref())
            .put_string_list("occupationQids", &person.occupation_qids)
            .put_string_list("positionQids", &person.position_qids)
            .put_string_list("employerQids", &person.employer_qids)
            .put_opt_str("viafId", person.viaf_id.as_deref())
            .put_opt_str("gndId", person.gnd_id.as_deref())
            .put_opt_str("locId", person.loc_id.as_deref())
            .build()
    }

    fn organization_to_bolt(org: &WikidataOrganization) -> BoltType {
        MapBuilder::new()
            .put_str("qid", &org.qid)
            .put_str("name", &org.name)
            .put_opt_str("founded", org.founded.as_deref())
            .put_opt_str("dissolved", org.dissolved.as_deref())
            .put_opt_str("foundedInQid", org.founded_in_qid.as_deref())
            .put_opt_str("headquartersQid", org.headquarters_qid.as_deref())
            .put_opt_str("locatedInQid", org.located_in_qid.as_deref())
            .put_string_list("operatingAreaQids", &org.operating_area_qids)
            .put_string_list("founderQids", &org.founder_qids)
            .put_opt_str("parentOrgQid", org.parent_org_qid.as_deref())
            .put_opt_str("industryQid", org.industry_qid.as_deref())
            .put_opt_str("officialName", org.official_name.as_deref())
            .build()
    }

    /// Upsert one batch of gazetteer places, linking each to its country.
    pub async fn write_places(&self, places: &[Place]) -> Result<u64> {
        if places.is_empty() {
            return Ok(0);
        }
        let batch = bolt::list(places.iter().map(Self::place_to_bolt).collect());
        let cypher = format!(
            "UNWIND $batch AS item
             {node}
             SET p += item,
                 p.location = point({{latitude: item.latitude, longitude: item.longitude}})
             MERGE (c:Country {{code: item.countryCode}})
             MERGE (p)-[:LOCATED_IN_COUNTRY]->(c)",
            node = self.mode.node_clause("(p:Place {geonameId: item.geonameId})"),
        );
        self.client.run(query(&cypher).param("batch", batch)).await?;
        debug!("Wrote {} places", places.len());
        Ok(places.len() as u64)
    }

    /// Upsert Wikidata places, applying the coordinate sanity fix.
    pub async fn write_wikidata_places(&self, places: &[WikidataPlace]) -> Result<WriteStats> {
        let mut stats = WriteStats::default();
        let mut items = Vec::with_capacity(places.len());
        for place in places {
            match sanitize_coordinates(place.latitude, place.longitude) {
                CoordinateFix::Valid(lat, lon) => {
                    items.push(Self::wikidata_place_to_bolt(place, lat, lon));
                }
                CoordinateFix::Swapped(lat, lon) => {
                    stats.fixed_swapped += 1;
                    items.push(Self::wikidata_place_to_bolt(place, lat, lon));
                }
                CoordinateFix::Invalid => {
                    stats.skipped_invalid += 1;
                }
            }
        }
        if items.is_empty() {
            return Ok(stats);
        }
        stats.written = items.len() as u64;
        let cypher = format!(
            "UNWIND $batch AS item
             {node}
             SET w += item,
                 w.location = point({{latitude: item.latitude, longitude: item.longitude}})",
            node = self.mode.node_clause("(w:WikidataPlace {qid: item.qid})"),
        );
        self.client
            .run(query(&cypher).param("batch", bolt::list(items)))
            .await?;
        Ok(stats)
    }

    pub async fn write_persons(&self, persons: &[WikidataPerson]) -> Result<u64> {
        if persons.is_empty() {
            return Ok(0);
        }
        let batch = bolt::list(persons.iter().map(Self::person_to_bolt).collect());
        let cypher = format!(
            "UNWIND $batch AS item
             {node}
             SET p += item",
            node = self.mode.node_clause("(p:Person {qid: item.qid})"),
        );
        self.client.run(query(&cypher).param("batch", batch)).await?;
        Ok(persons.len() as u64)
    }

    pub async fn write_organizations(&self, orgs: &[WikidataOrganization]) -> Result<u64> {
        if orgs.is_empty() {
            return Ok(0);
        }
        let batch = bolt::list(orgs.iter().map(Self::organization_to_bolt).collect());
        let cypher = format!(
            "UNWIND $batch AS item
             {node}
             SET o += item",
            node = self.mode.node_clause("(o:Organization {qid: item.qid})"),
        );
        self.client.run(query(&cypher).param("batch", batch)).await?;
        Ok(orgs.len() as u64)
    }

    pub async fn summarize(&self) -> Result<()> {
        let places = self
            .client
            .single_i64(query("MATCH (p:Place) RETURN count(p) AS c"), "c")
            .await?;
        let wikidata = self
            .client
            .single_i64(query("MATCH (w:WikidataPlace) RETURN count(w) AS c"), "c")
            .await?;
        info!("Store now holds {} places, {} Wikidata places", places, wikidata);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_coordinates_pass_through() {
        assert_eq!(
            sanitize_coordinates(43.65, -79.38),
            CoordinateFix::Valid(43.65, -79.38)
        );
        assert_eq!(
            sanitize_coordinates(-90.0, 180.0),
            CoordinateFix::Valid(-90.0, 180.0)
        );
    }

    #[test]
    fn swapped_axes_are_fixed() {
        // Latitude slot holds a longitude-looking value and vice versa.
        assert_eq!(
            sanitize_coordinates(-135.2, 58.4),
            CoordinateFix::Swapped(58.4, -135.2)
        );
    }

    #[test]
    fn doubly_bad_coordinates_are_dropped() {
        assert_eq!(sanitize_coordinates(250.0, 300.0), CoordinateFix::Invalid);
        assert_eq!(sanitize_coordinates(91.0, 95.0), CoordinateFix::Invalid);
    }

    #[test]
    fn write_modes_choose_create_or_merge() {
        assert_eq!(
            WriteMode::Bulk.node_clause("(p:Place)"),
            "CREATE (p:Place)"
        );
        assert_eq!(
            WriteMode::Incremental.node_clause("(p:Place)"),
            "MERGE (p:Place)"
        );
    }
}
