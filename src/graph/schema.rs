//! Constraints and indexes the loaders and the resolver depend on.
//!
//! Created before any data is loaded; every statement is `IF NOT EXISTS`
//! so schema setup is re-runnable.

use anyhow::Result;
use neo4rs::query;
use tracing::info;

use super::GraphClient;

const SCHEMA_STATEMENTS: &[&str] = &[
    // Country
    "CREATE CONSTRAINT country_code IF NOT EXISTS FOR (c:Country) REQUIRE c.code IS UNIQUE",
    // AdminDivision
    "CREATE CONSTRAINT admin_geonameid IF NOT EXISTS FOR (a:AdminDivision) REQUIRE a.geonameId IS UNIQUE",
    "CREATE INDEX admin_country_admin1 IF NOT EXISTS FOR (a:AdminDivision) ON (a.countryCode, a.admin1Code)",
    "CREATE INDEX admin_country_admin2 IF NOT EXISTS FOR (a:AdminDivision) ON (a.countryCode, a.admin2Code)",
    "CREATE INDEX admin_feature_code IF NOT EXISTS FOR (a:AdminDivision) ON (a.featureCode)",
    // Place
    "CREATE CONSTRAINT place_geonameid IF NOT EXISTS FOR (p:Place) REQUIRE p.geonameId IS UNIQUE",
    "CREATE INDEX place_country IF NOT EXISTS FOR (p:Place) ON (p.countryCode)",
    "CREATE INDEX place_country_admin1 IF NOT EXISTS FOR (p:Place) ON (p.countryCode, p.admin1Code)",
    "CREATE INDEX place_country_admin2 IF NOT EXISTS FOR (p:Place) ON (p.countryCode, p.admin2Code)",
    "CREATE INDEX place_feature_code IF NOT EXISTS FOR (p:Place) ON (p.featureCode)",
    "CREATE POINT INDEX place_location IF NOT EXISTS FOR (p:Place) ON (p.location)",
    "CREATE INDEX place_latitude IF NOT EXISTS FOR (p:Place) ON (p.latitude)",
    "CREATE INDEX place_longitude IF NOT EXISTS FOR (p:Place) ON (p.longitude)",
    // WikidataPlace
    "CREATE CONSTRAINT wikidata_place_qid IF NOT EXISTS FOR (w:WikidataPlace) REQUIRE w.qid IS UNIQUE",
    "CREATE INDEX wikidata_place_geonames IF NOT EXISTS FOR (w:WikidataPlace) ON (w.geonamesId)",
    "CREATE INDEX wikidata_place_country IF NOT EXISTS FOR (w:WikidataPlace) ON (w.countryQid)",
    "CREATE INDEX wikidata_place_latitude IF NOT EXISTS FOR (w:WikidataPlace) ON (w.latitude)",
    "CREATE INDEX wikidata_place_longitude IF NOT EXISTS FOR (w:WikidataPlace) ON (w.longitude)",
    "CREATE POINT INDEX wikidata_place_location IF NOT EXISTS FOR (w:WikidataPlace) ON (w.location)",
    // Person / Organization (Wikidata streams)
    "CREATE CONSTRAINT person_qid IF NOT EXISTS FOR (p:Person) REQUIRE p.qid IS UNIQUE",
    "CREATE CONSTRAINT organization_qid IF NOT EXISTS FOR (o:Organization) REQUIRE o.qid IS UNIQUE",
    // HistoricalPerson (RDF stream)
    "CREATE CONSTRAINT historical_person_id IF NOT EXISTS FOR (h:HistoricalPerson) REQUIRE h.personId IS UNIQUE",
    "CREATE INDEX historical_person_wikidata IF NOT EXISTS FOR (h:HistoricalPerson) ON (h.wikidataQid)",
    "CREATE INDEX historical_person_viaf IF NOT EXISTS FOR (h:HistoricalPerson) ON (h.viafId)",
    "CREATE INDEX historical_person_name IF NOT EXISTS FOR (h:HistoricalPerson) ON (h.name)",
];

/// Create every constraint and index the pipeline relies on.
pub async fn create_schema(client: &GraphClient) -> Result<()> {
    info!("Creating constraints and indexes...");
    for statement in SCHEMA_STATEMENTS {
        client.run(query(statement)).await?;
    }
    info!("Schema ready ({} statements)", SCHEMA_STATEMENTS.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_statement_is_idempotent() {
        for statement in SCHEMA_STATEMENTS {
            assert!(
                statement.contains("IF NOT EXISTS"),
                "not re-runnable: {}",
                statement
            );
        }
    }

    #[test]
    fn resolver_prefilter_indexes_present() {
        let required = [
            "FOR (p:Place) ON (p.latitude)",
            "FOR (p:Place) ON (p.longitude)",
            "FOR (w:WikidataPlace) ON (w.geonamesId)",
            "FOR (w:WikidataPlace) ON (w.countryQid)",
        ];
        for needle in required {
            assert!(
                SCHEMA_STATEMENTS.iter().any(|s| s.contains(needle)),
                "missing index: {}",
                needle
            );
        }
    }
}
