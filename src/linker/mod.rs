//! Cross-source linking: RDF-derived persons into the resolved place and
//! person stores.

use std::path::Path;

use anyhow::{Context, Result};
use hashbrown::HashSet;
use neo4rs::query;
use tracing::{info, warn};

use crate::graph::bolt::{self, MapBuilder};
use crate::graph::GraphClient;
use crate::models::person::PersonsDocument;
use crate::models::{HistoricalPerson, LifeEvent};

pub const PERSON_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkerSummary {
    pub persons_written: u64,
    pub same_as_links: u64,
    pub born_in_links: u64,
    pub died_in_links: u64,
    pub worked_at_links: u64,
    pub family_links: u64,
    pub spouse_links: u64,
    /// Event facts whose GeoNames target was absent from the store.
    pub missing_place_targets: u64,
}

pub struct PersonLinker {
    client: GraphClient,
    batch_size: usize,
}

impl PersonLinker {
    pub fn new(client: GraphClient, batch_size: usize) -> Self {
        Self { client, batch_size }
    }

    pub fn load_document(path: &Path) -> Result<PersonsDocument> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read persons document {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Malformed persons document {}", path.display()))
    }

    fn event_geonames_ids(event: Option<&LifeEvent>) -> Vec<i64> {
        event
            .map(|e| e.places.iter().filter_map(|p| p.geonames_id()).collect())
            .unwrap_or_default()
    }

    fn person_to_bolt(person: &HistoricalPerson) -> neo4rs::BoltType {
        MapBuilder::new()
            .put_str("personId", &person.person_id)
            .put_str("idType", &person.id_type)
            .put_str("name", &person.name)
            .put_string_list("alternateNames", &person.alternate_names)
            .put_opt_str("wikidataQid", person.wikidata_qid.as_deref())
            .put_opt_str("viafId", person.viaf_id.as_deref())
            .put_opt_str(
                "birthDate",
                person.birth_event.as_ref().and_then(|e| e.date.as_deref()),
            )
            .put_opt_str(
                "deathDate",
                person.death_event.as_ref().and_then(|e| e.date.as_deref()),
            )
            .put(
                "birthGeonamesIds",
                bolt::list(
                    Self::event_geonames_ids(person.birth_event.as_ref())
                        .into_iter()
                        .map(bolt::integer)
                        .collect(),
                ),
            )
            .put(
                "deathGeonamesIds",
                bolt::list(
                    Self::event_geonames_ids(person.death_event.as_ref())
                        .into_iter()
                        .map(bolt::integer)
                        .collect(),
                ),
            )
            .build()
    }

    async fn write_person_nodes(&self, batch: &[HistoricalPerson]) -> Result<i64> {
        let items = bolt::list(batch.iter().map(Self::person_to_bolt).collect());
        self.client
            .single_i64(
                query(
                    "UNWIND $batch AS person
                     MERGE (h:HistoricalPerson {personId: person.personId})
                     SET h.name = person.name,
                         h.idType = person.idType,
                         h.alternateNames = person.alternateNames,
                         h.wikidataQid = person.wikidataQid,
                         h.viafId = person.viafId,
                         h.birthDate = person.birthDate,
                         h.deathDate = person.deathDate
                     RETURN count(h) AS n",
                )
                .param("batch", items),
                "n",
            )
            .await
    }

    async fn link_life_events(
        &self,
        batch: &[HistoricalPerson],
        rel: &str,
        expected: u64,
    ) -> Result<(i64, u64)> {
        let key = match rel {
            "BORN_IN" => "birthGeonamesIds",
            _ => "deathGeonamesIds",
        };
        let items = bolt::list(batch.iter().map(Self::person_to_bolt).collect());
        let cypher = format!(
            "UNWIND $batch AS person
             MATCH (h:HistoricalPerson {{personId: person.personId}})
             UNWIND person.{key} AS geonamesId
             MATCH (p:Place {{geonameId: geonamesId}})
             MERGE (h)-[:{rel}]->(p)
             RETURN count(*) AS n",
            key = key,
            rel = rel,
        );
        let linked = self
            .client
            .single_i64(query(&cypher).param("batch", items), "n")
            .await?;
        let missing = expected.saturating_sub(linked as u64);
        Ok((linked, missing))
    }

    async fn link_occupations(&self, batch: &[HistoricalPerson]) -> Result<(i64, u64)> {
        let mut expected = 0u64;
        let mut items = Vec::new();
        for person in batch {
            for occupation in &person.occupations {
                if let Some(id) = occupation.place.as_ref().and_then(|p| p.geonames_id()) {
                    expected += 1;
                    items.push(
                        MapBuilder::new()
                            .put_str("personId", &person.person_id)
                            .put_i64("geonamesId", id)
                            .put_str("role", &occupation.role)
                            .put_opt_str("date", occupation.date.as_deref())
                            .build(),
                    );
                }
            }
        }
        if items.is_empty() {
            return Ok((0, 0));
        }
        let linked = self
            .client
            .single_i64(
                query(
                    "UNWIND $links AS link
                     MATCH (h:HistoricalPerson {personId: link.personId})
                     MATCH (p:Place {geonameId: link.geonamesId})
                     MERGE (h)-[r:WORKED_AT]->(p)
                     SET r.role = link.role,
                         r.date = link.date
                     RETURN count(*) AS n",
                )
                .param("links", bolt::list(items)),
                "n",
            )
            .await?;
        Ok((linked, expected.saturating_sub(linked as u64)))
    }

    async fn link_wikidata_persons(&self) -> Result<i64> {
        self.client
            .single_i64(
                query(
                    "MATCH (h:HistoricalPerson)
                     WHERE h.wikidataQid IS NOT NULL
                     MATCH (p:Person {qid: h.wikidataQid})
                     MERGE (h)-[:SAME_AS]->(p)
                     RETURN count(*) AS n",
                ),
                "n",
            )
            .await
    }

    async fn link_family(&self, document: &PersonsDocument) -> Result<(i64, i64)> {
        // Parent/child pairs from birth events.
        let mut parent_items = Vec::new();
        for person in &document.persons {
            if let Some(birth) = &person.birth_event {
                for parent in [birth.mother_id.as_deref(), birth.father_id.as_deref()]
                    .into_iter()
                    .flatten()
                {
                    parent_items.push(
                        MapBuilder::new()
                            .put_str("parentId", parent)
                            .put_str("childId", &person.person_id)
                            .build(),
                    );
                }
            }
        }
        let mut family = 0i64;
        for chunk in parent_items.chunks(self.batch_size) {
            family += self
                .client
                .single_i64(
                    query(
                        "UNWIND $links AS link
                         MATCH (parent:HistoricalPerson {personId: link.parentId})
                         MATCH (child:HistoricalPerson {personId: link.childId})
                         MERGE (parent)-[:PARENT_OF]->(child)
                         MERGE (child)-[:CHILD_OF]->(parent)
                         RETURN count(*) AS n",
                    )
                    .param("links", bolt::list(chunk.to_vec())),
                    "n",
                )
                .await?;
        }

        // One canonical SPOUSE_OF edge per couple: endpoint ids sorted.
        let mut seen = HashSet::new();
        let mut spouse_items = Vec::new();
        for person in &document.persons {
            for relationship in &person.relationships {
                if relationship.kind != "spouse" {
                    continue;
                }
                let (a, b) = if person.person_id <= relationship.person_id {
                    (&person.person_id, &relationship.person_id)
                } else {
                    (&relationship.person_id, &person.person_id)
                };
                if !seen.insert((a.clone(), b.clone())) {
                    continue;
                }
                spouse_items.push(
                    MapBuilder::new()
                        .put_str("leftId", a)
                        .put_str("rightId", b)
                        .put_opt_str("date", relationship.date.as_deref())
                        .build(),
                );
            }
        }
        let mut spouses = 0i64;
        for chunk in spouse_items.chunks(self.batch_size) {
            spouses += self
                .client
                .single_i64(
                    query(
                        "UNWIND $links AS link
                         MATCH (a:HistoricalPerson {personId: link.leftId})
                         MATCH (b:HistoricalPerson {personId: link.rightId})
                         MERGE (a)-[r:SPOUSE_OF]->(b)
                         SET r.marriageDate = link.date
                         RETURN count(*) AS n",
                    )
                    .param("links", bolt::list(chunk.to_vec())),
                    "n",
                )
                .await?;
        }
        Ok((family, spouses))
    }

    /// Load the whole document: nodes, identity links, event-place edges,
    /// family edges. Idempotent on re-run.
    pub async fn run(&self, document: &PersonsDocument) -> Result<LinkerSummary> {
        info!(
            "Linking {} persons from {} ({} in source)",
            document.persons.len(),
            document.metadata.source,
            document.metadata.total_persons
        );
        let mut summary = LinkerSummary::default();

        for batch in document.persons.chunks(self.batch_size) {
            summary.persons_written += self.write_person_nodes(batch).await? as u64;

            let born_expected: u64 = batch
                .iter()
                .map(|p| Self::event_geonames_ids(p.birth_event.as_ref()).len() as u64)
                .sum();
            let (born, born_missing) = self.link_life_events(batch, "BORN_IN", born_expected).await?;
            summary.born_in_links += born as u64;
            summary.missing_place_targets += born_missing;

            let died_expected: u64 = batch
                .iter()
                .map(|p| Self::event_geonames_ids(p.death_event.as_ref()).len() as u64)
                .sum();
            let (died, died_missing) = self.link_life_events(batch, "DIED_IN", died_expected).await?;
            summary.died_in_links += died as u64;
            summary.missing_place_targets += died_missing;

            let (worked, worked_missing) = self.link_occupations(batch).await?;
            summary.worked_at_links += worked as u64;
            summary.missing_place_targets += worked_missing;
        }

        summary.same_as_links = self.link_wikidata_persons().await? as u64;
        let (family, spouses) = self.link_family(document).await?;
        summary.family_links = family as u64;
        summary.spouse_links = spouses as u64;

        info!(
            "Person linking complete: {} persons, {} SAME_AS, {} BORN_IN, {} DIED_IN, {} WORKED_AT, {} family, {} SPOUSE_OF",
            summary.persons_written,
            summary.same_as_links,
            summary.born_in_links,
            summary.died_in_links,
            summary.worked_at_links,
            summary.family_links,
            summary.spouse_links
        );
        if summary.missing_place_targets > 0 {
            warn!(
                "{} event facts referenced places absent from the store",
                summary.missing_place_targets
            );
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LifeEvent, PlaceRef, Relationship};

    #[test]
    fn event_geonames_ids_resolve_through_place_refs() {
        let event = LifeEvent {
            places: vec![
                PlaceRef::Geonames { id: 2643743 },
                PlaceRef::Wikidata { qid: "Q84".into() },
                PlaceRef::Place {
                    name: None,
                    geonames_id: Some(6324729),
                    latitude: None,
                    longitude: None,
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            PersonLinker::event_geonames_ids(Some(&event)),
            vec![2643743, 6324729]
        );
        assert!(PersonLinker::event_geonames_ids(None).is_empty());
    }

    #[test]
    fn spouse_pairs_are_canonicalised() {
        // Both directions of the same marriage yield a single sorted pair.
        let a = HistoricalPerson {
            person_id: "lincs:b".into(),
            relationships: vec![Relationship {
                kind: "spouse".into(),
                person_id: "lincs:a".into(),
                date: None,
            }],
            ..Default::default()
        };
        let b = HistoricalPerson {
            person_id: "lincs:a".into(),
            relationships: vec![Relationship {
                kind: "spouse".into(),
                person_id: "lincs:b".into(),
                date: None,
            }],
            ..Default::default()
        };
        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        for person in [&a, &b] {
            for rel in &person.relationships {
                let (x, y) = if person.person_id <= rel.person_id {
                    (person.person_id.clone(), rel.person_id.clone())
                } else {
                    (rel.person_id.clone(), person.person_id.clone())
                };
                if seen.insert((x.clone(), y.clone())) {
                    pairs.push((x, y));
                }
            }
        }
        assert_eq!(pairs, vec![("lincs:a".to_string(), "lincs:b".to_string())]);
    }
}
