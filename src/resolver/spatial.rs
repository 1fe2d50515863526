//! Phase B: country-scoped spatial proximity linking.
//!
//! For each unlinked WikidataPlace the resolver computes a bounding box,
//! pulls candidates through the coordinate B-tree indexes, filters by true
//! haversine distance, scores the k nearest and writes SAME_AS / NEAR /
//! LOCATED_IN edges in batches.

use std::time::Instant;

use anyhow::{bail, Result};
use neo4rs::query;
use tracing::{error, info, warn};

use super::bbox::{haversine_km, BoundingBox};
use super::priority::{geonames_priority, wikidata_priority};
use super::scoring::confidence;
use super::{select_edge, EdgeKind};
use crate::control::{CancelFlag, COUNTRY_BUDGET};
use crate::graph::bolt::{self, MapBuilder};
use crate::graph::GraphClient;
use crate::progress::ProgressLog;

#[derive(Debug, Clone, Copy)]
pub struct ResolverParams {
    pub radius_km: f64,
    pub max_candidates: usize,
    pub min_confidence: f64,
    pub batch_size: usize,
}

impl Default for ResolverParams {
    fn default() -> Self {
        Self {
            radius_km: 10.0,
            max_candidates: 5,
            min_confidence: 0.5,
            batch_size: 1000,
        }
    }
}

/// An unlinked WikidataPlace pulled for one batch.
#[derive(Debug, Clone)]
struct SourcePlace {
    qid: String,
    name: Option<String>,
    lat: f64,
    lon: f64,
    instance_of_label: Option<String>,
}

/// A gazetteer candidate inside the bounding box.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub geoname_id: i64,
    pub name: Option<String>,
    pub feature_class: String,
    pub feature_code: String,
    pub distance_km: f64,
}

/// A scored link ready to be written.
#[derive(Debug, Clone)]
pub(crate) struct Link {
    pub qid: String,
    pub geoname_id: i64,
    pub distance_km: f64,
    pub confidence: f64,
    pub kind: EdgeKind,
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Score the candidates of one source and decide which edges to emit.
///
/// Candidates arrive distance-filtered; this keeps the k nearest, scores
/// them, drops anything under the confidence floor and lets only the
/// best-scored candidate claim identity.
pub(crate) fn score_candidates(
    source_name: &str,
    source_priority: i32,
    mut candidates: Vec<Candidate>,
    params: &ResolverParams,
) -> Vec<Link> {
    candidates.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    candidates.truncate(params.max_candidates);

    let scored: Vec<(f64, &Candidate, i32)> = candidates
        .iter()
        .map(|c| {
            let target_priority = geonames_priority(&c.feature_code, &c.feature_class);
            let conf = confidence(
                c.distance_km,
                source_name,
                c.name.as_deref().unwrap_or(""),
                source_priority,
                target_priority,
            );
            (conf, c, target_priority)
        })
        .collect();

    let best_qid = scored
        .iter()
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c, _)| c.geoname_id);

    scored
        .into_iter()
        .filter(|(conf, _, _)| *conf >= params.min_confidence)
        .map(|(conf, c, target_priority)| {
            let kind = select_edge(
                Some(c.geoname_id) == best_qid,
                conf,
                c.distance_km,
                source_priority,
                target_priority,
            );
            Link {
                qid: String::new(),
                geoname_id: c.geoname_id,
                distance_km: round3(c.distance_km),
                confidence: round3(conf),
                kind,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialSummary {
    pub countries_processed: u64,
    pub countries_failed: u64,
    pub same_as: u64,
    pub near: u64,
    pub located_in: u64,
}

impl SpatialSummary {
    pub fn total_links(&self) -> u64 {
        self.same_as + self.near + self.located_in
    }
}

pub struct SpatialResolver {
    client: GraphClient,
    params: ResolverParams,
    progress: ProgressLog,
    cancel: CancelFlag,
}

impl SpatialResolver {
    pub fn new(
        client: GraphClient,
        params: ResolverParams,
        progress: ProgressLog,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            client,
            params,
            progress,
            cancel,
        }
    }

    /// Countries holding unlinked places, smallest first for fast feedback.
    async fn countries_with_unlinked(&self) -> Result<Vec<(String, i64)>> {
        let mut rows = self
            .client
            .graph()
            .execute(query(
                "MATCH (wp:WikidataPlace)
                 WHERE wp.countryQid IS NOT NULL
                   AND wp.latitude IS NOT NULL
                   AND wp.longitude IS NOT NULL
                   AND NOT (wp)-[:SAME_AS|NEAR|LOCATED_IN]->()
                 RETURN wp.countryQid AS country, count(*) AS unlinked
                 ORDER BY unlinked ASC",
            ))
            .await?;
        let mut countries = Vec::new();
        while let Some(row) = rows.next().await? {
            countries.push((row.get::<String>("country")?, row.get::<i64>("unlinked")?));
        }
        Ok(countries)
    }

    async fn fetch_unlinked_batch(
        &self,
        country_qid: &str,
        cursor: &str,
    ) -> Result<Vec<SourcePlace>> {
        let mut rows = self
            .client
            .graph()
            .execute(
                query(
                    "MATCH (wp:WikidataPlace)
                     WHERE wp.countryQid = $countryQid
                       AND wp.latitude IS NOT NULL
                       AND wp.longitude IS NOT NULL
                       AND wp.qid > $cursor
                       AND NOT (wp)-[:SAME_AS]->()
                     RETURN wp.qid AS qid,
                            wp.name AS name,
                            wp.latitude AS lat,
                            wp.longitude AS lon,
                            wp.instanceOfLabel AS instanceLabel
                     ORDER BY wp.qid
                     LIMIT $limit",
                )
                .param("countryQid", country_qid)
                .param("cursor", cursor)
                .param("limit", self.params.batch_size as i64),
            )
            .await?;
        let mut sources = Vec::new();
        while let Some(row) = rows.next().await? {
            sources.push(SourcePlace {
                qid: row.get::<String>("qid")?,
                name: row.get::<Option<String>>("name")?,
                lat: row.get::<f64>("lat")?,
                lon: row.get::<f64>("lon")?,
                instance_of_label: row.get::<Option<String>>("instanceLabel")?,
            });
        }
        Ok(sources)
    }

    /// Bounding-box prefilter against the latitude/longitude indexes, then
    /// the exact haversine cut in memory.
    async fn nearby_candidates(&self, source: &SourcePlace) -> Result<Vec<Candidate>> {
        let bbox = BoundingBox::around(source.lat, source.lon, self.params.radius_km);
        let mut rows = self
            .client
            .graph()
            .execute(
                query(
                    "MATCH (p:Place)
                     WHERE p.latitude >= $minLat AND p.latitude <= $maxLat
                       AND p.longitude >= $minLon AND p.longitude <= $maxLon
                     RETURN p.geonameId AS geonameId,
                            p.name AS name,
                            p.latitude AS lat,
                            p.longitude AS lon,
                            p.featureClass AS featureClass,
                            p.featureCode AS featureCode",
                )
                .param("minLat", bbox.min_lat)
                .param("maxLat", bbox.max_lat)
                .param("minLon", bbox.min_lon)
                .param("maxLon", bbox.max_lon),
            )
            .await?;

        let mut candidates = Vec::new();
        while let Some(row) = rows.next().await? {
            let lat = row.get::<f64>("lat")?;
            let lon = row.get::<f64>("lon")?;
            let distance_km = haversine_km(source.lat, source.lon, lat, lon);
            if distance_km > self.params.radius_km {
                continue;
            }
            candidates.push(Candidate {
                geoname_id: row.get::<i64>("geonameId")?,
                name: row.get::<Option<String>>("name")?,
                feature_class: row.get::<Option<String>>("featureClass")?.unwrap_or_default(),
                feature_code: row.get::<Option<String>>("featureCode")?.unwrap_or_default(),
                distance_km,
            });
        }
        Ok(candidates)
    }

    async fn write_links(&self, links: &[Link]) -> Result<()> {
        for kind in [EdgeKind::SameAs, EdgeKind::Near, EdgeKind::LocatedIn] {
            let items: Vec<_> = links
                .iter()
                .filter(|l| l.kind == kind)
                .map(|l| {
                    MapBuilder::new()
                        .put_str("qid", &l.qid)
                        .put_i64("geonameId", l.geoname_id)
                        .put_f64("distanceKm", l.distance_km)
                        .put_f64("confidence", l.confidence)
                        .build()
                })
                .collect();
            if items.is_empty() {
                continue;
            }
            let cypher = format!(
                "UNWIND $links AS link
                 MATCH (wp:WikidataPlace {{qid: link.qid}})
                 MATCH (p:Place {{geonameId: link.geonameId}})
                 MERGE (wp)-[r:{rel}]->(p)
                 SET r.distance_km = link.distanceKm,
                     r.confidence = link.confidence,
                     r.evidence = 'spatial_proximity',
                     r.linkedDate = datetime()",
                rel = kind.rel_type(),
            );
            self.client
                .run(query(&cypher).param("links", bolt::list(items)))
                .await?;
        }
        Ok(())
    }

    /// Write a batch; on failure retry once with the batch halved. A second
    /// failure logs the affected source QIDs and fails the country.
    async fn write_links_with_retry(&self, links: &[Link]) -> Result<()> {
        if links.is_empty() {
            return Ok(());
        }
        match self.write_links(links).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!("Link batch failed ({}), retrying in halves", first);
                let mid = links.len() / 2;
                for half in [&links[..mid.max(1)], &links[mid.max(1)..]] {
                    if half.is_empty() {
                        continue;
                    }
                    if let Err(second) = self.write_links(half).await {
                        let mut qids: Vec<&str> = half.iter().map(|l| l.qid.as_str()).collect();
                        qids.dedup();
                        error!("Link batch failed twice; source QIDs: {}", qids.join(", "));
                        return Err(second);
                    }
                }
                Ok(())
            }
        }
    }

    async fn link_country(&self, country_qid: &str, summary: &mut SpatialSummary) -> Result<u64> {
        let started = Instant::now();
        let mut cursor = String::new();
        let mut links_created = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if started.elapsed() > COUNTRY_BUDGET {
                bail!("country wall-clock budget exceeded");
            }

            let sources = self.fetch_unlinked_batch(country_qid, &cursor).await?;
            let Some(last) = sources.last() else { break };
            cursor = last.qid.clone();

            let mut batch: Vec<Link> = Vec::new();
            for source in &sources {
                let candidates = self.nearby_candidates(source).await?;
                if candidates.is_empty() {
                    continue;
                }
                let source_priority = wikidata_priority(source.instance_of_label.as_deref());
                let mut links = score_candidates(
                    source.name.as_deref().unwrap_or(""),
                    source_priority,
                    candidates,
                    &self.params,
                );
                for link in &mut links {
                    link.qid = source.qid.clone();
                }
                batch.extend(links);
            }

            self.write_links_with_retry(&batch).await?;
            for link in &batch {
                match link.kind {
                    EdgeKind::SameAs => summary.same_as += 1,
                    EdgeKind::Near => summary.near += 1,
                    EdgeKind::LocatedIn => summary.located_in += 1,
                }
            }
            links_created += batch.len() as u64;
        }

        Ok(links_created)
    }

    /// Drive Phase B over every country with unlinked places, persisting
    /// progress after each country.
    pub async fn run(&mut self) -> Result<SpatialSummary> {
        let countries = self.countries_with_unlinked().await?;
        info!(
            "Phase B: {} countries hold unlinked WikidataPlace nodes",
            countries.len()
        );

        let worklist = self
            .progress
            .filter_worklist(countries.iter().map(|(qid, _)| qid.clone()).collect());
        let mut summary = SpatialSummary::default();

        for country in worklist {
            if self.cancel.is_cancelled() {
                info!("Cancelled; progress saved through the last completed country");
                break;
            }
            self.progress.set_running(&country, 0);
            match self.link_country(&country, &mut summary).await {
                Ok(links) => {
                    info!("{}: {} spatial links", country, links);
                    // A cancel mid-country leaves it unmarked; the rerun
                    // re-links it idempotently.
                    if self.cancel.is_cancelled() {
                        info!("Cancelled; progress saved through the last completed country");
                        break;
                    }
                    summary.countries_processed += 1;
                    self.progress.mark_completed(&country)?;
                }
                Err(e) => {
                    error!("{}: failed ({}); skipping to next country", country, e);
                    summary.countries_failed += 1;
                    self.progress.mark_failed(&country, &e.to_string())?;
                }
            }
        }

        if !self.cancel.is_cancelled() {
            self.progress.mark_complete_phase();
        }
        info!(
            "Phase B complete: {} SAME_AS, {} NEAR, {} LOCATED_IN across {} countries ({} failed)",
            summary.same_as,
            summary.near,
            summary.located_in,
            summary.countries_processed,
            summary.countries_failed
        );
        Ok(summary)
    }

    pub fn progress(&self) -> &ProgressLog {
        &self.progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, name: &str, code: &str, class: &str, d: f64) -> Candidate {
        Candidate {
            geoname_id: id,
            name: Some(name.to_string()),
            feature_class: class.to_string(),
            feature_code: code.to_string(),
            distance_km: d,
        }
    }

    #[test]
    fn toronto_wins_over_cn_tower() {
        // Source: Q172 "Toronto", instance-of "city" (priority 75).
        let candidates = vec![
            candidate(9999999, "CN Tower", "TOWR", "S", 1.2),
            candidate(6167865, "Toronto", "PPLA", "P", 5.3),
        ];
        let links = score_candidates("Toronto", 75, candidates, &ResolverParams::default());

        let toronto = links.iter().find(|l| l.geoname_id == 6167865).unwrap();
        assert_eq!(toronto.kind, EdgeKind::Near); // best, but 5.3 km > 1 km
        assert!(toronto.confidence > 0.9);

        // CN Tower scores ~0.36, below the 0.5 floor, and is dropped.
        assert!(links.iter().all(|l| l.geoname_id != 9999999));
    }

    #[test]
    fn same_as_when_best_is_close_and_confident() {
        let candidates = vec![candidate(6167865, "Toronto", "PPLA", "P", 0.4)];
        let links = score_candidates("Toronto", 75, candidates, &ResolverParams::default());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].kind, EdgeKind::SameAs);
        assert!(links[0].confidence >= 0.85);
    }

    #[test]
    fn equal_distance_resolved_by_name() {
        let candidates = vec![
            candidate(1, "Maitland", "PPL", "P", 3.0),
            candidate(2, "Sheet Harbour", "PPL", "P", 3.0),
        ];
        let links = score_candidates("Maitland", 70, candidates, &ResolverParams::default());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].geoname_id, 1);
        assert!(links[0].confidence > 0.9);
    }

    #[test]
    fn poi_source_contained_in_settlement() {
        // A monument (priority 10) 2 km from a town (priority 70).
        let candidates = vec![candidate(5, "Brock's Monument town", "PPL", "P", 2.0)];
        let links = score_candidates("Brock's Monument", 10, candidates, &ResolverParams::default());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].kind, EdgeKind::LocatedIn);
    }

    #[test]
    fn candidate_cap_keeps_k_nearest() {
        let mut candidates: Vec<Candidate> = (0..8)
            .map(|i| candidate(i, "Springfield", "PPL", "P", 0.2 + i as f64))
            .collect();
        candidates.reverse();
        let links = score_candidates("Springfield", 70, candidates, &ResolverParams::default());
        // Five nearest survive the cap; all share the name so all clear 0.5.
        assert_eq!(links.len(), 5);
        assert!(links.iter().all(|l| l.geoname_id <= 4));
        // Only one SAME_AS despite several close, confident candidates.
        assert_eq!(
            links.iter().filter(|l| l.kind == EdgeKind::SameAs).count(),
            1
        );
    }
}
