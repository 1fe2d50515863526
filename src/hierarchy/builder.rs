//! Country-by-country hierarchy materialisation with adaptive chunking.
//!
//! The Place x AdminDivision join is bounded by partitioning large
//! countries: a single scan up to 50k places, admin1 partitions up to
//! 500k, admin1+admin2 partitions beyond that. Every write is a MERGE, so
//! a rerun after partial failure never duplicates edges.

use std::time::Instant;

use anyhow::{bail, Result};
use neo4rs::{query, Query};
use tracing::{error, info, warn};

use crate::control::{CancelFlag, COUNTRY_BUDGET};
use crate::graph::GraphClient;
use crate::models::AdminLevel;
use crate::progress::ProgressLog;

pub const HIERARCHY_BATCH_SIZE: usize = 10_000;

const ADMIN_FEATURE_CODES: &str = "['ADM1', 'ADM2', 'ADM3', 'ADM4', 'ADMD']";

/// How a country's place scan is partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// Single scan, batched.
    Single,
    /// Partition by admin1 code.
    ByAdmin1,
    /// Partition by admin1, then admin2.
    ByAdmin1Admin2,
}

impl ChunkStrategy {
    /// Pick the strategy from the country's non-admin place count.
    pub fn plan(place_count: i64) -> Self {
        if place_count > 500_000 {
            ChunkStrategy::ByAdmin1Admin2
        } else if place_count > 50_000 {
            ChunkStrategy::ByAdmin1
        } else {
            ChunkStrategy::Single
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchySummary {
    pub countries_processed: u64,
    pub countries_failed: u64,
    pub divisions_created: u64,
    pub places_linked: u64,
    pub part_of_links: u64,
}

pub struct AdminHierarchyBuilder {
    client: GraphClient,
    progress: ProgressLog,
    batch_size: usize,
    cancel: CancelFlag,
}

impl AdminHierarchyBuilder {
    pub fn new(
        client: GraphClient,
        progress: ProgressLog,
        batch_size: usize,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            client,
            progress,
            batch_size,
            cancel,
        }
    }

    async fn country_list(&self) -> Result<Vec<String>> {
        self.client
            .string_column(
                query(
                    "MATCH (p:Place)
                     WHERE p.countryCode IS NOT NULL AND p.countryCode <> ''
                     RETURN DISTINCT p.countryCode AS code
                     ORDER BY code",
                ),
                "code",
            )
            .await
    }

    async fn count_places(&self, country: &str) -> Result<i64> {
        self.client
            .single_i64(
                query(
                    "MATCH (p:Place)
                     WHERE p.countryCode = $country AND p.featureClass <> 'A'
                     RETURN count(p) AS total",
                )
                .param("country", country),
                "total",
            )
            .await
    }

    /// Run one MERGE batch with the retry-halving envelope. Returns the
    /// row count and the limit that actually ran, so the caller's SKIP
    /// cursor advances by what was covered.
    async fn run_batch(&self, build: impl Fn(usize) -> Query) -> Result<(i64, usize)> {
        match self.client.single_i64(build(self.batch_size), "n").await {
            Ok(n) => Ok((n, self.batch_size)),
            Err(first) => {
                warn!("Batch failed ({}), retrying with halved batch", first);
                let halved = (self.batch_size / 2).max(1);
                let n = self.client.single_i64(build(halved), "n").await?;
                Ok((n, halved))
            }
        }
    }

    /// Step 1: materialise AdminDivision nodes from the country's
    /// administrative places.
    async fn create_admin_divisions(&self, country: &str) -> Result<i64> {
        let total = self
            .client
            .single_i64(
                query(&format!(
                    "MATCH (p:Place)
                     WHERE p.countryCode = $country
                       AND p.featureClass = 'A'
                       AND p.featureCode IN {codes}
                     RETURN count(p) AS total",
                    codes = ADMIN_FEATURE_CODES
                ))
                .param("country", country),
                "total",
            )
            .await?;
        if total == 0 {
            return Ok(0);
        }

        let mut created = 0i64;
        let mut skip = 0i64;
        while skip < total {
            if self.cancel.is_cancelled() {
                break;
            }
            let country = country.to_string();
            let (n, advanced) = self
                .run_batch(|limit| {
                    query(&format!(
                        "MATCH (p:Place)
                         WHERE p.countryCode = $country
                           AND p.featureClass = 'A'
                           AND p.featureCode IN {codes}
                         WITH p
                         ORDER BY p.geonameId
                         SKIP $skip LIMIT $limit
                         MERGE (a:AdminDivision {{geonameId: p.geonameId}})
                         SET a.name = p.name,
                             a.countryCode = p.countryCode,
                             a.admin1Code = p.admin1Code,
                             a.admin2Code = p.admin2Code,
                             a.admin3Code = p.admin3Code,
                             a.admin4Code = p.admin4Code,
                             a.featureCode = p.featureCode,
                             a.latitude = p.latitude,
                             a.longitude = p.longitude,
                             a.location = p.location,
                             a.population = p.population
                         RETURN count(a) AS n",
                        codes = ADMIN_FEATURE_CODES
                    ))
                    .param("country", country.clone())
                    .param("skip", skip)
                    .param("limit", limit as i64)
                })
                .await?;
            created += n;
            skip += advanced as i64;
        }
        Ok(created)
    }

    /// Distinct partition keys (admin1 codes, or admin2 codes within an
    /// admin1) among the country's non-admin places.
    async fn partition_codes(&self, country: &str, admin1: Option<&str>) -> Result<Vec<String>> {
        let (filter, column) = match admin1 {
            None => ("", "p.admin1Code"),
            Some(_) => ("AND p.admin1Code = $admin1", "p.admin2Code"),
        };
        let cypher = format!(
            "MATCH (p:Place)
             WHERE p.countryCode = $country
               AND p.featureClass <> 'A'
               AND {column} <> ''
               {filter}
             RETURN DISTINCT {column} AS code",
            column = column,
            filter = filter
        );
        let mut q = query(&cypher).param("country", country);
        if let Some(a1) = admin1 {
            q = q.param("admin1", a1);
        }
        self.client.string_column(q, "code").await
    }

    /// Link one partition of places to the AdminDivision at `level`,
    /// batched by SKIP/LIMIT within the partition.
    async fn link_partition(
        &self,
        country: &str,
        level: AdminLevel,
        admin1: Option<&str>,
        admin2: Option<&str>,
    ) -> Result<i64> {
        // Every code property up to the level must be non-empty.
        let code_filter: String = level
            .code_properties()
            .iter()
            .map(|prop| format!("AND p.{} <> ''", prop))
            .collect::<Vec<_>>()
            .join("\n                       ");
        let mut partition_filter = String::new();
        if admin1.is_some() {
            partition_filter.push_str("AND p.admin1Code = $admin1 ");
        }
        if admin2.is_some() {
            partition_filter.push_str("AND p.admin2Code = $admin2");
        }
        // The target division must match the full code tuple of its level.
        let join: String = level
            .code_properties()
            .iter()
            .map(|prop| format!("{prop}: p.{prop}", prop = prop))
            .collect::<Vec<_>>()
            .join(", ");

        let count_cypher = format!(
            "MATCH (p:Place)
             WHERE p.countryCode = $country
               AND p.featureClass <> 'A'
               {code_filter}
               {partition_filter}
             RETURN count(p) AS total"
        );
        let link_cypher = format!(
            "MATCH (p:Place)
             WHERE p.countryCode = $country
               AND p.featureClass <> 'A'
               {code_filter}
               {partition_filter}
             WITH p
             ORDER BY p.geonameId
             SKIP $skip LIMIT $limit
             MATCH (a:AdminDivision {{featureCode: '{feature}', countryCode: p.countryCode, {join}}})
             MERGE (p)-[:{rel}]->(a)
             RETURN count(*) AS n",
            feature = level.feature_code(),
            join = join,
            rel = level.edge_type(),
        );

        let with_params = |q: Query| {
            let mut q = q.param("country", country);
            if let Some(a1) = admin1 {
                q = q.param("admin1", a1);
            }
            if let Some(a2) = admin2 {
                q = q.param("admin2", a2);
            }
            q
        };

        let total = self
            .client
            .single_i64(with_params(query(&count_cypher)), "total")
            .await?;

        let mut linked = 0i64;
        let mut skip = 0i64;
        while skip < total {
            if self.cancel.is_cancelled() {
                break;
            }
            let (n, advanced) = self
                .run_batch(|limit| {
                    with_params(query(&link_cypher))
                        .param("skip", skip)
                        .param("limit", limit as i64)
                })
                .await?;
            linked += n;
            skip += advanced as i64;
        }
        Ok(linked)
    }

    /// Step 2: Place -> AdminDivision edges for levels 1..3, using the
    /// chunk strategy chosen from the country's size.
    async fn link_places(&self, country: &str) -> Result<i64> {
        let total = self.count_places(country).await?;
        if total == 0 {
            return Ok(0);
        }
        let strategy = ChunkStrategy::plan(total);
        info!("  {}: {} places, {:?} chunking", country, total, strategy);

        let mut linked = 0i64;
        for level in [AdminLevel::Admin1, AdminLevel::Admin2, AdminLevel::Admin3] {
            match strategy {
                ChunkStrategy::Single => {
                    linked += self.link_partition(country, level, None, None).await?;
                }
                ChunkStrategy::ByAdmin1 => {
                    for admin1 in self.partition_codes(country, None).await? {
                        linked += self
                            .link_partition(country, level, Some(&admin1), None)
                            .await?;
                    }
                }
                ChunkStrategy::ByAdmin1Admin2 => {
                    for admin1 in self.partition_codes(country, None).await? {
                        for admin2 in self.partition_codes(country, Some(&admin1)).await? {
                            linked += self
                                .link_partition(country, level, Some(&admin1), Some(&admin2))
                                .await?;
                        }
                    }
                }
            }
        }
        Ok(linked)
    }

    /// Step 3: PART_OF chain between division levels, plus ADM1 -> Country.
    /// Division counts are small enough to run globally.
    async fn link_part_of(&self) -> Result<i64> {
        info!("Linking admin division hierarchies...");
        let mut total = 0i64;

        let admin1_country = self
            .client
            .single_i64(
                query(
                    "MATCH (a1:AdminDivision)
                     WHERE a1.featureCode = 'ADM1'
                       AND a1.countryCode IS NOT NULL
                     MERGE (c:Country {code: a1.countryCode})
                     MERGE (a1)-[:PART_OF]->(c)
                     RETURN count(*) AS n",
                ),
                "n",
            )
            .await?;
        info!("  Admin1 -> Country: {}", admin1_country);
        total += admin1_country;

        for level in [AdminLevel::Admin2, AdminLevel::Admin3, AdminLevel::Admin4] {
            let parent = match level {
                AdminLevel::Admin2 => AdminLevel::Admin1,
                AdminLevel::Admin3 => AdminLevel::Admin2,
                _ => AdminLevel::Admin3,
            };
            let join: String = parent
                .code_properties()
                .iter()
                .map(|prop| format!("parent.{prop} = child.{prop}", prop = prop))
                .collect::<Vec<_>>()
                .join(" AND ");
            let cypher = format!(
                "MATCH (child:AdminDivision)
                 WHERE child.featureCode = '{child_code}'
                   AND child.{own_code} <> ''
                 MATCH (parent:AdminDivision)
                 WHERE parent.featureCode = '{parent_code}'
                   AND parent.countryCode = child.countryCode
                   AND {join}
                 MERGE (child)-[:PART_OF]->(parent)
                 RETURN count(*) AS n",
                child_code = level.feature_code(),
                own_code = level.code_properties().last().unwrap(),
                parent_code = parent.feature_code(),
                join = join,
            );
            let linked = self.client.single_i64(query(&cypher), "n").await?;
            info!("  {} -> {}: {}", level.feature_code(), parent.feature_code(), linked);
            total += linked;
        }
        Ok(total)
    }

    async fn process_country(&self, country: &str, summary: &mut HierarchySummary) -> Result<()> {
        let started = Instant::now();
        let divisions = self.create_admin_divisions(country).await?;
        if started.elapsed() > COUNTRY_BUDGET {
            bail!("country wall-clock budget exceeded");
        }
        let links = self.link_places(country).await?;
        summary.divisions_created += divisions as u64;
        summary.places_linked += links as u64;
        if divisions > 0 || links > 0 {
            info!("  {}: {} admin divisions, {} links", country, divisions, links);
        }
        Ok(())
    }

    /// Build the full hierarchy, resuming from the progress file.
    pub async fn run(&mut self) -> Result<HierarchySummary> {
        let countries = self.country_list().await?;
        info!("Found {} countries", countries.len());
        let worklist = self.progress.filter_worklist(countries);
        info!("{} countries remaining after resume subtraction", worklist.len());

        let mut summary = HierarchySummary::default();

        for country in worklist {
            if self.cancel.is_cancelled() {
                info!("Cancelled; progress saved through the last completed country");
                break;
            }
            self.progress.set_running(&country, 0);
            match self.process_country(&country, &mut summary).await {
                Ok(()) => {
                    // A cancel mid-country leaves it unmarked; the rerun
                    // re-links it idempotently.
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    summary.countries_processed += 1;
                    self.progress.mark_completed(&country)?;
                }
                Err(e) => {
                    error!("  {}: FAILED - {}", country, e);
                    summary.countries_failed += 1;
                    self.progress.mark_failed(&country, &e.to_string())?;
                }
            }
        }

        if !self.cancel.is_cancelled() {
            summary.part_of_links = self.link_part_of().await? as u64;
            self.progress.mark_complete_phase();
        }

        info!(
            "Hierarchy complete: {} divisions, {} place links, {} PART_OF links ({} countries failed)",
            summary.divisions_created,
            summary.places_linked,
            summary.part_of_links,
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

    #[test]
    fn chunk_strategy_thresholds() {
        assert_eq!(ChunkStrategy::plan(0), ChunkStrategy::Single);
        assert_eq!(ChunkStrategy::plan(50_000), ChunkStrategy::Single);
        assert_eq!(ChunkStrategy::plan(50_001), ChunkStrategy::ByAdmin1);
        assert_eq!(ChunkStrategy::plan(500_000), ChunkStrategy::ByAdmin1);
        assert_eq!(ChunkStrategy::plan(500_001), ChunkStrategy::ByAdmin1Admin2);
        assert_eq!(ChunkStrategy::plan(600_000), ChunkStrategy::ByAdmin1Admin2);
    }
}
