//! Phase A: direct GeoNames-id matches.
//!
//! The Wikidata property is a string while the gazetteer key is an
//! integer; the join coerces with `toInteger` or it silently matches
//! nothing.

use anyhow::{Context, Result};
use neo4rs::query;
use tracing::{info, warn};

use crate::graph::GraphClient;

pub const DIRECT_BATCH_SIZE: usize = 50_000;

/// MERGE a SAME_AS edge for every WikidataPlace whose `geonamesId` parses
/// to an existing Place key and that has no outgoing SAME_AS yet. Returns
/// the number of edges created or matched.
///
/// Phase A must complete for Phase B to be meaningful, so a failure is
/// retried once before propagating.
pub async fn link_by_geonames_id(client: &GraphClient, batch_size: usize) -> Result<i64> {
    let candidates = client
        .single_i64(
            query(
                "MATCH (wp:WikidataPlace)
                 WHERE wp.geonamesId IS NOT NULL
                   AND NOT (wp)-[:SAME_AS]->()
                 RETURN count(wp) AS total",
            ),
            "total",
        )
        .await?;
    info!(
        "Phase A: {} WikidataPlace nodes carry a geonamesId and are unlinked",
        candidates
    );
    if candidates == 0 {
        return Ok(0);
    }

    let cypher = direct_link_statement(batch_size);

    // The statement drives its own inner transactions, so it runs without
    // the single-transaction timeout envelope.
    let run = || async {
        let mut rows = client.graph().execute(query(&cypher)).await?;
        match rows.next().await? {
            Some(row) => Ok::<i64, anyhow::Error>(row.get::<i64>("total_count")?),
            None => Ok(0),
        }
    };
    let linked = match run().await {
        Ok(linked) => linked,
        Err(e) => {
            warn!("Phase A failed ({}), retrying once", e);
            run()
                .await
                .context("Phase A direct-id linking failed after retry")?
        }
    };

    info!("Phase A: {} SAME_AS edges via geonames_id_match", linked);
    Ok(linked)
}

/// The Wikidata property is a string; the gazetteer key is an integer.
/// The join coerces on the match key, and only sources without an
/// existing identity link are touched.
fn direct_link_statement(batch_size: usize) -> String {
    format!(
        "CALL {{
            MATCH (wp:WikidataPlace)
            WHERE wp.geonamesId IS NOT NULL
              AND NOT (wp)-[:SAME_AS]->()
            WITH wp, toInteger(wp.geonamesId) AS gid
            WHERE gid IS NOT NULL
            MATCH (p:Place {{geonameId: gid}})
            MERGE (wp)-[r:SAME_AS]->(p)
            SET r.evidence = 'geonames_id_match',
                r.confidence = 1.0,
                r.distance_km = 0.0,
                r.linkedDate = datetime()
            RETURN count(r) AS batch_count
         }} IN TRANSACTIONS OF {batch} ROWS
         RETURN sum(batch_count) AS total_count",
        batch = batch_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_coerces_the_string_id_and_fixes_edge_properties() {
        let cypher = direct_link_statement(DIRECT_BATCH_SIZE);
        assert!(cypher.contains("toInteger(wp.geonamesId)"));
        assert!(cypher.contains("r.evidence = 'geonames_id_match'"));
        assert!(cypher.contains("r.confidence = 1.0"));
        assert!(cypher.contains("r.distance_km = 0.0"));
        assert!(cypher.contains("NOT (wp)-[:SAME_AS]->()"));
        assert!(cypher.contains("IN TRANSACTIONS OF 50000 ROWS"));
    }
}
