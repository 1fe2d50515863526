//! Spatial entity resolution: WikidataPlace -> Place linking.
//!
//! Phase A links by direct GeoNames id; Phase B links by bounding-box
//! filtered haversine proximity with weighted multi-factor scoring.

pub mod bbox;
mod direct;
pub mod priority;
pub mod scoring;
mod spatial;

pub use direct::link_by_geonames_id;
pub use spatial::{ResolverParams, SpatialResolver, SpatialSummary};

/// Edge kinds the resolver can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    SameAs,
    Near,
    LocatedIn,
}

impl EdgeKind {
    pub fn rel_type(&self) -> &'static str {
        match self {
            EdgeKind::SameAs => "SAME_AS",
            EdgeKind::Near => "NEAR",
            EdgeKind::LocatedIn => "LOCATED_IN",
        }
    }
}

/// Select the edge type for a scored candidate pair.
///
/// Identity needs both a very high score and a sub-kilometre distance and
/// is only claimed for the best-ranked candidate. Containment (a
/// point-of-interest inside a settlement) takes precedence over plain
/// proximity whenever its predicate fires.
pub fn select_edge(
    is_best: bool,
    confidence: f64,
    distance_km: f64,
    source_priority: i32,
    target_priority: i32,
) -> EdgeKind {
    if is_best && confidence >= 0.85 && distance_km <= 1.0 {
        EdgeKind::SameAs
    } else if source_priority < 60 && target_priority >= 60 && distance_km <= 5.0 {
        EdgeKind::LocatedIn
    } else {
        EdgeKind::Near
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_requires_best_rank_score_and_distance() {
        assert_eq!(select_edge(true, 0.9, 0.5, 75, 90), EdgeKind::SameAs);
        assert_eq!(select_edge(false, 0.9, 0.5, 75, 90), EdgeKind::Near);
        assert_eq!(select_edge(true, 0.8, 0.5, 75, 90), EdgeKind::Near);
        assert_eq!(select_edge(true, 0.9, 1.5, 75, 90), EdgeKind::Near);
    }

    #[test]
    fn containment_beats_proximity_when_predicate_fires() {
        // POI (priority 20) near a settlement (priority 70), 3 km away.
        assert_eq!(select_edge(true, 0.6, 3.0, 20, 70), EdgeKind::LocatedIn);
        // Too far for containment.
        assert_eq!(select_edge(true, 0.6, 6.0, 20, 70), EdgeKind::Near);
        // Settlement-to-settlement is never containment.
        assert_eq!(select_edge(false, 0.6, 3.0, 70, 70), EdgeKind::Near);
    }
}
