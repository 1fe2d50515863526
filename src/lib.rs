//! Meridian - a historical-geography knowledge-graph pipeline
//!
//! This library provides the shared modules for the `filter`, `ingest` and
//! `link` binaries: gazetteer and Wikidata-dump readers, the CIDOC-CRM fact
//! reader, the graph-store writer, the admin-hierarchy builder and the
//! spatial entity resolver.

pub mod control;
pub mod geonames;
pub mod graph;
pub mod hierarchy;
pub mod linker;
pub mod models;
pub mod progress;
pub mod rdf;
pub mod resolver;
pub mod wikidata;

pub use models::{EntityRecord, GeoPoint, Place};
