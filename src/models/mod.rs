//! Shared record types for the pipeline.

pub mod person;
pub mod place;
pub mod wikidata;

pub use person::{HistoricalPerson, LifeEvent, OccupationFact, PlaceRef, Relationship, TimeSpan};
pub use place::{AdminLevel, Country, GeoPoint, Place};
pub use wikidata::{EntityRecord, WikidataOrganization, WikidataPerson, WikidataPlace};
