//! GeoNames gazetteer dump parsing.

mod reader;

pub use reader::{FeatureFilter, GazetteerReader, ReaderStats};
