//! Streaming Wikidata dump filter: single pass, bounded memory, three
//! typed output streams.

pub mod claims;
mod filter;
mod sink;
mod stream;

pub use filter::{DumpFilter, FilterStats, StreamPaths};
pub use sink::{RecordSink, SinkMetadata};
pub use stream::DumpLines;
