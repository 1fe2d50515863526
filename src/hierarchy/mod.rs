//! Administrative containment: AdminDivision nodes and the
//! Place -> ADM1..4 -> Country edge chain.

mod builder;

pub use builder::{AdminHierarchyBuilder, ChunkStrategy, HierarchySummary, HIERARCHY_BATCH_SIZE};
