//! Workspace walking and the indexing pipeline.

pub mod indexer;
pub mod metrics;
pub mod walker;

pub use indexer::Indexer;
pub use metrics::IndexMetrics;
pub use walker::{SourceFile, VisitPattern, WorkspaceWalker};
