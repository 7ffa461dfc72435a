//! Local incremental code-graph indexer and query engine.
//!
//! Walks a workspace, parses source files with tree-sitter, persists a
//! compact per-project graph into an embedded ordered KV store, and answers
//! definition / reference / call-graph / skeleton queries over that graph.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod indexing;
pub mod logging;
pub mod parsing;
pub mod query;
pub mod storage;
pub mod types;
pub mod workspace;

pub use config::Settings;
pub use error::{IndexError, IndexResult};
pub use indexing::{IndexMetrics, Indexer};
pub use parsing::Language;
pub use query::{
    CallGraphQuery, Definition, DefinitionQuery, QueryEngine, ReferenceQuery, RelationNode,
};
pub use storage::{FileElementTable, GraphStore, Project, ProjectUuid};
pub use types::{Element, ElementType, ExtraData, Import, Range, VariableScope};
pub use workspace::{BuildState, JsonMetaStore, WorkspaceMetaStore, WorkspaceRecord};
