//! Persistent storage: key codec, record types, and the ordered KV adapter.

pub mod error;
pub mod keys;
pub mod kv;
pub mod records;

pub use error::{StorageError, StorageResult};
pub use keys::GraphKey;
pub use kv::{Entry, GraphStore};
pub use records::{
    CalleeMapItem, CalleeTarget, FileElementTable, Occurrence, Project, ProjectUuid,
    SymbolOccurrence, META_CALLGRAPH_BUILT,
};
