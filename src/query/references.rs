//! Reference lookup: who uses a definition.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::error::{IndexError, IndexResult};
use crate::query::{
    QueryEngine, ReferenceQuery, RelationNode, contained_in_window, to_external,
};
use crate::storage::records::decode;
use crate::storage::{FileElementTable, GraphKey, keys};

impl QueryEngine {
    /// Find the use sites of definitions in a file.
    ///
    /// Roots are located by exact symbol name or by line-range containment
    /// and must be definitions of a callable or type kind. Matching is by
    /// name across the project, so unrelated same-named definitions can
    /// collect each other's references.
    pub fn query_references(
        &self,
        workspace: &Path,
        query: &ReferenceQuery,
        cancel: &CancellationToken,
    ) -> IndexResult<Vec<RelationNode>> {
        let target = self.prepare(workspace, &query.file_path)?;
        let by_name = query
            .symbol_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if by_name.is_none() && query.start_line.is_none() {
            return Err(IndexError::MissingParam {
                name: "symbol_name or start_line",
            });
        }

        let table = self
            .load_table(&target)?
            .ok_or_else(|| IndexError::IndexNotFound {
                path: PathBuf::from(&query.file_path),
            })?;
        let (start, end) = self.clamp_range(query.start_line, query.end_line);

        let mut roots: Vec<RelationNode> = Vec::new();
        for element in &table.elements {
            if !element.is_definition || !element.element_type.is_queryable_definition() {
                continue;
            }
            let selected = match by_name {
                Some(name) => element.name == name,
                None => contained_in_window(&element.range, start, end),
            };
            if selected {
                roots.push(RelationNode {
                    name: element.name.clone(),
                    element_type: element.element_type,
                    path: table.path.clone(),
                    range: to_external(element.range),
                    children: Vec::new(),
                });
            }
        }
        if roots.is_empty() {
            return Ok(roots);
        }

        // One pass over the project's tables, attaching matching uses.
        for item in self
            .store
            .scan_prefix(&target.project.uuid, keys::PATH_PREFIX.as_bytes())?
        {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            let (key, value) = item.map_err(crate::storage::StorageError::from)?;
            let Ok(GraphKey::Path { .. }) = GraphKey::parse(&key) else {
                continue;
            };
            let other = decode(&key, &value, FileElementTable::from_bytes)?;
            for element in other.uses() {
                for root in roots.iter_mut() {
                    if element.name == root.name {
                        root.children.push(RelationNode {
                            name: element.name.clone(),
                            element_type: element.element_type,
                            path: other.path.clone(),
                            range: to_external(element.range),
                            children: Vec::new(),
                        });
                    }
                }
            }
        }
        Ok(roots)
    }
}
