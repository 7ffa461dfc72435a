//! Read-only queries over the stored graph.
//!
//! All queries are safe to run concurrently with each other and with an
//! in-progress indexing batch: batched writes are atomic per file, so a
//! query sees either the pre- or post-batch state of any file.
//!
//! Line numbers at this boundary are 1-based and inclusive; stored ranges
//! are 0-based as parsed.

pub mod callgraph;
pub mod definitions;
pub mod references;
pub mod skeleton;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analyzer::DependencyAnalyzer;
use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::indexing::WorkspaceWalker;
use crate::parsing::{Language, ParserFactory};
use crate::storage::records::decode;
use crate::storage::{
    FileElementTable, GraphKey, GraphStore, Project, SymbolOccurrence, keys,
};
use crate::types::{ElementType, Range};

/// One resolved definition site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Definition {
    pub name: String,
    pub element_type: ElementType,
    pub path: String,
    pub range: Range,
}

/// A node in a reference or call-graph tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationNode {
    pub name: String,
    pub element_type: ElementType,
    pub path: String,
    pub range: Range,
    pub children: Vec<RelationNode>,
}

/// Options for [`QueryEngine::query_definitions`].
#[derive(Debug, Clone, Default)]
pub struct DefinitionQuery {
    pub file_path: String,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub code_snippet: Option<String>,
}

/// Options for [`QueryEngine::query_references`].
#[derive(Debug, Clone, Default)]
pub struct ReferenceQuery {
    pub file_path: String,
    pub symbol_name: Option<String>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
}

/// Options for [`QueryEngine::query_call_graph`].
#[derive(Debug, Clone, Default)]
pub struct CallGraphQuery {
    pub file_path: String,
    pub symbol_name: Option<String>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub max_layer: Option<usize>,
}

pub struct QueryEngine {
    pub(crate) settings: Arc<Settings>,
    pub(crate) store: Arc<GraphStore>,
    pub(crate) walker: WorkspaceWalker,
    pub(crate) analyzer: DependencyAnalyzer,
    pub(crate) factory: ParserFactory,
}

/// Resolved query context: the project a file belongs to and the file's
/// project-relative path and language.
pub(crate) struct QueryTarget {
    pub project: Project,
    pub relative_path: String,
    pub language: Language,
}

impl QueryEngine {
    pub fn new(settings: Arc<Settings>, store: Arc<GraphStore>) -> Self {
        Self {
            walker: WorkspaceWalker::new(settings.clone()),
            analyzer: DependencyAnalyzer::new(),
            factory: ParserFactory::new(),
            settings,
            store,
        }
    }

    /// Shared entry checks: the global switch, parameter presence, language
    /// support, and index existence.
    pub(crate) fn prepare(&self, workspace: &Path, file_path: &str) -> IndexResult<QueryTarget> {
        if !self.settings.enabled {
            return Err(IndexError::IndexDisabled);
        }
        if file_path.trim().is_empty() {
            return Err(IndexError::MissingParam { name: "file_path" });
        }
        let language = Language::from_path(Path::new(file_path)).ok_or_else(|| {
            IndexError::UnsupportedLanguage {
                path: PathBuf::from(file_path),
                extension: Path::new(file_path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_string(),
            }
        })?;

        let projects = match self.walker.discover_projects(workspace) {
            Ok(projects) => projects,
            Err(_) => vec![Project::new(workspace.to_path_buf(), Vec::new())],
        };
        let requested = if Path::new(file_path).is_absolute() {
            PathBuf::from(file_path)
        } else {
            workspace.join(file_path)
        };
        let (project, relative_path) = projects
            .into_iter()
            .find_map(|project| {
                let rel = requested.strip_prefix(&project.root_path).ok()?;
                Some((project, keys::normalize_separators(&rel.to_string_lossy())))
            })
            .ok_or_else(|| IndexError::IndexNotFound {
                path: PathBuf::from(file_path),
            })?;

        if !self.store.project_index_exists(&project.uuid)? {
            return Err(IndexError::IndexNotFound {
                path: workspace.to_path_buf(),
            });
        }
        Ok(QueryTarget {
            project,
            relative_path,
            language,
        })
    }

    /// Load the element table of a file, if indexed.
    pub(crate) fn load_table(
        &self,
        target: &QueryTarget,
    ) -> IndexResult<Option<FileElementTable>> {
        let key = GraphKey::path(target.language, target.relative_path.clone()).encode();
        match self.store.get(&target.project.uuid, &key)? {
            Some(bytes) => Ok(Some(decode(&key, &bytes, FileElementTable::from_bytes)?)),
            None => Ok(None),
        }
    }

    /// Load the element table of an arbitrary project file by stored path.
    pub(crate) fn load_table_at(
        &self,
        target: &QueryTarget,
        language: Language,
        path: &str,
    ) -> IndexResult<Option<FileElementTable>> {
        let key = GraphKey::path(language, path.to_string()).encode();
        match self.store.get(&target.project.uuid, &key)? {
            Some(bytes) => Ok(Some(decode(&key, &bytes, FileElementTable::from_bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn load_symbol(
        &self,
        target: &QueryTarget,
        name: &str,
    ) -> IndexResult<Option<SymbolOccurrence>> {
        let key = GraphKey::symbol(target.language, name).encode();
        match self.store.get(&target.project.uuid, &key)? {
            Some(bytes) => Ok(Some(decode(&key, &bytes, SymbolOccurrence::from_bytes)?)),
            None => Ok(None),
        }
    }

    /// Clamp a 1-based inclusive line window: the start is at least one, the
    /// end never precedes the start, and the window never exceeds the
    /// configured limit.
    pub(crate) fn clamp_range(&self, start_line: Option<u32>, end_line: Option<u32>) -> (u32, u32) {
        let start = start_line.unwrap_or(1).max(1);
        let end = end_line.unwrap_or(start).max(start);
        let end = end.min(start.saturating_add(self.settings.max_query_line_limit));
        (start, end)
    }

    /// Streaming iteration over every record of a project, for export.
    pub fn export_iter(
        &self,
        project: &crate::storage::ProjectUuid,
    ) -> IndexResult<impl Iterator<Item = IndexResult<(Vec<u8>, Vec<u8>)>> + use<>> {
        let iter = self.store.iter(project)?;
        Ok(iter.map(|item| {
            item.map(|(k, v)| (k.to_vec(), v.to_vec()))
                .map_err(|e| IndexError::Storage(e.into()))
        }))
    }
}

/// Convert a stored range to the 1-based inclusive external convention.
pub(crate) fn to_external(range: Range) -> Range {
    Range::new(
        range.start_line + 1,
        range.start_col,
        range.end_line + 1,
        range.end_col,
    )
}

/// Whether an element's 0-based range falls inside a 1-based inclusive
/// query window.
pub(crate) fn in_window(range: &Range, start: u32, end: u32) -> bool {
    range.start_line >= start - 1 && range.start_line <= end - 1
}

/// Whether an element is fully contained in a 1-based inclusive window.
pub(crate) fn contained_in_window(range: &Range, start: u32, end: u32) -> bool {
    start - 1 <= range.start_line && end - 1 >= range.end_line
}
