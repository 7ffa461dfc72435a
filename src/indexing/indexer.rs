//! The indexing orchestrator.
//!
//! Scan → filter-by-timestamp → batched parse → persist, plus incremental
//! update, removal, and rename. Writes follow two ordering rules the query
//! side depends on: within a batch, symbol-occurrence updates for a file
//! happen before the file's element-table write, and on removal the
//! occurrence cleanup happens strictly before the `@path` key delete.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::analyzer::{DependencyAnalyzer, SymbolOccurrenceCache};
use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::indexing::metrics::IndexMetrics;
use crate::indexing::walker::{SourceFile, WorkspaceWalker, file_mtime};
use crate::parsing::{Language, ParserFactory, SourceParser};
use crate::query::{
    CallGraphQuery, Definition, DefinitionQuery, QueryEngine, ReferenceQuery, RelationNode,
};
use crate::storage::records::decode;
use crate::storage::{
    Entry, FileElementTable, GraphKey, GraphStore, Project, ProjectUuid, SymbolOccurrence, keys,
    META_CALLGRAPH_BUILT,
};
use crate::workspace::{BuildState, WorkspaceMetaStore};

pub struct Indexer {
    settings: Arc<Settings>,
    store: Arc<GraphStore>,
    meta: Arc<dyn WorkspaceMetaStore>,
    walker: WorkspaceWalker,
    analyzer: DependencyAnalyzer,
    factory: ParserFactory,
    queries: QueryEngine,
    symbol_cache: Mutex<SymbolOccurrenceCache>,
}

impl Indexer {
    pub fn new(
        settings: Arc<Settings>,
        store: Arc<GraphStore>,
        meta: Arc<dyn WorkspaceMetaStore>,
    ) -> Self {
        let symbol_cache = Mutex::new(SymbolOccurrenceCache::new(settings.cache_capacity));
        Self {
            walker: WorkspaceWalker::new(settings.clone()),
            analyzer: DependencyAnalyzer::new(),
            factory: ParserFactory::new(),
            queries: QueryEngine::new(settings.clone(), store.clone()),
            settings,
            store,
            meta,
            symbol_cache,
        }
    }

    /// Open the engine under the configured data directory, with the
    /// built-in JSON workspace metadata store.
    pub fn open(settings: Arc<Settings>) -> IndexResult<Self> {
        let store = Arc::new(GraphStore::open(settings.data_path.join("graph"))?);
        let meta = Arc::new(crate::workspace::JsonMetaStore::open(&settings.data_path)?);
        Ok(Self::new(settings, store, meta))
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn queries(&self) -> &QueryEngine {
        &self.queries
    }

    pub fn query_definitions(
        &self,
        workspace: &Path,
        query: &DefinitionQuery,
    ) -> IndexResult<Vec<Definition>> {
        self.queries.query_definitions(workspace, query)
    }

    pub fn query_references(
        &self,
        workspace: &Path,
        query: &ReferenceQuery,
        cancel: &CancellationToken,
    ) -> IndexResult<Vec<RelationNode>> {
        self.queries.query_references(workspace, query, cancel)
    }

    pub fn query_call_graph(
        &self,
        workspace: &Path,
        query: &CallGraphQuery,
        cancel: &CancellationToken,
    ) -> IndexResult<Vec<RelationNode>> {
        self.queries.query_call_graph(workspace, query, cancel)
    }

    pub fn get_file_element_table(
        &self,
        workspace: &Path,
        file_path: &str,
    ) -> IndexResult<FileElementTable> {
        self.queries.get_file_element_table(workspace, file_path)
    }

    /// Index every project of a workspace.
    pub fn index_workspace(
        &self,
        workspace: &Path,
        cancel: &CancellationToken,
    ) -> IndexResult<IndexMetrics> {
        let label = workspace_label(workspace);
        let previous = self
            .meta
            .get_by_path(&label)
            .map(|r| r.total_files)
            .unwrap_or(0);
        self.meta
            .update_codegraph_info(&label, previous, BuildState::Building)?;

        let result = self.index_workspace_inner(workspace, &label, cancel);
        match &result {
            Ok(metrics) => {
                let total = self.get_summary(workspace).unwrap_or(0);
                self.meta
                    .update_codegraph_info(&label, total, BuildState::Success)?;
                tracing::info!(
                    workspace = %label,
                    files = metrics.total_files,
                    failed = metrics.total_failed_files,
                    "workspace indexed"
                );
            }
            Err(e) => {
                tracing::warn!(workspace = %label, "indexing failed: {e}");
                let total = self.get_summary(workspace).unwrap_or(previous);
                let _ = self
                    .meta
                    .update_codegraph_info(&label, total, BuildState::Failed);
            }
        }
        result
    }

    fn index_workspace_inner(
        &self,
        workspace: &Path,
        label: &str,
        cancel: &CancellationToken,
    ) -> IndexResult<IndexMetrics> {
        let projects = self.walker.discover_projects(workspace)?;
        let mut metrics = IndexMetrics::new();
        for project in &projects {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            metrics.merge(self.index_project(label, project, cancel)?);
        }
        Ok(metrics)
    }

    fn index_project(
        &self,
        label: &str,
        project: &Project,
        cancel: &CancellationToken,
    ) -> IndexResult<IndexMetrics> {
        let files = self.walker.collect_files(&project.root_path)?;
        let stored = self.stored_timestamps(&project.uuid)?;
        let work: Vec<SourceFile> = files
            .into_iter()
            .filter(|f| stored.get(&f.relative_path) != Some(&f.mtime))
            .collect();
        tracing::debug!(
            project = %project.uuid,
            candidates = work.len(),
            unchanged = stored.len(),
            "timestamp filter applied"
        );
        self.process_batches(label, project, &work, cancel)
    }

    /// Map of stored file path to the timestamp it was indexed at.
    fn stored_timestamps(&self, project: &ProjectUuid) -> IndexResult<HashMap<String, i64>> {
        let mut stored = HashMap::new();
        for item in self
            .store
            .scan_prefix(project, keys::PATH_PREFIX.as_bytes())?
        {
            let (key, value) = item.map_err(crate::storage::StorageError::from)?;
            let Ok(GraphKey::Path { path, .. }) = GraphKey::parse(&key) else {
                continue;
            };
            match decode(&key, &value, FileElementTable::from_bytes) {
                Ok(table) => {
                    stored.insert(path, table.timestamp);
                }
                Err(e) => {
                    // A corrupt table will simply be reparsed.
                    tracing::warn!(path = %path, "unreadable element table: {e}");
                }
            }
        }
        Ok(stored)
    }

    /// Parse and persist `work` in batches, updating progress after each.
    fn process_batches(
        &self,
        label: &str,
        project: &Project,
        work: &[SourceFile],
        cancel: &CancellationToken,
    ) -> IndexResult<IndexMetrics> {
        let mut metrics = IndexMetrics::new();
        if work.is_empty() {
            return Ok(metrics);
        }

        let previous = self
            .meta
            .get_by_path(label)
            .map(|r| r.total_files)
            .unwrap_or(0);
        let mut parsers: HashMap<Language, Box<dyn SourceParser>> = HashMap::new();
        let mut cache = self.symbol_cache.lock();
        // Cached records are keyed by symbol name only; entries from another
        // project must not leak into this one.
        cache.clear();
        let mut processed = 0;

        for batch in work.chunks(self.settings.max_batch_size) {
            if cancel.is_cancelled() {
                cache.flush(&self.store, &project.uuid)?;
                return Err(IndexError::Cancelled);
            }

            let mut tables = Vec::with_capacity(batch.len());
            for file in batch {
                if cancel.is_cancelled() {
                    cache.flush(&self.store, &project.uuid)?;
                    return Err(IndexError::Cancelled);
                }
                match self.parse_file(&mut parsers, file) {
                    Ok(table) => tables.push(table),
                    Err(e) => {
                        tracing::warn!(path = %file.relative_path, "parse failed: {e}");
                        metrics.record_failure(file.relative_path.clone());
                    }
                }
            }

            // Symbol-name index first, element tables second.
            let saved = self
                .analyzer
                .save_symbol_occurrences(&self.store, &project.uuid, &tables, &mut cache);
            let symbol_metrics = match saved {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("symbol index update failed for batch: {e}");
                    for table in &tables {
                        metrics.record_failure(table.path.clone());
                    }
                    processed += batch.len();
                    continue;
                }
            };

            let mut entries = Vec::with_capacity(tables.len());
            let mut encode_failed = Vec::new();
            for table in &tables {
                match table.to_bytes() {
                    Ok(bytes) => entries.push(Entry::new(table.key().encode(), bytes)),
                    Err(e) => {
                        tracing::warn!(path = %table.path, "serialize failed: {e}");
                        encode_failed.push(table.path.clone());
                    }
                }
            }
            for path in &encode_failed {
                metrics.record_failure(path.clone());
            }

            let persisted = entries.len();
            if let Err(e) = self.store.batch_save(&project.uuid, entries) {
                tracing::warn!("batch save failed: {e}");
                for table in &tables {
                    if !encode_failed.contains(&table.path) {
                        metrics.record_failure(table.path.clone());
                    }
                }
            } else {
                metrics.total_files += persisted;
                metrics.absorb_symbols(&symbol_metrics);
            }

            processed += batch.len();
            self.meta
                .update_codegraph_info(label, previous + processed, BuildState::Building)?;
        }

        cache.flush(&self.store, &project.uuid)?;
        drop(cache);

        if metrics.total_files > 0 {
            self.invalidate_callee_index(&project.uuid)?;
        }
        Ok(metrics)
    }

    fn parse_file(
        &self,
        parsers: &mut HashMap<Language, Box<dyn SourceParser>>,
        file: &SourceFile,
    ) -> IndexResult<FileElementTable> {
        let content =
            std::fs::read_to_string(&file.absolute_path).map_err(|e| IndexError::FileRead {
                path: file.absolute_path.clone(),
                source: e,
            })?;
        let parser = match parsers.entry(file.language) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(self.factory.create(file.language)?)
            }
        };
        let parsed = parser.parse(&content);
        let mut table = FileElementTable {
            path: keys::normalize_separators(&file.relative_path),
            language: file.language,
            timestamp: file.mtime,
            imports: parsed.imports,
            elements: parsed.elements,
        };
        table.strip_invalid();
        table.imports = self
            .analyzer
            .preprocess_imports(file.language, table.imports);
        Ok(table)
    }

    /// Index specific files. A project with no index yet is indexed whole.
    pub fn index_files(
        &self,
        workspace: &Path,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> IndexResult<IndexMetrics> {
        let label = workspace_label(workspace);
        let projects = self.walker.discover_projects(workspace)?;
        let mut metrics = IndexMetrics::new();

        for project in &projects {
            let requested = self.resolve_within(workspace, &project.root_path, paths);
            if requested.is_empty() {
                continue;
            }
            if !self.store.project_index_exists(&project.uuid)? {
                metrics.merge(self.index_project(&label, project, cancel)?);
                continue;
            }

            let mut work = Vec::new();
            for rel in requested {
                let absolute = project.root_path.join(&rel);
                let Some(language) = Language::from_path(&absolute) else {
                    tracing::debug!(path = %rel, "unsupported file skipped");
                    continue;
                };
                if !absolute.is_file() {
                    continue;
                }
                work.push(SourceFile {
                    relative_path: rel,
                    mtime: file_mtime(&absolute).unwrap_or(0),
                    absolute_path: absolute,
                    language,
                });
            }
            metrics.merge(self.process_batches(&label, project, &work, cancel)?);
        }
        Ok(metrics)
    }

    /// Remove the records of files or directories from the graph.
    ///
    /// Occurrence cleanup runs before the `@path` deletes so a concurrent
    /// query can never observe an occurrence whose table is already gone.
    pub fn remove_indexes(
        &self,
        workspace: &Path,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> IndexResult<()> {
        let label = workspace_label(workspace);
        for project in self.projects_or_fallback(workspace) {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            let targets = self.resolve_within(workspace, &project.root_path, paths);
            if targets.is_empty() {
                continue;
            }
            let collected = self.collect_tables(&project.uuid, &targets)?;
            if collected.is_empty() {
                continue;
            }

            let deleted_paths: HashSet<String> =
                collected.iter().map(|(_, t)| t.path.clone()).collect();

            for (_, table) in &collected {
                for element in table.definitions() {
                    let key = GraphKey::symbol(table.language, &element.name).encode();
                    let Some(bytes) = self.store.get(&project.uuid, &key)? else {
                        continue;
                    };
                    let mut record = decode(&key, &bytes, SymbolOccurrence::from_bytes)?;
                    if record.remove_paths(&deleted_paths) {
                        if record.is_empty() {
                            self.store.delete(&project.uuid, &key)?;
                        } else {
                            self.store.put(&project.uuid, &key, &record.to_bytes()?)?;
                        }
                    }
                }
            }

            for (key, _) in &collected {
                self.store.delete(&project.uuid, key)?;
            }
            self.invalidate_callee_index(&project.uuid)?;
            tracing::info!(project = %project.uuid, removed = collected.len(), "indexes removed");
        }

        self.symbol_cache.lock().clear();
        let total = self.get_summary(workspace).unwrap_or(0);
        self.meta
            .update_codegraph_info(&label, total, BuildState::Success)?;
        Ok(())
    }

    /// Drop every record of every project in the workspace.
    pub fn remove_all_indexes(&self, workspace: &Path) -> IndexResult<()> {
        let label = workspace_label(workspace);
        for project in self.projects_or_fallback(workspace) {
            self.store.delete_all(&project.uuid)?;
        }
        self.symbol_cache.lock().clear();
        self.meta
            .update_codegraph_info(&label, 0, BuildState::Success)?;
        Ok(())
    }

    /// Rewrite records after a file or directory rename. Does not reparse.
    pub fn rename_indexes(
        &self,
        workspace: &Path,
        old_path: &Path,
        new_path: &Path,
        cancel: &CancellationToken,
    ) -> IndexResult<()> {
        for project in self.projects_or_fallback(workspace) {
            let Some(old_rel) = self.relative_of(workspace, &project.root_path, old_path) else {
                continue;
            };
            let Some(new_rel) = self.relative_of(workspace, &project.root_path, new_path) else {
                continue;
            };
            let collected = self.collect_tables(&project.uuid, std::slice::from_ref(&old_rel))?;
            if collected.is_empty() {
                continue;
            }

            for (old_key, mut table) in collected {
                if cancel.is_cancelled() {
                    return Err(IndexError::Cancelled);
                }
                let suffix = table.path[old_rel.len()..].to_string();
                let renamed = format!("{new_rel}{suffix}");
                let old_language = table.language;
                let old_file = table.path.clone();
                let new_language =
                    Language::from_path(Path::new(&renamed)).unwrap_or(old_language);

                self.store.delete(&project.uuid, &old_key)?;
                table.path = renamed.clone();
                table.language = new_language;
                self.store
                    .put(&project.uuid, &table.key().encode(), &table.to_bytes()?)?;

                for element in table.definitions() {
                    if old_language == new_language {
                        let key = GraphKey::symbol(old_language, &element.name).encode();
                        let Some(bytes) = self.store.get(&project.uuid, &key)? else {
                            continue;
                        };
                        let mut record = decode(&key, &bytes, SymbolOccurrence::from_bytes)?;
                        if record.rename_path(&old_file, &renamed) {
                            self.store.put(&project.uuid, &key, &record.to_bytes()?)?;
                        }
                    } else {
                        // Language changed: move the occurrence between the
                        // per-language records, delete side first.
                        let old_key = GraphKey::symbol(old_language, &element.name).encode();
                        if let Some(bytes) = self.store.get(&project.uuid, &old_key)? {
                            let mut record = decode(&old_key, &bytes, SymbolOccurrence::from_bytes)?;
                            let gone: HashSet<String> = [old_file.clone()].into_iter().collect();
                            if record.remove_paths(&gone) {
                                if record.is_empty() {
                                    self.store.delete(&project.uuid, &old_key)?;
                                } else {
                                    self.store
                                        .put(&project.uuid, &old_key, &record.to_bytes()?)?;
                                }
                            }
                        }
                        let new_key = GraphKey::symbol(new_language, &element.name).encode();
                        let mut record = match self.store.get(&project.uuid, &new_key)? {
                            Some(bytes) => decode(&new_key, &bytes, SymbolOccurrence::from_bytes)?,
                            None => SymbolOccurrence::new(&element.name, new_language),
                        };
                        record.upsert(crate::storage::Occurrence {
                            path: renamed.clone(),
                            range: element.range,
                            element_type: element.element_type,
                        });
                        self.store
                            .put(&project.uuid, &new_key, &record.to_bytes()?)?;
                    }
                }
            }
            self.invalidate_callee_index(&project.uuid)?;
        }
        self.symbol_cache.lock().clear();
        Ok(())
    }

    /// Total number of indexed files across the workspace's projects.
    pub fn get_summary(&self, workspace: &Path) -> IndexResult<usize> {
        let mut total = 0;
        for project in self.projects_or_fallback(workspace) {
            total += self
                .store
                .size(&project.uuid, Some(keys::PATH_PREFIX.as_bytes()))?;
        }
        Ok(total)
    }

    /// Gather `(key, table)` pairs for the given relative paths, falling back
    /// to a prefix scan so directory paths and language-less lookups work.
    fn collect_tables(
        &self,
        project: &ProjectUuid,
        targets: &[String],
    ) -> IndexResult<Vec<(Vec<u8>, FileElementTable)>> {
        let mut collected: Vec<(Vec<u8>, FileElementTable)> = Vec::new();
        let mut matched: HashSet<String> = HashSet::new();
        let mut scan_targets: Vec<&String> = Vec::new();

        for target in targets {
            let exact = Language::from_path(Path::new(target)).and_then(|language| {
                let key = GraphKey::path(language, target.clone()).encode();
                self.store.get(project, &key).ok().flatten().map(|bytes| {
                    decode(&key, &bytes, FileElementTable::from_bytes).map(|t| (key, t))
                })
            });
            match exact {
                Some(Ok((key, table))) => {
                    matched.insert(table.path.clone());
                    collected.push((key, table));
                }
                Some(Err(e)) => return Err(e.into()),
                None => scan_targets.push(target),
            }
        }

        if !scan_targets.is_empty() {
            let sep = std::path::MAIN_SEPARATOR;
            for item in self.store.scan_prefix(project, keys::PATH_PREFIX.as_bytes())? {
                let (key, value) = item.map_err(crate::storage::StorageError::from)?;
                let Ok(GraphKey::Path { path, .. }) = GraphKey::parse(&key) else {
                    continue;
                };
                if matched.contains(&path) {
                    continue;
                }
                let hit = scan_targets.iter().any(|target| {
                    path == **target
                        || path.starts_with(&format!("{}{sep}", target.trim_end_matches(sep)))
                });
                if hit {
                    let table = decode(&key, &value, FileElementTable::from_bytes)?;
                    matched.insert(path);
                    collected.push((key.to_vec(), table));
                }
            }
        }
        Ok(collected)
    }

    fn invalidate_callee_index(&self, project: &ProjectUuid) -> IndexResult<()> {
        self.store
            .delete_all_with_prefix(project, keys::CALLEE_PREFIX.as_bytes())?;
        self.store
            .delete(project, &GraphKey::meta(META_CALLGRAPH_BUILT).encode())?;
        Ok(())
    }

    fn projects_or_fallback(&self, workspace: &Path) -> Vec<Project> {
        match self.walker.discover_projects(workspace) {
            Ok(projects) => projects,
            // Deleted workspaces still need their records addressable.
            Err(_) => vec![Project::new(workspace.to_path_buf(), Vec::new())],
        }
    }

    /// Normalize requested paths to project-relative strings.
    fn resolve_within(
        &self,
        workspace: &Path,
        project_root: &Path,
        paths: &[PathBuf],
    ) -> Vec<String> {
        paths
            .iter()
            .filter_map(|p| self.relative_of(workspace, project_root, p))
            .collect()
    }

    fn relative_of(
        &self,
        workspace: &Path,
        project_root: &Path,
        path: &Path,
    ) -> Option<String> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            workspace.join(path)
        };
        let relative = absolute.strip_prefix(project_root).ok()?;
        let text = relative.to_string_lossy();
        if text.is_empty() {
            return None;
        }
        let sep = std::path::MAIN_SEPARATOR;
        Some(
            keys::normalize_separators(&text)
                .trim_end_matches(sep)
                .to_string(),
        )
    }
}

pub(crate) fn workspace_label(workspace: &Path) -> String {
    workspace
        .canonicalize()
        .unwrap_or_else(|_| workspace.to_path_buf())
        .to_string_lossy()
        .into_owned()
}
