//! Call-graph construction.
//!
//! The reverse call index maps `(called name, arity)` to the scored
//! definition sites such calls resolve to. It is built lazily on the first
//! call-graph query after a mutation: one pass over every element table,
//! buffered through a bounded cache that merges into the persisted
//! `@callee:` records on eviction. While the `callgraph_built` flag is set,
//! later queries skip the scan and read the persisted records directly.
//!
//! BFS then expands downward from the seed definitions: a node's children
//! are the resolved targets of the calls inside its body, capped per node,
//! deduplicated globally on `(name, file path)` to break cycles.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::analyzer::CalleeMapCache;
use crate::error::{IndexError, IndexResult};
use crate::parsing::Language;
use crate::query::{
    CallGraphQuery, QueryEngine, QueryTarget, RelationNode, contained_in_window, to_external,
};
use crate::storage::records::decode;
use crate::storage::{
    CalleeMapItem, CalleeTarget, FileElementTable, GraphKey, SymbolOccurrence, keys,
    META_CALLGRAPH_BUILT,
};
use crate::types::{Element, ElementType, Range};

/// Node data kept flat during BFS; trees are assembled at the end.
struct ArenaNode {
    name: String,
    element_type: ElementType,
    path: String,
    range: Range,
    children: Vec<usize>,
}

impl QueryEngine {
    /// Build the call tree below the function or method definitions matching
    /// the query.
    pub fn query_call_graph(
        &self,
        workspace: &Path,
        query: &CallGraphQuery,
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

        let seeds: Vec<&Element> = table
            .elements
            .iter()
            .filter(|e| e.is_definition && e.element_type.is_callable())
            .filter(|e| match by_name {
                Some(name) => e.name == name,
                None => contained_in_window(&e.range, start, end),
            })
            .collect();
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let max_layer = query.max_layer.unwrap_or(self.settings.max_layer).max(1);
        let mut cache = CalleeMapCache::new(self.settings.callee_cache_capacity);
        self.ensure_reverse_index(&target, &mut cache, cancel)?;

        let mut arena: Vec<ArenaNode> = Vec::new();
        let mut visited: HashSet<(String, String)> = HashSet::new();
        let mut tables: HashMap<String, Option<FileElementTable>> = HashMap::new();
        let mut symbols: HashMap<String, Option<SymbolOccurrence>> = HashMap::new();
        tables.insert(table.path.clone(), Some(table.clone()));

        let mut frontier: Vec<usize> = Vec::new();
        for seed in seeds {
            if visited.insert((seed.name.clone(), table.path.clone())) {
                arena.push(ArenaNode {
                    name: seed.name.clone(),
                    element_type: seed.element_type,
                    path: table.path.clone(),
                    range: seed.range,
                    children: Vec::new(),
                });
                frontier.push(arena.len() - 1);
            }
        }
        let roots: Vec<usize> = frontier.clone();

        for _layer in 0..max_layer {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            if frontier.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for index in frontier {
                let (node_name, node_path, node_range) = {
                    let node = &arena[index];
                    (node.name.clone(), node.path.clone(), node.range)
                };
                let calls = self.body_calls(&target, &mut tables, &node_name, &node_path, node_range)?;
                let mut children = Vec::new();

                for call in calls {
                    if children.len() >= self.settings.top_n {
                        break;
                    }
                    let mut targets = match cache.get(
                        &self.store,
                        &target.project.uuid,
                        &call.name,
                        call.arity(),
                    )? {
                        Some(item) => item.targets,
                        None => {
                            // Cold pair: resolve now and keep for next time.
                            let resolved = self.resolve_call_targets(
                                &target,
                                &node_path,
                                &call,
                            )?;
                            if !resolved.targets.is_empty() {
                                cache.merge(
                                    &self.store,
                                    &target.project.uuid,
                                    resolved.clone(),
                                )?;
                            }
                            resolved.targets
                        }
                    };
                    targets.sort_by(|a, b| {
                        b.score
                            .partial_cmp(&a.score)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    });

                    for t in targets {
                        if children.len() >= self.settings.top_n {
                            break;
                        }
                        if !visited.insert((t.symbol_name.clone(), t.file_path.clone())) {
                            continue;
                        }
                        let element_type = self.occurrence_type(&target, &mut symbols, &t);
                        arena.push(ArenaNode {
                            name: t.symbol_name.clone(),
                            element_type,
                            path: t.file_path.clone(),
                            range: t.position,
                            children: Vec::new(),
                        });
                        let child = arena.len() - 1;
                        children.push(child);
                        next.push(child);
                    }
                }
                arena[index].children = children;
            }
            frontier = next;
        }

        cache.flush(&self.store, &target.project.uuid)?;
        Ok(roots.into_iter().map(|r| assemble(&arena, r)).collect())
    }

    /// Build and persist the reverse call index unless it is already marked
    /// built. Any mutation clears the flag and the records.
    fn ensure_reverse_index(
        &self,
        target: &QueryTarget,
        cache: &mut CalleeMapCache,
        cancel: &CancellationToken,
    ) -> IndexResult<()> {
        let flag_key = GraphKey::meta(META_CALLGRAPH_BUILT).encode();
        if self.store.exists(&target.project.uuid, &flag_key)? {
            return Ok(());
        }
        tracing::debug!(project = %target.project.uuid, "building reverse call index");

        for item in self
            .store
            .scan_prefix(&target.project.uuid, keys::PATH_PREFIX.as_bytes())?
        {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            let (key, value) = item.map_err(crate::storage::StorageError::from)?;
            let table = decode(&key, &value, FileElementTable::from_bytes)?;

            for def in table
                .elements
                .iter()
                .filter(|e| e.is_definition && e.element_type.is_callable())
            {
                for call in calls_in_body(&table, def) {
                    let resolved =
                        self.resolve_targets_for(&target, &table, &call.name, call.arity())?;
                    if !resolved.targets.is_empty() {
                        cache.merge(&self.store, &target.project.uuid, resolved)?;
                    }
                }
            }
        }

        cache.flush(&self.store, &target.project.uuid)?;
        self.store.put(&target.project.uuid, &flag_key, b"1")?;
        Ok(())
    }

    /// The call elements inside the body of the named definition.
    fn body_calls(
        &self,
        target: &QueryTarget,
        tables: &mut HashMap<String, Option<FileElementTable>>,
        name: &str,
        path: &str,
        range: Range,
    ) -> IndexResult<Vec<Element>> {
        if !tables.contains_key(path) {
            let language = Language::from_path(Path::new(path)).unwrap_or(target.language);
            let loaded = self.load_table_at(target, language, path)?;
            tables.insert(path.to_string(), loaded);
        }
        let Some(Some(table)) = tables.get(path) else {
            return Ok(Vec::new());
        };
        let def = table.elements.iter().find(|e| {
            e.is_definition
                && e.element_type.is_callable()
                && e.name == name
                && e.range.start_line == range.start_line
        });
        let Some(def) = def else {
            return Ok(Vec::new());
        };
        Ok(calls_in_body(table, def))
    }

    fn resolve_call_targets(
        &self,
        target: &QueryTarget,
        caller_path: &str,
        call: &Element,
    ) -> IndexResult<CalleeMapItem> {
        let language = Language::from_path(Path::new(caller_path)).unwrap_or(target.language);
        let caller_table = self.load_table_at(target, language, caller_path)?;
        match caller_table {
            Some(table) => self.resolve_targets_for(target, &table, &call.name, call.arity()),
            None => Ok(CalleeMapItem::new(&call.name, call.arity())),
        }
    }

    /// Resolve a `(name, arity)` call observed in `caller` to its scored
    /// candidate definitions.
    fn resolve_targets_for(
        &self,
        target: &QueryTarget,
        caller: &FileElementTable,
        name: &str,
        arity: u32,
    ) -> IndexResult<CalleeMapItem> {
        let mut item = CalleeMapItem::new(name, arity);
        let key = GraphKey::symbol(caller.language, name).encode();
        let Some(bytes) = self.store.get(&target.project.uuid, &key)? else {
            return Ok(item);
        };
        let record = decode(&key, &bytes, SymbolOccurrence::from_bytes)?;
        let callable: Vec<_> = record
            .occurrences
            .into_iter()
            .filter(|o| o.element_type.is_callable())
            .collect();
        let filtered = self.analyzer.filter_by_imports(
            caller.language,
            &caller.path,
            &caller.imports,
            callable,
        );
        for occ in filtered {
            let score = self.analyzer.symbol_match_score(
                caller.language,
                &caller.imports,
                &caller.path,
                &occ.path,
            );
            item.targets.push(CalleeTarget {
                symbol_name: name.to_string(),
                file_path: occ.path,
                position: occ.range,
                param_count: arity,
                score,
            });
        }
        Ok(item)
    }

    /// Element type of a resolved target, read from the symbol index.
    fn occurrence_type(
        &self,
        target: &QueryTarget,
        symbols: &mut HashMap<String, Option<SymbolOccurrence>>,
        t: &CalleeTarget,
    ) -> ElementType {
        let record = symbols
            .entry(t.symbol_name.clone())
            .or_insert_with(|| self.load_symbol(target, &t.symbol_name).ok().flatten());
        record
            .as_ref()
            .and_then(|r| {
                r.occurrences
                    .iter()
                    .find(|o| o.path == t.file_path && o.range.start_line == t.position.start_line)
                    .map(|o| o.element_type)
            })
            .unwrap_or(ElementType::Function)
    }
}

/// Calls inside a definition's body range. Multi-line bodies exclude the
/// signature and closing line; single-line definitions keep the whole range.
fn calls_in_body(table: &FileElementTable, def: &Element) -> Vec<Element> {
    let (lo, hi) = if def.range.end_line > def.range.start_line + 1 {
        (def.range.start_line + 1, def.range.end_line - 1)
    } else {
        (def.range.start_line, def.range.end_line)
    };
    table
        .elements
        .iter()
        .filter(|e| {
            e.is_use()
                && e.element_type == ElementType::Call
                && e.range.start_line >= lo
                && e.range.start_line <= hi
        })
        .cloned()
        .collect()
}

fn assemble(arena: &[ArenaNode], index: usize) -> RelationNode {
    let node = &arena[index];
    RelationNode {
        name: node.name.clone(),
        element_type: node.element_type,
        path: node.path.clone(),
        range: to_external(node.range),
        children: node
            .children
            .iter()
            .map(|&child| assemble(arena, child))
            .collect(),
    }
}
