//! Definition lookup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, IndexResult};
use crate::query::{Definition, DefinitionQuery, QueryEngine, QueryTarget, in_window, to_external};
use crate::types::Import;

impl QueryEngine {
    /// Resolve the definitions visible from a file region or a code snippet.
    ///
    /// With a snippet: parse it in isolation, collect the identifiers it
    /// references and its imports, and look every name up in the symbol
    /// index. Without one: walk the elements in the requested line window,
    /// emitting definitions directly and resolving uses through the symbol
    /// index filtered by the file's imports.
    pub fn query_definitions(
        &self,
        workspace: &Path,
        query: &DefinitionQuery,
    ) -> IndexResult<Vec<Definition>> {
        let target = self.prepare(workspace, &query.file_path)?;

        if let Some(snippet) = query.code_snippet.as_deref() {
            if snippet.trim().is_empty() {
                return Err(IndexError::MissingParam {
                    name: "code_snippet",
                });
            }
            return self.definitions_from_snippet(&target, snippet);
        }
        if query.start_line.is_none() && query.end_line.is_none() {
            return Err(IndexError::MissingParam {
                name: "start_line or code_snippet",
            });
        }
        self.definitions_from_range(&target, query)
    }

    fn definitions_from_snippet(
        &self,
        target: &QueryTarget,
        snippet: &str,
    ) -> IndexResult<Vec<Definition>> {
        // Oversized snippets are truncated, not rejected.
        let max_lines = self.settings.max_read_line;
        let truncated: String = if snippet.lines().count() > max_lines {
            snippet
                .lines()
                .take(max_lines)
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            snippet.to_string()
        };

        let mut parser = self.factory.create(target.language)?;
        let parsed = parser.parse(&truncated);
        let imports = self
            .analyzer
            .preprocess_imports(target.language, parsed.imports);

        let mut names: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for element in parsed.elements.iter().filter(|e| e.is_use()) {
            if seen.insert(element.name.clone()) {
                names.push(element.name.clone());
            }
        }

        self.search_symbol_names(target, &names, &imports)
    }

    /// Look up each name in the symbol index, keeping occurrences reachable
    /// through the given imports.
    pub(crate) fn search_symbol_names(
        &self,
        target: &QueryTarget,
        names: &[String],
        imports: &[Import],
    ) -> IndexResult<Vec<Definition>> {
        let mut out = Vec::new();
        let mut emitted = HashSet::new();
        for name in names {
            let Some(record) = self.load_symbol(target, name)? else {
                continue;
            };
            let occurrences = self.analyzer.filter_by_imports(
                target.language,
                &target.relative_path,
                imports,
                record.occurrences,
            );
            for occ in occurrences {
                if emitted.insert((record.name.clone(), occ.path.clone(), occ.range.start_line)) {
                    out.push(Definition {
                        name: record.name.clone(),
                        element_type: occ.element_type,
                        path: occ.path,
                        range: to_external(occ.range),
                    });
                }
            }
        }
        Ok(out)
    }

    fn definitions_from_range(
        &self,
        target: &QueryTarget,
        query: &DefinitionQuery,
    ) -> IndexResult<Vec<Definition>> {
        let table = self.load_table(target)?.ok_or_else(|| IndexError::IndexNotFound {
            path: PathBuf::from(&query.file_path),
        })?;
        let (start, end) = self.clamp_range(query.start_line, query.end_line);

        let mut out = Vec::new();
        let mut emitted = HashSet::new();
        for element in &table.elements {
            if !in_window(&element.range, start, end) {
                continue;
            }
            if element.is_definition {
                if emitted.insert((
                    element.name.clone(),
                    table.path.clone(),
                    element.range.start_line,
                )) {
                    out.push(Definition {
                        name: element.name.clone(),
                        element_type: element.element_type,
                        path: table.path.clone(),
                        range: to_external(element.range),
                    });
                }
                continue;
            }
            if !element.is_use() {
                continue;
            }
            let Some(record) = self.load_symbol(target, &element.name)? else {
                continue;
            };
            let occurrences = self.analyzer.filter_by_imports(
                target.language,
                &table.path,
                &table.imports,
                record.occurrences,
            );
            for occ in occurrences {
                if emitted.insert((record.name.clone(), occ.path.clone(), occ.range.start_line)) {
                    out.push(Definition {
                        name: record.name.clone(),
                        element_type: occ.element_type,
                        path: occ.path,
                        range: to_external(occ.range),
                    });
                }
            }
        }
        Ok(out)
    }
}
