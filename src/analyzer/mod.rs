//! Cross-file resolution glue.
//!
//! The analyzer sits between per-file parse results and the persisted graph:
//! it normalizes and filters imports, maintains the project-wide symbol-name
//! index, and scores candidate matches when a name resolves to several
//! definitions.

pub mod cache;

pub use cache::{CalleeMapCache, SymbolOccurrenceCache};

use std::collections::HashSet;

use crate::parsing::Language;
use crate::storage::{FileElementTable, GraphStore, Occurrence, ProjectUuid, StorageResult};
use crate::types::{ElementType, Import};

/// Counters reported by [`DependencyAnalyzer::save_symbol_occurrences`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymbolMetrics {
    pub total_symbols: usize,
    pub total_saved_symbols: usize,
    pub total_variables: usize,
    pub total_saved_variables: usize,
}

#[derive(Debug, Default, Clone)]
pub struct DependencyAnalyzer;

impl DependencyAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize and filter a file's imports before persistence.
    ///
    /// Separators are normalized, imports that cannot plausibly target
    /// project-local code are dropped (per-language policy), and duplicates
    /// on `(name, source)` collapse to the first occurrence. No filesystem
    /// access happens here.
    pub fn preprocess_imports(&self, language: Language, imports: Vec<Import>) -> Vec<Import> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut out = Vec::with_capacity(imports.len());
        for mut import in imports {
            import.source = match language {
                Language::Go | Language::JavaScript | Language::TypeScript => {
                    import.source.replace('\\', "/")
                }
                _ => import.source,
            };
            if !self.is_plausibly_local(language, &import) {
                tracing::debug!(source = %import.source, "dropping non-local import");
                continue;
            }
            if seen.insert((import.name.clone(), import.source.clone())) {
                out.push(import);
            }
        }
        out
    }

    fn is_plausibly_local(&self, language: Language, import: &Import) -> bool {
        let source = import.source.as_str();
        if source.is_empty() {
            return false;
        }
        match language {
            // Single-segment paths are standard-library packages; anything
            // qualified may be this module (indistinguishable from
            // third-party without go.mod, so kept).
            Language::Go => source.contains('/'),
            Language::Rust => {
                source == "crate"
                    || source == "self"
                    || source == "super"
                    || source.starts_with("crate::")
                    || source.starts_with("self::")
                    || source.starts_with("super::")
            }
            // Relative modules are local; dotted absolute ones may be.
            Language::Python => source.starts_with('.') || source.contains('.'),
            // Bare specifiers resolve into node_modules.
            Language::JavaScript | Language::TypeScript => {
                source.starts_with("./") || source.starts_with("../") || source.starts_with('/')
            }
            Language::Java => {
                !source.starts_with("java.") && !source.starts_with("javax.")
            }
        }
    }

    /// Upsert the symbol-name index for every definition in `tables`.
    ///
    /// Goes through the write-coalescing cache; malformed elements are
    /// skipped, never fatal.
    pub fn save_symbol_occurrences(
        &self,
        store: &GraphStore,
        project: &ProjectUuid,
        tables: &[FileElementTable],
        cache: &mut SymbolOccurrenceCache,
    ) -> StorageResult<SymbolMetrics> {
        let mut metrics = SymbolMetrics::default();
        for table in tables {
            for element in table.definitions() {
                let is_variable = element.element_type == ElementType::Variable;
                if is_variable {
                    metrics.total_variables += 1;
                } else {
                    metrics.total_symbols += 1;
                }
                if !element.is_valid() {
                    tracing::debug!(path = %table.path, "skipping malformed element");
                    continue;
                }
                cache.upsert(
                    store,
                    project,
                    table.language,
                    &element.name,
                    Occurrence {
                        path: table.path.clone(),
                        range: element.range,
                        element_type: element.element_type,
                    },
                )?;
                if is_variable {
                    metrics.total_saved_variables += 1;
                } else {
                    metrics.total_saved_symbols += 1;
                }
            }
        }
        Ok(metrics)
    }

    /// Keep candidates reachable through at least one import of the current
    /// file (or defined in the file itself). When the filter would discard
    /// everything, the full input is returned: wrong import heuristics must
    /// not cost recall.
    pub fn filter_by_imports(
        &self,
        language: Language,
        current_path: &str,
        imports: &[Import],
        candidates: Vec<Occurrence>,
    ) -> Vec<Occurrence> {
        if candidates.is_empty() {
            return candidates;
        }
        let filtered: Vec<Occurrence> = candidates
            .iter()
            .filter(|occ| {
                occ.path == current_path
                    || imports
                        .iter()
                        .any(|import| self.is_file_path_in_import_package(language, &occ.path, import))
            })
            .cloned()
            .collect();
        if filtered.is_empty() {
            return candidates;
        }
        filtered
    }

    /// Language-specific test: could `file_path` be the file an import
    /// statement brings into scope?
    pub fn is_file_path_in_import_package(
        &self,
        language: Language,
        file_path: &str,
        import: &Import,
    ) -> bool {
        let file = file_path.replace('\\', "/");
        let stem = file_stem(&file);

        // Importing a name that matches the file stem is a match in every
        // language (e.g. `import util` vs `util.py`).
        if !import.name.is_empty() && import.name != "*" && stem == import.name {
            return true;
        }

        match language {
            Language::Go => {
                let dir = parent_dir(&file);
                segments_overlap(&split_segments(dir, '/'), &split_segments(&import.source, '/'))
            }
            Language::Java => {
                let dotted = import.source.replace('.', "/");
                if import.name == "*" {
                    path_has_suffix(parent_dir(&file), &dotted)
                } else {
                    path_has_suffix(strip_extension(&file), &dotted)
                }
            }
            Language::Python => {
                let module = import.source.trim_start_matches('.').replace('.', "/");
                if module.is_empty() {
                    // Purely relative import: same directory.
                    return true;
                }
                let noext = strip_extension(&file);
                let noinit = noext.strip_suffix("/__init__").unwrap_or(noext);
                path_has_suffix(noinit, &module)
                    || path_has_suffix(parent_dir(&file), &module)
                    || path_has_suffix(noinit, &format!("{module}/{}", import.name))
            }
            Language::Rust => {
                let trimmed = import
                    .source
                    .trim_start_matches("crate::")
                    .trim_start_matches("self::")
                    .trim_start_matches("super::");
                let path = trimmed.replace("::", "/");
                let noext = strip_extension(&file);
                let nomod = noext.strip_suffix("/mod").unwrap_or(noext);
                if path_has_suffix(nomod, &path) {
                    return true;
                }
                // The last segment is usually an item, not a file.
                match path.rsplit_once('/') {
                    Some((parent, _)) => !parent.is_empty() && path_has_suffix(nomod, parent),
                    None => false,
                }
            }
            Language::JavaScript | Language::TypeScript => {
                let cleaned: Vec<&str> = import
                    .source
                    .split('/')
                    .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
                    .collect();
                if cleaned.is_empty() {
                    return true;
                }
                let joined = cleaned.join("/");
                let noext = strip_extension(&file);
                let noindex = noext.strip_suffix("/index").unwrap_or(noext);
                path_has_suffix(noindex, &joined)
            }
        }
    }

    /// Rank a candidate definition for a name used in `caller_file`.
    ///
    /// Only the ordering matters: same file beats same directory beats
    /// import-reachable beats anything else in the workspace.
    pub fn symbol_match_score(
        &self,
        language: Language,
        imports: &[Import],
        caller_file: &str,
        callee_file: &str,
    ) -> f64 {
        let caller = caller_file.replace('\\', "/");
        let callee = callee_file.replace('\\', "/");
        if caller == callee {
            return 10.0;
        }
        if parent_dir(&caller) == parent_dir(&callee) {
            return 8.0;
        }
        if imports
            .iter()
            .any(|import| self.is_file_path_in_import_package(language, &callee, import))
        {
            return 6.0;
        }
        let top = |p: &str| p.split('/').next().unwrap_or("").to_string();
        if !parent_dir(&caller).is_empty() && top(&caller) == top(&callee) {
            return 4.0;
        }
        1.0
    }
}

fn parent_dir(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    }
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    }
}

fn strip_extension(path: &str) -> &str {
    match path.rsplit_once('.') {
        Some((before, ext)) if !ext.contains('/') => before,
        _ => path,
    }
}

fn split_segments(path: &str, sep: char) -> Vec<&str> {
    path.split(sep).filter(|s| !s.is_empty()).collect()
}

/// Whether `path` ends with the full segment sequence `suffix`.
fn path_has_suffix(path: &str, suffix: &str) -> bool {
    let path_segs = split_segments(path, '/');
    let suffix_segs = split_segments(suffix, '/');
    if suffix_segs.is_empty() || suffix_segs.len() > path_segs.len() {
        return false;
    }
    path_segs[path_segs.len() - suffix_segs.len()..] == suffix_segs[..]
}

/// Whether the shorter segment list is a suffix of the longer one; used for
/// package-directory matching where only the tail of an import path exists
/// on disk.
fn segments_overlap(a: &[&str], b: &[&str]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let n = a.len().min(b.len());
    a[a.len() - n..] == b[b.len() - n..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Range;

    fn import(name: &str, source: &str) -> Import {
        Import::new(name, source, Range::default())
    }

    fn occurrence(path: &str) -> Occurrence {
        Occurrence {
            path: path.to_string(),
            range: Range::default(),
            element_type: ElementType::Function,
        }
    }

    #[test]
    fn test_preprocess_drops_stdlib_go_imports() {
        let analyzer = DependencyAnalyzer::new();
        let imports = vec![
            import("fmt", "fmt"),
            import("util", "example.com/app/util"),
            import("util", "example.com/app/util"),
        ];
        let out = analyzer.preprocess_imports(Language::Go, imports);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "example.com/app/util");
    }

    #[test]
    fn test_preprocess_keeps_relative_js_imports() {
        let analyzer = DependencyAnalyzer::new();
        let imports = vec![
            import("react", "react"),
            import("helper", "./lib/helper"),
            import("other", "..\\lib\\other"),
        ];
        let out = analyzer.preprocess_imports(Language::JavaScript, imports);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].source, "../lib/other");
    }

    #[test]
    fn test_preprocess_rust_crate_paths_only() {
        let analyzer = DependencyAnalyzer::new();
        let imports = vec![
            import("HashMap", "std::collections::HashMap"),
            import("Element", "crate::types::Element"),
        ];
        let out = analyzer.preprocess_imports(Language::Rust, imports);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Element");
    }

    #[test]
    fn test_go_package_matching() {
        let analyzer = DependencyAnalyzer::new();
        let i = import("util", "example.com/app/util");
        assert!(analyzer.is_file_path_in_import_package(Language::Go, "util/strings.go", &i));
        assert!(analyzer.is_file_path_in_import_package(
            Language::Go,
            "app/util/strings.go",
            &i
        ));
        assert!(!analyzer.is_file_path_in_import_package(Language::Go, "web/server.go", &i));
    }

    #[test]
    fn test_java_dotted_matching() {
        let analyzer = DependencyAnalyzer::new();
        let i = import("Helper", "com.example.util.Helper");
        assert!(analyzer.is_file_path_in_import_package(
            Language::Java,
            "src/com/example/util/Helper.java",
            &i
        ));
        assert!(!analyzer.is_file_path_in_import_package(
            Language::Java,
            "src/com/example/web/Server.java",
            &i
        ));

        let wildcard = import("*", "com.example.util");
        assert!(analyzer.is_file_path_in_import_package(
            Language::Java,
            "src/com/example/util/Other.java",
            &wildcard
        ));
    }

    #[test]
    fn test_python_module_matching() {
        let analyzer = DependencyAnalyzer::new();
        let i = import("Store", "app.storage");
        assert!(analyzer.is_file_path_in_import_package(
            Language::Python,
            "app/storage.py",
            &i
        ));
        assert!(analyzer.is_file_path_in_import_package(
            Language::Python,
            "app/storage/__init__.py",
            &i
        ));
        assert!(!analyzer.is_file_path_in_import_package(Language::Python, "app/web.py", &i));
    }

    #[test]
    fn test_rust_use_matching() {
        let analyzer = DependencyAnalyzer::new();
        let i = import("Element", "crate::types::Element");
        assert!(analyzer.is_file_path_in_import_package(Language::Rust, "src/types.rs", &i));
        assert!(analyzer.is_file_path_in_import_package(Language::Rust, "src/types/mod.rs", &i));
        assert!(!analyzer.is_file_path_in_import_package(Language::Rust, "src/query.rs", &i));
    }

    #[test]
    fn test_ts_relative_matching() {
        let analyzer = DependencyAnalyzer::new();
        let i = import("helper", "./lib/helper");
        assert!(analyzer.is_file_path_in_import_package(
            Language::TypeScript,
            "src/lib/helper.ts",
            &i
        ));
        assert!(analyzer.is_file_path_in_import_package(
            Language::TypeScript,
            "src/lib/helper/index.ts",
            &i
        ));
        assert!(!analyzer.is_file_path_in_import_package(
            Language::TypeScript,
            "src/app.ts",
            &i
        ));
    }

    #[test]
    fn test_filter_by_imports_conservative_fallback() {
        let analyzer = DependencyAnalyzer::new();
        let imports = vec![import("util", "example.com/app/util")];
        let candidates = vec![occurrence("web/server.go"), occurrence("db/conn.go")];

        // Nothing matches the import: everything is kept.
        let out = analyzer.filter_by_imports(
            Language::Go,
            "main.go",
            &imports,
            candidates.clone(),
        );
        assert_eq!(out.len(), 2);

        // One match: only it survives.
        let candidates = vec![occurrence("util/strings.go"), occurrence("db/conn.go")];
        let out = analyzer.filter_by_imports(Language::Go, "main.go", &imports, candidates);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, "util/strings.go");
    }

    #[test]
    fn test_filter_keeps_same_file_candidates() {
        let analyzer = DependencyAnalyzer::new();
        let candidates = vec![occurrence("main.go"), occurrence("web/server.go")];
        let out = analyzer.filter_by_imports(Language::Go, "main.go", &[], candidates);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, "main.go");
    }

    #[test]
    fn test_score_ordering() {
        let analyzer = DependencyAnalyzer::new();
        let imports = vec![import("util", "example.com/app/util")];

        let same_file =
            analyzer.symbol_match_score(Language::Go, &imports, "pkg/a.go", "pkg/a.go");
        let same_dir = analyzer.symbol_match_score(Language::Go, &imports, "pkg/a.go", "pkg/b.go");
        let imported =
            analyzer.symbol_match_score(Language::Go, &imports, "pkg/a.go", "util/strings.go");
        let distant = analyzer.symbol_match_score(Language::Go, &imports, "pkg/a.go", "web/x.go");

        assert!(same_file > same_dir);
        assert!(same_dir > imported);
        assert!(imported > distant);
    }

    #[test]
    fn test_save_symbol_occurrences_metrics() {
        use crate::types::{Element, ExtraData, VariableScope};
        let analyzer = DependencyAnalyzer::new();
        let store = GraphStore::open_temporary().unwrap();
        let project = ProjectUuid::from_root_path(std::path::Path::new("/virtual/analyzer"));
        let mut cache = SymbolOccurrenceCache::new(16);

        let table = FileElementTable {
            path: "a.go".to_string(),
            language: Language::Go,
            timestamp: 0,
            imports: vec![],
            elements: vec![
                Element::definition("F", ElementType::Function, Range::new(0, 0, 2, 1)),
                Element::definition("G", ElementType::Function, Range::new(4, 0, 6, 1)),
                Element::definition("V", ElementType::Variable, Range::new(8, 0, 8, 5)).with_extra(
                    ExtraData::Variable {
                        scope: VariableScope::File,
                    },
                ),
                Element::new("F", ElementType::Call, Range::new(5, 2, 5, 6)),
            ],
        };

        let metrics = analyzer
            .save_symbol_occurrences(&store, &project, &[table], &mut cache)
            .unwrap();
        assert_eq!(metrics.total_symbols, 2);
        assert_eq!(metrics.total_saved_symbols, 2);
        assert_eq!(metrics.total_variables, 1);
        assert_eq!(metrics.total_saved_variables, 1);

        cache.flush(&store, &project).unwrap();
        let loaded = cache.get(&store, &project, Language::Go, "F").unwrap();
        assert!(loaded.is_some());
    }
}
