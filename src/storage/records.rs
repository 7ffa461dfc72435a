//! Persisted record types and their JSON encoding.
//!
//! All values in the store are self-describing JSON documents. The encoding
//! is stable within a schema version; the key layout lives in
//! [`super::keys`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::parsing::Language;
use crate::storage::keys::GraphKey;
use crate::storage::{StorageError, StorageResult};
use crate::types::{Element, ElementType, Import, Range};

/// Meta flag set once the reverse call index has been fully constructed.
pub const META_CALLGRAPH_BUILT: &str = "callgraph_built";

/// Stable identifier for a project, derived once from its root path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectUuid(String);

impl ProjectUuid {
    /// Derive the identifier from the project root. Canonicalizes when the
    /// path exists so the same project always maps to the same namespace.
    pub fn from_root_path(root: &Path) -> Self {
        let canonical = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
        let mut hex = String::with_capacity(32);
        for byte in digest.iter().take(16) {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A self-contained source unit inside a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub uuid: ProjectUuid,
    pub root_path: PathBuf,
    pub name: String,
    pub language_hints: Vec<Language>,
}

impl Project {
    pub fn new(root_path: PathBuf, language_hints: Vec<Language>) -> Self {
        let uuid = ProjectUuid::from_root_path(&root_path);
        let name = root_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root_path.to_string_lossy().into_owned());
        Self {
            uuid,
            root_path,
            name,
            language_hints,
        }
    }
}

/// The parsed, resolved contents of a single file.
///
/// Stored tables are always validated: invalid elements are stripped,
/// local-scope variables dropped, and imports preprocessed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileElementTable {
    pub path: String,
    pub language: Language,
    /// Source mtime in seconds at the moment the file was parsed.
    pub timestamp: i64,
    pub imports: Vec<Import>,
    pub elements: Vec<Element>,
}

impl FileElementTable {
    pub fn key(&self) -> GraphKey {
        GraphKey::path(self.language, self.path.clone())
    }

    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Drop malformed elements and variables that never escape their
    /// function or block. Returns how many elements were removed.
    pub fn strip_invalid(&mut self) -> usize {
        let before = self.elements.len();
        self.elements
            .retain(|e| e.is_valid() && !e.is_local_variable());
        before - self.elements.len()
    }

    /// Definition elements of this file.
    pub fn definitions(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.is_definition)
    }

    /// Use elements (references and calls) of this file.
    pub fn uses(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.is_use())
    }
}

/// One definitional occurrence of a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub path: String,
    pub range: Range,
    pub element_type: ElementType,
}

/// The ordered list of definitional occurrences of one symbol name across a
/// project. Never stored empty: an emptied record is deleted instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolOccurrence {
    pub name: String,
    pub language: Language,
    pub occurrences: Vec<Occurrence>,
}

impl SymbolOccurrence {
    pub fn new(name: impl Into<String>, language: Language) -> Self {
        Self {
            name: name.into(),
            language,
            occurrences: Vec::new(),
        }
    }

    pub fn key(&self) -> GraphKey {
        GraphKey::symbol(self.language, self.name.clone())
    }

    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    /// Insert or replace: an existing occurrence at the same
    /// `(path, start_line)` is replaced, anything else is appended.
    pub fn upsert(&mut self, occurrence: Occurrence) {
        if let Some(existing) = self.occurrences.iter_mut().find(|o| {
            o.path == occurrence.path && o.range.start_line == occurrence.range.start_line
        }) {
            *existing = occurrence;
        } else {
            self.occurrences.push(occurrence);
        }
    }

    /// Drop every occurrence whose path is in `paths`. Returns true when the
    /// record changed.
    pub fn remove_paths(&mut self, paths: &HashSet<String>) -> bool {
        let before = self.occurrences.len();
        self.occurrences.retain(|o| !paths.contains(&o.path));
        before != self.occurrences.len()
    }

    /// Rewrite occurrences of `old_path` to `new_path`. Returns true when
    /// the record changed.
    pub fn rename_path(&mut self, old_path: &str, new_path: &str) -> bool {
        let mut changed = false;
        for occ in &mut self.occurrences {
            if occ.path == old_path {
                occ.path = new_path.to_string();
                changed = true;
            }
        }
        changed
    }
}

/// One resolved target a call with a given name and arity may land on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalleeTarget {
    pub symbol_name: String,
    /// File the target definition lives in.
    pub file_path: String,
    pub position: Range,
    pub param_count: u32,
    /// Match confidence; only the ordering is meaningful.
    pub score: f64,
}

/// Reverse call index entry for one `(called name, arity)` pair, listing the
/// scored definition sites such calls resolve to.
///
/// Built lazily during call-graph construction, buffered in a bounded cache,
/// and persisted under `@callee:`; invalidated wholesale whenever the
/// project's files change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalleeMapItem {
    pub callee_name: String,
    pub param_count: u32,
    pub targets: Vec<CalleeTarget>,
}

impl CalleeMapItem {
    pub fn new(callee_name: impl Into<String>, param_count: u32) -> Self {
        Self {
            callee_name: callee_name.into(),
            param_count,
            targets: Vec::new(),
        }
    }

    pub fn key(&self) -> GraphKey {
        GraphKey::callee(self.callee_name.clone(), self.param_count)
    }

    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Set-union merge keyed by `(symbol_name, file_path)`, keeping the
    /// higher score on collision. Commutative, so concurrent evictions may
    /// merge in any order.
    pub fn merge(&mut self, other: CalleeMapItem) {
        for target in other.targets {
            match self
                .targets
                .iter_mut()
                .find(|t| t.symbol_name == target.symbol_name && t.file_path == target.file_path)
            {
                Some(existing) => {
                    if target.score > existing.score {
                        *existing = target;
                    }
                }
                None => self.targets.push(target),
            }
        }
    }
}

/// Parse a stored value with key context attached to decode failures.
pub fn decode<T, F>(key: &[u8], bytes: &[u8], parse: F) -> StorageResult<T>
where
    F: FnOnce(&[u8]) -> StorageResult<T>,
{
    parse(bytes).map_err(|e| StorageError::Corrupted {
        key: String::from_utf8_lossy(key).into_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrence(path: &str, line: u32) -> Occurrence {
        Occurrence {
            path: path.to_string(),
            range: Range::new(line, 0, line + 2, 1),
            element_type: ElementType::Function,
        }
    }

    #[test]
    fn test_project_uuid_is_stable() {
        let a = ProjectUuid::from_root_path(Path::new("/tmp/does-not-exist-xyz"));
        let b = ProjectUuid::from_root_path(Path::new("/tmp/does-not-exist-xyz"));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32);

        let c = ProjectUuid::from_root_path(Path::new("/tmp/other-xyz"));
        assert_ne!(a, c);
    }

    #[test]
    fn test_file_table_round_trip() {
        let table = FileElementTable {
            path: "src/main.go".to_string(),
            language: Language::Go,
            timestamp: 1_700_000_000,
            imports: vec![Import::new("fmt", "fmt", Range::default())],
            elements: vec![Element::definition(
                "main",
                ElementType::Function,
                Range::new(2, 0, 4, 1),
            )],
        };
        let bytes = table.to_bytes().unwrap();
        let back = FileElementTable::from_bytes(&bytes).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_strip_invalid_drops_locals_and_bad_ranges() {
        use crate::types::{ExtraData, VariableScope};
        let mut table = FileElementTable {
            path: "a.go".to_string(),
            language: Language::Go,
            timestamp: 0,
            imports: vec![],
            elements: vec![
                Element::definition("ok", ElementType::Function, Range::new(0, 0, 2, 1)),
                Element::definition("bad", ElementType::Function, Range::new(5, 0, 2, 1)),
                Element::definition("local", ElementType::Variable, Range::new(1, 0, 1, 5))
                    .with_extra(ExtraData::Variable {
                        scope: VariableScope::Block,
                    }),
                Element::definition("global", ElementType::Variable, Range::new(0, 0, 0, 5))
                    .with_extra(ExtraData::Variable {
                        scope: VariableScope::File,
                    }),
            ],
        };
        assert_eq!(table.strip_invalid(), 2);
        let names: Vec<_> = table.elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["ok", "global"]);
    }

    #[test]
    fn test_symbol_occurrence_upsert_replaces_same_start_line() {
        let mut sym = SymbolOccurrence::new("F", Language::Go);
        sym.upsert(occurrence("a.go", 3));
        sym.upsert(occurrence("b.go", 3));
        assert_eq!(sym.occurrences.len(), 2);

        // Same path and start line: replaced, not appended.
        let mut updated = occurrence("a.go", 3);
        updated.element_type = ElementType::Method;
        sym.upsert(updated);
        assert_eq!(sym.occurrences.len(), 2);
        assert_eq!(sym.occurrences[0].element_type, ElementType::Method);
    }

    #[test]
    fn test_symbol_occurrence_remove_paths() {
        let mut sym = SymbolOccurrence::new("F", Language::Go);
        sym.upsert(occurrence("a.go", 1));
        sym.upsert(occurrence("dir/b.go", 4));

        let removed: HashSet<String> = ["a.go".to_string()].into_iter().collect();
        assert!(sym.remove_paths(&removed));
        assert_eq!(sym.occurrences.len(), 1);
        assert!(!sym.remove_paths(&removed));
    }

    #[test]
    fn test_callee_merge_is_union_with_max_score() {
        let target = |file: &str, score: f64| CalleeTarget {
            symbol_name: "F".to_string(),
            file_path: file.to_string(),
            position: Range::default(),
            param_count: 0,
            score,
        };

        let mut a = CalleeMapItem::new("F", 0);
        a.targets.push(target("x.go", 1.0));

        let mut b = CalleeMapItem::new("F", 0);
        b.targets.push(target("x.go", 5.0));
        b.targets.push(target("y.go", 2.0));

        a.merge(b.clone());
        assert_eq!(a.targets.len(), 2);
        assert_eq!(a.targets[0].score, 5.0);

        // Merging the other way around yields the same set.
        let mut c = CalleeMapItem::new("F", 0);
        c.targets.push(target("y.go", 2.0));
        c.targets.push(target("x.go", 5.0));
        let mut b2 = b;
        b2.merge(CalleeMapItem {
            targets: vec![target("x.go", 1.0)],
            ..CalleeMapItem::new("F", 0)
        });
        assert_eq!(b2.targets.len(), 2);
    }
}
