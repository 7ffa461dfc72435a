//! Core data types shared by the parsing, storage, and query layers.

use serde::{Deserialize, Serialize};

/// Source range of an element: 0-based, inclusive start, exclusive end on lines.
///
/// Ranges are stored exactly as the parser reports them; the external query
/// boundary converts to 1-based inclusive coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Range {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// A well-formed range never ends before it starts.
    pub fn is_valid(&self) -> bool {
        self.start_line <= self.end_line
    }

    /// Whether a 0-based line falls inside this range.
    pub fn contains_line(&self, line: u32) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    /// Whether `other` lies entirely within this range (by lines).
    pub fn contains(&self, other: &Range) -> bool {
        self.start_line <= other.start_line && self.end_line >= other.end_line
    }
}

/// Kind of a syntactic element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    Function,
    Method,
    Class,
    Interface,
    Variable,
    Reference,
    Call,
    Import,
}

impl ElementType {
    /// Kinds that can anchor a reference or call-graph query.
    pub fn is_queryable_definition(&self) -> bool {
        matches!(
            self,
            Self::Function | Self::Method | Self::Class | Self::Interface
        )
    }

    /// Kinds that represent a use site rather than a definition.
    pub fn is_use(&self) -> bool {
        matches!(self, Self::Reference | Self::Call)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function | Self::Method)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "FUNCTION",
            Self::Method => "METHOD",
            Self::Class => "CLASS",
            Self::Interface => "INTERFACE",
            Self::Variable => "VARIABLE",
            Self::Reference => "REFERENCE",
            Self::Call => "CALL",
            Self::Import => "IMPORT",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scope of a variable definition. Function- and block-scoped variables are
/// dropped before persistence; file- and class-scoped ones are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableScope {
    File,
    Class,
    Function,
    Block,
}

impl VariableScope {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Function | Self::Block)
    }
}

/// Typed per-element payload. Callables carry their declared parameter list,
/// variables their scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtraData {
    #[default]
    None,
    Callable {
        params: Vec<String>,
    },
    Variable {
        scope: VariableScope,
    },
}

impl ExtraData {
    /// Declared parameter count, if this element is a callable or a call site.
    pub fn param_count(&self) -> Option<u32> {
        match self {
            Self::Callable { params } => Some(params.len() as u32),
            _ => None,
        }
    }

    pub fn variable_scope(&self) -> Option<VariableScope> {
        match self {
            Self::Variable { scope } => Some(*scope),
            _ => None,
        }
    }
}

/// One syntactic occurrence of a named entity inside a file: a definition or
/// a use (reference / call).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub element_type: ElementType,
    pub is_definition: bool,
    pub range: Range,
    #[serde(default)]
    pub extra: ExtraData,
}

impl Element {
    pub fn new(name: impl Into<String>, element_type: ElementType, range: Range) -> Self {
        Self {
            name: name.into(),
            element_type,
            is_definition: false,
            range,
            extra: ExtraData::None,
        }
    }

    pub fn definition(name: impl Into<String>, element_type: ElementType, range: Range) -> Self {
        Self {
            name: name.into(),
            element_type,
            is_definition: true,
            range,
            extra: ExtraData::None,
        }
    }

    pub fn with_extra(mut self, extra: ExtraData) -> Self {
        self.extra = extra;
        self
    }

    /// A use is a non-definition reference or call element.
    pub fn is_use(&self) -> bool {
        !self.is_definition && self.element_type.is_use()
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && self.range.is_valid()
    }

    /// Arity for call sites and callable definitions; 0 when unknown.
    pub fn arity(&self) -> u32 {
        self.extra.param_count().unwrap_or(0)
    }

    /// True for variable definitions that never leave their enclosing
    /// function or block.
    pub fn is_local_variable(&self) -> bool {
        self.element_type == ElementType::Variable
            && self
                .extra
                .variable_scope()
                .is_some_and(|scope| scope.is_local())
    }
}

/// One declared import in a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// Imported name as visible in the file (last path segment by default).
    pub name: String,
    /// Local alias, when the language supports one.
    pub alias: Option<String>,
    /// Import target as written: a package path, module path, or file path.
    pub source: String,
    pub range: Range,
}

impl Import {
    pub fn new(name: impl Into<String>, source: impl Into<String>, range: Range) -> Self {
        Self {
            name: name.into(),
            alias: None,
            source: source.into(),
            range,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Name the import binds locally: the alias when present.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_validity() {
        assert!(Range::new(0, 0, 0, 10).is_valid());
        assert!(Range::new(3, 0, 7, 1).is_valid());
        assert!(!Range::new(7, 0, 3, 1).is_valid());
    }

    #[test]
    fn test_range_containment() {
        let outer = Range::new(2, 0, 10, 1);
        assert!(outer.contains_line(2));
        assert!(outer.contains_line(10));
        assert!(!outer.contains_line(11));
        assert!(outer.contains(&Range::new(3, 0, 9, 1)));
        assert!(!outer.contains(&Range::new(1, 0, 9, 1)));
    }

    #[test]
    fn test_element_use_detection() {
        let call = Element::new("println", ElementType::Call, Range::default());
        assert!(call.is_use());

        let def = Element::definition("main", ElementType::Function, Range::default());
        assert!(!def.is_use());

        // A definition-flagged call is not a use.
        let mut odd = Element::new("odd", ElementType::Call, Range::default());
        odd.is_definition = true;
        assert!(!odd.is_use());
    }

    #[test]
    fn test_local_variable_detection() {
        let local = Element::definition("tmp", ElementType::Variable, Range::default())
            .with_extra(ExtraData::Variable {
                scope: VariableScope::Function,
            });
        assert!(local.is_local_variable());

        let module_level = Element::definition("CONFIG", ElementType::Variable, Range::default())
            .with_extra(ExtraData::Variable {
                scope: VariableScope::File,
            });
        assert!(!module_level.is_local_variable());
    }

    #[test]
    fn test_arity_from_extra_data() {
        let f = Element::definition("add", ElementType::Function, Range::default()).with_extra(
            ExtraData::Callable {
                params: vec!["a".to_string(), "b".to_string()],
            },
        );
        assert_eq!(f.arity(), 2);

        let bare = Element::new("x", ElementType::Reference, Range::default());
        assert_eq!(bare.arity(), 0);
    }

    #[test]
    fn test_element_type_serialization() {
        let json = serde_json::to_string(&ElementType::Function).unwrap();
        assert_eq!(json, "\"FUNCTION\"");
        let back: ElementType = serde_json::from_str("\"CALL\"").unwrap();
        assert_eq!(back, ElementType::Call);
    }

    #[test]
    fn test_import_local_name() {
        let plain = Import::new("fmt", "fmt", Range::default());
        assert_eq!(plain.local_name(), "fmt");

        let aliased = Import::new("strings", "strings", Range::default()).with_alias("str");
        assert_eq!(aliased.local_name(), "str");
    }
}
