//! Parser construction.

use crate::error::{IndexError, IndexResult};
use crate::parsing::ecma::{JavaScriptParser, TypeScriptParser};
use crate::parsing::go::GoParser;
use crate::parsing::java::JavaParser;
use crate::parsing::python::PythonParser;
use crate::parsing::rust::RustParser;
use crate::parsing::{Language, SourceParser};

/// Creates language parsers on demand.
///
/// Tree-sitter parsers hold mutable parse state, so each caller gets a fresh
/// instance rather than a shared one.
#[derive(Debug, Default, Clone)]
pub struct ParserFactory;

impl ParserFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn create(&self, language: Language) -> IndexResult<Box<dyn SourceParser>> {
        let parser: Box<dyn SourceParser> = match language {
            Language::Go => Box::new(GoParser::new().map_err(IndexError::General)?),
            Language::Rust => Box::new(RustParser::new().map_err(IndexError::General)?),
            Language::Python => Box::new(PythonParser::new().map_err(IndexError::General)?),
            Language::JavaScript => {
                Box::new(JavaScriptParser::new().map_err(IndexError::General)?)
            }
            Language::TypeScript => {
                Box::new(TypeScriptParser::new().map_err(IndexError::General)?)
            }
            Language::Java => Box::new(JavaParser::new().map_err(IndexError::General)?),
        };
        Ok(parser)
    }
}
