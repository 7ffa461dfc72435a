//! JavaScript and TypeScript source extraction.
//!
//! The two grammars share almost all relevant node kinds, so both parsers
//! drive the same walker; the TypeScript grammar adds interfaces, enums, and
//! typed parameter wrappers, which the walker handles when present.

use tree_sitter::{Node, Parser};

use crate::parsing::parser::{
    ParsedFile, SourceParser, depth_exceeded, node_range, node_text, strip_quotes,
};
use crate::parsing::Language;
use crate::types::{Element, ElementType, ExtraData, Import, VariableScope};

pub struct JavaScriptParser {
    inner: EcmaWalker,
}

impl JavaScriptParser {
    pub fn new() -> Result<Self, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .map_err(|e| format!("Failed to set JavaScript language: {e}"))?;
        Ok(Self {
            inner: EcmaWalker { parser },
        })
    }
}

impl SourceParser for JavaScriptParser {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn parse(&mut self, code: &str) -> ParsedFile {
        self.inner.parse(code)
    }
}

pub struct TypeScriptParser {
    inner: EcmaWalker,
}

impl TypeScriptParser {
    pub fn new() -> Result<Self, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .map_err(|e| format!("Failed to set TypeScript language: {e}"))?;
        Ok(Self {
            inner: EcmaWalker { parser },
        })
    }
}

impl SourceParser for TypeScriptParser {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn parse(&mut self, code: &str) -> ParsedFile {
        self.inner.parse(code)
    }
}

struct EcmaWalker {
    parser: Parser,
}

impl EcmaWalker {
    fn parse(&mut self, code: &str) -> ParsedFile {
        let Some(tree) = self.parser.parse(code, None) else {
            return ParsedFile::default();
        };
        let mut out = ParsedFile::default();
        self.collect(tree.root_node(), code, &mut out, 0);
        out
    }

    fn collect(&self, node: Node, code: &str, out: &mut ParsedFile, depth: usize) {
        if depth_exceeded(depth, node) {
            return;
        }

        match node.kind() {
            "import_statement" => {
                self.collect_import(node, code, out);
                return;
            }
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    let params = self.parameter_names(node.child_by_field_name("parameters"), code);
                    out.elements.push(
                        Element::definition(
                            node_text(name_node, code),
                            ElementType::Function,
                            node_range(node),
                        )
                        .with_extra(ExtraData::Callable { params }),
                    );
                }
            }
            "method_definition" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    let params = self.parameter_names(node.child_by_field_name("parameters"), code);
                    out.elements.push(
                        Element::definition(
                            node_text(name_node, code),
                            ElementType::Method,
                            node_range(node),
                        )
                        .with_extra(ExtraData::Callable { params }),
                    );
                }
            }
            "class_declaration" | "abstract_class_declaration" | "enum_declaration" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    out.elements.push(Element::definition(
                        node_text(name_node, code),
                        ElementType::Class,
                        node_range(node),
                    ));
                }
            }
            "interface_declaration" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    out.elements.push(Element::definition(
                        node_text(name_node, code),
                        ElementType::Interface,
                        node_range(node),
                    ));
                }
            }
            "variable_declarator" => {
                self.collect_declarator(node, code, out);
            }
            "call_expression" => {
                if let Some(name) = self.call_name(node, code) {
                    let arity = node
                        .child_by_field_name("arguments")
                        .map(|args| args.named_child_count() as u32)
                        .unwrap_or(0);
                    let params = (0..arity).map(|i| format!("arg{i}")).collect();
                    out.elements.push(
                        Element::new(name, ElementType::Call, node_range(node))
                            .with_extra(ExtraData::Callable { params }),
                    );
                }
            }
            "new_expression" => {
                if let Some(constructor) = node.child_by_field_name("constructor") {
                    if constructor.kind() == "identifier" {
                        let arity = node
                            .child_by_field_name("arguments")
                            .map(|args| args.named_child_count() as u32)
                            .unwrap_or(0);
                        let params = (0..arity).map(|i| format!("arg{i}")).collect();
                        out.elements.push(
                            Element::new(
                                node_text(constructor, code),
                                ElementType::Call,
                                node_range(node),
                            )
                            .with_extra(ExtraData::Callable { params }),
                        );
                    }
                }
            }
            "type_identifier" => {
                let is_definition_name = node.parent().is_some_and(|p| {
                    matches!(
                        p.kind(),
                        "interface_declaration"
                            | "class_declaration"
                            | "abstract_class_declaration"
                            | "type_alias_declaration"
                            | "enum_declaration"
                    )
                });
                if !is_definition_name {
                    out.elements.push(Element::new(
                        node_text(node, code),
                        ElementType::Reference,
                        node_range(node),
                    ));
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect(child, code, out, depth + 1);
        }
    }

    fn collect_declarator(&self, node: Node, code: &str, out: &mut ParsedFile) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        if name_node.kind() != "identifier" {
            return;
        }
        let name = node_text(name_node, code);

        // `const f = () => {}` declares a function, not a variable.
        if let Some(value) = node.child_by_field_name("value") {
            if matches!(
                value.kind(),
                "arrow_function" | "function_expression" | "generator_function"
            ) {
                let params = self
                    .parameter_names(value.child_by_field_name("parameters"), code)
                    .into_iter()
                    .chain(
                        // Single-parameter arrow without parentheses.
                        value
                            .child_by_field_name("parameter")
                            .map(|p| node_text(p, code).to_string()),
                    )
                    .collect();
                out.elements.push(
                    Element::definition(name, ElementType::Function, node_range(node))
                        .with_extra(ExtraData::Callable { params }),
                );
                return;
            }
        }

        let scope = self.variable_scope(node);
        out.elements.push(
            Element::definition(name, ElementType::Variable, node_range(node))
                .with_extra(ExtraData::Variable { scope }),
        );
    }

    fn collect_import(&self, node: Node, code: &str, out: &mut ParsedFile) {
        let Some(source_node) = node.child_by_field_name("source") else {
            return;
        };
        let source = strip_quotes(node_text(source_node, code)).to_string();
        let range = node_range(node);

        let mut cursor = node.walk();
        let clause = node
            .children(&mut cursor)
            .find(|c| c.kind() == "import_clause");
        let Some(clause) = clause else {
            // Side-effect import: `import "./setup"`.
            out.imports.push(Import::new(
                source.rsplit('/').next().unwrap_or(&source).to_string(),
                source,
                range,
            ));
            return;
        };

        let mut clause_cursor = clause.walk();
        for child in clause.children(&mut clause_cursor) {
            match child.kind() {
                "identifier" => {
                    // Default import binds the module under a local name.
                    out.imports.push(
                        Import::new("default", source.clone(), range)
                            .with_alias(node_text(child, code)),
                    );
                }
                "namespace_import" => {
                    let mut ns_cursor = child.walk();
                    if let Some(alias) = child
                        .children(&mut ns_cursor)
                        .find(|c| c.kind() == "identifier")
                    {
                        out.imports.push(
                            Import::new("*", source.clone(), range)
                                .with_alias(node_text(alias, code)),
                        );
                    }
                }
                "named_imports" => {
                    let mut named_cursor = child.walk();
                    for spec in child.children(&mut named_cursor) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(name_node) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let mut import =
                            Import::new(node_text(name_node, code), source.clone(), range);
                        if let Some(alias_node) = spec.child_by_field_name("alias") {
                            import = import.with_alias(node_text(alias_node, code));
                        }
                        out.imports.push(import);
                    }
                }
                _ => {}
            }
        }
    }

    fn call_name<'a>(&self, node: Node, code: &'a str) -> Option<&'a str> {
        let function = node.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => Some(node_text(function, code)),
            "member_expression" => function
                .child_by_field_name("property")
                .map(|prop| node_text(prop, code)),
            _ => None,
        }
    }

    fn parameter_names(&self, parameters: Option<Node>, code: &str) -> Vec<String> {
        let Some(parameters) = parameters else {
            return Vec::new();
        };
        let mut names = Vec::new();
        let mut cursor = parameters.walk();
        for param in parameters.named_children(&mut cursor) {
            let name = match param.kind() {
                "identifier" => Some(node_text(param, code).to_string()),
                // TypeScript wraps each parameter.
                "required_parameter" | "optional_parameter" => param
                    .child_by_field_name("pattern")
                    .map(|p| node_text(p, code).to_string()),
                "assignment_pattern" => param
                    .child_by_field_name("left")
                    .map(|p| node_text(p, code).to_string()),
                "rest_pattern" | "object_pattern" | "array_pattern" => {
                    Some(node_text(param, code).to_string())
                }
                _ => None,
            };
            if let Some(name) = name {
                names.push(name);
            }
        }
        names
    }

    fn variable_scope(&self, node: Node) -> VariableScope {
        let mut current = node.parent();
        while let Some(parent) = current {
            match parent.kind() {
                "function_declaration"
                | "generator_function_declaration"
                | "function_expression"
                | "arrow_function"
                | "method_definition" => return VariableScope::Function,
                "class_body" => return VariableScope::Class,
                "statement_block" => return VariableScope::Block,
                "program" => return VariableScope::File,
                _ => {}
            }
            current = parent.parent();
        }
        VariableScope::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ts(code: &str) -> ParsedFile {
        TypeScriptParser::new().unwrap().parse(code)
    }

    fn parse_js(code: &str) -> ParsedFile {
        JavaScriptParser::new().unwrap().parse(code)
    }

    fn find<'a>(out: &'a ParsedFile, name: &str, element_type: ElementType) -> Option<&'a Element> {
        out.elements
            .iter()
            .find(|e| e.name == name && e.element_type == element_type)
    }

    #[test]
    fn test_js_function_and_call() {
        let out = parse_js("function greet(name) {\n  return name;\n}\n\ngreet('hi');\n");
        let def = find(&out, "greet", ElementType::Function).unwrap();
        assert_eq!(def.arity(), 1);
        let call = find(&out, "greet", ElementType::Call).unwrap();
        assert_eq!(call.arity(), 1);
    }

    #[test]
    fn test_js_arrow_function_const() {
        let out = parse_js("const add = (a, b) => a + b;\n");
        let def = find(&out, "add", ElementType::Function).unwrap();
        assert!(def.is_definition);
        assert_eq!(def.arity(), 2);
        assert!(find(&out, "add", ElementType::Variable).is_none());
    }

    #[test]
    fn test_js_class_and_method() {
        let out = parse_js(
            "class Store {\n  put(key, value) {\n    this.save(key, value);\n  }\n}\n",
        );
        assert!(find(&out, "Store", ElementType::Class).is_some());
        let method = find(&out, "put", ElementType::Method).unwrap();
        assert_eq!(method.arity(), 2);
        assert!(find(&out, "save", ElementType::Call).is_some());
    }

    #[test]
    fn test_js_imports() {
        let code = "import fs from 'fs';\nimport { join, basename as base } from './path-utils';\nimport * as lib from '../lib';\n";
        let out = parse_js(code);

        let default = out.imports.iter().find(|i| i.source == "fs").unwrap();
        assert_eq!(default.alias.as_deref(), Some("fs"));

        let join = out.imports.iter().find(|i| i.name == "join").unwrap();
        assert_eq!(join.source, "./path-utils");

        let base = out.imports.iter().find(|i| i.name == "basename").unwrap();
        assert_eq!(base.alias.as_deref(), Some("base"));

        let ns = out.imports.iter().find(|i| i.name == "*").unwrap();
        assert_eq!(ns.source, "../lib");
        assert_eq!(ns.alias.as_deref(), Some("lib"));
    }

    #[test]
    fn test_ts_interface_and_typed_params() {
        let code = "interface Logger {\n  log(msg: string): void;\n}\n\nfunction write(logger: Logger, msg: string) {\n  logger.log(msg);\n}\n";
        let out = parse_ts(code);
        assert!(find(&out, "Logger", ElementType::Interface).is_some());

        let def = find(&out, "write", ElementType::Function).unwrap();
        assert_eq!(def.arity(), 2);

        // The parameter type is a use of the interface.
        assert!(
            out.elements
                .iter()
                .any(|e| e.name == "Logger" && e.element_type == ElementType::Reference)
        );
    }

    #[test]
    fn test_ts_variable_scopes() {
        let code = "const LIMIT = 10;\n\nfunction main() {\n  const local = LIMIT;\n  return local;\n}\n";
        let out = parse_ts(code);
        assert!(!find(&out, "LIMIT", ElementType::Variable)
            .unwrap()
            .is_local_variable());
        assert!(find(&out, "local", ElementType::Variable)
            .unwrap()
            .is_local_variable());
    }
}
