//! Python source extraction.

use tree_sitter::{Node, Parser};

use crate::parsing::parser::{
    ParsedFile, SourceParser, depth_exceeded, last_segment, node_range, node_text,
};
use crate::parsing::Language;
use crate::types::{Element, ElementType, ExtraData, Import, VariableScope};

pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| format!("Failed to set Python language: {e}"))?;
        Ok(Self { parser })
    }

    fn collect(&self, node: Node, code: &str, out: &mut ParsedFile, depth: usize) {
        if depth_exceeded(depth, node) {
            return;
        }

        match node.kind() {
            "import_statement" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    match child.kind() {
                        "dotted_name" => {
                            let source = node_text(child, code);
                            out.imports.push(Import::new(
                                last_segment(source, ".").to_string(),
                                source,
                                node_range(node),
                            ));
                        }
                        "aliased_import" => {
                            if let Some(name_node) = child.child_by_field_name("name") {
                                let source = node_text(name_node, code);
                                let mut import = Import::new(
                                    last_segment(source, ".").to_string(),
                                    source,
                                    node_range(node),
                                );
                                if let Some(alias_node) = child.child_by_field_name("alias") {
                                    import = import.with_alias(node_text(alias_node, code));
                                }
                                out.imports.push(import);
                            }
                        }
                        _ => {}
                    }
                }
                return;
            }
            "import_from_statement" => {
                self.collect_from_import(node, code, out);
                return;
            }
            "function_definition" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    let element_type = if self.inside_class(node) {
                        ElementType::Method
                    } else {
                        ElementType::Function
                    };
                    let params = self.parameter_names(node.child_by_field_name("parameters"), code);
                    out.elements.push(
                        Element::definition(node_text(name_node, code), element_type, node_range(node))
                            .with_extra(ExtraData::Callable { params }),
                    );
                }
            }
            "class_definition" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    out.elements.push(Element::definition(
                        node_text(name_node, code),
                        ElementType::Class,
                        node_range(node),
                    ));
                }
            }
            "call" => {
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
            "assignment" => {
                if let Some(left) = node.child_by_field_name("left") {
                    if left.kind() == "identifier" {
                        let scope = self.variable_scope(node);
                        out.elements.push(
                            Element::definition(
                                node_text(left, code),
                                ElementType::Variable,
                                node_range(node),
                            )
                            .with_extra(ExtraData::Variable { scope }),
                        );
                    }
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect(child, code, out, depth + 1);
        }
    }

    fn collect_from_import(&self, node: Node, code: &str, out: &mut ParsedFile) {
        let Some(module) = node.child_by_field_name("module_name") else {
            return;
        };
        let source = node_text(module, code).to_string();

        let mut cursor = node.walk();
        let mut seen_import_keyword = false;
        let mut any_name = false;
        for child in node.children(&mut cursor) {
            if child.kind() == "import" {
                seen_import_keyword = true;
                continue;
            }
            if !seen_import_keyword {
                continue;
            }
            match child.kind() {
                "dotted_name" => {
                    any_name = true;
                    out.imports.push(Import::new(
                        node_text(child, code),
                        source.clone(),
                        node_range(node),
                    ));
                }
                "aliased_import" => {
                    if let Some(name_node) = child.child_by_field_name("name") {
                        any_name = true;
                        let mut import = Import::new(
                            node_text(name_node, code),
                            source.clone(),
                            node_range(node),
                        );
                        if let Some(alias_node) = child.child_by_field_name("alias") {
                            import = import.with_alias(node_text(alias_node, code));
                        }
                        out.imports.push(import);
                    }
                }
                "wildcard_import" => {
                    any_name = true;
                    out.imports
                        .push(Import::new("*", source.clone(), node_range(node)));
                }
                _ => {}
            }
        }
        if !any_name {
            out.imports.push(Import::new(
                last_segment(&source, ".").to_string(),
                source,
                node_range(node),
            ));
        }
    }

    fn call_name<'a>(&self, node: Node, code: &'a str) -> Option<&'a str> {
        let function = node.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => Some(node_text(function, code)),
            "attribute" => function
                .child_by_field_name("attribute")
                .map(|attr| node_text(attr, code)),
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
                "identifier" => Some(node_text(param, code)),
                "typed_parameter" | "default_parameter" | "typed_default_parameter" => param
                    .child_by_field_name("name")
                    .or_else(|| param.named_child(0))
                    .map(|n| node_text(n, code)),
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    param.named_child(0).map(|n| node_text(n, code))
                }
                _ => None,
            };
            if let Some(name) = name {
                // The receiver does not count toward call arity.
                if names.is_empty() && (name == "self" || name == "cls") {
                    continue;
                }
                names.push(name.to_string());
            }
        }
        names
    }

    fn inside_class(&self, node: Node) -> bool {
        let mut current = node.parent();
        while let Some(parent) = current {
            match parent.kind() {
                "class_definition" => return true,
                "function_definition" => return false,
                _ => {}
            }
            current = parent.parent();
        }
        false
    }

    fn variable_scope(&self, node: Node) -> VariableScope {
        let mut current = node.parent();
        while let Some(parent) = current {
            match parent.kind() {
                "function_definition" => return VariableScope::Function,
                "class_definition" => return VariableScope::Class,
                "module" => return VariableScope::File,
                _ => {}
            }
            current = parent.parent();
        }
        VariableScope::File
    }
}

impl SourceParser for PythonParser {
    fn language(&self) -> Language {
        Language::Python
    }

    fn parse(&mut self, code: &str) -> ParsedFile {
        let Some(tree) = self.parser.parse(code, None) else {
            return ParsedFile::default();
        };
        let mut out = ParsedFile::default();
        self.collect(tree.root_node(), code, &mut out, 0);
        out
    }
}
