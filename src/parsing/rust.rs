//! Rust source extraction.

use tree_sitter::{Node, Parser};

use crate::parsing::parser::{
    ParsedFile, SourceParser, depth_exceeded, last_segment, node_range, node_text,
};
use crate::parsing::Language;
use crate::types::{Element, ElementType, ExtraData, Import, VariableScope};

pub struct RustParser {
    parser: Parser,
}

impl RustParser {
    pub fn new() -> Result<Self, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .map_err(|e| format!("Failed to set Rust language: {e}"))?;
        Ok(Self { parser })
    }

    fn collect(&self, node: Node, code: &str, out: &mut ParsedFile, depth: usize) {
        if depth_exceeded(depth, node) {
            return;
        }

        match node.kind() {
            "use_declaration" => {
                if let Some(argument) = node.child_by_field_name("argument") {
                    self.collect_use_tree(argument, code, String::new(), node, out);
                }
                return;
            }
            "function_item" | "function_signature_item" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    let element_type = if self.inside_impl_or_trait(node) {
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
            "struct_item" | "enum_item" | "union_item" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    out.elements.push(Element::definition(
                        node_text(name_node, code),
                        ElementType::Class,
                        node_range(node),
                    ));
                }
            }
            "trait_item" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    out.elements.push(Element::definition(
                        node_text(name_node, code),
                        ElementType::Interface,
                        node_range(node),
                    ));
                }
            }
            "const_item" | "static_item" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    let scope = if self.inside_function(node) {
                        VariableScope::Function
                    } else {
                        VariableScope::File
                    };
                    out.elements.push(
                        Element::definition(
                            node_text(name_node, code),
                            ElementType::Variable,
                            node_range(node),
                        )
                        .with_extra(ExtraData::Variable { scope }),
                    );
                }
            }
            "let_declaration" => {
                if let Some(pattern) = node.child_by_field_name("pattern") {
                    if pattern.kind() == "identifier" {
                        out.elements.push(
                            Element::definition(
                                node_text(pattern, code),
                                ElementType::Variable,
                                node_range(node),
                            )
                            .with_extra(ExtraData::Variable {
                                scope: VariableScope::Function,
                            }),
                        );
                    }
                }
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
            "type_identifier" => {
                if self.is_type_use(node) {
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

    fn collect_use_tree(
        &self,
        node: Node,
        code: &str,
        prefix: String,
        decl: Node,
        out: &mut ParsedFile,
    ) {
        match node.kind() {
            "identifier" | "scoped_identifier" | "crate" | "super" | "self" => {
                let segment = node_text(node, code);
                let path = join_path(&prefix, segment);
                out.imports.push(Import::new(
                    last_segment(&path, "::").to_string(),
                    path,
                    node_range(decl),
                ));
            }
            "use_as_clause" => {
                if let (Some(path_node), Some(alias_node)) = (
                    node.child_by_field_name("path"),
                    node.child_by_field_name("alias"),
                ) {
                    let path = join_path(&prefix, node_text(path_node, code));
                    out.imports.push(
                        Import::new(last_segment(&path, "::").to_string(), path, node_range(decl))
                            .with_alias(node_text(alias_node, code)),
                    );
                }
            }
            "use_wildcard" => {
                let mut cursor = node.walk();
                let base = node
                    .children(&mut cursor)
                    .find(|c| matches!(c.kind(), "identifier" | "scoped_identifier" | "crate"))
                    .map(|c| node_text(c, code))
                    .unwrap_or("");
                let path = join_path(&prefix, base);
                if !path.is_empty() {
                    out.imports.push(Import::new("*", path, node_range(decl)));
                }
            }
            "scoped_use_list" => {
                let base = node
                    .child_by_field_name("path")
                    .map(|p| node_text(p, code))
                    .unwrap_or("");
                let new_prefix = join_path(&prefix, base);
                if let Some(list) = node.child_by_field_name("list") {
                    let mut cursor = list.walk();
                    for child in list.children(&mut cursor) {
                        if child.is_named() {
                            self.collect_use_tree(child, code, new_prefix.clone(), decl, out);
                        }
                    }
                }
            }
            "use_list" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.is_named() {
                        self.collect_use_tree(child, code, prefix.clone(), decl, out);
                    }
                }
            }
            _ => {}
        }
    }

    fn call_name<'a>(&self, node: Node, code: &'a str) -> Option<&'a str> {
        let function = node.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => Some(node_text(function, code)),
            "scoped_identifier" => function
                .child_by_field_name("name")
                .map(|name| node_text(name, code)),
            "field_expression" => function
                .child_by_field_name("field")
                .map(|field| node_text(field, code)),
            "generic_function" => {
                let inner = function.child_by_field_name("function")?;
                match inner.kind() {
                    "identifier" => Some(node_text(inner, code)),
                    "scoped_identifier" => inner
                        .child_by_field_name("name")
                        .map(|name| node_text(name, code)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn parameter_names(&self, parameters: Option<Node>, code: &str) -> Vec<String> {
        let Some(parameters) = parameters else {
            return Vec::new();
        };
        let mut names = Vec::new();
        let mut cursor = parameters.walk();
        for param in parameters.children(&mut cursor) {
            match param.kind() {
                "parameter" => {
                    if let Some(pattern) = param.child_by_field_name("pattern") {
                        names.push(node_text(pattern, code).to_string());
                    }
                }
                // Receivers do not count toward call arity.
                "self_parameter" => {}
                _ => {}
            }
        }
        names
    }

    fn inside_impl_or_trait(&self, node: Node) -> bool {
        let mut current = node.parent();
        while let Some(parent) = current {
            if matches!(parent.kind(), "impl_item" | "trait_item") {
                return true;
            }
            current = parent.parent();
        }
        false
    }

    fn inside_function(&self, node: Node) -> bool {
        let mut current = node.parent();
        while let Some(parent) = current {
            if matches!(parent.kind(), "function_item" | "closure_expression") {
                return true;
            }
            current = parent.parent();
        }
        false
    }

    fn is_type_use(&self, node: Node) -> bool {
        // Definition names are emitted by their item cases; everything else
        // naming a type is a use.
        match node.parent() {
            Some(parent) => !matches!(
                parent.kind(),
                "struct_item" | "enum_item" | "union_item" | "trait_item" | "type_item"
            ),
            None => true,
        }
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else if segment.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}::{segment}")
    }
}

impl SourceParser for RustParser {
    fn language(&self) -> Language {
        Language::Rust
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
