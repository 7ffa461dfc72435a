//! Go source extraction.

use tree_sitter::{Node, Parser};

use crate::parsing::parser::{
    ParsedFile, SourceParser, depth_exceeded, last_segment, node_range, node_text, strip_quotes,
};
use crate::parsing::Language;
use crate::types::{Element, ElementType, ExtraData, Import, VariableScope};

pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    pub fn new() -> Result<Self, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| format!("Failed to set Go language: {e}"))?;
        Ok(Self { parser })
    }

    fn collect(&self, node: Node, code: &str, out: &mut ParsedFile, depth: usize) {
        if depth_exceeded(depth, node) {
            return;
        }

        match node.kind() {
            "import_declaration" => {
                self.collect_imports(node, code, out);
                return;
            }
            "function_declaration" => {
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
            "method_declaration" => {
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
            "type_spec" => {
                if let (Some(name_node), Some(type_node)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("type"),
                ) {
                    let element_type = match type_node.kind() {
                        "struct_type" => Some(ElementType::Class),
                        "interface_type" => Some(ElementType::Interface),
                        _ => None,
                    };
                    if let Some(element_type) = element_type {
                        out.elements.push(Element::definition(
                            node_text(name_node, code),
                            element_type,
                            node_range(node),
                        ));
                    }
                }
            }
            "var_spec" | "const_spec" => {
                let scope = self.variable_scope(node);
                let mut cursor = node.walk();
                for name_node in node.children_by_field_name("name", &mut cursor) {
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
            "short_var_declaration" => {
                if let Some(left) = node.child_by_field_name("left") {
                    let mut cursor = left.walk();
                    for child in left.children(&mut cursor) {
                        if child.kind() == "identifier" && node_text(child, code) != "_" {
                            out.elements.push(
                                Element::definition(
                                    node_text(child, code),
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
                // Type uses; definition names are the `type_spec` case above.
                if node.parent().is_none_or(|p| p.kind() != "type_spec") {
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

    fn collect_imports(&self, node: Node, code: &str, out: &mut ParsedFile) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_spec" => self.collect_import_spec(child, code, out),
                "import_spec_list" => {
                    let mut list_cursor = child.walk();
                    for spec in child.children(&mut list_cursor) {
                        if spec.kind() == "import_spec" {
                            self.collect_import_spec(spec, code, out);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn collect_import_spec(&self, spec: Node, code: &str, out: &mut ParsedFile) {
        let Some(path_node) = spec.child_by_field_name("path") else {
            return;
        };
        let source = strip_quotes(node_text(path_node, code)).to_string();
        let name = last_segment(&source, "/").to_string();
        let mut import = Import::new(name, source, node_range(spec));
        if let Some(name_node) = spec.child_by_field_name("name") {
            if name_node.kind() == "package_identifier" {
                import = import.with_alias(node_text(name_node, code));
            }
        }
        out.imports.push(import);
    }

    fn call_name<'a>(&self, node: Node, code: &'a str) -> Option<&'a str> {
        let function = node.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => Some(node_text(function, code)),
            "selector_expression" => function
                .child_by_field_name("field")
                .map(|field| node_text(field, code)),
            "parenthesized_expression" => None,
            _ => None,
        }
    }

    fn parameter_names(&self, parameters: Option<Node>, code: &str) -> Vec<String> {
        let Some(parameters) = parameters else {
            return Vec::new();
        };
        let mut names = Vec::new();
        let mut cursor = parameters.walk();
        for decl in parameters.children(&mut cursor) {
            match decl.kind() {
                "parameter_declaration" | "variadic_parameter_declaration" => {
                    let mut decl_cursor = decl.walk();
                    let declared: Vec<&str> = decl
                        .children_by_field_name("name", &mut decl_cursor)
                        .map(|n| node_text(n, code))
                        .collect();
                    if declared.is_empty() {
                        // Unnamed parameter: the type alone declares one slot.
                        if let Some(type_node) = decl.child_by_field_name("type") {
                            names.push(node_text(type_node, code).to_string());
                        }
                    } else {
                        names.extend(declared.iter().map(|s| s.to_string()));
                    }
                }
                _ => {}
            }
        }
        names
    }

    fn variable_scope(&self, node: Node) -> VariableScope {
        let mut current = node.parent();
        while let Some(parent) = current {
            match parent.kind() {
                "function_declaration" | "method_declaration" | "func_literal" => {
                    return VariableScope::Function;
                }
                "source_file" => return VariableScope::File,
                _ => {}
            }
            current = parent.parent();
        }
        VariableScope::File
    }
}

impl SourceParser for GoParser {
    fn language(&self) -> Language {
        Language::Go
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> ParsedFile {
        GoParser::new().unwrap().parse(code)
    }

    fn find<'a>(out: &'a ParsedFile, name: &str, element_type: ElementType) -> Option<&'a Element> {
        out.elements
            .iter()
            .find(|e| e.name == name && e.element_type == element_type)
    }

    #[test]
    fn test_function_definition() {
        let out = parse("package main\n\nfunc Greet(name string) string {\n\treturn name\n}\n");
        let def = find(&out, "Greet", ElementType::Function).unwrap();
        assert!(def.is_definition);
        assert_eq!(def.arity(), 1);
        assert_eq!(def.range.start_line, 2);
    }

    #[test]
    fn test_method_definition() {
        let out = parse(
            "package main\n\ntype Server struct{}\n\nfunc (s *Server) Start(port int) error {\n\treturn nil\n}\n",
        );
        let def = find(&out, "Start", ElementType::Method).unwrap();
        assert!(def.is_definition);
        assert_eq!(def.arity(), 1);
        assert!(find(&out, "Server", ElementType::Class).is_some());
    }

    #[test]
    fn test_interface_definition() {
        let out = parse("package main\n\ntype Reader interface {\n\tRead() error\n}\n");
        assert!(find(&out, "Reader", ElementType::Interface).is_some());
    }

    #[test]
    fn test_call_with_arity() {
        let out = parse("package main\n\nfunc main() {\n\tGreet(\"hi\")\n}\n");
        let call = find(&out, "Greet", ElementType::Call).unwrap();
        assert!(!call.is_definition);
        assert!(call.is_use());
        assert_eq!(call.arity(), 1);
        assert_eq!(call.range.start_line, 3);
    }

    #[test]
    fn test_selector_call_uses_field_name() {
        let out = parse("package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(1, 2)\n}\n");
        let call = find(&out, "Println", ElementType::Call).unwrap();
        assert_eq!(call.arity(), 2);
    }

    #[test]
    fn test_imports_plain_and_aliased() {
        let out = parse(
            "package main\n\nimport (\n\t\"fmt\"\n\tstr \"strings\"\n\t\"example.com/app/util\"\n)\n",
        );
        assert_eq!(out.imports.len(), 3);

        let fmt = out.imports.iter().find(|i| i.source == "fmt").unwrap();
        assert_eq!(fmt.name, "fmt");
        assert!(fmt.alias.is_none());

        let strings = out.imports.iter().find(|i| i.source == "strings").unwrap();
        assert_eq!(strings.alias.as_deref(), Some("str"));

        let util = out
            .imports
            .iter()
            .find(|i| i.source == "example.com/app/util")
            .unwrap();
        assert_eq!(util.name, "util");
    }

    #[test]
    fn test_variable_scopes() {
        let out = parse(
            "package main\n\nvar Global = 1\n\nfunc main() {\n\tlocal := 2\n\tvar inner = 3\n\t_ = local + inner\n}\n",
        );
        let global = find(&out, "Global", ElementType::Variable).unwrap();
        assert!(!global.is_local_variable());

        let local = find(&out, "local", ElementType::Variable).unwrap();
        assert!(local.is_local_variable());

        let inner = find(&out, "inner", ElementType::Variable).unwrap();
        assert!(inner.is_local_variable());
    }

    #[test]
    fn test_type_reference() {
        let out = parse(
            "package main\n\ntype Server struct{}\n\nfunc NewServer() *Server {\n\treturn &Server{}\n}\n",
        );
        let refs: Vec<_> = out
            .elements
            .iter()
            .filter(|e| e.name == "Server" && e.element_type == ElementType::Reference)
            .collect();
        assert!(!refs.is_empty());
    }

    #[test]
    fn test_garbage_input_yields_empty() {
        let out = parse("this is not go at all {{{{");
        assert!(out.imports.is_empty());
    }
}
