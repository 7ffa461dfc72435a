//! Java source extraction.

use tree_sitter::{Node, Parser};

use crate::parsing::parser::{
    ParsedFile, SourceParser, depth_exceeded, last_segment, node_range, node_text,
};
use crate::parsing::Language;
use crate::types::{Element, ElementType, ExtraData, Import, VariableScope};

pub struct JavaParser {
    parser: Parser,
}

impl JavaParser {
    pub fn new() -> Result<Self, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .map_err(|e| format!("Failed to set Java language: {e}"))?;
        Ok(Self { parser })
    }

    fn collect(&self, node: Node, code: &str, out: &mut ParsedFile, depth: usize) {
        if depth_exceeded(depth, node) {
            return;
        }

        match node.kind() {
            "import_declaration" => {
                self.collect_import(node, code, out);
                return;
            }
            "class_declaration" | "enum_declaration" | "record_declaration" => {
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
            "method_declaration" | "constructor_declaration" => {
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
            "method_invocation" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    let arity = node
                        .child_by_field_name("arguments")
                        .map(|args| args.named_child_count() as u32)
                        .unwrap_or(0);
                    let params = (0..arity).map(|i| format!("arg{i}")).collect();
                    out.elements.push(
                        Element::new(node_text(name_node, code), ElementType::Call, node_range(node))
                            .with_extra(ExtraData::Callable { params }),
                    );
                }
            }
            "object_creation_expression" => {
                if let Some(type_node) = node.child_by_field_name("type") {
                    if type_node.kind() == "type_identifier" {
                        let arity = node
                            .child_by_field_name("arguments")
                            .map(|args| args.named_child_count() as u32)
                            .unwrap_or(0);
                        let params = (0..arity).map(|i| format!("arg{i}")).collect();
                        out.elements.push(
                            Element::new(
                                node_text(type_node, code),
                                ElementType::Call,
                                node_range(node),
                            )
                            .with_extra(ExtraData::Callable { params }),
                        );
                    }
                }
            }
            "field_declaration" => {
                self.collect_variables(node, code, VariableScope::Class, out);
            }
            "local_variable_declaration" => {
                self.collect_variables(node, code, VariableScope::Function, out);
            }
            "type_identifier" => {
                let is_definition_name = node.parent().is_some_and(|p| {
                    matches!(
                        p.kind(),
                        "class_declaration"
                            | "interface_declaration"
                            | "enum_declaration"
                            | "record_declaration"
                    )
                });
                let is_constructor_type = node
                    .parent()
                    .is_some_and(|p| p.kind() == "object_creation_expression");
                if !is_definition_name && !is_constructor_type {
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

    fn collect_import(&self, node: Node, code: &str, out: &mut ParsedFile) {
        let mut cursor = node.walk();
        let Some(path_node) = node
            .children(&mut cursor)
            .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
        else {
            return;
        };
        let source = node_text(path_node, code).to_string();
        let mut wildcard_cursor = node.walk();
        let is_wildcard = node
            .children(&mut wildcard_cursor)
            .any(|c| c.kind() == "asterisk");
        let name = if is_wildcard {
            "*".to_string()
        } else {
            last_segment(&source, ".").to_string()
        };
        out.imports.push(Import::new(name, source, node_range(node)));
    }

    fn collect_variables(&self, node: Node, code: &str, scope: VariableScope, out: &mut ParsedFile) {
        let mut cursor = node.walk();
        for declarator in node.children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            if let Some(name_node) = declarator.child_by_field_name("name") {
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
    }

    fn parameter_names(&self, parameters: Option<Node>, code: &str) -> Vec<String> {
        let Some(parameters) = parameters else {
            return Vec::new();
        };
        let mut names = Vec::new();
        let mut cursor = parameters.walk();
        for param in parameters.children(&mut cursor) {
            if !matches!(param.kind(), "formal_parameter" | "spread_parameter") {
                continue;
            }
            if let Some(name_node) = param.child_by_field_name("name") {
                names.push(node_text(name_node, code).to_string());
            } else if let Some(last) =
                param.named_child((param.named_child_count() as u32).saturating_sub(1))
            {
                names.push(node_text(last, code).to_string());
            }
        }
        names
    }
}

impl SourceParser for JavaParser {
    fn language(&self) -> Language {
        Language::Java
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
        JavaParser::new().unwrap().parse(code)
    }

    fn find<'a>(out: &'a ParsedFile, name: &str, element_type: ElementType) -> Option<&'a Element> {
        out.elements
            .iter()
            .find(|e| e.name == name && e.element_type == element_type)
    }

    #[test]
    fn test_class_method_and_field() {
        let code = r#"
public class Store {
    private int size;

    public void put(String key, String value) {
        persist(key, value);
    }
}
"#;
        let out = parse(code);
        assert!(find(&out, "Store", ElementType::Class).is_some());

        let method = find(&out, "put", ElementType::Method).unwrap();
        assert_eq!(method.arity(), 2);

        let field = find(&out, "size", ElementType::Variable).unwrap();
        assert!(!field.is_local_variable());

        let call = find(&out, "persist", ElementType::Call).unwrap();
        assert_eq!(call.arity(), 2);
    }

    #[test]
    fn test_interface() {
        let out = parse("public interface Reader {\n    String read();\n}\n");
        assert!(find(&out, "Reader", ElementType::Interface).is_some());
    }

    #[test]
    fn test_imports() {
        let code = "import java.util.List;\nimport com.example.storage.*;\n\npublic class A {}\n";
        let out = parse(code);

        let list = out.imports.iter().find(|i| i.source == "java.util.List").unwrap();
        assert_eq!(list.name, "List");

        let wildcard = out
            .imports
            .iter()
            .find(|i| i.source == "com.example.storage")
            .unwrap();
        assert_eq!(wildcard.name, "*");
    }

    #[test]
    fn test_local_variable_and_constructor_call() {
        let code = r#"
public class A {
    public void run() {
        Store store = new Store(10);
        store.put("k", "v");
    }
}
"#;
        let out = parse(code);
        let local = find(&out, "store", ElementType::Variable).unwrap();
        assert!(local.is_local_variable());

        let ctor = find(&out, "Store", ElementType::Call).unwrap();
        assert_eq!(ctor.arity(), 1);
    }
}
