//! Call-graph and reference queries over an indexed workspace.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use codegraph::query::{CallGraphQuery, ReferenceQuery};
use codegraph::storage::ProjectUuid;
use codegraph::{ElementType, Indexer, Settings};

fn engine(data: &TempDir) -> Indexer {
    let mut settings = Settings::default();
    settings.data_path = data.path().to_path_buf();
    Indexer::open(Arc::new(settings)).unwrap()
}

fn write_chain_workspace(workspace: &Path) {
    fs::write(
        workspace.join("x.go"),
        "package main\n\nfunc A() {\n\tB()\n}\n",
    )
    .unwrap();
    fs::write(
        workspace.join("y.go"),
        "package main\n\nfunc B() {\n\tC()\n}\n",
    )
    .unwrap();
    fs::write(workspace.join("z.go"), "package main\n\nfunc C() {\n}\n").unwrap();
}

#[test]
fn test_call_graph_depth_two() {
    let data = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    write_chain_workspace(ws.path());

    let indexer = engine(&data);
    let cancel = CancellationToken::new();
    indexer.index_workspace(ws.path(), &cancel).unwrap();

    let roots = indexer
        .query_call_graph(
            ws.path(),
            &CallGraphQuery {
                file_path: "x.go".to_string(),
                symbol_name: Some("A".to_string()),
                max_layer: Some(2),
                ..Default::default()
            },
            &cancel,
        )
        .unwrap();

    assert_eq!(roots.len(), 1);
    let a = &roots[0];
    assert_eq!(a.name, "A");
    assert_eq!(a.path, "x.go");
    assert_eq!(a.children.len(), 1);

    let b = &a.children[0];
    assert_eq!(b.name, "B");
    assert_eq!(b.path, "y.go");
    assert_eq!(b.element_type, ElementType::Function);
    assert_eq!(b.children.len(), 1);

    let c = &b.children[0];
    assert_eq!(c.name, "C");
    assert_eq!(c.path, "z.go");
    // Depth limit reached: C is not expanded.
    assert!(c.children.is_empty());
}

#[test]
fn test_call_graph_warm_path_uses_persisted_records() {
    let data = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    write_chain_workspace(ws.path());

    let indexer = engine(&data);
    let cancel = CancellationToken::new();
    indexer.index_workspace(ws.path(), &cancel).unwrap();

    let query = CallGraphQuery {
        file_path: "x.go".to_string(),
        symbol_name: Some("A".to_string()),
        max_layer: Some(2),
        ..Default::default()
    };
    let cold = indexer.query_call_graph(ws.path(), &query, &cancel).unwrap();

    // The reverse index survives the query.
    let project = ProjectUuid::from_root_path(ws.path());
    let callee_records = indexer
        .store()
        .size(&project, Some(b"@callee:"))
        .unwrap();
    assert!(callee_records > 0);

    let warm = indexer.query_call_graph(ws.path(), &query, &cancel).unwrap();
    assert_eq!(cold, warm);
}

#[test]
fn test_call_graph_invalidated_after_change() {
    let data = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    write_chain_workspace(ws.path());

    let indexer = engine(&data);
    let cancel = CancellationToken::new();
    indexer.index_workspace(ws.path(), &cancel).unwrap();

    let query = CallGraphQuery {
        file_path: "x.go".to_string(),
        symbol_name: Some("A".to_string()),
        max_layer: Some(3),
        ..Default::default()
    };
    indexer.query_call_graph(ws.path(), &query, &cancel).unwrap();

    // Rewire A to call C directly.
    fs::write(
        ws.path().join("x.go"),
        "package main\n\nfunc A() {\n\tC()\n}\n",
    )
    .unwrap();
    let file = fs::OpenOptions::new()
        .append(true)
        .open(ws.path().join("x.go"))
        .unwrap();
    let bumped = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
    file.set_times(fs::FileTimes::new().set_modified(bumped)).unwrap();
    indexer.index_workspace(ws.path(), &cancel).unwrap();

    let roots = indexer.query_call_graph(ws.path(), &query, &cancel).unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].children.len(), 1);
    assert_eq!(roots[0].children[0].name, "C");
}

#[test]
fn test_call_graph_breaks_cycles() {
    let data = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    fs::write(
        ws.path().join("ping.go"),
        "package main\n\nfunc Ping() {\n\tPong()\n}\n",
    )
    .unwrap();
    fs::write(
        ws.path().join("pong.go"),
        "package main\n\nfunc Pong() {\n\tPing()\n}\n",
    )
    .unwrap();

    let indexer = engine(&data);
    let cancel = CancellationToken::new();
    indexer.index_workspace(ws.path(), &cancel).unwrap();

    let roots = indexer
        .query_call_graph(
            ws.path(),
            &CallGraphQuery {
                file_path: "ping.go".to_string(),
                symbol_name: Some("Ping".to_string()),
                max_layer: Some(10),
                ..Default::default()
            },
            &cancel,
        )
        .unwrap();

    // Ping -> Pong, then the cycle back to Ping is cut by the visited set.
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].children.len(), 1);
    let pong = &roots[0].children[0];
    assert_eq!(pong.name, "Pong");
    assert!(pong.children.is_empty());
}

#[test]
fn test_query_references() {
    let data = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    fs::write(
        ws.path().join("lib.go"),
        "package main\n\nfunc Helper() {\n\treturn\n}\n",
    )
    .unwrap();
    fs::write(
        ws.path().join("one.go"),
        "package main\n\nfunc UseOne() {\n\tHelper()\n}\n",
    )
    .unwrap();
    fs::write(
        ws.path().join("two.go"),
        "package main\n\nfunc UseTwo() {\n\tHelper()\n}\n",
    )
    .unwrap();

    let indexer = engine(&data);
    let cancel = CancellationToken::new();
    indexer.index_workspace(ws.path(), &cancel).unwrap();

    let roots = indexer
        .query_references(
            ws.path(),
            &ReferenceQuery {
                file_path: "lib.go".to_string(),
                symbol_name: Some("Helper".to_string()),
                ..Default::default()
            },
            &cancel,
        )
        .unwrap();

    assert_eq!(roots.len(), 1);
    let root = &roots[0];
    assert_eq!(root.name, "Helper");
    assert_eq!(root.element_type, ElementType::Function);
    assert_eq!(root.children.len(), 2);
    let mut paths: Vec<&str> = root.children.iter().map(|c| c.path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["one.go", "two.go"]);
    assert!(root
        .children
        .iter()
        .all(|c| c.element_type == ElementType::Call));
}

#[test]
fn test_query_references_by_range_containment() {
    let data = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    fs::write(
        ws.path().join("lib.go"),
        "package main\n\nfunc Helper() {\n\treturn\n}\n",
    )
    .unwrap();
    fs::write(
        ws.path().join("one.go"),
        "package main\n\nfunc UseOne() {\n\tHelper()\n}\n",
    )
    .unwrap();

    let indexer = engine(&data);
    let cancel = CancellationToken::new();
    indexer.index_workspace(ws.path(), &cancel).unwrap();

    // Lines 3-5 contain the whole Helper definition.
    let roots = indexer
        .query_references(
            ws.path(),
            &ReferenceQuery {
                file_path: "lib.go".to_string(),
                symbol_name: None,
                start_line: Some(3),
                end_line: Some(5),
            },
            &cancel,
        )
        .unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].name, "Helper");
    assert_eq!(roots[0].children.len(), 1);
}
