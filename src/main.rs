use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use codegraph::query::{CallGraphQuery, DefinitionQuery, ReferenceQuery};
use codegraph::storage::ProjectUuid;
use codegraph::{Indexer, Settings, logging};

#[derive(Parser)]
#[command(name = "codegraph")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Local incremental code-graph indexer and query engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a workspace directory
    Index {
        /// Workspace root to index
        workspace: PathBuf,
    },

    /// Index specific files of a workspace
    IndexFiles {
        workspace: PathBuf,
        /// Files to (re)index, absolute or workspace-relative
        paths: Vec<PathBuf>,
    },

    /// Remove files or directories from the index
    Remove {
        workspace: PathBuf,
        /// Paths to remove, absolute or workspace-relative
        paths: Vec<PathBuf>,
    },

    /// Drop every record of a workspace
    RemoveAll { workspace: PathBuf },

    /// Rewrite records after a file or directory rename
    Rename {
        workspace: PathBuf,
        old_path: PathBuf,
        new_path: PathBuf,
    },

    /// Show how many files are indexed
    Summary { workspace: PathBuf },

    /// Query the graph
    Query {
        #[command(subcommand)]
        query: QueryCommands,
    },

    /// Print the stored element table of a file
    Skeleton {
        workspace: PathBuf,
        file_path: String,
    },

    /// Dump a project's records as JSON lines
    Export {
        /// Project root (its records are exported)
        project_root: PathBuf,
    },

    /// Show the resolved configuration
    Config,
}

#[derive(Subcommand)]
enum QueryCommands {
    /// Find the definitions visible from a file region or snippet
    Definitions {
        workspace: PathBuf,
        file_path: String,
        #[arg(long)]
        start_line: Option<u32>,
        #[arg(long)]
        end_line: Option<u32>,
        /// Resolve identifiers of this snippet instead of a line range
        #[arg(long)]
        snippet: Option<String>,
    },

    /// Find the use sites of a definition
    References {
        workspace: PathBuf,
        file_path: String,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        start_line: Option<u32>,
        #[arg(long)]
        end_line: Option<u32>,
    },

    /// Build the call tree below a function or method
    Callgraph {
        workspace: PathBuf,
        file_path: String,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        start_line: Option<u32>,
        #[arg(long)]
        end_line: Option<u32>,
        #[arg(long)]
        max_layer: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let settings = Arc::new(Settings::load().context("failed to load configuration")?.sanitize());
    let indexer = Indexer::open(settings.clone()).context("failed to open the graph store")?;
    let cancel = CancellationToken::new();

    match cli.command {
        Commands::Index { workspace } => {
            let metrics = indexer.index_workspace(&workspace, &cancel)?;
            println!(
                "indexed {} files ({} failed)",
                metrics.total_files, metrics.total_failed_files
            );
            for path in &metrics.failed_paths {
                eprintln!("  failed: {path}");
            }
        }
        Commands::IndexFiles { workspace, paths } => {
            let metrics = indexer.index_files(&workspace, &paths, &cancel)?;
            println!(
                "indexed {} files ({} failed)",
                metrics.total_files, metrics.total_failed_files
            );
        }
        Commands::Remove { workspace, paths } => {
            indexer.remove_indexes(&workspace, &paths, &cancel)?;
            println!("removed");
        }
        Commands::RemoveAll { workspace } => {
            indexer.remove_all_indexes(&workspace)?;
            println!("removed all records");
        }
        Commands::Rename {
            workspace,
            old_path,
            new_path,
        } => {
            indexer.rename_indexes(&workspace, &old_path, &new_path, &cancel)?;
            println!("renamed");
        }
        Commands::Summary { workspace } => {
            let total = indexer.get_summary(&workspace)?;
            println!("{total} files indexed");
        }
        Commands::Query { query } => run_query(&indexer, query, &cancel)?,
        Commands::Skeleton {
            workspace,
            file_path,
        } => {
            let table = indexer.get_file_element_table(&workspace, &file_path)?;
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
        Commands::Export { project_root } => {
            let uuid = ProjectUuid::from_root_path(&project_root);
            for item in indexer.queries().export_iter(&uuid)? {
                let (key, value) = item?;
                println!(
                    "{}\t{}",
                    String::from_utf8_lossy(&key),
                    String::from_utf8_lossy(&value)
                );
            }
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(settings.as_ref())?);
        }
    }
    Ok(())
}

fn run_query(
    indexer: &Indexer,
    query: QueryCommands,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    match query {
        QueryCommands::Definitions {
            workspace,
            file_path,
            start_line,
            end_line,
            snippet,
        } => {
            let definitions = indexer.query_definitions(
                &workspace,
                &DefinitionQuery {
                    file_path,
                    start_line,
                    end_line,
                    code_snippet: snippet,
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }
        QueryCommands::References {
            workspace,
            file_path,
            symbol,
            start_line,
            end_line,
        } => {
            let nodes = indexer.query_references(
                &workspace,
                &ReferenceQuery {
                    file_path,
                    symbol_name: symbol,
                    start_line,
                    end_line,
                },
                cancel,
            )?;
            println!("{}", serde_json::to_string_pretty(&nodes)?);
        }
        QueryCommands::Callgraph {
            workspace,
            file_path,
            symbol,
            start_line,
            end_line,
            max_layer,
        } => {
            let nodes = indexer.query_call_graph(
                &workspace,
                &CallGraphQuery {
                    file_path,
                    symbol_name: symbol,
                    start_line,
                    end_line,
                    max_layer,
                },
                cancel,
            )?;
            println!("{}", serde_json::to_string_pretty(&nodes)?);
        }
    }
    Ok(())
}
