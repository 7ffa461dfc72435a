//! Workspace reader: project discovery and the file walk.
//!
//! Discovery treats a directory rooted at a language-ecosystem manifest as a
//! project; a workspace with no manifests is itself one project. The walk
//! honors .gitignore, the configured ignore patterns, and a visit pattern of
//! include-extensions plus exclude-directories, capped at `max_files`.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::parsing::Language;
use crate::storage::Project;

/// Manifest files that mark a directory as a project root, with the
/// language each one hints at.
const PROJECT_MANIFESTS: &[(&str, Language)] = &[
    ("go.mod", Language::Go),
    ("Cargo.toml", Language::Rust),
    ("package.json", Language::TypeScript),
    ("pyproject.toml", Language::Python),
    ("setup.py", Language::Python),
    ("requirements.txt", Language::Python),
    ("pom.xml", Language::Java),
    ("build.gradle", Language::Java),
];

/// Governs which files a walk visits.
#[derive(Debug, Clone)]
pub struct VisitPattern {
    pub include_extensions: Vec<String>,
    pub exclude_directories: Vec<String>,
    pub max_files: usize,
}

impl VisitPattern {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            include_extensions: Language::all_extensions()
                .into_iter()
                .map(|e| e.to_string())
                .collect(),
            exclude_directories: settings.exclude_directories.clone(),
            max_files: settings.max_files,
        }
    }

    fn includes(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| ext.to_lowercase())
            .is_some_and(|ext| self.include_extensions.iter().any(|inc| inc == &ext))
    }
}

/// One file selected by the walk, with its modification time in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the project root.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub language: Language,
    pub mtime: i64,
}

pub struct WorkspaceWalker {
    settings: Arc<Settings>,
}

impl WorkspaceWalker {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Discover the projects of a workspace, capped at `max_projects`.
    pub fn discover_projects(&self, workspace: &Path) -> IndexResult<Vec<Project>> {
        if !workspace.is_dir() {
            return Err(IndexError::WorkspaceNotFound {
                path: workspace.to_path_buf(),
            });
        }

        // A manifest at the workspace root wins over nested ones.
        if let Some(hints) = manifest_hints(workspace) {
            return Ok(vec![Project::new(workspace.to_path_buf(), hints)]);
        }

        let mut projects = Vec::new();
        let mut children: Vec<PathBuf> = std::fs::read_dir(workspace)
            .map_err(|e| IndexError::FileRead {
                path: workspace.to_path_buf(),
                source: e,
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        children.sort();

        for child in children {
            if projects.len() >= self.settings.max_projects {
                tracing::debug!(
                    limit = self.settings.max_projects,
                    "project cap reached, skipping remaining directories"
                );
                break;
            }
            let name = child.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with('.') || self.settings.exclude_directories.iter().any(|d| d == name)
            {
                continue;
            }
            if let Some(hints) = manifest_hints(&child) {
                projects.push(Project::new(child, hints));
            }
        }

        if projects.is_empty() {
            projects.push(Project::new(workspace.to_path_buf(), Vec::new()));
        }
        Ok(projects)
    }

    /// Walk a project root and collect source files with their mtimes.
    pub fn collect_files(&self, root: &Path) -> IndexResult<Vec<SourceFile>> {
        let pattern = VisitPattern::from_settings(&self.settings);
        self.collect_with_pattern(root, &pattern)
    }

    pub fn collect_with_pattern(
        &self,
        root: &Path,
        pattern: &VisitPattern,
    ) -> IndexResult<Vec<SourceFile>> {
        if !root.is_dir() {
            return Err(IndexError::WorkspaceNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .require_git(false);

        let excluded = pattern.exclude_directories.clone();
        builder.filter_entry(move |entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_some_and(|ft| ft.is_dir()) && excluded.iter().any(|d| *d == name))
        });

        let mut override_builder = ignore::overrides::OverrideBuilder::new(root);
        for glob in &self.settings.ignore_patterns {
            if let Err(e) = override_builder.add(&format!("!{glob}")) {
                tracing::warn!(pattern = %glob, "invalid ignore pattern: {e}");
            }
        }
        if let Ok(overrides) = override_builder.build() {
            builder.overrides(overrides);
        }

        let mut files = Vec::new();
        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("walk error: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            if !pattern.includes(path) {
                continue;
            }
            let Some(language) = Language::from_path(path) else {
                continue;
            };
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let mtime = file_mtime(path).unwrap_or(0);
            files.push(SourceFile {
                relative_path: relative.to_string_lossy().into_owned(),
                absolute_path: path.to_path_buf(),
                language,
                mtime,
            });
            if files.len() >= pattern.max_files {
                tracing::warn!(limit = pattern.max_files, "file cap reached, walk truncated");
                break;
            }
        }
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }
}

fn manifest_hints(dir: &Path) -> Option<Vec<Language>> {
    let mut hints = Vec::new();
    for (manifest, language) in PROJECT_MANIFESTS {
        if dir.join(manifest).is_file() && !hints.contains(language) {
            hints.push(*language);
        }
    }
    if hints.is_empty() { None } else { Some(hints) }
}

/// Modification time in whole seconds since the epoch.
pub fn file_mtime(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    modified
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn walker() -> WorkspaceWalker {
        WorkspaceWalker::new(Arc::new(Settings::default()))
    }

    #[test]
    fn test_missing_workspace_errors() {
        let err = walker()
            .discover_projects(Path::new("/definitely/not/here"))
            .unwrap_err();
        assert!(matches!(err, IndexError::WorkspaceNotFound { .. }));
    }

    #[test]
    fn test_workspace_without_manifest_is_one_project() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("main.go"), "package main\n").unwrap();

        let projects = walker().discover_projects(temp.path()).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].root_path, temp.path());
    }

    #[test]
    fn test_root_manifest_wins() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("go.mod"), "module example.com/app\n").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/go.mod"), "module example.com/sub\n").unwrap();

        let projects = walker().discover_projects(temp.path()).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].language_hints, vec![Language::Go]);
    }

    #[test]
    fn test_nested_projects_capped() {
        let temp = TempDir::new().unwrap();
        for name in ["a", "b", "c", "d"] {
            let dir = temp.path().join(name);
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("go.mod"), "module x\n").unwrap();
        }

        let projects = walker().discover_projects(temp.path()).unwrap();
        // Default cap is three projects.
        assert_eq!(projects.len(), 3);
    }

    #[test]
    fn test_collect_files_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.go"), "package main\n").unwrap();
        fs::write(temp.path().join("a.go"), "package main\n").unwrap();
        fs::write(temp.path().join("notes.txt"), "nope\n").unwrap();
        fs::create_dir(temp.path().join("vendor")).unwrap();
        fs::write(temp.path().join("vendor/dep.go"), "package dep\n").unwrap();

        let files = walker().collect_files(temp.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(names, vec!["a.go", "b.go"]);
        assert!(files.iter().all(|f| f.mtime > 0));
        assert!(files.iter().all(|f| f.language == Language::Go));
    }

    #[test]
    fn test_gitignore_respected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".gitignore"), "skipped.go\n").unwrap();
        fs::write(temp.path().join("skipped.go"), "package main\n").unwrap();
        fs::write(temp.path().join("kept.go"), "package main\n").unwrap();

        let files = walker().collect_files(temp.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(names, vec!["kept.go"]);
    }

    #[test]
    fn test_max_files_cap() {
        let temp = TempDir::new().unwrap();
        for i in 0..10 {
            fs::write(temp.path().join(format!("f{i}.go")), "package main\n").unwrap();
        }
        let mut settings = Settings::default();
        settings.max_files = 4;
        let walker = WorkspaceWalker::new(Arc::new(settings));
        let files = walker.collect_files(temp.path()).unwrap();
        assert_eq!(files.len(), 4);
    }
}
