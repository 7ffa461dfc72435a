//! File skeleton: the stored element table of one file, in external
//! coordinates.

use std::path::{Path, PathBuf};

use crate::error::{IndexError, IndexResult};
use crate::query::{QueryEngine, to_external};
use crate::storage::FileElementTable;

impl QueryEngine {
    /// The element table of a file with ranges translated to the 1-based
    /// inclusive convention consumers expect.
    ///
    /// Unlike the graph queries, an unrecognized extension here is an
    /// `UnsupportedFileType` failure.
    pub fn get_file_element_table(
        &self,
        workspace: &Path,
        file_path: &str,
    ) -> IndexResult<FileElementTable> {
        let target = self.prepare(workspace, file_path).map_err(|e| match e {
            IndexError::UnsupportedLanguage { path, extension } => {
                IndexError::UnsupportedFileType { path, extension }
            }
            other => other,
        })?;
        let mut table = self
            .load_table(&target)?
            .ok_or_else(|| IndexError::IndexNotFound {
                path: PathBuf::from(file_path),
            })?;
        externalize(&mut table);
        Ok(table)
    }
}

fn externalize(table: &mut FileElementTable) {
    for element in &mut table.elements {
        element.range = to_external(element.range);
    }
    for import in &mut table.imports {
        import.range = to_external(import.range);
    }
}
