//! Counters reported by indexing operations.

use crate::analyzer::SymbolMetrics;

/// Aggregated result of an indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexMetrics {
    /// Files actually parsed and persisted (unchanged files are excluded).
    pub total_files: usize,
    pub total_failed_files: usize,
    pub failed_paths: Vec<String>,
    pub total_symbols: usize,
    pub total_variables: usize,
}

impl IndexMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&mut self, path: impl Into<String>) {
        self.total_failed_files += 1;
        self.failed_paths.push(path.into());
    }

    pub fn absorb_symbols(&mut self, symbols: &SymbolMetrics) {
        self.total_symbols += symbols.total_saved_symbols;
        self.total_variables += symbols.total_saved_variables;
    }

    pub fn merge(&mut self, other: IndexMetrics) {
        self.total_files += other.total_files;
        self.total_failed_files += other.total_failed_files;
        self.failed_paths.extend(other.failed_paths);
        self.total_symbols += other.total_symbols;
        self.total_variables += other.total_variables;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_accumulates() {
        let mut a = IndexMetrics {
            total_files: 2,
            ..IndexMetrics::new()
        };
        let mut b = IndexMetrics::new();
        b.record_failure("bad.go");
        b.total_files = 1;

        a.merge(b);
        assert_eq!(a.total_files, 3);
        assert_eq!(a.total_failed_files, 1);
        assert_eq!(a.failed_paths, vec!["bad.go"]);
    }
}
