//! Retired-terminology scanner.
//!
//! Terms are data: `(regex, scope glob)` pairs from the ruleset. One generic
//! scanner applies them to every snapshot text.

use crate::snapshot::TextFile;
use asit_kernel::{ConfigError, ForbiddenTerm, Issue, ScanConfig, parallel, rule};
use glob::{MatchOptions, Pattern};
use regex::Regex;

const SCOPE_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct CompiledTerm {
    source: String,
    regex: Regex,
    scope: Pattern,
    replacement: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermHit {
    pub path: String,
    /// 1-based.
    pub line: usize,
    /// 1-based, in characters.
    pub column: usize,
    pub pattern: String,
    pub matched: String,
    pub replacement: Option<String>,
}

impl TermHit {
    pub fn to_issue(&self) -> Issue {
        let mut message = format!(
            "line {}:{}: retired term {:?} (pattern {})",
            self.line, self.column, self.matched, self.pattern
        );
        if let Some(replacement) = &self.replacement {
            message.push_str(&format!("; use {replacement:?}"));
        }
        Issue::structural(rule::TREE_FORBIDDEN_TERM, self.path.clone(), message)
    }
}

#[derive(Debug, Clone)]
pub struct ForbiddenScanner {
    terms: Vec<CompiledTerm>,
}

fn compile(term: &ForbiddenTerm) -> Result<CompiledTerm, ConfigError> {
    let regex = Regex::new(&term.pattern).map_err(|err| ConfigError::Pattern {
        pattern: term.pattern.clone(),
        reason: err.to_string(),
    })?;
    let scope = Pattern::new(&term.scope).map_err(|err| ConfigError::Pattern {
        pattern: term.scope.clone(),
        reason: err.to_string(),
    })?;
    Ok(CompiledTerm {
        source: term.pattern.clone(),
        regex,
        scope,
        replacement: term.replacement.clone(),
    })
}

impl ForbiddenScanner {
    pub fn new(scan: &ScanConfig) -> Result<Self, ConfigError> {
        let terms = scan
            .forbidden
            .iter()
            .map(compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { terms })
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Hits in one file, in (line, term, column) order.
    pub fn scan_file(&self, file: &TextFile) -> Vec<TermHit> {
        let terms: Vec<&CompiledTerm> = self
            .terms
            .iter()
            .filter(|term| term.scope.matches_with(&file.path, SCOPE_MATCH))
            .collect();
        if terms.is_empty() {
            return Vec::new();
        }
        let mut hits = Vec::new();
        for (idx, line) in file.content.lines().enumerate() {
            for term in &terms {
                for found in term.regex.find_iter(line) {
                    hits.push(TermHit {
                        path: file.path.clone(),
                        line: idx + 1,
                        column: line[..found.start()].chars().count() + 1,
                        pattern: term.source.clone(),
                        matched: found.as_str().to_string(),
                        replacement: term.replacement.clone(),
                    });
                }
            }
        }
        hits
    }

    /// Hits across all files, scanned concurrently and merged by a stable
    /// sort on (path, line, pattern).
    pub fn scan(&self, files: &[TextFile]) -> Vec<TermHit> {
        let mut hits: Vec<TermHit> = parallel::map_ordered(files, |file| self.scan_file(file))
            .into_iter()
            .flatten()
            .collect();
        hits.sort_by(|a, b| {
            (a.path.as_str(), a.line, a.pattern.as_str())
                .cmp(&(b.path.as_str(), b.line, b.pattern.as_str()))
        });
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(path: &str, content: &str) -> TextFile {
        TextFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn default_terms_report_line_and_column() {
        let scanner = ForbiddenScanner::new(&ScanConfig::default()).unwrap();
        let hits = scanner.scan(&[text(
            "IIS/META/README.md",
            "# IIS\nThe SUBSYSTEMS layer and QBIT leaf.\nquantum-only path\n",
        )]);
        let summary: Vec<(usize, usize, &str)> = hits
            .iter()
            .map(|h| (h.line, h.column, h.matched.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![(2, 26, "QBIT"), (2, 5, "SUBSYSTEMS"), (3, 1, "quantum-only")]
        );
        assert_eq!(
            hits[1].to_issue().annotation(),
            "::error file=IIS/META/README.md::line 2:5: retired term \"SUBSYSTEMS\" \
             (pattern \\bSUBSYSTEMS\\b); use \"SYSTEMS\" (violates TREE-2.1)"
        );
    }

    #[test]
    fn scope_glob_limits_terms() {
        let scanner = ForbiddenScanner::new(&ScanConfig::default()).unwrap();
        assert!(scanner.scan(&[text("IIS/BITS/CB/leaf.json", "\"quantum only\"")]).is_empty());
        assert_eq!(scanner.scan(&[text("notes.md", "Quantum Only")]).len(), 1);
    }

    #[test]
    fn merged_order_is_by_path_line_pattern() {
        let scanner = ForbiddenScanner::new(&ScanConfig::default()).unwrap();
        let hits = scanner.scan(&[
            text("b.txt", "PARTS\nSUBSYSTEMS PARTS"),
            text("a.txt", "QBIT"),
        ]);
        let keys: Vec<(&str, usize, &str)> = hits
            .iter()
            .map(|h| (h.path.as_str(), h.line, h.pattern.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a.txt", 1, r"\bQBIT\b"),
                ("b.txt", 1, r"\bPARTS\b"),
                ("b.txt", 2, r"\bPARTS\b"),
                ("b.txt", 2, r"\bSUBSYSTEMS\b"),
            ]
        );
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let scan = ScanConfig {
            forbidden: vec![ForbiddenTerm {
                pattern: "(".to_string(),
                scope: "**/*".to_string(),
                replacement: None,
            }],
            ..ScanConfig::default()
        };
        assert!(matches!(
            ForbiddenScanner::new(&scan),
            Err(ConfigError::Pattern { .. })
        ));
    }
}
