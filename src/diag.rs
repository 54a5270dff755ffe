//! Diagnostic accumulation for the parser and semantic analyzer.
//!
//! Diagnostics are *collected*, never thrown (spec.md §7): the parser and
//! the semantic analyzer push onto a [`DiagnosticBag`] owned by the
//! translation unit and keep going. Fatal bugs below the analyzer (a
//! localization/allocation/selection invariant violated) are a different
//! regime entirely and are reported as `anyhow::Error`, not as a
//! `Diagnostic` — see the pass functions in `localize`, `regalloc`, and
//! `select`.

use std::fmt;

/// Severity of a collected diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single row/column-attributed diagnostic.
///
/// `depth` records how deep into a grammar production the parser had
/// descended when an `expected` request failed; the deepest recorded parse
/// error is taken as the best user-facing message (spec.md §4.1).
#[derive(Clone, Debug, serde::Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub row: u32,
    pub col: u32,
    pub message: String,
    pub depth: u32,
}

impl Diagnostic {
    pub fn new(severity: Severity, row: u32, col: u32, message: impl Into<String>) -> Self {
        Diagnostic { severity, row, col, message: message.into(), depth: 0 }
    }

    pub fn error(row: u32, col: u32, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, row, col, message)
    }

    pub fn warn(row: u32, col: u32, message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, row, col, message)
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cc: {}: [{}:{}] {}", self.severity, self.row, self.col, self.message)
    }
}

/// Accumulator for a single translation unit's diagnostics.
///
/// Mirrors the reference's `tlu_errors` vector hanging off the translation
/// unit AST node (`cc.h: tlu_external_declarations`/`tlu_errors`), kept as
/// a free-standing container here rather than a field on the AST arena so
/// that passes which don't own the AST (the constant evaluator) can still
/// report into it.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct DiagnosticBag {
    entries: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.entries.push(diag);
    }

    pub fn error(&mut self, row: u32, col: u32, message: impl Into<String>) {
        self.push(Diagnostic::error(row, col, message));
    }

    pub fn warn(&mut self, row: u32, col: u32, message: impl Into<String>) {
        self.push(Diagnostic::warn(row, col, message));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|d| d.severity == Severity::Error).count()
    }

    /// Non-zero error count gates further compilation (spec.md §4.3).
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// The deepest recorded error, used as the single best parse message
    /// when the parser could not recover (spec.md §4.1).
    pub fn deepest(&self) -> Option<&Diagnostic> {
        self.entries.iter().max_by_key(|d| d.depth)
    }

    pub fn sorted_by_position(&self) -> Vec<&Diagnostic> {
        let mut v: Vec<&Diagnostic> = self.entries.iter().collect();
        v.sort_by_key(|d| (d.row, d.col));
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gates_on_errors_not_warnings() {
        let mut bag = DiagnosticBag::new();
        bag.warn(1, 1, "unused variable");
        assert!(!bag.has_errors());
        bag.error(2, 3, "undeclared identifier");
        assert!(bag.has_errors());
        assert_eq!(bag.error_count(), 1);
    }

    #[test]
    fn deepest_error_wins() {
        let mut bag = DiagnosticBag::new();
        bag.push(Diagnostic::error(1, 1, "shallow").with_depth(2));
        bag.push(Diagnostic::error(1, 5, "deep").with_depth(9));
        assert_eq!(bag.deepest().unwrap().message, "deep");
    }

    #[test]
    fn display_matches_reference_format() {
        let d = Diagnostic::error(4, 10, "undeclared identifier 'x'");
        assert_eq!(format!("{d}"), "cc: error: [4:10] undeclared identifier 'x'");
    }
}
