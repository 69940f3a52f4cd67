//! CLI output formatting for `render` and `check`.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects. Diagnostics go through `tracing` to
//! stderr; what is printed here is the summary a user reads at the end.
//!
//! # Output Format
//!
//! ## Render
//!
//! ```text
//! Rendered 12 documents, 30 unmodified, 2 skipped
//! Copied 4 files
//! Failed 1
//!     blog/draft.html.tpl: unclosed '{{#each}}' block
//! Output: site/build
//! ```
//!
//! ## Check
//!
//! ```text
//! Site
//!     42 documents, 3 layouts, 1 data file, 7 files
//!     1 book, 2 paginated pages, 1 draft, 2 partials
//! Stale (2)
//!     index.html.tpl
//!     blog/2024-1-1-new.html.md
//! Unmodified 40 documents, 7 files
//! ```

use crate::build::{BuildFailure, BuildReport, CheckReport};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 file`, `2 files`.
fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

fn failure_lines(failures: &[BuildFailure]) -> Vec<String> {
    if failures.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!("Failed {}", failures.len())];
    lines.extend(
        failures
            .iter()
            .map(|f| format!("{}{}: {}", indent(1), f.source, f.message)),
    );
    lines
}

// ============================================================================
// Render
// ============================================================================

pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut summary = format!(
        "Rendered {}, {} unmodified",
        count(report.rendered, "document", "documents"),
        report.unmodified
    );
    if report.skipped > 0 {
        summary.push_str(&format!(", {} skipped", report.skipped));
    }
    let mut lines = vec![summary];
    if report.copied > 0 {
        lines.push(format!("Copied {}", count(report.copied, "file", "files")));
    }
    lines.extend(failure_lines(&report.failures));
    lines.push(format!("Output: {}", report.output_root.display()));
    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check_output(report: &CheckReport) -> Vec<String> {
    let mut lines = vec![
        "Site".to_string(),
        format!(
            "{}{}, {}, {}, {}",
            indent(1),
            count(report.documents, "document", "documents"),
            count(report.layouts, "layout", "layouts"),
            count(report.data, "data file", "data files"),
            count(report.files, "file", "files"),
        ),
        format!(
            "{}{}, {}, {}, {}",
            indent(1),
            count(report.books, "book", "books"),
            count(report.pages, "paginated page", "paginated pages"),
            count(report.drafts, "draft", "drafts"),
            count(report.partials, "partial", "partials"),
        ),
    ];

    if report.stale.is_empty() {
        lines.push("Nothing to render".to_string());
    } else {
        lines.push(format!("Stale ({})", report.stale.len()));
        lines.extend(report.stale.iter().map(|s| format!("{}{}", indent(1), s)));
    }
    lines.push(format!(
        "Unmodified {}, {}",
        count(report.unmodified, "document", "documents"),
        count(
            report.files - report.stale_files.min(report.files),
            "file",
            "files"
        ),
    ));
    lines.extend(failure_lines(&report.failures));
    lines
}

pub fn print_check_output(report: &CheckReport) {
    for line in format_check_output(report) {
        println!("{}", line);
    }
}
