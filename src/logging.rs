//! Diagnostic reporting: warnings and fatal errors.
//!
//! Warnings raised during assembly (overlap, NOP substitution, address
//! regression) are routed through a [`DiagnosticSink`] rather than
//! printed directly, so tests can capture them instead of scraping
//! stderr. [`ConsoleSink`] reproduces the console presentation the
//! teacher crate used for its own warnings and errors.

use colored::Colorize;

/// Receives warnings emitted during assembly.
///
/// Fatal errors are not routed through this trait: they abort assembly
/// and are reported by the caller via `Display` on [`crate::assembler::Error`].
pub trait DiagnosticSink {
    /// A non-fatal condition occurred while assembling `line_number`.
    fn warning(&mut self, line_number: usize, message: String);
}

/// Prints warnings to stderr, styled the way the teacher crate's
/// `logging::warning` did.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl DiagnosticSink for ConsoleSink {
    fn warning(&mut self, line_number: usize, message: String) {
        let warning = "warning:".yellow().bold();
        eprintln!("{} line {}: {}", warning, line_number, message);
    }
}

/// Pretty-print a fatal error message to the console.
pub fn error(error_message: String) {
    let error_title = "error:".red().bold();
    eprintln!("{} {}", error_title, error_message);
}

/// Collects warnings in memory instead of printing them; used by tests
/// that need to assert on which diagnostics were raised.
#[derive(Debug, Default)]
pub struct CapturingSink {
    pub warnings: Vec<(usize, String)>,
}

impl DiagnosticSink for CapturingSink {
    fn warning(&mut self, line_number: usize, message: String) {
        self.warnings.push((line_number, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capturing_sink_records_warnings_in_order() {
        let mut sink = CapturingSink::default();
        sink.warning(3, "first".to_string());
        sink.warning(9, "second".to_string());
        assert_eq!(
            sink.warnings,
            vec![(3, "first".to_string()), (9, "second".to_string())]
        );
    }
}
