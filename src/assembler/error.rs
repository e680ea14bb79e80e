//! The assembler's error taxonomy.
//!
//! Every variant here answers to one of the kinds named in the error
//! taxonomy: lexical errors, parse errors, argument count/kind errors,
//! duplicate/unresolved labels, and unknown architectures. Handler-level
//! conditions that don't need their own variant (numeric-range checks,
//! alignment, and the PALM backend's register/device/address range
//! checks) are carried generically in `Handler`, the same way the
//! original Python implementation let architecture modules raise a bare
//! `ValueError` and only attached line context at the driver boundary.
//!
//! `Display` renders the fatal-error banner described in the language
//! reference (`### Fatal error on line N: ...`), with an optional
//! caret-underline of the offending span appended to the message body —
//! ported from the teacher crate's `underline_spans` helper.

use std::fmt;

use super::op::TokenSpan;

#[derive(Debug)]
pub enum Error {
    /// Unterminated string, or a label token that doesn't match the label
    /// grammar.
    Lexical {
        line_number: usize,
        line: String,
        why: String,
    },
    /// Argument classification exhausted every alternative (dereference,
    /// register, number, address).
    InvalidArgument {
        argument: String,
        argument_span: TokenSpan,
        line_number: usize,
        line: String,
        why: String,
    },
    /// A handler saw the wrong number of arguments.
    InvalidArgumentCount {
        instruction: String,
        n_arguments: usize,
        expected: Vec<usize>,
        extra_argument_spans: Vec<TokenSpan>,
        line_number: usize,
        line: String,
    },
    /// An argument parsed to a shape the handler doesn't accept there
    /// (e.g. a register where only an address is valid).
    InvalidArgumentKind {
        argument: String,
        argument_span: TokenSpan,
        instruction: String,
        line_number: usize,
        line: String,
    },
    /// A label name was bound more than once.
    LabelDuplicate {
        label: String,
        first_line: usize,
        line_number: usize,
        line: String,
    },
    /// The fixpoint loop stabilized with lines still awaiting codegen.
    LabelUnresolved {
        after_passes: usize,
        stuck: Vec<(usize, String)>,
    },
    /// `cpu`/`arch` named an architecture with no registered back end.
    ArchUnknown {
        name: String,
        line_number: usize,
        line: String,
    },
    /// An opcode isn't recognized by the active architecture.
    OpcodeUnknown {
        opcode: String,
        arch: String,
        line_number: usize,
        line: String,
    },
    /// Any other `ValueError`-class condition a handler raised: numeric
    /// range, alignment, or a family-specific register/device/address
    /// check in the PALM back end.
    Handler {
        line_number: usize,
        line: String,
        why: String,
    },
    /// An exception that isn't supposed to happen: a bug in the
    /// assembler itself, not in the source it's assembling.
    Internal {
        line_number: usize,
        line: String,
        message: String,
    },
    /// The input contained no assemblable lines.
    Empty,
}

impl std::error::Error for Error {}

fn underline(line: &str, spans: &[TokenSpan]) -> String {
    let mut underline: Vec<char> = vec![' '; line.chars().count()];
    for span in spans {
        for i in span.start()..span.end() {
            if i < underline.len() {
                underline[i] = '^';
            }
        }
    }
    underline.into_iter().collect()
}

fn banner(f: &mut fmt::Formatter<'_>, line_number: usize, line: &str, why: &str) -> fmt::Result {
    writeln!(f, "### Fatal error on line {}:", line_number)?;
    writeln!(f, "###   {}", line)?;
    for part in why.split('\n') {
        writeln!(f, "### {}", part)?;
    }
    Ok(())
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Lexical {
                line_number, line, why,
            } => banner(f, *line_number, line, why),

            Error::InvalidArgument {
                argument, argument_span, line_number, line, why,
            } => {
                let why = format!(
                    "invalid argument {:?}: {}\n{}",
                    argument,
                    why,
                    underline(line, &[*argument_span])
                );
                banner(f, *line_number, line, &why)
            }

            Error::InvalidArgumentCount {
                instruction, n_arguments, expected, extra_argument_spans, line_number, line,
            } => {
                let mut why = format!(
                    "invalid argument count for instruction {:?}: found {}, expected {:?}",
                    instruction, n_arguments, expected
                );
                if !extra_argument_spans.is_empty() {
                    why.push('\n');
                    why.push_str(&underline(line, extra_argument_spans));
                }
                banner(f, *line_number, line, &why)
            }

            Error::InvalidArgumentKind {
                argument, argument_span, instruction, line_number, line,
            } => {
                let why = format!(
                    "argument {:?} to {} has the wrong kind\n{}",
                    argument,
                    instruction.to_uppercase(),
                    underline(line, &[*argument_span])
                );
                banner(f, *line_number, line, &why)
            }

            Error::LabelDuplicate {
                label, first_line, line_number, line,
            } => {
                let why = format!(
                    "the label {:?} was already used on line {}",
                    label, first_line
                );
                banner(f, *line_number, line, &why)
            }

            Error::LabelUnresolved { after_passes, stuck } => {
                writeln!(
                    f,
                    "### Fatal error after {} passes: unresolved labels or other issues prevent full assembly:",
                    after_passes
                )?;
                for (lineno, line) in stuck {
                    writeln!(f, "###   {:>5}: {}", lineno, line)?;
                }
                Ok(())
            }

            Error::ArchUnknown { name, line_number, line } => {
                let why = format!(
                    "failed to load a code-generation back end for architecture {:?}",
                    name
                );
                banner(f, *line_number, line, &why)
            }

            Error::OpcodeUnknown { opcode, arch, line_number, line } => {
                let why = format!(
                    "opcode {:?} not recognized for architecture {:?}",
                    opcode, arch
                );
                banner(f, *line_number, line, &why)
            }

            Error::Handler { line_number, line, why } => banner(f, *line_number, line, why),

            Error::Internal { line_number, line, message } => {
                let why = format!(
                    "internal error, sorry! this is probably a bug in the assembler itself: {}",
                    message
                );
                banner(f, *line_number, line, &why)
            }

            Error::Empty => writeln!(f, "### Fatal error: no code to compile in the input"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_includes_line_number_and_text() {
        let err = Error::ArchUnknown {
            name: "z80".to_string(),
            line_number: 3,
            line: "arch z80".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.starts_with("### Fatal error on line 3:\n"));
        assert!(rendered.contains("arch z80"));
        assert!(rendered.contains("z80"));
    }

    #[test]
    fn empty_source_message_has_no_line_banner() {
        let rendered = Error::Empty.to_string();
        assert!(rendered.contains("no code to compile"));
    }

    #[test]
    fn invalid_argument_underlines_the_span() {
        let err = Error::InvalidArgument {
            argument: "!!!".to_string(),
            argument_span: TokenSpan::new(4, 7),
            line_number: 1,
            line: "add !!!".to_string(),
            why: "malformed".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("^^^"));
    }
}
