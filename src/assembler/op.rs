//! [Op] and its supporting types: one source line in flight across passes.

use super::arg::Arg;

/// A span of text in the source line, used to underline errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    start: usize,
    end: usize,
}

impl TokenSpan {
    pub fn new(start: usize, end: usize) -> TokenSpan {
        TokenSpan { start, end }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }
}

/// The next step the driver should apply to an [Op].
///
/// A tagged variant instead of a stored closure: it keeps `Op` plain
/// data and makes counting how many lines are still pending codegen (the
/// fixpoint loop's termination condition) a simple field comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Todo {
    Lex,
    Codegen,
    Done,
}

/// One line of source code and its progress toward a finished emission.
///
/// Mutated in place across passes, unlike the functional-update style of
/// the system this was distilled from: the driver owns every `Op` for
/// the program's lifetime, so there's no benefit to copy-on-write here.
#[derive(Debug, Clone)]
pub struct Op {
    pub lineno: usize,
    pub line: String,
    pub tokens: Vec<String>,
    pub token_spans: Vec<TokenSpan>,
    pub labels: Vec<String>,
    pub opcode: String,
    pub opcode_span: TokenSpan,
    pub args: Vec<Arg>,
    pub arg_spans: Vec<TokenSpan>,
    pub hex: Option<String>,
    pub todo: Todo,
}

impl Op {
    /// Construct a freshly-loaded line: labels and raw tokens known,
    /// opcode/args not yet split out.
    pub fn new(
        lineno: usize,
        line: String,
        labels: Vec<String>,
        tokens: Vec<String>,
        token_spans: Vec<TokenSpan>,
    ) -> Op {
        Op {
            lineno,
            line,
            tokens,
            token_spans,
            labels,
            opcode: String::new(),
            opcode_span: TokenSpan::new(0, 0),
            args: Vec::new(),
            arg_spans: Vec::new(),
            hex: None,
            todo: Todo::Lex,
        }
    }

    /// Build an [`super::Error::InvalidArgumentCount`] for this op.
    pub fn invalid_argument_count(&self, expected: &[usize]) -> super::Error {
        let n_arguments = self.args.len();
        let max_expected = expected.iter().copied().max().unwrap_or(0);
        let extra_argument_spans = self.arg_spans.get(max_expected..).unwrap_or(&[]).to_vec();
        super::Error::InvalidArgumentCount {
            instruction: self.opcode.clone(),
            n_arguments,
            expected: expected.to_vec(),
            extra_argument_spans,
            line_number: self.lineno,
            line: self.line.clone(),
        }
    }

    /// Build an [`super::Error::InvalidArgumentKind`] for the argument at
    /// `index`.
    pub fn invalid_argument_kind(&self, index: usize) -> super::Error {
        super::Error::InvalidArgumentKind {
            argument: self.args[index].stripped.clone(),
            argument_span: self.arg_spans[index],
            instruction: self.opcode.clone(),
            line_number: self.lineno,
            line: self.line.clone(),
        }
    }

    /// Build a generic [`super::Error::Handler`] carrying `why`, for
    /// family-specific checks (register/device/address ranges,
    /// alignment) that don't need a structured span.
    pub fn handler_error(&self, why: impl Into<String>) -> super::Error {
        super::Error::Handler {
            line_number: self.lineno,
            line: self.line.clone(),
            why: why.into(),
        }
    }
}
