//! Source loading and lexical analysis.
//!
//! `read_source` turns raw text into [`Op`]s: one per non-blank,
//! non-comment, non-label-only line, each carrying the labels that
//! pointed at it. `lex` then splits a loaded line's tokens into an
//! opcode and its (still unparsed) arguments — argument *parsing*
//! happens later, during codegen, so that label lookups happen as late
//! as possible.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::arg::{Arg, LABEL_RE};
use super::error::Error;
use super::op::{Op, TokenSpan, Todo};

const STRING_FRAGMENT: &str = r#"'(?:\\.|[^\\'])*?'|"(?:\\.|[^\\"])*?""#;

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r#"^(?:[^'";]|{})*"#, STRING_FRAGMENT)).unwrap());

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r#"(?:[^'"\s,]|{})+"#, STRING_FRAGMENT)).unwrap());

/// Load source text into [`Op`]s (one per code-bearing line) and the
/// raw line text (every line, including blanks and label-only lines --
/// the listing needs all of them).
pub fn read_source(source: &str) -> Result<(Vec<Op>, Vec<String>), Error> {
    let mut ops = Vec::new();
    let mut lines = Vec::new();
    let mut current_labels: Vec<String> = Vec::new();
    let mut claimed_labels: HashMap<String, usize> = HashMap::new();

    for (lineno, raw_line) in source.lines().enumerate() {
        let line = raw_line.to_string();
        lines.push(line.clone());

        let code = CODE_RE.find(&line).map(|m| m.as_str()).unwrap_or("");
        let mut tokens: Vec<String> = Vec::new();
        let mut token_spans: Vec<TokenSpan> = Vec::new();
        for m in TOKEN_RE.find_iter(code) {
            tokens.push(m.as_str().to_string());
            token_spans.push(TokenSpan::new(m.start(), m.end()));
        }

        if tokens.is_empty() {
            continue;
        }

        if tokens[0].ends_with(':') && LABEL_RE.is_match(&tokens[0][..tokens[0].len() - 1]) {
            let label = tokens[0][..tokens[0].len() - 1].to_string();
            if let Some(&first) = claimed_labels.get(&label) {
                return Err(Error::LabelDuplicate {
                    label,
                    first_line: first,
                    line_number: lineno,
                    line,
                });
            }
            claimed_labels.insert(label.clone(), lineno);
            current_labels.push(label);
            tokens.remove(0);
            token_spans.remove(0);
        }

        if tokens.is_empty() {
            continue;
        }

        current_labels.sort();
        ops.push(Op::new(lineno, line, std::mem::take(&mut current_labels), tokens, token_spans));
    }

    Ok((ops, lines))
}

/// Split a loaded line's tokens into an opcode and its (unparsed)
/// arguments, and advance it to the codegen stage.
pub fn lex(op: &mut Op) {
    op.opcode = op.tokens[0].to_lowercase();
    op.opcode_span = op.token_spans[0];
    op.args = op.tokens[1..]
        .iter()
        .map(|t| Arg::unparsed(t.trim().to_string()))
        .collect();
    op.arg_spans = op.token_spans[1..].to_vec();
    op.todo = Todo::Codegen;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_only_lines_produce_no_op() {
        let (ops, lines) = read_source("\n; just a comment\n").unwrap();
        assert!(ops.is_empty());
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn strips_trailing_comment() {
        let (ops, _) = read_source("nop ; do nothing\n").unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].tokens, vec!["nop"]);
    }

    #[test]
    fn semicolon_inside_string_is_not_a_comment() {
        let (ops, _) = read_source(r#"db "a;b""#).unwrap();
        assert_eq!(ops[0].tokens, vec![r#""a;b""#]);
    }

    #[test]
    fn label_only_line_attaches_to_next_code_line() {
        let (ops, _) = read_source("loop:\nnop\n").unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].labels, vec!["loop".to_string()]);
        assert_eq!(ops[0].tokens, vec!["nop"]);
    }

    #[test]
    fn label_and_code_share_a_line() {
        let (ops, _) = read_source("loop: nop\n").unwrap();
        assert_eq!(ops[0].labels, vec!["loop".to_string()]);
        assert_eq!(ops[0].tokens, vec!["nop"]);
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let result = read_source("loop: nop\nloop: nop\n");
        assert!(matches!(result, Err(Error::LabelDuplicate { .. })));
    }

    #[test]
    fn lex_splits_opcode_and_args() {
        let (mut ops, _) = read_source("add r4, #1\n").unwrap();
        lex(&mut ops[0]);
        assert_eq!(ops[0].opcode, "add");
        assert_eq!(ops[0].args.len(), 2);
        assert_eq!(ops[0].args[0].stripped, "r4");
        assert_eq!(ops[0].args[1].stripped, "#1");
        assert_eq!(ops[0].todo, Todo::Codegen);
    }

    #[test]
    fn lex_casefolds_opcode() {
        let (mut ops, _) = read_source("NOP\n").unwrap();
        lex(&mut ops[0]);
        assert_eq!(ops[0].opcode, "nop");
    }
}
