//! Shared codegen framework: `org` and the `db`/`dw`/`dd` data statements.
//!
//! Every architecture mixes these into its own opcode table. Ported from
//! the Python original's `codegen/common.py`, including its one quirk:
//! `org`, when its address argument can't yet be resolved, leaves the
//! current position exactly as it found it rather than marking it
//! unknown — so a later line in the same pass still sees whatever
//! position was live before the `org`.

use std::collections::HashMap;

use super::arg::{parse_args_if_able, parse_delimited_string, parse_integer, KindMask, LABEL_RE, ParseOptions};
use super::context::Context;
use super::op::{Op, Todo};
use super::registry::Opcode;
use super::Error;

fn parse_options() -> ParseOptions {
    ParseOptions::new(&[])
}

pub fn codegen_table() -> HashMap<String, Opcode> {
    let mut table = HashMap::new();
    table.insert("org".to_string(), Opcode::Org);
    table.insert(".org".to_string(), Opcode::Org);
    table.insert("db".to_string(), Opcode::Data { element_size: 1 });
    table.insert(".db".to_string(), Opcode::Data { element_size: 1 });
    table.insert("byte".to_string(), Opcode::Data { element_size: 1 });
    table.insert("dw".to_string(), Opcode::Data { element_size: 2 });
    table.insert(".dw".to_string(), Opcode::Data { element_size: 2 });
    table.insert("word".to_string(), Opcode::Data { element_size: 2 });
    table.insert("dd".to_string(), Opcode::Data { element_size: 4 });
    table.insert(".dd".to_string(), Opcode::Data { element_size: 4 });
    table.insert("long".to_string(), Opcode::Data { element_size: 4 });
    table
}

/// The default string encoder: plain ASCII, one byte per character.
pub fn encode_str_ascii(data: &str) -> Result<Vec<u8>, String> {
    if data.is_ascii() {
        Ok(data.bytes().collect())
    } else {
        Err(format!("{:?} contains non-ASCII characters", data))
    }
}

pub(crate) fn encode_org(context: &mut Context, op: &mut Op) -> Result<(), Error> {
    let options = parse_options();
    op.args = parse_args_if_able(&options, context, op, &[KindMask::ADDRESS])?;
    if op.args[0].is_resolved() {
        op.hex = Some(String::new());
        op.todo = Todo::Done;
        context.pos = Some(op.args[0].integer as u32);
    }
    // If unresolved, position is left exactly as it was: org's own quirk.
    Ok(())
}

pub(crate) fn encode_data(element_size: u32, context: &mut Context, op: &mut Op) -> Result<(), Error> {
    let mut hexparts = Vec::new();
    let mut all_hex_ok = true;

    if element_size != 1 {
        let pos = context
            .pos
            .ok_or_else(|| op.handler_error(
                "unresolved labels above this line (or other factors) make it impossible \
                 to know how to align this data statement; consider an org statement to \
                 make this data's memory location explicit",
            ))?;
        hexparts.push("00".repeat((pos % element_size) as usize));
    }

    let width = (element_size * 2) as usize;
    for arg in &op.args {
        let stripped = &arg.stripped;
        if stripped.starts_with('"') || stripped.starts_with('\'') {
            let bytes = parse_delimited_string(context, stripped).map_err(|e| op.handler_error(e))?;
            for b in bytes {
                hexparts.push(format!("{:0width$X}", b, width = width));
            }
        } else if LABEL_RE.is_match(stripped) {
            match context.labels.get(stripped) {
                Some(&addr) => hexparts.push(format!("{:0width$X}", addr, width = width)),
                None => {
                    all_hex_ok = false;
                    hexparts.push("00".repeat(width / 2));
                }
            }
        } else {
            let val = parse_integer(context, stripped).map_err(|e| op.handler_error(e))?;
            let max = 1i64 << (element_size * 8);
            if !(0..max).contains(&val) {
                return Err(op.handler_error(format!(
                    "value {} does not fit in {} unsigned byte(s)",
                    val, element_size
                )));
            }
            hexparts.push(format!("{:0width$X}", val, width = width));
        }
    }

    let hex: String = hexparts.concat();
    if all_hex_ok {
        op.todo = Todo::Done;
    }
    context.advance((hex.len() / 2) as u32);
    op.hex = Some(hex);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::op::Op;
    use crate::assembler::registry;

    fn ctx() -> Context {
        Context::new(registry::lookup("ibm5100").unwrap())
    }

    fn op_with_args(lineno: usize, line: &str, args: &[&str]) -> Op {
        let mut op = Op::new(lineno, line.to_string(), vec![], vec![], vec![]);
        op.opcode = "db".to_string();
        op.todo = Todo::Codegen;
        for a in args {
            op.args.push(crate::assembler::arg::Arg::unparsed(*a));
            op.arg_spans.push(crate::assembler::op::TokenSpan::new(0, a.len()));
        }
        op
    }

    #[test]
    fn org_sets_position() {
        let mut context = ctx();
        let mut op = op_with_args(1, "org $100", &["$100"]);
        encode_org(&mut context, &mut op).unwrap();
        assert_eq!(context.pos, Some(0x100));
        assert_eq!(op.todo, Todo::Done);
    }

    #[test]
    fn db_encodes_bytes_and_advances() {
        let mut context = ctx();
        let mut op = op_with_args(1, "db 1, 2", &["1", "2"]);
        encode_data(1, &mut context, &mut op).unwrap();
        assert_eq!(op.hex.as_deref(), Some("0102"));
        assert_eq!(context.pos, Some(2));
    }

    #[test]
    fn dw_requires_known_position_for_alignment() {
        let mut context = ctx();
        context.unpin();
        let mut op = op_with_args(1, "dw #1", &["#1"]);
        assert!(encode_data(2, &mut context, &mut op).is_err());
    }

    #[test]
    fn db_string_literal_encodes_each_byte() {
        let mut context = ctx();
        let mut op = op_with_args(1, r#"db "AB""#, &[r#""AB""#]);
        encode_data(1, &mut context, &mut op).unwrap();
        assert_eq!(op.hex.as_deref(), Some("4142"));
    }

    #[test]
    fn db_unresolved_label_emits_placeholder_and_stays_pending() {
        let mut context = ctx();
        let mut op = op_with_args(1, "db not_yet_bound", &["not_yet_bound"]);
        encode_data(1, &mut context, &mut op).unwrap();
        assert_eq!(op.hex.as_deref(), Some("00"));
        assert_eq!(op.todo, Todo::Codegen);
    }
}
