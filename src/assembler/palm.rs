//! Code generation for the IBM PALM processor.
//!
//! PALM ("Put All Logic in Microcode") was the 16-bit processor in IBM's
//! 5100, 5110, and 5120 personal computers. It has an orthogonal
//! register file and a compact, almost RISC-like instruction set. These
//! mnemonics match Christian Corti's reverse-engineered names, not IBM's
//! own internal ones.
//!
//! Ported from `codegen/_ibmpalm.py`; every nybble constant below is
//! taken directly from there.

use std::collections::HashMap;

use super::arg::{parse_args_if_able, Arg, ArgKind, KindMask, ParseOptions};
use super::context::Context;
use super::op::{Op, Todo};
use super::registry::Opcode;
use super::Error;
use crate::logging::DiagnosticSink;

fn parse_options() -> ParseOptions {
    ParseOptions::new(&["r"])
}

pub fn codegen_table() -> HashMap<String, Opcode> {
    use Opcode::*;
    let entries: &[(&str, Opcode)] = &[
        ("dec2", RegToReg { n1: 0, n2: 0 }),
        ("halt", Halt),
        ("dec", RegToReg { n1: 0, n2: 1 }),
        ("inc", RegToReg { n1: 0, n2: 2 }),
        ("inc2", RegToReg { n1: 0, n2: 3 }),
        ("move", Move),
        ("nop", Nop),
        ("and", RegToReg { n1: 0, n2: 5 }),
        ("or", RegToReg { n1: 0, n2: 6 }),
        ("xor", RegToReg { n1: 0, n2: 7 }),
        ("add", AddOrSub { is_add: true }),
        ("sub", AddOrSub { is_add: false }),
        ("addh", RegToReg { n1: 0, n2: 0xA }),
        ("addh2", RegToReg { n1: 0, n2: 0xB }),
        ("mhl", RegToReg { n1: 0, n2: 0xC }),
        ("mlh", RegToReg { n1: 0, n2: 0xD }),
        ("getb", Getb),
        ("getadd", DevToReg { n: 0 }),
        ("ctrl", Ctrl),
        ("putb", Putb),
        ("movb", Movb),
        ("lbi", ImmedToReg { n: 8 }),
        ("clr", ImmedToReg { n: 9 }),
        ("set", ImmedToReg { n: 0xB }),
        ("sle", RegToReg { n1: 0xC, n2: 0 }),
        ("slt", RegToReg { n1: 0xC, n2: 1 }),
        ("se", RegToReg { n1: 0xC, n2: 2 }),
        ("sz", OneReg { n1: 0xC, n2: 3, argpos: 0 }),
        ("ss", OneReg { n1: 0xC, n2: 4, argpos: 0 }),
        ("sbs", RegToReg { n1: 0xC, n2: 5 }),
        ("sbc", RegToReg { n1: 0xC, n2: 6 }),
        ("sbsh", RegToReg { n1: 0xC, n2: 7 }),
        ("sgt", RegToReg { n1: 0xC, n2: 8 }),
        ("sge", RegToReg { n1: 0xC, n2: 9 }),
        ("sne", RegToReg { n1: 0xC, n2: 0xA }),
        ("snz", OneReg { n1: 0xC, n2: 0xB, argpos: 0 }),
        ("sns", OneReg { n1: 0xC, n2: 0xC, argpos: 0 }),
        ("snbs", RegToReg { n1: 0xC, n2: 0xD }),
        // snbsh duplicates snbc's encoding, not snbs's -- preserved from
        // the original reverse-engineered opcode table as-is.
        ("snbc", RegToReg { n1: 0xC, n2: 0xE }),
        ("snbsh", RegToReg { n1: 0xC, n2: 0xE }),
        ("lwi", Lwi),
        ("shr", OneReg { n1: 0xE, n2: 0xC, argpos: 1 }),
        ("ror", OneReg { n1: 0xE, n2: 0xD, argpos: 1 }),
        ("ror3", OneReg { n1: 0xE, n2: 0xE, argpos: 1 }),
        ("swap", OneReg { n1: 0xE, n2: 0xF, argpos: 1 }),
        ("stat", DevToReg { n: 0xE }),
        ("bra", Bra),
        ("ret", OneReg { n1: 0, n2: 4, argpos: 1 }), // cheeky
        ("jmp", Jmp),
        ("call", Call),
        ("rcall", Rcall),
    ];
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn regcheck(args: &[&Arg]) -> Result<(), String> {
    for arg in args {
        if !(0..=15).contains(&arg.integer) {
            return Err(format!("invalid register {:?}", arg.stripped));
        }
    }
    Ok(())
}

fn devcheck(args: &[&Arg]) -> Result<(), String> {
    for arg in args {
        if !(0..=15).contains(&arg.integer) {
            return Err(format!("invalid device address {:?} ({})", arg.stripped, arg.integer));
        }
    }
    Ok(())
}

fn bytecheck(args: &[&Arg]) -> Result<(), String> {
    for arg in args {
        if !(-128..=255).contains(&arg.integer) {
            return Err(format!(
                "byte literal {:?} ({}) not in range -128..255",
                arg.stripped, arg.integer
            ));
        }
    }
    Ok(())
}

fn regderefcheck(arg: &Arg, postcrem_from: f64, postcrem_to: f64) -> Result<(), String> {
    if !(0..=15).contains(&arg.integer) {
        return Err(format!("invalid register in dereference {:?}", arg.stripped));
    }
    if arg.precrement != 0.0 {
        return Err("no IBM PALM instruction supports address pre-(in/de)crementation".to_string());
    }
    if !(postcrem_from..=postcrem_to).contains(&arg.postcrement) {
        return Err(format!(
            "invalid post-(in|de)crement in {:?}; valid range is {}..{}",
            arg.stripped, postcrem_from, postcrem_to
        ));
    }
    Ok(())
}

fn addrcheck(args: &[&Arg]) -> Result<(), String> {
    for arg in args {
        if !(0..=65535).contains(&arg.integer) {
            return Err(format!(
                "invalid memory address {:?} (${:X}); valid range is $0..$FFFF",
                arg.stripped, arg.integer
            ));
        }
    }
    Ok(())
}

fn lowwordaddrcheck(args: &[&Arg]) -> Result<(), String> {
    for arg in args {
        if arg.integer % 2 != 0 {
            return Err(format!(
                "low word address {:?} (${:X}) is not 16-bit aligned (even)",
                arg.stripped, arg.integer
            ));
        }
        if !(0..=510).contains(&arg.integer) {
            return Err(format!(
                "low word address {:?} (${:X}) is not in range 0..510",
                arg.stripped, arg.integer
            ));
        }
    }
    Ok(())
}

fn jmpdestcheck(args: &[&Arg]) -> Result<(), String> {
    addrcheck(args)?;
    for arg in args {
        if arg.integer % 2 != 0 {
            return Err(format!(
                "invalid jump address {:?} (${:X}); must be 16-bit aligned",
                arg.stripped, arg.integer
            ));
        }
    }
    Ok(())
}

fn callregcheck(arg1: &Arg, arg2: &Arg) -> Result<(), String> {
    addrcheck(&[arg1, arg2])?;
    if arg1.integer == arg2.integer {
        return Err("arguments to subroutine call instructions must use different registers".to_string());
    }
    Ok(())
}

/// Program counter displacement for a relative jump.
fn reljmpoffset(context: &Context, arg: &Arg) -> Result<i64, String> {
    let pos = context.pos.expect("caller must check context.pos is known") as i64;
    let true_displacement = arg.integer - pos;
    if !(-254..=258).contains(&true_displacement) {
        return Err(format!(
            "invalid relative jump {:?} (${:X}); limits are -254..258",
            arg.stripped, arg.integer
        ));
    }
    // The running instruction sees R0 (the program counter) already
    // advanced by 2, which this offset (and the bounds above) account for.
    Ok(true_displacement - 2)
}

fn postcrement_to_modifier(postcrement: f64) -> i64 {
    const TABLE: [i64; 9] = [7, 6, 5, 4, 8, 0, 1, 2, 3];
    TABLE[(postcrement as i64 + 4) as usize]
}

pub fn encode(
    opcode: &Opcode,
    context: &mut Context,
    op: &mut Op,
    sink: &mut dyn DiagnosticSink,
) -> Result<(), Error> {
    let opts = parse_options();
    match *opcode {
        Opcode::RegToReg { n1, n2 } => {
            op.args = parse_args_if_able(&opts, context, op, &[KindMask::REGISTER, KindMask::REGISTER])?;
            if all_resolved(&op.args) {
                regcheck(&[&op.args[0], &op.args[1]]).map_err(|e| op.handler_error(e))?;
                op.hex = Some(format!("{:X}{:X}{:X}{:X}", n1, op.args[0].integer, op.args[1].integer, n2));
                op.todo = Todo::Done;
            }
            context.advance(2);
        }

        Opcode::OneReg { n1, n2, argpos } => {
            op.args = parse_args_if_able(&opts, context, op, &[KindMask::REGISTER])?;
            if all_resolved(&op.args) {
                regcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                let reg = op.args[0].integer;
                op.hex = Some(if argpos == 0 {
                    format!("{:X}{:X}0{:X}", n1, reg, n2)
                } else {
                    format!("{:X}0{:X}{:X}", n1, reg, n2)
                });
                op.todo = Todo::Done;
            }
            context.advance(2);
        }

        Opcode::DevToReg { n } => {
            op.args = parse_args_if_able(&opts, context, op, &[KindMask::REGISTER, KindMask::ADDRESS])?;
            if all_resolved(&op.args) {
                regcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                devcheck(&[&op.args[1]]).map_err(|e| op.handler_error(e))?;
                op.hex = Some(format!("{:X}{:X}{:X}F", n, op.args[0].integer, op.args[1].integer));
                op.todo = Todo::Done;
            }
            context.advance(2);
        }

        Opcode::ImmedToReg { n } => {
            op.args = parse_args_if_able(&opts, context, op, &[KindMask::REGISTER, KindMask::NUMBER])?;
            if all_resolved(&op.args) {
                regcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                bytecheck(&[&op.args[1]]).map_err(|e| op.handler_error(e))?;
                op.hex = Some(format!(
                    "{:X}{:X}{:02X}",
                    n,
                    op.args[0].integer,
                    op.args[1].integer.rem_euclid(256)
                ));
                op.todo = Todo::Done;
            }
            context.advance(2);
        }

        Opcode::AddOrSub { is_add } => {
            op.args = parse_args_if_able(
                &opts,
                context,
                op,
                &[KindMask::REGISTER, KindMask::NUMBER | KindMask::REGISTER],
            )?;
            if all_resolved(&op.args) {
                regcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                if op.args[1].kind == Some(ArgKind::Number) {
                    let value = op.args[1].integer;
                    if !(0..=256).contains(&value) {
                        return Err(op.handler_error(format!(
                            "literal {:?} not in range 0..256",
                            op.args[1].stripped
                        )));
                    } else if value == 0 {
                        sink.warning(
                            op.lineno,
                            format!(
                                "a #0 literal argument to {} is not supported by the instruction; \
                                 generating a NOP (MOVE R0, R0) instead",
                                op.opcode.to_uppercase()
                            ),
                        );
                        op.hex = Some("0004".to_string());
                    } else {
                        let n = if is_add { 0xA } else { 0xF };
                        op.hex = Some(format!(
                            "{:X}{:X}{:02X}",
                            n,
                            op.args[0].integer,
                            (value - 1).rem_euclid(256)
                        ));
                    }
                } else {
                    regcheck(&[&op.args[1]]).map_err(|e| op.handler_error(e))?;
                    let n = if is_add { 8 } else { 9 };
                    op.hex = Some(format!("0{:X}{:X}{:X}", op.args[0].integer, op.args[1].integer, n));
                }
                op.todo = Todo::Done;
            }
            context.advance(2);
        }

        Opcode::Ctrl => {
            op.args = parse_args_if_able(&opts, context, op, &[KindMask::ADDRESS, KindMask::NUMBER])?;
            if all_resolved(&op.args) {
                devcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                bytecheck(&[&op.args[1]]).map_err(|e| op.handler_error(e))?;
                op.hex = Some(format!(
                    "1{:X}{:02X}",
                    op.args[0].integer,
                    op.args[1].integer.rem_euclid(256)
                ));
                op.todo = Todo::Done;
            }
            context.advance(2);
        }

        Opcode::Putb => {
            op.args = parse_args_if_able(&opts, context, op, &[KindMask::ADDRESS, KindMask::DEREF_REGISTER])?;
            if all_resolved(&op.args) {
                devcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                regderefcheck(&op.args[1], -4.0, 4.0).map_err(|e| op.handler_error(e))?;
                let modifier = postcrement_to_modifier(op.args[1].postcrement);
                op.hex = Some(format!("4{:X}{:X}{:X}", op.args[0].integer, op.args[1].integer, modifier));
                op.todo = Todo::Done;
            }
            context.advance(2);
        }

        Opcode::Getb => {
            op.args = parse_args_if_able(
                &opts,
                context,
                op,
                &[KindMask::REGISTER | KindMask::DEREF_REGISTER, KindMask::ADDRESS],
            )?;
            if all_resolved(&op.args) {
                devcheck(&[&op.args[1]]).map_err(|e| op.handler_error(e))?;
                if op.args[0].kind == Some(ArgKind::Register) {
                    regcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                    op.hex = Some(format!("0{:X}{:X}E", op.args[1].integer, op.args[0].integer));
                } else {
                    regderefcheck(&op.args[0], -4.0, 4.0).map_err(|e| op.handler_error(e))?;
                    let modifier = postcrement_to_modifier(op.args[0].postcrement);
                    op.hex = Some(format!("E{:X}{:X}{:X}", op.args[1].integer, op.args[0].integer, modifier));
                }
                op.todo = Todo::Done;
            }
            context.advance(2);
        }

        Opcode::Movb => {
            op.args = parse_args_if_able(
                &opts,
                context,
                op,
                &[
                    KindMask::REGISTER | KindMask::DEREF_REGISTER,
                    KindMask::REGISTER | KindMask::DEREF_REGISTER,
                ],
            )?;
            if op.args[0].kind == op.args[1].kind {
                return Err(op.handler_error(
                    "one MOVB argument should be a register, and the other should be a register dereference",
                ));
            }
            if all_resolved(&op.args) {
                let (nybble, argderef, argreg) = if op.args[0].kind == Some(ArgKind::Register) {
                    (6, op.args[1].clone(), op.args[0].clone())
                } else {
                    (7, op.args[0].clone(), op.args[1].clone())
                };
                regcheck(&[&argreg]).map_err(|e| op.handler_error(e))?;
                regderefcheck(&argderef, -4.0, 4.0).map_err(|e| op.handler_error(e))?;
                let modifier = postcrement_to_modifier(argderef.postcrement);
                op.hex = Some(format!("{:X}{:X}{:X}{:X}", nybble, argreg.integer, argderef.integer, modifier));
                op.todo = Todo::Done;
            }
            context.advance(2);
        }

        Opcode::Move => {
            let move_opts = opts.with_fractional_crements();
            let shapes = KindMask::ADDRESS | KindMask::REGISTER | KindMask::DEREF_REGISTER;
            op.args = parse_args_if_able(&move_opts, context, op, &[shapes, shapes])?;
            if all_resolved(&op.args) {
                if !op.args.iter().any(|a| a.kind == Some(ArgKind::Register)) {
                    return Err(op.handler_error("at least one argument to MOVE must be a register"));
                } else if op.args[0].kind == Some(ArgKind::Register) && op.args[1].kind == Some(ArgKind::Register) {
                    regcheck(&[&op.args[0], &op.args[1]]).map_err(|e| op.handler_error(e))?;
                    op.hex = Some(format!("0{:X}{:X}4", op.args[0].integer, op.args[1].integer));
                } else if op.args.iter().any(|a| a.kind == Some(ArgKind::Address)) {
                    let (nybble, argaddr, argreg) = if op.args[0].kind == Some(ArgKind::Register) {
                        (2, op.args[1].clone(), op.args[0].clone())
                    } else {
                        (3, op.args[0].clone(), op.args[1].clone())
                    };
                    regcheck(&[&argreg]).map_err(|e| op.handler_error(e))?;
                    lowwordaddrcheck(&[&argaddr]).map_err(|e| op.handler_error(e))?;
                    op.hex = Some(format!("{:X}{:X}{:02X}", nybble, argreg.integer, argaddr.integer / 2));
                } else {
                    let nybble = if op.args[0].kind == Some(ArgKind::DerefRegister) { 5 } else { 0xD };
                    let (argderef, argreg) = if nybble == 5 {
                        (op.args[0].clone(), op.args[1].clone())
                    } else {
                        (op.args[1].clone(), op.args[0].clone())
                    };
                    regcheck(&[&argreg]).map_err(|e| op.handler_error(e))?;
                    regderefcheck(&argderef, -2.0, 2.0).map_err(|e| op.handler_error(e))?;
                    let modifier = postcrement_to_modifier(2.0 * argderef.postcrement);
                    op.hex = Some(format!(
                        "{:X}{:X}{:X}{:X}",
                        nybble, op.args[1].integer, op.args[0].integer, modifier
                    ));
                }
                op.todo = Todo::Done;
            }
            context.advance(2);
        }

        Opcode::Halt => {
            op.args = parse_args_if_able(&opts, context, op, &[])?;
            op.hex = Some("0000".to_string());
            op.todo = Todo::Done;
            context.advance(2);
        }

        Opcode::Nop => {
            op.args = parse_args_if_able(&opts, context, op, &[])?;
            op.hex = Some("0004".to_string());
            op.todo = Todo::Done;
            context.advance(2);
        }

        Opcode::Lwi => {
            op.args = parse_args_if_able(&opts, context, op, &[KindMask::REGISTER, KindMask::NUMBER])?;
            if all_resolved(&op.args) {
                regcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                let value = op.args[1].integer;
                if !(-32767..=65535).contains(&value) {
                    return Err(op.handler_error(format!(
                        "halfword literal {} not in range -32768..65535",
                        op.args[1].stripped
                    )));
                }
                op.hex = Some(format!("D{:X}01{:04X}", op.args[0].integer, value.rem_euclid(65536)));
                op.todo = Todo::Done;
            }
            context.advance(4);
        }

        Opcode::Bra => {
            op.args = parse_args_if_able(&opts, context, op, &[KindMask::ADDRESS])?;
            if all_resolved(&op.args) && context.pos.is_some() {
                jmpdestcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                let offset = reljmpoffset(context, &op.args[0]).map_err(|e| op.handler_error(e))?;
                if offset == 0 {
                    sink.warning(
                        op.lineno,
                        "a BRA of +2 bytes (so, an ordinary PC increment) is not supported by the \
                         usual relative jump techniques; generating a NOP (MOVE R0, R0) instead"
                            .to_string(),
                    );
                    op.hex = Some("0004".to_string());
                } else {
                    let (n, v) = if offset > 0 { (0xA, offset - 1) } else { (0xF, -offset - 1) };
                    op.hex = Some(format!("{:X}0{:02X}", n, v));
                }
                op.todo = Todo::Done;
            }
            context.advance(2);
        }

        Opcode::Jmp => {
            op.args = parse_args_if_able(
                &opts,
                context,
                op,
                &[KindMask::ADDRESS | KindMask::DEREF_REGISTER | KindMask::DEREF_ADDRESS],
            )?;
            if !all_resolved(&op.args) {
                let advance = if op.args[0].kind == Some(ArgKind::Address) { 4 } else { 2 };
                context.advance(advance);
                return Ok(());
            }
            if op.args[0].kind == Some(ArgKind::Address) {
                jmpdestcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                op.hex = Some(format!("D001{:04X}", op.args[0].integer));
            } else if op.args[0].kind == Some(ArgKind::DerefRegister) {
                regderefcheck(&op.args[0], 0.0, 0.0).map_err(|e| op.handler_error(e))?;
                op.hex = Some(format!("D0{:X}8", op.args[0].integer));
            } else {
                lowwordaddrcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                op.hex = Some(format!("20{:02X}", op.args[0].integer / 2));
            }
            op.todo = Todo::Done;
            context.advance((op.hex.as_ref().unwrap().len() / 2) as u32);
        }

        Opcode::Call => {
            op.args = parse_args_if_able(
                &opts,
                context,
                op,
                &[
                    KindMask::ADDRESS | KindMask::REGISTER | KindMask::DEREF_REGISTER | KindMask::DEREF_ADDRESS,
                    KindMask::REGISTER,
                ],
            )?;
            if !all_resolved(&op.args) {
                let advance = if op.args[0].kind == Some(ArgKind::Address) { 6 } else { 4 };
                context.advance(advance);
                return Ok(());
            }
            if op.args[0].kind == Some(ArgKind::Address) {
                jmpdestcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                regcheck(&[&op.args[1]]).map_err(|e| op.handler_error(e))?;
                op.hex = Some(format!(
                    "0{:X}03D0{:X}1{:04X}",
                    op.args[1].integer, op.args[1].integer, op.args[0].integer
                ));
            } else if op.args[0].kind == Some(ArgKind::Register) {
                callregcheck(&op.args[0], &op.args[1]).map_err(|e| op.handler_error(e))?;
                op.hex = Some(format!("0{:X}0300{:X}4", op.args[1].integer, op.args[0].integer));
            } else if op.args[0].kind == Some(ArgKind::DerefRegister) {
                callregcheck(&op.args[0], &op.args[1]).map_err(|e| op.handler_error(e))?;
                regderefcheck(&op.args[0], -2.0, 2.0).map_err(|e| op.handler_error(e))?;
                let modifier = postcrement_to_modifier(2.0 * op.args[0].postcrement);
                op.hex = Some(format!("0{:X}03D0{:X}{:X}", op.args[1].integer, op.args[0].integer, modifier));
            } else {
                regcheck(&[&op.args[1]]).map_err(|e| op.handler_error(e))?;
                lowwordaddrcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                if op.args[0].precrement != 0.0 || op.args[0].postcrement != 0.0 {
                    return Err(op.handler_error(format!(
                        "no (in/de)crementation is allowed for address dereference arguments to {}",
                        op.opcode.to_uppercase()
                    )));
                }
                op.hex = Some(format!("0{:X}0320{:02X}", op.args[1].integer, op.args[0].integer / 2));
            }
            op.todo = Todo::Done;
            context.advance((op.hex.as_ref().unwrap().len() / 2) as u32);
        }

        Opcode::Rcall => {
            op.args = parse_args_if_able(&opts, context, op, &[KindMask::ADDRESS, KindMask::REGISTER])?;
            if all_resolved(&op.args) && context.pos.is_some() {
                jmpdestcheck(&[&op.args[0]]).map_err(|e| op.handler_error(e))?;
                regcheck(&[&op.args[1]]).map_err(|e| op.handler_error(e))?;
                let offset = reljmpoffset(context, &op.args[0]).map_err(|e| op.handler_error(e))?;
                if offset == 0 {
                    sink.warning(
                        op.lineno,
                        "a +2-byte RCALL (so, an ordinary PC increment) is not supported by the \
                         usual relative jump techniques; generating a NOP (MOVE R0, R0) instead"
                            .to_string(),
                    );
                    op.hex = Some(format!("0{:X}030004", op.args[1].integer));
                } else {
                    let (n, v) = if offset > 0 { (0xA, offset - 1) } else { (0xF, -offset - 1) };
                    op.hex = Some(format!("0{:X}03{:X}0{:02X}", op.args[1].integer, n, v));
                }
                op.todo = Todo::Done;
            }
            context.advance(4);
        }

        Opcode::Org | Opcode::Data { .. } => unreachable!("common opcodes are dispatched in common.rs"),
    }
    Ok(())
}

fn all_resolved(args: &[Arg]) -> bool {
    super::arg::all_args_parsed(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::context::Context;
    use crate::assembler::registry;
    use crate::logging::CapturingSink;

    fn ctx() -> Context {
        Context::new(registry::lookup("ibm5100").unwrap())
    }

    fn op(lineno: usize, line: &str, opcode: &str, args: &[&str]) -> Op {
        let mut o = Op::new(lineno, line.to_string(), vec![], vec![], vec![]);
        o.opcode = opcode.to_string();
        o.todo = Todo::Codegen;
        for a in args {
            o.args.push(Arg::unparsed(*a));
            o.arg_spans.push(super::super::op::TokenSpan::new(0, a.len()));
        }
        o
    }

    #[test]
    fn nop_encodes_to_0004() {
        let mut context = ctx();
        let mut op = op(1, "nop", "nop", &[]);
        let mut sink = CapturingSink::default();
        encode(&Opcode::Nop, &mut context, &mut op, &mut sink).unwrap();
        assert_eq!(op.hex.as_deref(), Some("0004"));
        assert_eq!(context.pos, Some(2));
    }

    #[test]
    fn halt_encodes_to_0000() {
        let mut context = ctx();
        let mut op = op(1, "halt", "halt", &[]);
        let mut sink = CapturingSink::default();
        encode(&Opcode::Halt, &mut context, &mut op, &mut sink).unwrap();
        assert_eq!(op.hex.as_deref(), Some("0000"));
    }

    #[test]
    fn move_register_to_register() {
        let mut context = ctx();
        let mut op = op(1, "move r1, r2", "move", &["r1", "r2"]);
        let mut sink = CapturingSink::default();
        encode(&Opcode::Move, &mut context, &mut op, &mut sink).unwrap();
        assert_eq!(op.hex.as_deref(), Some("0124"));
    }

    #[test]
    fn move_deref_register_to_register() {
        let mut context = ctx();
        let mut op = op(1, "move (r3)+, r5", "move", &["(r3)+", "r5"]);
        let mut sink = CapturingSink::default();
        encode(&Opcode::Move, &mut context, &mut op, &mut sink).unwrap();
        assert_eq!(op.hex.as_deref(), Some("5531"));
    }

    #[test]
    fn move_deref_register_rejects_out_of_range_register() {
        let mut context = ctx();
        let mut op = op(1, "move (r3)+, r20", "move", &["(r3)+", "r20"]);
        let mut sink = CapturingSink::default();
        assert!(encode(&Opcode::Move, &mut context, &mut op, &mut sink).is_err());
    }

    #[test]
    fn lbi_immediate_to_register() {
        let mut context = ctx();
        let mut op = op(1, "lbi r3, #$2A", "lbi", &["r3", "#$2A"]);
        let mut sink = CapturingSink::default();
        encode(&Opcode::ImmedToReg { n: 8 }, &mut context, &mut op, &mut sink).unwrap();
        assert_eq!(op.hex.as_deref(), Some("832A"));
    }

    #[test]
    fn add_register_immediate_nonzero() {
        let mut context = ctx();
        let mut op = op(1, "add r4, #1", "add", &["r4", "#1"]);
        let mut sink = CapturingSink::default();
        encode(&Opcode::AddOrSub { is_add: true }, &mut context, &mut op, &mut sink).unwrap();
        assert_eq!(op.hex.as_deref(), Some("A400"));
    }

    #[test]
    fn add_register_immediate_zero_becomes_nop_with_warning() {
        let mut context = ctx();
        let mut op = op(1, "add r4, #0", "add", &["r4", "#0"]);
        let mut sink = CapturingSink::default();
        encode(&Opcode::AddOrSub { is_add: true }, &mut context, &mut op, &mut sink).unwrap();
        assert_eq!(op.hex.as_deref(), Some("0004"));
        assert_eq!(sink.warnings.len(), 1);
    }

    #[test]
    fn snbsh_duplicates_snbc_encoding() {
        let table = codegen_table();
        let snbc = table.get("snbc").unwrap();
        let snbsh = table.get("snbsh").unwrap();
        match (snbc, snbsh) {
            (Opcode::RegToReg { n1: a1, n2: a2 }, Opcode::RegToReg { n1: b1, n2: b2 }) => {
                assert_eq!((a1, a2), (b1, b2));
            }
            _ => panic!("expected RegToReg opcodes"),
        }
    }

    #[test]
    fn bra_to_next_instruction_becomes_nop_with_warning() {
        let mut context = ctx();
        context.pos = Some(0x100);
        let mut op = op(1, "bra $102", "bra", &["$102"]);
        let mut sink = CapturingSink::default();
        encode(&Opcode::Bra, &mut context, &mut op, &mut sink).unwrap();
        assert_eq!(op.hex.as_deref(), Some("0004"));
        assert_eq!(sink.warnings.len(), 1);
    }

    #[test]
    fn jmp_to_address_literal() {
        let mut context = ctx();
        let mut op = op(1, "jmp $1234", "jmp", &["$1234"]);
        let mut sink = CapturingSink::default();
        encode(&Opcode::Jmp, &mut context, &mut op, &mut sink).unwrap();
        assert_eq!(op.hex.as_deref(), Some("D0011234"));
        assert_eq!(context.pos, Some(4));
    }
}
