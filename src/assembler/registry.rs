//! The opcode table and the architecture registry.
//!
//! Where the system this was distilled from dynamically imported one
//! Python module per architecture, `ArchBackend` plus a static map
//! stands in: each backend is just a bundle of (codegen table, string
//! encoder, parse options), resolved at compile time instead of at
//! runtime. Loading a plug-in from outside the binary is out of scope
//! here, as it is for the language this crate's contract describes.

use std::collections::HashMap;

use super::arg::ParseOptions;
use super::{common, palm};

/// One opcode's code-generation recipe. A plain data enum rather than a
/// table of boxed closures: every handler's constant nybbles live right
/// in the variant, and the dispatcher in [`super::driver`] is one match
/// expression instead of indirect calls through `Box<dyn Fn>`.
#[derive(Debug, Clone, Copy)]
pub enum Opcode {
    /// `org`/`.org`: set the current position.
    Org,
    /// `db`/`dw`/`dd` (and their aliases): emit literal data.
    Data { element_size: u32 },

    /// Two-register ALU ops sharing one hex template: `{n1}{r1}{r2}{n2}`.
    RegToReg { n1: u8, n2: u8 },
    /// One-register ops: `argpos` picks which nybble position the
    /// register digit lands in (`0` or `1`).
    OneReg { n1: u8, n2: u8, argpos: u8 },
    /// `getadd`/`stat`: a register and a device address.
    DevToReg { n: u8 },
    /// `lbi`/`clr`/`set`: a register and an immediate byte.
    ImmedToReg { n: u8 },
    /// `add`/`sub`: immediate-to-register or register-to-register,
    /// decided by the second argument's shape.
    AddOrSub { is_add: bool },

    Ctrl,
    Putb,
    Getb,
    Movb,
    Move,
    Halt,
    Nop,
    Lwi,
    Bra,
    Jmp,
    Call,
    Rcall,
}

/// One code-generation back end: an opcode table, a string encoder, and
/// the register-prefix set its instructions accept.
pub trait ArchBackend {
    fn name(&self) -> &'static str;
    fn codegen_table(&self) -> HashMap<String, Opcode>;
    fn encode_str(&self) -> fn(&str) -> Result<Vec<u8>, String>;
    fn parse_options(&self) -> ParseOptions;
}

/// The IBM 5100's character set, one entry per byte value `$00`-`$7F`
/// (page 6-24 of the October 1979 Maintenance Information Manual). The
/// underscored characters at `$80`-`$FF` have no Unicode equivalent
/// worth guessing at, so a string needing one of those has no way to
/// spell it through this encoder.
const CHARACTER_SET: &str = r#" ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789/+×←[],.⍺⊥∩⌊∈_∇∆⍳∘'⎕∣⊤○⋆?⍴⌈∼↓∪⍵⊃↑⊂∧¨¯<≤=≥>≠∨\-÷→();:⌽⊖⍉⍟⌿⍀⍞!⍫ᵭ⍟⌹⌶⍝⍲⍱⍒⍋⍕⍎¬"&@#$%ÄⓉÖÜÅÆ℞Ñ£ÇÕÃ"#;

/// Encode `data` against the IBM 5100's character set rather than
/// ASCII: each character's byte is its position in [`CHARACTER_SET`].
fn encode_str_ibm5100(data: &str) -> Result<Vec<u8>, String> {
    let table: Vec<char> = CHARACTER_SET.chars().collect();
    let mut bytes = Vec::with_capacity(data.chars().count());
    let mut missing = String::new();
    for c in data.chars() {
        match table.iter().position(|&t| t == c) {
            Some(index) => bytes.push(index as u8),
            None => missing.push(c),
        }
    }
    if missing.is_empty() {
        Ok(bytes)
    } else {
        Err(format!(
            "the IBM 5100 character set is missing some of the characters in {:?}: ->{}<-",
            data, missing
        ))
    }
}

/// The PALM instruction set, common data directives mixed in, with the
/// IBM 5100's own character set for string encoding. Named `ibm5100`
/// after the first machine it shipped in; this is also the default
/// architecture.
pub struct Ibm5100;

impl ArchBackend for Ibm5100 {
    fn name(&self) -> &'static str {
        "ibm5100"
    }

    fn codegen_table(&self) -> HashMap<String, Opcode> {
        let mut table = common::codegen_table();
        table.extend(palm::codegen_table());
        table
    }

    fn encode_str(&self) -> fn(&str) -> Result<Vec<u8>, String> {
        encode_str_ibm5100
    }

    fn parse_options(&self) -> ParseOptions {
        ParseOptions::new(&["r"])
    }
}

/// Look up a registered architecture by name (case-sensitive, matching
/// how `cpu`/`arch` directives name them).
pub fn lookup(name: &str) -> Option<&'static dyn ArchBackend> {
    match name {
        "ibm5100" => Some(&Ibm5100),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_architecture_resolves() {
        assert!(lookup("ibm5100").is_some());
    }

    #[test]
    fn unknown_architecture_is_none() {
        assert!(lookup("nonesuch").is_none());
    }

    #[test]
    fn codegen_table_mixes_in_common_directives() {
        let table = Ibm5100.codegen_table();
        assert!(table.contains_key("org"));
        assert!(table.contains_key("db"));
        assert!(table.contains_key("nop"));
    }

    #[test]
    fn ibm5100_string_encoding_is_not_ascii_identity() {
        // 'A' sits at index 1 in the 5100's character set, not 0x41.
        assert_eq!(encode_str_ibm5100("A").unwrap(), vec![1]);
        assert_eq!(encode_str_ibm5100(" 09").unwrap(), vec![0, 27, 36]);
    }

    #[test]
    fn ibm5100_string_encoding_rejects_characters_outside_the_set() {
        let err = encode_str_ibm5100("A€").unwrap_err();
        assert!(err.contains('€'));
    }
}
