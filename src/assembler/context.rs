//! [Context]: the label table and per-architecture assembly state.

use std::collections::HashMap;

use super::arg::ParseOptions;
use super::registry::{ArchBackend, Opcode};

/// The symbol table: label name to the address it was bound at.
pub type SymbolTable = HashMap<String, u32>;

/// How to turn a (possibly-unknown) current address forward by some
/// number of bytes. `None` means "unknown until the next pass" — set
/// the moment a handler can't compute its own size yet, and left alone
/// for the rest of the current pass once that happens (see the
/// language reference's position-tracking invariant).
pub type Position = Option<u32>;

/// Mutable state threaded through one codegen pass: the label table,
/// the current position, and the active architecture's opcode table.
pub struct Context {
    pub arch_name: String,
    pub codegen: HashMap<String, Opcode>,
    pub encode_str: fn(&str) -> Result<Vec<u8>, String>,
    pub labels: SymbolTable,
    pub pos: Position,
    pub parse_options: ParseOptions,
}

impl Context {
    pub fn new(backend: &dyn ArchBackend) -> Context {
        Context {
            arch_name: backend.name().to_string(),
            codegen: backend.codegen_table(),
            encode_str: backend.encode_str(),
            labels: SymbolTable::new(),
            pos: Some(0),
            parse_options: backend.parse_options(),
        }
    }

    /// Advance `pos` by `n` bytes, or leave it unknown if it already is.
    pub fn advance(&mut self, n: u32) {
        self.pos = self.pos.map(|p| p + n);
    }

    /// Mark `pos` unknown for the rest of this pass. Once a handler
    /// can't size itself, the driver can't trust any later address in
    /// this pass either, so this is sticky until the next pass resets it.
    pub fn unpin(&mut self) {
        self.pos = None;
    }

    /// Bind `label` to the current position. A no-op if the position
    /// isn't known yet this pass (the label picks up its address once a
    /// later pass re-binds it with `pos` resolved); overwrites silently
    /// if the label was already bound, matching the original's
    /// `if self.pos is not None: self.labels[label] = self.pos` — real
    /// duplicate-label detection happens up front at lex time instead.
    pub fn bind_label(&mut self, label: &str) {
        if let Some(pos) = self.pos {
            self.labels.insert(label.to_string(), pos);
        }
    }

    /// Switch the active architecture mid-file, as `cpu`/`arch` does.
    pub fn switch_arch(&mut self, backend: &dyn ArchBackend) {
        self.arch_name = backend.name().to_string();
        self.codegen = backend.codegen_table();
        self.encode_str = backend.encode_str();
        self.parse_options = backend.parse_options();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::registry;

    #[test]
    fn advance_tracks_known_position() {
        let mut context = Context::new(registry::lookup("ibm5100").unwrap());
        context.advance(2);
        assert_eq!(context.pos, Some(2));
    }

    #[test]
    fn advance_after_unpin_stays_unknown() {
        let mut context = Context::new(registry::lookup("ibm5100").unwrap());
        context.unpin();
        context.advance(2);
        assert_eq!(context.pos, None);
    }

    #[test]
    fn bind_label_then_rebind_same_address_is_fine() {
        let mut context = Context::new(registry::lookup("ibm5100").unwrap());
        context.bind_label("loop");
        context.bind_label("loop");
        assert_eq!(context.labels.get("loop"), Some(&0));
    }

    #[test]
    fn rebind_at_a_different_address_silently_overwrites() {
        let mut context = Context::new(registry::lookup("ibm5100").unwrap());
        context.bind_label("loop");
        context.advance(4);
        context.bind_label("loop");
        assert_eq!(context.labels.get("loop"), Some(&4));
    }

    #[test]
    fn bind_label_without_known_position_is_a_noop() {
        let mut context = Context::new(registry::lookup("ibm5100").unwrap());
        context.unpin();
        context.bind_label("loop");
        assert!(context.labels.get("loop").is_none());
    }
}
