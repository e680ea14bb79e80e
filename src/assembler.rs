//! A two-plus-pass, architecture-pluggable cross-assembler.
//!
//! Every op visits exactly one step (`Lex`, then `Codegen`, then `Done`)
//! per pass; the driver keeps re-running passes until the count of ops
//! still stuck on `Codegen` stops shrinking. This lets forward label
//! references, variable-length jump encodings, and mid-file
//! architecture switches all resolve without a dedicated dependency
//! graph -- the same "just loop until it settles" approach the system
//! this was distilled from takes.
//!
//! - [`arg`]: numeric/string literal parsing and the argument classifier.
//! - [`context`]: the label table and per-architecture assembly state.
//! - [`op`]: one source line in flight across passes.
//! - [`lexer`]: source loading and tokenizing.
//! - [`common`]: the `org`/`db`/`dw`/`dd` codegen shared by every architecture.
//! - [`palm`]: the IBM PALM instruction set.
//! - [`registry`]: the opcode table type and the architecture lookup.
//! - [`driver`]: the fixpoint pass loop, binary emission, and listing emission.
//! - [`error`]: the assembler's error taxonomy.

pub mod arg;
pub mod common;
pub mod context;
pub mod driver;
pub mod error;
pub mod lexer;
pub mod op;
pub mod palm;
pub mod registry;

pub use driver::{assemble, Assembled};
pub use error::Error;

use std::fs;

use crate::logging::DiagnosticSink;

/// The architecture installed before the first `cpu`/`arch` directive,
/// if the caller doesn't ask for a different one.
pub const DEFAULT_ARCH: &str = "ibm5100";

/// Read `path`, assemble it for `arch`, and return the finished image.
/// A thin file-I/O wrapper around [`assemble`] for callers (the CLI)
/// that would otherwise just inline this themselves.
pub fn assemble_from_file(path: &str, arch: &str, sink: &mut dyn DiagnosticSink) -> Result<Assembled, Error> {
    let source = fs::read_to_string(path).map_err(|e| Error::Handler {
        line_number: 0,
        line: path.to_string(),
        why: format!("failed to read input file: {}", e),
    })?;
    assemble(&source, arch, sink)
}
