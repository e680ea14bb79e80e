//! A two-plus-pass, architecture-pluggable cross-assembler.
//!
//! See [`assembler`] for the assembler itself; [`logging`] for the
//! diagnostic sink used to report warnings and errors.

pub mod assembler;
pub mod logging;
