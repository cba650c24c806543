//! The back end: raw-IR -> RV32 assembly.

pub mod asm;
pub mod codegen;
pub mod env;
pub mod frame;
pub mod place;
pub mod select;

pub use codegen::lower_program;
