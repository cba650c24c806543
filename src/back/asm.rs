//! The 32-bit RISC-V (RV32I) assembly model.
//!
//! Every Koopa-level operation selects to 1-3 of these; the selector
//! (`back::select`) builds them and the backend environment prints each
//! one with its `Display` impl, append-only, exactly like the frontend's
//! IR buffer.
//!
//! # Calling convention
//!
//! The first 8 integer arguments travel in `a0..a7`; argument `i >= 8`
//! is written by the caller into its outgoing-argument area at
//! `i-8` words past the top of its own frame, and read by the callee at
//! `frame_size + (i-8)*4` relative to `sp`. Only one word-sized return
//! value exists, always in `a0`.
//!
//! # Stack frame
//!
//! The stack grows down: the within-frame layout is **downward from the
//! frame pointer**. `stack_top` starts at `frame_size - 4` and decreases
//! by 4 per slot, so every local's offset from `sp` lands in
//! `[0, frame_size)`. The saved return address, when the function
//! contains any `call`, occupies the top word of the frame (offset
//! `frame_size - 4`); locals are packed below it.
//!
//! ```txt
//!   sp + frame_size  (caller's sp before `addi sp, sp, -frame_size`)
//!   +-------------------------+
//!   | saved ra (if any call)  |  <- frame_size - 4
//!   +-------------------------+
//!   | locals (one slot each   |
//!   | per non-unit IR value)  |
//!   +-------------------------+
//!   | outgoing call argument  |
//!   | overflow area (i >= 8)  |  <- offsets 0..
//!   +-------------------------+ <- sp
//! ```

use derive_more::Display;

use crate::common::Id;

/// Word size for this processor: every IR value is a 32-bit `int`.
pub const WORD_SIZE: i32 = 4;

/// Registers available to the allocator, in register-file order.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum Register {
    #[display("zero")]
    Zero,
    #[display("ra")]
    Ra,
    #[display("sp")]
    Sp,
    #[display("gp")]
    Gp,
    #[display("tp")]
    Tp,
    #[display("t0")]
    T0,
    #[display("t1")]
    T1,
    #[display("t2")]
    T2,
    #[display("s0")]
    S0,
    #[display("s1")]
    S1,
    #[display("a0")]
    A0,
    #[display("a1")]
    A1,
    #[display("a2")]
    A2,
    #[display("a3")]
    A3,
    #[display("a4")]
    A4,
    #[display("a5")]
    A5,
    #[display("a6")]
    A6,
    #[display("a7")]
    A7,
    #[display("s2")]
    S2,
    #[display("s3")]
    S3,
    #[display("s4")]
    S4,
    #[display("s5")]
    S5,
    #[display("s6")]
    S6,
    #[display("s7")]
    S7,
    #[display("s8")]
    S8,
    #[display("s9")]
    S9,
    #[display("s10")]
    S10,
    #[display("s11")]
    S11,
    #[display("t3")]
    T3,
    #[display("t4")]
    T4,
    #[display("t5")]
    T5,
    #[display("t6")]
    T6,
}

/// The 16-entry register-state array: slot 0 is `x0` (reserved, never
/// allocated), slots 1-7 are `t0..t6`, slots 8-15 are `a0..a7`. These
/// are the only registers the allocator ever hands out; `s1..s11` and
/// the frame/stack pointers are never touched by the value placer.
pub static TEMP_REGISTERS: [Register; 7] =
    [Register::T0, Register::T1, Register::T2, Register::T3, Register::T4, Register::T5, Register::T6];

pub static ARG_REGISTERS: [Register; 8] = [
    Register::A0,
    Register::A1,
    Register::A2,
    Register::A3,
    Register::A4,
    Register::A5,
    Register::A6,
    Register::A7,
];

/// Two-register arithmetic/comparison mnemonics used by `Instruction::Arith`.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Display)]
#[allow(missing_docs)]
pub enum ArithOp {
    #[display("add")]
    Add,
    #[display("sub")]
    Sub,
    #[display("mul")]
    Mul,
    #[display("div")]
    Div,
    #[display("rem")]
    Rem,
    #[display("and")]
    And,
    #[display("or")]
    Or,
    #[display("xor")]
    Xor,
    #[display("sll")]
    Sll,
    #[display("srl")]
    Srl,
    #[display("sra")]
    Sra,
    #[display("slt")]
    Slt,
    /// Pseudo-op expanded by the assembler to `slt dst, rhs, lhs`.
    #[display("sgt")]
    Sgt,
}

/// A single RV32I instruction (or assembler pseudo-op), parametric over
/// nothing further -- register allocation has already happened by the
/// time one of these is constructed.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum Instruction {
    Li { dst: Register, imm: i32 },
    La { dst: Register, label: Id },
    Lw { dst: Register, base: Register, offset: i32 },
    Sw { src: Register, base: Register, offset: i32 },
    Mv { dst: Register, src: Register },
    Arith { op: ArithOp, dst: Register, lhs: Register, rhs: Register },
    ArithI { op: ArithOp, dst: Register, lhs: Register, imm: i32 },
    Xori { dst: Register, src: Register, imm: i32 },
    Seqz { dst: Register, src: Register },
    Snez { dst: Register, src: Register },
    Bnez { cond: Register, target: Id },
    J { target: Id },
    Call { target: Id },
    Ret,
    Label(Id),
    Directive(String),
    Comment(String),
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Instruction::*;
        match self {
            Li { dst, imm } => write!(f, "  li {dst}, {imm}"),
            La { dst, label } => write!(f, "  la {dst}, {label}"),
            Lw { dst, base, offset } => write!(f, "  lw {dst}, {offset}({base})"),
            Sw { src, base, offset } => write!(f, "  sw {src}, {offset}({base})"),
            Mv { dst, src } => write!(f, "  mv {dst}, {src}"),
            Arith { op, dst, lhs, rhs } => write!(f, "  {op} {dst}, {lhs}, {rhs}"),
            ArithI { op, dst, lhs, imm } => write!(f, "  {op}i {dst}, {lhs}, {imm}"),
            Xori { dst, src, imm } => write!(f, "  xori {dst}, {src}, {imm}"),
            Seqz { dst, src } => write!(f, "  seqz {dst}, {src}"),
            Snez { dst, src } => write!(f, "  snez {dst}, {src}"),
            Bnez { cond, target } => write!(f, "  bnez {cond}, {target}"),
            J { target } => write!(f, "  j {target}"),
            Call { target } => write!(f, "  call {target}"),
            Ret => write!(f, "  ret"),
            Label(l) => write!(f, "{l}:"),
            Directive(d) => write!(f, "{d}"),
            Comment(s) => write!(f, "  # {s}"),
        }
    }
}
