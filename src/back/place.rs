//! Value placement.
//!
//! A [`Placement`] is where an IR value currently resides: a register,
//! a byte offset from `sp`, or a global label. `back::env::BackEnv`
//! owns the value -> placement map and hands out fresh placements;
//! this module only names the three kinds.

use crate::common::Id;
use crate::back::asm::Register;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Register(Register),
    /// Non-negative byte offset from `sp`.
    Stack(i32),
    Global(Id),
}
