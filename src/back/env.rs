//! The backend environment.
//!
//! Owns the assembly output buffer, the IR-value -> [`Placement`] map,
//! the 16-entry register-state array, and the downward stack-slot
//! cursor for the function currently being lowered.

use crate::back::asm::{Instruction, Register};
use crate::back::place::Placement;
use crate::common::{Id, Map};
use crate::error::CompileError;
use crate::middle::raw::{BlockIdx, ValueIdx};

/// Slot 0 is `x0` (reserved, never allocated); slots 1-7 are `t0..t6`;
/// slots 8-15 are `a0..a7`.
const REGISTER_SLOTS: usize = 16;

fn slot_of(r: Register) -> usize {
    match r {
        Register::Zero => 0,
        Register::T0 => 1,
        Register::T1 => 2,
        Register::T2 => 3,
        Register::A0 => 8,
        Register::A1 => 9,
        Register::A2 => 10,
        Register::A3 => 11,
        Register::A4 => 12,
        Register::A5 => 13,
        Register::A6 => 14,
        Register::A7 => 15,
        Register::T3 => 4,
        Register::T4 => 5,
        Register::T5 => 6,
        Register::T6 => 7,
        other => unreachable!("{other} is not part of the allocator's register pool"),
    }
}

fn register_of(slot: usize) -> Register {
    match slot {
        0 => Register::Zero,
        1 => Register::T0,
        2 => Register::T1,
        3 => Register::T2,
        4 => Register::T3,
        5 => Register::T4,
        6 => Register::T5,
        7 => Register::T6,
        8 => Register::A0,
        9 => Register::A1,
        10 => Register::A2,
        11 => Register::A3,
        12 => Register::A4,
        13 => Register::A5,
        14 => Register::A6,
        15 => Register::A7,
        _ => unreachable!("register slot out of range"),
    }
}

pub struct BackEnv {
    pub code: String,
    placements: Map<ValueIdx, Placement>,
    register_busy: [bool; REGISTER_SLOTS],
    /// Counts down from `frame_size - WORD_SIZE`, one slot per allocation.
    stack_top: i32,
    pub frame_size: i32,
    block_labels: Map<BlockIdx, Id>,
}

impl BackEnv {
    pub fn new() -> Self {
        BackEnv {
            code: String::new(),
            placements: Map::new(),
            register_busy: [false; REGISTER_SLOTS],
            stack_top: 0,
            frame_size: 0,
            block_labels: Map::new(),
        }
    }

    /// Reset per-function state: called once before lowering each
    /// function, since placements, register liveness and block labels
    /// never cross a function boundary.
    pub fn start_function(&mut self, frame_size: i32) {
        self.placements.clear();
        self.register_busy = [false; REGISTER_SLOTS];
        self.frame_size = frame_size;
        self.stack_top = frame_size - crate::back::asm::WORD_SIZE;
        self.block_labels.clear();
    }

    pub fn emit(&mut self, instr: Instruction) {
        self.code.push_str(&instr.to_string());
        self.code.push('\n');
    }

    /// First free scratch register, marked busy. Instruction selection
    /// never keeps more than a handful of temporaries live at once, so
    /// this should never run dry; exhaustion is a compiler bug.
    pub fn find_reg(&mut self) -> Result<Register, CompileError> {
        for slot in 1..REGISTER_SLOTS {
            if !self.register_busy[slot] {
                self.register_busy[slot] = true;
                return Ok(register_of(slot));
            }
        }
        Err(CompileError::Internal("register pool exhausted".into()))
    }

    pub fn free_reg(&mut self, r: Register) {
        if r != Register::Zero {
            self.register_busy[slot_of(r)] = false;
        }
    }

    /// Marks a specific register busy ahead of time, so `find_reg`
    /// cannot later hand it out to a scratch computation that would
    /// overwrite it (used while marshalling call arguments).
    pub fn reserve(&mut self, r: Register) {
        self.register_busy[slot_of(r)] = true;
    }

    /// Allocates the next slot downward from the frame pointer.
    pub fn alloc_stack_slot(&mut self) -> i32 {
        let offset = self.stack_top;
        self.stack_top -= crate::back::asm::WORD_SIZE;
        offset
    }

    pub fn placement_of(&self, idx: ValueIdx) -> Option<Placement> {
        self.placements.get(&idx).copied()
    }

    pub fn set_placement(&mut self, idx: ValueIdx, placement: Placement) {
        self.placements.insert(idx, placement);
    }

    /// The label printed for a non-entry block, generated on first
    /// request and memoized so every branch to the same block agrees.
    pub fn label_for(&mut self, block: BlockIdx, source_label: Id) -> Id {
        *self
            .block_labels
            .entry(block)
            .or_insert_with(|| crate::common::id(source_label.to_string().trim_start_matches('%').to_string()))
    }
}

impl Default for BackEnv {
    fn default() -> Self {
        BackEnv::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_slots_count_down_from_frame_size_minus_word() {
        let mut env = BackEnv::new();
        env.start_function(32);
        assert_eq!(env.alloc_stack_slot(), 28);
        assert_eq!(env.alloc_stack_slot(), 24);
        assert_eq!(env.alloc_stack_slot(), 20);
    }

    #[test]
    fn find_reg_never_hands_out_a_reserved_register() {
        let mut env = BackEnv::new();
        env.start_function(0);
        env.reserve(Register::A0);
        for _ in 0..14 {
            let r = env.find_reg().unwrap();
            assert_ne!(r, Register::A0);
            // Leave every register busy; a full pool (minus the
            // reservation) should still not dip into `x0`.
        }
        assert!(env.find_reg().is_err());
    }

    #[test]
    fn free_reg_makes_a_register_available_again() {
        let mut env = BackEnv::new();
        env.start_function(0);
        let r = env.find_reg().unwrap();
        env.free_reg(r);
        let r2 = env.find_reg().unwrap();
        assert_eq!(r, r2);
    }

    #[test]
    fn freeing_zero_is_a_no_op() {
        let mut env = BackEnv::new();
        env.start_function(0);
        // x0 is never handed out by find_reg, so freeing it must not
        // corrupt slot 0's busy bit (which stays permanently unused).
        env.free_reg(Register::Zero);
        assert!(env.find_reg().is_ok());
    }

    #[test]
    fn label_for_is_memoized_per_block() {
        let mut env = BackEnv::new();
        env.start_function(0);
        let a = env.label_for(3, crate::common::id("%branch0"));
        let b = env.label_for(3, crate::common::id("%branch0"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "branch0");
    }

    #[test]
    fn placements_do_not_survive_a_new_function() {
        let mut env = BackEnv::new();
        env.start_function(16);
        env.set_placement(0, Placement::Stack(4));
        env.start_function(16);
        assert_eq!(env.placement_of(0), None);
    }
}
