//! Top-level backend orchestration: the raw-program walker that visits
//! functions, basic blocks and instructions in turn.

use crate::back::asm::{ArithOp, Instruction, Register, ARG_REGISTERS, WORD_SIZE};
use crate::back::env::BackEnv;
use crate::back::frame;
use crate::back::place::Placement;
use crate::back::select;
use crate::common::id;
use crate::error::CompileError;
use crate::middle::raw::{GlobalInit, RawFunction, RawProgram};

pub fn lower_program(program: &RawProgram) -> Result<String, CompileError> {
    let mut env = BackEnv::new();

    if !program.globals.is_empty() {
        env.emit(Instruction::Directive(".data".into()));
        for g in &program.globals {
            env.emit(Instruction::Directive(format!(".global {}", g.name)));
            env.emit(Instruction::Label(g.name));
            match g.init {
                GlobalInit::Zero => env.emit(Instruction::Directive("  .zero 4".into())),
                GlobalInit::Word(n) => env.emit(Instruction::Directive(format!("  .word {n}"))),
            }
        }
        env.code.push('\n');
    }

    env.emit(Instruction::Directive(".text".into()));
    for func in &program.funcs {
        lower_function(&mut env, func)?;
        env.code.push('\n');
    }

    Ok(std::mem::take(&mut env.code))
}

fn lower_function(env: &mut BackEnv, func: &RawFunction) -> Result<(), CompileError> {
    let plan = frame::plan(func);
    env.start_function(plan.size);

    let bare_name = id(func.name.to_string().trim_start_matches('@'));
    env.emit(Instruction::Directive(format!(".global {bare_name}")));
    env.emit(Instruction::Label(bare_name));

    if plan.size > 0 {
        env.emit(Instruction::ArithI { op: ArithOp::Add, dst: Register::Sp, lhs: Register::Sp, imm: -plan.size });
    }
    // Reserve the top stack slot for the saved `ra` through the same
    // downward cursor locals use, so a local can never be handed the
    // same offset.
    if plan.has_call {
        let ra_slot = env.alloc_stack_slot();
        env.emit(Instruction::Sw { src: Register::Ra, base: Register::Sp, offset: ra_slot });
    }

    // The first 8 parameters arrive in a0..a7, the rest at
    // `frame_size + (i-8)*4` relative to our own (already-adjusted) sp --
    // i.e. in the caller's frame, just above ours.
    for (i, &param) in func.params.iter().enumerate() {
        let placement = if i < 8 {
            Placement::Register(ARG_REGISTERS[i])
        } else {
            Placement::Stack(plan.size + WORD_SIZE * (i as i32 - 8))
        };
        env.set_placement(param, placement);
    }

    for (i, block) in func.blocks.iter().enumerate() {
        if i > 0 {
            let label = env.label_for(i, block.label.expect("every block has a label"));
            env.emit(Instruction::Label(label));
        }
        for &idx in &block.insts {
            select::select(env, func, idx, plan.has_call, plan.size)?;
        }
    }
    Ok(())
}
