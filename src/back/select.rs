//! Instruction selection: translates one raw-IR value into the RV32
//! instructions that compute it, spilling its result immediately per
//! the backend's register discipline.

use crate::back::asm::{ArithOp, Instruction, Register, WORD_SIZE};
use crate::back::env::BackEnv;
use crate::back::place::Placement;
use crate::common::id;
use crate::error::CompileError;
use crate::middle::raw::{BinOp, RawFunction, ValueIdx, ValueKind};

fn internal(msg: impl Into<String>) -> CompileError {
    CompileError::Internal(msg.into())
}

/// Gets `idx`'s value into some register, emitting whatever load is
/// needed. The caller must free the returned register once done with
/// it -- this never allocates a persistent placement for `idx` itself
/// (that only happens for the *defining* instruction of a value).
fn materialize(env: &mut BackEnv, func: &RawFunction, idx: ValueIdx) -> Result<Register, CompileError> {
    if let ValueKind::Integer(0) = &func.values[idx].kind {
        return Ok(Register::Zero);
    }
    if let ValueKind::Integer(n) = &func.values[idx].kind {
        let r = env.find_reg()?;
        env.emit(Instruction::Li { dst: r, imm: *n });
        return Ok(r);
    }
    match env.placement_of(idx).ok_or_else(|| internal("value read before it was placed"))? {
        Placement::Register(r) => Ok(r),
        Placement::Stack(offset) => {
            let r = env.find_reg()?;
            env.emit(Instruction::Lw { dst: r, base: Register::Sp, offset });
            Ok(r)
        }
        Placement::Global(label) => {
            let r = env.find_reg()?;
            env.emit(Instruction::La { dst: r, label });
            env.emit(Instruction::Lw { dst: r, base: r, offset: 0 });
            Ok(r)
        }
    }
}

/// Like [`materialize`], but for an address (the left side of a `load`
/// or `store`) rather than a value: globals need `la` before the
/// access, locals are already a direct `sp`-relative offset.
enum Address {
    Stack(i32),
    Global(crate::common::Id),
}

fn resolve_address(env: &BackEnv, idx: ValueIdx) -> Result<Address, CompileError> {
    match env.placement_of(idx).ok_or_else(|| internal("address read before it was placed"))? {
        Placement::Stack(offset) => Ok(Address::Stack(offset)),
        Placement::Global(label) => Ok(Address::Global(label)),
        Placement::Register(_) => Err(internal("an alloc/global placement can never be a register")),
    }
}

fn spill(env: &mut BackEnv, idx: ValueIdx, r: Register) {
    let slot = env.alloc_stack_slot();
    env.emit(Instruction::Sw { src: r, base: Register::Sp, offset: slot });
    env.set_placement(idx, Placement::Stack(slot));
}

fn binary_op_instructions(env: &mut BackEnv, op: BinOp, dst: Register, lhs: Register, rhs: Register) {
    use Instruction::*;
    match op {
        BinOp::Add => env.emit(Arith { op: ArithOp::Add, dst, lhs, rhs }),
        BinOp::Sub => env.emit(Arith { op: ArithOp::Sub, dst, lhs, rhs }),
        BinOp::Mul => env.emit(Arith { op: ArithOp::Mul, dst, lhs, rhs }),
        BinOp::Div => env.emit(Arith { op: ArithOp::Div, dst, lhs, rhs }),
        BinOp::Mod => env.emit(Arith { op: ArithOp::Rem, dst, lhs, rhs }),
        BinOp::And => env.emit(Arith { op: ArithOp::And, dst, lhs, rhs }),
        BinOp::Or => env.emit(Arith { op: ArithOp::Or, dst, lhs, rhs }),
        BinOp::Xor => env.emit(Arith { op: ArithOp::Xor, dst, lhs, rhs }),
        BinOp::Shl => env.emit(Arith { op: ArithOp::Sll, dst, lhs, rhs }),
        BinOp::Shr => env.emit(Arith { op: ArithOp::Srl, dst, lhs, rhs }),
        BinOp::Sar => env.emit(Arith { op: ArithOp::Sra, dst, lhs, rhs }),
        BinOp::Eq => {
            env.emit(Arith { op: ArithOp::Xor, dst, lhs, rhs });
            env.emit(Seqz { dst, src: dst });
        }
        BinOp::NotEq => {
            env.emit(Arith { op: ArithOp::Xor, dst, lhs, rhs });
            env.emit(Snez { dst, src: dst });
        }
        BinOp::Lt => env.emit(Arith { op: ArithOp::Slt, dst, lhs, rhs }),
        BinOp::Gt => env.emit(Arith { op: ArithOp::Sgt, dst, lhs, rhs }),
        // `a>=b` iff `!(a<b)`.
        BinOp::Ge => {
            env.emit(Arith { op: ArithOp::Slt, dst, lhs, rhs });
            env.emit(Xori { dst, src: dst, imm: 1 });
        }
        // Symmetric correction: `a<=b` iff `!(b<a)`.
        BinOp::Le => {
            env.emit(Arith { op: ArithOp::Slt, dst, lhs: rhs, rhs: lhs });
            env.emit(Xori { dst, src: dst, imm: 1 });
        }
    }
}

fn reserve_arg_registers(env: &mut BackEnv, count: usize) -> Vec<Register> {
    use crate::back::asm::ARG_REGISTERS;
    ARG_REGISTERS[..count.min(8)].to_vec()
}

/// Lowers one raw-IR value. `has_call` and `frame_size` come from the
/// enclosing function's frame plan, needed by `ret`'s epilogue.
pub fn select(
    env: &mut BackEnv,
    func: &RawFunction,
    idx: ValueIdx,
    has_call: bool,
    frame_size: i32,
) -> Result<(), CompileError> {
    let kind = func.values[idx].kind.clone();
    match kind {
        ValueKind::Integer(_) | ValueKind::Global(_) | ValueKind::FuncArgRef(_) => {
            // Placed eagerly (literals are never placed; globals and
            // parameters are placed before the body is walked).
            Ok(())
        }
        ValueKind::Alloc => {
            let slot = env.alloc_stack_slot();
            env.set_placement(idx, Placement::Stack(slot));
            Ok(())
        }
        ValueKind::Load { src } => {
            let dst = match resolve_address(env, src)? {
                Address::Stack(offset) => {
                    let r = env.find_reg()?;
                    env.emit(Instruction::Lw { dst: r, base: Register::Sp, offset });
                    r
                }
                Address::Global(label) => {
                    let r = env.find_reg()?;
                    env.emit(Instruction::La { dst: r, label });
                    env.emit(Instruction::Lw { dst: r, base: r, offset: 0 });
                    r
                }
            };
            spill(env, idx, dst);
            env.free_reg(dst);
            Ok(())
        }
        ValueKind::Store { value, dst } => {
            let v = materialize(env, func, value)?;
            match resolve_address(env, dst)? {
                Address::Stack(offset) => env.emit(Instruction::Sw { src: v, base: Register::Sp, offset }),
                Address::Global(label) => {
                    let scratch = env.find_reg()?;
                    env.emit(Instruction::La { dst: scratch, label });
                    env.emit(Instruction::Sw { src: v, base: scratch, offset: 0 });
                    env.free_reg(scratch);
                }
            }
            env.free_reg(v);
            Ok(())
        }
        ValueKind::Binary { op, lhs, rhs } => {
            let l = materialize(env, func, lhs)?;
            let r = materialize(env, func, rhs)?;
            let dst = env.find_reg()?;
            binary_op_instructions(env, op, dst, l, r);
            env.free_reg(l);
            env.free_reg(r);
            spill(env, idx, dst);
            env.free_reg(dst);
            Ok(())
        }
        ValueKind::Branch { cond, then_bb, else_bb } => {
            let c = materialize(env, func, cond)?;
            let then_label = env.label_for(then_bb, func.blocks[then_bb].label.expect("every block has a label"));
            let else_label = env.label_for(else_bb, func.blocks[else_bb].label.expect("every block has a label"));
            env.emit(Instruction::Bnez { cond: c, target: then_label });
            env.emit(Instruction::J { target: else_label });
            env.free_reg(c);
            Ok(())
        }
        ValueKind::Jump { target } => {
            let label = env.label_for(target, func.blocks[target].label.expect("every block has a label"));
            env.emit(Instruction::J { target: label });
            Ok(())
        }
        ValueKind::Call { callee, args, has_result } => {
            let reserved = reserve_arg_registers(env, args.len());
            for r in &reserved {
                env.reserve(*r);
            }
            for (i, &arg) in args.iter().enumerate() {
                let v = materialize(env, func, arg)?;
                if i < 8 {
                    env.emit(Instruction::Mv { dst: reserved[i], src: v });
                } else {
                    let offset = WORD_SIZE * (i as i32 - 8);
                    env.emit(Instruction::Sw { src: v, base: Register::Sp, offset });
                }
                env.free_reg(v);
            }
            let target = id(callee.to_string().trim_start_matches('@').to_string());
            env.emit(Instruction::Call { target });
            for r in &reserved {
                env.free_reg(*r);
            }
            if has_result {
                spill(env, idx, Register::A0);
            }
            Ok(())
        }
        ValueKind::Return(value) => {
            if let Some(v) = value {
                let r = materialize(env, func, v)?;
                if r != Register::A0 {
                    env.emit(Instruction::Mv { dst: Register::A0, src: r });
                }
                env.free_reg(r);
            }
            if has_call {
                env.emit(Instruction::Lw { dst: Register::Ra, base: Register::Sp, offset: frame_size - WORD_SIZE });
            }
            if frame_size > 0 {
                env.emit(Instruction::ArithI { op: ArithOp::Add, dst: Register::Sp, lhs: Register::Sp, imm: frame_size });
            }
            env.emit(Instruction::Ret);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(env: &BackEnv) -> Vec<&str> {
        env.code.lines().collect()
    }

    #[test]
    fn ge_lowers_to_slt_then_xori_not_the_buggy_sub_form() {
        let mut env = BackEnv::new();
        env.start_function(0);
        binary_op_instructions(&mut env, BinOp::Ge, Register::T0, Register::T1, Register::T2);
        let code = lines(&env);
        assert_eq!(code, vec!["  slt t0, t1, t2", "  xori t0, t0, 1"]);
    }

    #[test]
    fn le_lowers_to_the_operand_swapped_symmetric_form() {
        let mut env = BackEnv::new();
        env.start_function(0);
        binary_op_instructions(&mut env, BinOp::Le, Register::T0, Register::T1, Register::T2);
        let code = lines(&env);
        assert_eq!(code, vec!["  slt t0, t2, t1", "  xori t0, t0, 1"]);
    }

    #[test]
    fn gt_uses_the_sgt_pseudo_op() {
        let mut env = BackEnv::new();
        env.start_function(0);
        binary_op_instructions(&mut env, BinOp::Gt, Register::T0, Register::T1, Register::T2);
        assert_eq!(lines(&env), vec!["  sgt t0, t1, t2"]);
    }

    #[test]
    fn eq_lowers_to_xor_then_seqz() {
        let mut env = BackEnv::new();
        env.start_function(0);
        binary_op_instructions(&mut env, BinOp::Eq, Register::T0, Register::T1, Register::T2);
        assert_eq!(lines(&env), vec!["  xor t0, t1, t2", "  seqz t0, t0"]);
    }

    #[test]
    fn materialize_zero_literal_uses_x0_without_emitting_anything() {
        let mut env = BackEnv::new();
        env.start_function(0);
        let func = RawFunction {
            name: id("@f"),
            params: Vec::new(),
            returns_value: true,
            blocks: Vec::new(),
            values: vec![crate::middle::raw::Value { kind: ValueKind::Integer(0), ty: crate::middle::raw::Type::Int32 }],
        };
        let r = materialize(&mut env, &func, 0).unwrap();
        assert_eq!(r, Register::Zero);
        assert!(env.code.is_empty());
    }

    #[test]
    fn materialize_nonzero_literal_emits_li() {
        let mut env = BackEnv::new();
        env.start_function(0);
        let func = RawFunction {
            name: id("@f"),
            params: Vec::new(),
            returns_value: true,
            blocks: Vec::new(),
            values: vec![crate::middle::raw::Value { kind: ValueKind::Integer(7), ty: crate::middle::raw::Type::Int32 }],
        };
        materialize(&mut env, &func, 0).unwrap();
        assert_eq!(lines(&env), vec!["  li t0, 7"]);
    }
}
