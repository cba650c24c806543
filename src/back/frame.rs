//! Stack-frame layout: computes how many bytes a function's prologue
//! subtracts from `sp`, and whether it needs to save `ra`.

use crate::back::asm::WORD_SIZE;
use crate::middle::raw::{RawFunction, ValueKind};

pub struct FramePlan {
    /// Total bytes subtracted from `sp` on entry, rounded up to 16.
    pub size: i32,
    pub has_call: bool,
}

/// Sums 4 bytes per non-`Unit` instruction result, 4 bytes for a saved
/// `ra` if the function contains any `call`, and 4 bytes per argument
/// past the eighth in the widest call the function makes.
pub fn plan(func: &RawFunction) -> FramePlan {
    let mut locals = 0i32;
    let mut has_call = false;
    let mut max_overflow_args = 0usize;
    for block in &func.blocks {
        for &idx in &block.insts {
            let value = &func.values[idx];
            if !value.is_unit() {
                locals += WORD_SIZE;
            }
            if let ValueKind::Call { args, .. } = &value.kind {
                has_call = true;
                max_overflow_args = max_overflow_args.max(args.len().saturating_sub(8));
            }
        }
    }
    let ra_slot = if has_call { WORD_SIZE } else { 0 };
    let overflow = WORD_SIZE * max_overflow_args as i32;
    let size = locals + ra_slot + overflow;
    let size = (size + 15) / 16 * 16;
    FramePlan { size, has_call }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::id;
    use crate::middle::raw::{BasicBlock, Type, Value, ValueIdx, ValueKind};

    /// Builds a one-block function whose instruction stream is exactly
    /// `insts` (by index into `values`) -- mirroring that literal
    /// operands sit in the value arena but are never themselves listed
    /// as block instructions.
    fn leaf_function(values: Vec<Value>, insts: Vec<ValueIdx>) -> RawFunction {
        RawFunction {
            name: id("@f"),
            params: Vec::new(),
            returns_value: true,
            blocks: vec![BasicBlock { label: Some(id("%entry")), insts }],
            values,
        }
    }

    #[test]
    fn no_call_no_locals_is_empty() {
        let values = vec![Value { kind: ValueKind::Return(None), ty: Type::Unit }];
        let f = leaf_function(values, vec![0]);
        let plan = plan(&f);
        assert_eq!(plan.size, 0);
        assert!(!plan.has_call);
    }

    #[test]
    fn every_non_unit_result_gets_a_slot_rounded_up() {
        // Two `alloc`s (Pointer, non-unit) -> 8 bytes of locals, rounded
        // up to the 16-byte frame granularity.
        let values = vec![
            Value { kind: ValueKind::Alloc, ty: Type::Pointer },
            Value { kind: ValueKind::Alloc, ty: Type::Pointer },
            Value { kind: ValueKind::Return(None), ty: Type::Unit },
        ];
        let f = leaf_function(values, vec![0, 1, 2]);
        let plan = plan(&f);
        assert_eq!(plan.size, 16);
        assert!(!plan.has_call);
    }

    #[test]
    fn a_call_reserves_a_word_for_ra() {
        let values = vec![
            Value {
                kind: ValueKind::Call { callee: id("@g"), args: Vec::new(), has_result: false },
                ty: Type::Unit,
            },
            Value { kind: ValueKind::Return(None), ty: Type::Unit },
        ];
        let f = leaf_function(values, vec![0, 1]);
        let plan = plan(&f);
        assert!(plan.has_call);
        assert_eq!(plan.size, 16);
    }

    #[test]
    fn overflow_arguments_widen_the_frame() {
        // Ten literal operands live in the arena but never appear as
        // block instructions themselves; only the `call` and `ret` do.
        let args: Vec<ValueIdx> = (0..10).collect();
        let mut values: Vec<Value> =
            (0..10).map(|n| Value { kind: ValueKind::Integer(n), ty: Type::Int32 }).collect();
        values.push(Value { kind: ValueKind::Call { callee: id("@g"), args, has_result: false }, ty: Type::Unit });
        values.push(Value { kind: ValueKind::Return(None), ty: Type::Unit });
        let f = leaf_function(values, vec![10, 11]);
        let plan = plan(&f);
        // ra (4) + 2 overflow words (8) = 12, rounded up to 16.
        assert!(plan.has_call);
        assert_eq!(plan.size, 16);
    }
}
