//! Koopa-IR text parser. The compiler controls both ends of this text
//! format, so this is a plain recursive-descent reader over the fixed
//! grammar `front::lower` emits, rather than a general-purpose one.

use std::str::Lines;

use crate::common::{id, Id, Map};
use crate::error::CompileError;
use crate::middle::raw::*;

fn internal(msg: impl Into<String>) -> CompileError {
    CompileError::Internal(msg.into())
}

pub fn parse(text: &str) -> Result<RawProgram, CompileError> {
    let mut program = RawProgram::default();
    let mut lines = text.lines();
    while let Some(raw_line) = lines.next() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        } else if let Some(rest) = line.strip_prefix("decl ") {
            let name = rest.split('(').next().ok_or_else(|| internal("malformed decl"))?;
            program.decls.push(id(name));
        } else if let Some(rest) = line.strip_prefix("global ") {
            program.globals.push(parse_global(rest)?);
        } else if line.starts_with("fun ") {
            program.funcs.push(parse_func(line, &mut lines)?);
        } else {
            return Err(internal(format!("unexpected top-level line: {line}")));
        }
    }
    Ok(program)
}

fn parse_global(rest: &str) -> Result<GlobalVar, CompileError> {
    let (name, init) = rest
        .split_once(" = alloc i32, ")
        .ok_or_else(|| internal(format!("malformed global: {rest}")))?;
    let init = if init.trim() == "zeroinit" {
        GlobalInit::Zero
    } else {
        GlobalInit::Word(
            init.trim()
                .parse()
                .map_err(|_| internal(format!("malformed global initializer: {init}")))?,
        )
    };
    Ok(GlobalVar { name: id(name.trim_start_matches('@')), init })
}

/// Parses a `fun @name(params)[: i32] {` header followed by its body,
/// consuming lines from `lines` up to and including the closing `}`.
fn parse_func(header: &str, lines: &mut Lines<'_>) -> Result<RawFunction, CompileError> {
    let header = header.trim_end_matches('{').trim();
    let rest = header.strip_prefix("fun ").ok_or_else(|| internal("malformed fun header"))?;
    let open = rest.find('(').ok_or_else(|| internal("malformed fun header"))?;
    let name = id(&rest[..open]);
    let after_open = &rest[open + 1..];
    let close = after_open.find(')').ok_or_else(|| internal("malformed fun header"))?;
    let params_str = &after_open[..close];
    let returns_value = after_open[close + 1..].trim().starts_with(':');

    let mut values: Vec<Value> = Vec::new();
    let mut names: Map<Id, ValueIdx> = Map::new();
    let mut params = Vec::new();
    for (i, p) in params_str.split(',').map(str::trim).filter(|p| !p.is_empty()).enumerate() {
        let pname = id(p.split(':').next().unwrap().trim());
        values.push(Value { kind: ValueKind::FuncArgRef(i), ty: Type::Int32 });
        let idx = values.len() - 1;
        names.insert(pname, idx);
        params.push(idx);
    }

    let mut blocks: Vec<BasicBlock> = Vec::new();
    let mut current: Option<BasicBlock> = None;
    let mut pending_jumps: Vec<(ValueIdx, Id)> = Vec::new();
    let mut pending_branches: Vec<(ValueIdx, Id, Id)> = Vec::new();

    loop {
        let raw_line = lines.next().ok_or_else(|| internal("unterminated function"))?;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "}" {
            if let Some(b) = current.take() {
                blocks.push(b);
            }
            break;
        }
        if let Some(label) = line.strip_suffix(':') {
            if let Some(b) = current.take() {
                blocks.push(b);
            }
            current = Some(BasicBlock { label: Some(id(label)), insts: Vec::new() });
            continue;
        }
        let block = current.as_mut().ok_or_else(|| internal("instruction before any label"))?;
        let idx = parse_instruction(line, &mut values, &mut names, &mut pending_jumps, &mut pending_branches)?;
        block.insts.push(idx);
    }

    let mut label_to_block: Map<Id, BlockIdx> = Map::new();
    for (i, b) in blocks.iter().enumerate() {
        if let Some(label) = b.label {
            label_to_block.insert(label, i);
        }
    }
    for (idx, target) in pending_jumps {
        let target = *label_to_block
            .get(&target)
            .ok_or_else(|| internal(format!("jump to undefined label {target}")))?;
        values[idx].kind = ValueKind::Jump { target };
    }
    for (idx, then_label, else_label) in pending_branches {
        let then_bb = *label_to_block
            .get(&then_label)
            .ok_or_else(|| internal(format!("branch to undefined label {then_label}")))?;
        let else_bb = *label_to_block
            .get(&else_label)
            .ok_or_else(|| internal(format!("branch to undefined label {else_label}")))?;
        let cond = match &values[idx].kind {
            ValueKind::Branch { cond, .. } => *cond,
            _ => unreachable!(),
        };
        values[idx].kind = ValueKind::Branch { cond, then_bb, else_bb };
    }

    Ok(RawFunction { name, params, returns_value, blocks, values })
}

fn resolve(operand: &str, values: &mut Vec<Value>, names: &mut Map<Id, ValueIdx>) -> Result<ValueIdx, CompileError> {
    let key = id(operand);
    if let Some(&idx) = names.get(&key) {
        return Ok(idx);
    }
    if operand.starts_with('@') {
        let bare = id(operand.trim_start_matches('@'));
        values.push(Value { kind: ValueKind::Global(bare), ty: Type::Pointer });
        let idx = values.len() - 1;
        names.insert(key, idx);
        return Ok(idx);
    }
    let n: i32 = operand
        .parse()
        .map_err(|_| internal(format!("undefined value or malformed literal: {operand}")))?;
    values.push(Value { kind: ValueKind::Integer(n), ty: Type::Int32 });
    Ok(values.len() - 1)
}

fn parse_instruction(
    line: &str,
    values: &mut Vec<Value>,
    names: &mut Map<Id, ValueIdx>,
    pending_jumps: &mut Vec<(ValueIdx, Id)>,
    pending_branches: &mut Vec<(ValueIdx, Id, Id)>,
) -> Result<ValueIdx, CompileError> {
    if let Some((dst, rhs)) = line.split_once(" = ") {
        let value = parse_rhs(rhs, values, names)?;
        values.push(value);
        let idx = values.len() - 1;
        names.insert(id(dst), idx);
        return Ok(idx);
    }

    if let Some(rest) = line.strip_prefix("store ") {
        let (v, dst) = rest.split_once(", ").ok_or_else(|| internal(format!("malformed store: {line}")))?;
        let value = resolve(v.trim(), values, names)?;
        let dst = resolve(dst.trim(), values, names)?;
        values.push(Value { kind: ValueKind::Store { value, dst }, ty: Type::Unit });
        return Ok(values.len() - 1);
    }
    if let Some(rest) = line.strip_prefix("br ") {
        let mut parts = rest.splitn(3, ", ");
        let cond = parts.next().ok_or_else(|| internal("malformed br"))?;
        let then_label = parts.next().ok_or_else(|| internal("malformed br"))?;
        let else_label = parts.next().ok_or_else(|| internal("malformed br"))?;
        let cond = resolve(cond.trim(), values, names)?;
        values.push(Value { kind: ValueKind::Branch { cond, then_bb: 0, else_bb: 0 }, ty: Type::Unit });
        let idx = values.len() - 1;
        pending_branches.push((idx, id(then_label.trim()), id(else_label.trim())));
        return Ok(idx);
    }
    if let Some(rest) = line.strip_prefix("jump ") {
        values.push(Value { kind: ValueKind::Jump { target: 0 }, ty: Type::Unit });
        let idx = values.len() - 1;
        pending_jumps.push((idx, id(rest.trim())));
        return Ok(idx);
    }
    if line == "ret" {
        values.push(Value { kind: ValueKind::Return(None), ty: Type::Unit });
        return Ok(values.len() - 1);
    }
    if let Some(rest) = line.strip_prefix("ret ") {
        let v = resolve(rest.trim(), values, names)?;
        values.push(Value { kind: ValueKind::Return(Some(v)), ty: Type::Unit });
        return Ok(values.len() - 1);
    }
    if let Some(rest) = line.strip_prefix("call ") {
        let (callee, args) = parse_call(rest, values, names)?;
        values.push(Value { kind: ValueKind::Call { callee, args, has_result: false }, ty: Type::Unit });
        return Ok(values.len() - 1);
    }

    Err(internal(format!("unrecognized instruction: {line}")))
}

fn parse_rhs(rhs: &str, values: &mut Vec<Value>, names: &mut Map<Id, ValueIdx>) -> Result<Value, CompileError> {
    if rhs == "alloc i32" {
        return Ok(Value { kind: ValueKind::Alloc, ty: Type::Pointer });
    }
    if let Some(rest) = rhs.strip_prefix("load ") {
        let src = resolve(rest.trim(), values, names)?;
        return Ok(Value { kind: ValueKind::Load { src }, ty: Type::Int32 });
    }
    if let Some(rest) = rhs.strip_prefix("call ") {
        let (callee, args) = parse_call(rest, values, names)?;
        return Ok(Value { kind: ValueKind::Call { callee, args, has_result: true }, ty: Type::Int32 });
    }
    let (mnemonic, operands) = rhs.split_once(' ').ok_or_else(|| internal(format!("malformed rhs: {rhs}")))?;
    let (lhs, rhs_operand) =
        operands.split_once(", ").ok_or_else(|| internal(format!("malformed binary op: {rhs}")))?;
    let op = match mnemonic {
        "add" => BinOp::Add,
        "sub" => BinOp::Sub,
        "mul" => BinOp::Mul,
        "div" => BinOp::Div,
        "mod" => BinOp::Mod,
        "eq" => BinOp::Eq,
        "ne" => BinOp::NotEq,
        "lt" => BinOp::Lt,
        "gt" => BinOp::Gt,
        "le" => BinOp::Le,
        "ge" => BinOp::Ge,
        "and" => BinOp::And,
        "or" => BinOp::Or,
        "xor" => BinOp::Xor,
        "shl" => BinOp::Shl,
        "shr" => BinOp::Shr,
        "sar" => BinOp::Sar,
        other => return Err(internal(format!("unknown operator: {other}"))),
    };
    let lhs = resolve(lhs.trim(), values, names)?;
    let rhs_operand = resolve(rhs_operand.trim(), values, names)?;
    Ok(Value { kind: ValueKind::Binary { op, lhs, rhs: rhs_operand }, ty: Type::Int32 })
}

/// `rest` is `@name(a, b, c)` with no nested parens, so the first/last
/// paren delimit the whole argument list.
fn parse_call(rest: &str, values: &mut Vec<Value>, names: &mut Map<Id, ValueIdx>) -> Result<(Id, Vec<ValueIdx>), CompileError> {
    let open = rest.find('(').ok_or_else(|| internal(format!("malformed call: {rest}")))?;
    let close = rest.rfind(')').ok_or_else(|| internal(format!("malformed call: {rest}")))?;
    let callee = id(&rest[..open]);
    let args_str = &rest[open + 1..close];
    let mut args = Vec::new();
    for a in args_str.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        args.push(resolve(a, values, names)?);
    }
    Ok((callee, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_a() {
        let program = parse("fun @main(): i32 {\n%entry:\n  ret 0\n}\n").unwrap();
        assert_eq!(program.funcs.len(), 1);
        let f = &program.funcs[0];
        assert_eq!(f.blocks.len(), 1);
        match &f.values[f.blocks[0].insts[0]].kind {
            ValueKind::Return(Some(idx)) => assert!(matches!(f.values[*idx].kind, ValueKind::Integer(0))),
            other => panic!("expected `ret 0`, got {other:?}"),
        }
    }

    #[test]
    fn resolves_forward_branch_targets() {
        let text = "fun @main(): i32 {\n%entry:\n  %0 = add 1, 2\n  br %0, %branch0, %branch1\n%branch0:\n  ret 1\n%branch1:\n  ret 0\n}\n";
        let program = parse(text).unwrap();
        let f = &program.funcs[0];
        assert_eq!(f.blocks.len(), 3);
        let branch_idx = f.blocks[0].insts[1];
        match &f.values[branch_idx].kind {
            ValueKind::Branch { then_bb, else_bb, .. } => {
                assert_eq!(*then_bb, 1);
                assert_eq!(*else_bb, 2);
            }
            other => panic!("expected a branch, got {other:?}"),
        }
    }

    #[test]
    fn parses_globals_and_decls() {
        let text = "decl @getint(): i32\nglobal @g = alloc i32, zeroinit\nfun @main(): i32 {\n%entry:\n  ret 0\n}\n";
        let program = parse(text).unwrap();
        assert_eq!(program.decls, vec![id("@getint")]);
        assert_eq!(program.globals.len(), 1);
        assert!(matches!(program.globals[0].init, GlobalInit::Zero));
    }
}
