//! Statement lowering.
//!
//! Each statement's `lower` reports whether it terminated the current
//! basic block (a `ret`, or a `break`/`continue` jump) or fell through.
//! The block lowerer uses that to insert a fresh label whenever more code
//! follows a terminated statement, preserving the invariant that every
//! basic block ends in exactly one terminator.

use crate::common::Id;
use crate::error::{CompileError, SemanticError};
use crate::front::ast::*;
use crate::front::decl;
use crate::front::env::Env;
use crate::front::expr;

fn emit(env: &mut Env, line: impl AsRef<str>) {
    env.code.push_str("  ");
    env.code.push_str(line.as_ref());
    env.code.push('\n');
}

fn emit_label(env: &mut Env, label: Id) {
    env.code.push_str(&format!("{label}:\n"));
}

/// Lower the items of a block *without* pushing a new symbol-table scope
/// — used both by [`lower_block`] (which does push one) and by function
/// bodies, which share their scope with the parameter list.
pub fn lower_block_items(items: &[BlockItem], env: &mut Env) -> Result<bool, CompileError> {
    let mut terminated = false;
    for item in items {
        if terminated {
            // Whatever follows a terminator is unreachable, but the IR
            // still needs each block to end in exactly one terminator, so
            // give the dead code a label of its own.
            let label = env.new_branch_label();
            emit_label(env, label);
            terminated = false;
        }
        terminated = match item {
            BlockItem::ConstDecl(d) => {
                decl::lower_const_decl(d, env)?;
                false
            }
            BlockItem::VarDecl(d) => {
                decl::lower_var_decl(d, env)?;
                false
            }
            BlockItem::Stmt(s) => lower_stmt(s, env)?,
        };
    }
    Ok(terminated)
}

pub fn lower_block(block: &Block, env: &mut Env) -> Result<bool, CompileError> {
    env.enter_block();
    let terminated = lower_block_items(&block.items, env);
    env.exit_block();
    terminated
}

pub fn lower_stmt(stmt: &Stmt, env: &mut Env) -> Result<bool, CompileError> {
    match stmt {
        Stmt::Return(value) => lower_return(value.as_ref(), env),
        Stmt::Assign { target, value } => {
            lower_assign(target, value, env)?;
            Ok(false)
        }
        Stmt::Expr(e) => {
            if let Some(e) = e {
                expr::lower(e, env)?;
            }
            Ok(false)
        }
        Stmt::Block(b) => lower_block(b, env),
        Stmt::If { cond, then_branch, else_branch } => {
            lower_if(cond, then_branch, else_branch.as_deref(), env)
        }
        Stmt::While { cond, body } => lower_while(cond, body, env),
        Stmt::Break => {
            let loop_labels =
                env.current_loop().ok_or(SemanticError::BreakOutsideLoop)?;
            emit(env, format!("jump {}", loop_labels.end));
            Ok(true)
        }
        Stmt::Continue => {
            let loop_labels =
                env.current_loop().ok_or(SemanticError::ContinueOutsideLoop)?;
            emit(env, format!("jump {}", loop_labels.entry));
            Ok(true)
        }
    }
}

fn lower_return(value: Option<&Expr>, env: &mut Env) -> Result<bool, CompileError> {
    let (name, returns_value) = env.current_function.expect("return outside a function");
    match (value, returns_value) {
        (Some(_), false) => return Err(SemanticError::VoidReturnsValue(name).into()),
        (None, true) => return Err(SemanticError::NonVoidEmptyReturn(name).into()),
        _ => {}
    }
    match value {
        Some(e) => {
            let v = expr::lower(e, env)?;
            emit(env, format!("ret {v}"));
        }
        None => emit(env, "ret"),
    }
    Ok(true)
}

fn lower_assign(target: &LVal, value: &Expr, env: &mut Env) -> Result<(), CompileError> {
    if !target.indices.is_empty() {
        return Err(CompileError::Internal(
            "array indexing is not part of the compiling pipeline".into(),
        ));
    }
    let v = expr::lower(value, env)?;
    let binding = env
        .symbols
        .probe(target.name)
        .ok_or(SemanticError::UndeclaredIdentifier(target.name))?
        .clone();
    if binding.is_constant {
        return Err(SemanticError::AssignToConstant(target.name).into());
    }
    let storage = binding.storage_name.expect("variable binding without storage");
    emit(env, format!("store {v}, {storage}"));
    Ok(())
}

fn lower_if(
    cond: &Expr,
    then_branch: &Stmt,
    else_branch: Option<&Stmt>,
    env: &mut Env,
) -> Result<bool, CompileError> {
    let c = expr::lower(cond, env)?;
    let then_label = env.new_branch_label();
    let cont_label = env.new_branch_label();

    if let Some(else_branch) = else_branch {
        let else_label = env.new_branch_label();
        emit(env, format!("br {c}, {then_label}, {else_label}"));

        emit_label(env, then_label);
        let then_terminated = lower_stmt(then_branch, env)?;
        if !then_terminated {
            emit(env, format!("jump {cont_label}"));
        }

        emit_label(env, else_label);
        let else_terminated = lower_stmt(else_branch, env)?;
        if !else_terminated {
            emit(env, format!("jump {cont_label}"));
        }

        emit_label(env, cont_label);
        Ok(then_terminated && else_terminated)
    } else {
        emit(env, format!("br {c}, {then_label}, {cont_label}"));

        emit_label(env, then_label);
        let then_terminated = lower_stmt(then_branch, env)?;
        if !then_terminated {
            emit(env, format!("jump {cont_label}"));
        }

        emit_label(env, cont_label);
        Ok(false)
    }
}

fn lower_while(cond: &Expr, body: &Stmt, env: &mut Env) -> Result<bool, CompileError> {
    let entry_label = env.new_branch_label();
    let body_label = env.new_branch_label();
    let end_label = env.new_branch_label();
    env.push_loop(entry_label, end_label);
    let result = lower_while_body(cond, body, entry_label, body_label, end_label, env);
    env.pop_loop();
    result?;
    Ok(false)
}

/// The fallible part of [`lower_while`], split out so the caller can pop
/// the loop stack unconditionally before propagating any error.
fn lower_while_body(
    cond: &Expr,
    body: &Stmt,
    entry_label: Id,
    body_label: Id,
    end_label: Id,
    env: &mut Env,
) -> Result<(), CompileError> {
    emit(env, format!("jump {entry_label}"));
    emit_label(env, entry_label);
    let c = expr::lower(cond, env)?;
    emit(env, format!("br {c}, {body_label}, {end_label}"));

    emit_label(env, body_label);
    let body_terminated = lower_stmt(body, env)?;
    if !body_terminated {
        emit(env, format!("jump {entry_label}"));
    }

    emit_label(env, end_label);
    Ok(())
}
