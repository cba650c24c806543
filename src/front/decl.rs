//! Declaration & definition lowering: constants never emit IR; variables
//! allocate storage (global or local, with a mangled name); function
//! definitions materialize their parameters into locals so every use
//! inside the body is a uniform load.

use crate::common::Id;
use crate::error::{CompileError, SemanticError};
use crate::front::ast::*;
use crate::front::env::Env;
use crate::front::expr;
use crate::front::stmt;
use crate::front::symtab::Binding;

fn emit(env: &mut Env, line: impl AsRef<str>) {
    env.code.push_str("  ");
    env.code.push_str(line.as_ref());
    env.code.push('\n');
}

fn declare(env: &mut Env, name: Id, binding: Binding) -> Result<(), CompileError> {
    if env.symbols.insert(name, binding) {
        Ok(())
    } else {
        Err(SemanticError::DuplicateDeclaration(name).into())
    }
}

pub fn lower_const_decl(decl: &ConstDecl, env: &mut Env) -> Result<(), CompileError> {
    for def in &decl.defs {
        lower_const_def(def, env)?;
    }
    Ok(())
}

fn lower_const_def(def: &ConstDef, env: &mut Env) -> Result<(), CompileError> {
    if !def.dims.is_empty() {
        return Err(CompileError::Internal(
            "array constants are not part of the compiling pipeline".into(),
        ));
    }
    let value = match &def.init {
        ConstInitVal::Expr(e) => expr::eval(e, env)?,
        ConstInitVal::List(_) => {
            return Err(CompileError::Internal(
                "array constants are not part of the compiling pipeline".into(),
            ))
        }
    };
    declare(env, def.name, Binding::constant(value))
}

pub fn lower_var_decl(decl: &VarDecl, env: &mut Env) -> Result<(), CompileError> {
    for def in &decl.defs {
        lower_var_def(def, env)?;
    }
    Ok(())
}

fn lower_var_def(def: &VarDef, env: &mut Env) -> Result<(), CompileError> {
    if !def.dims.is_empty() {
        return Err(CompileError::Internal(
            "array variables are not part of the compiling pipeline".into(),
        ));
    }
    if env.in_global {
        lower_global_var_def(def, env)
    } else {
        lower_local_var_def(def, env)
    }
}

fn lower_global_var_def(def: &VarDef, env: &mut Env) -> Result<(), CompileError> {
    let storage = env.mangle_global(def.name);
    let init_text = match &def.init {
        None => "zeroinit".to_string(),
        Some(InitVal::Expr(e)) => expr::eval(e, env)?.to_string(),
        Some(InitVal::List(_)) => {
            return Err(CompileError::Internal(
                "array variables are not part of the compiling pipeline".into(),
            ))
        }
    };
    declare(env, def.name, Binding::variable(storage))?;
    env.code.push_str(&format!("global {storage} = alloc i32, {init_text}\n"));
    Ok(())
}

fn lower_local_var_def(def: &VarDef, env: &mut Env) -> Result<(), CompileError> {
    let storage = env.mangle_local(def.name);
    declare(env, def.name, Binding::variable(storage))?;
    emit(env, format!("{storage} = alloc i32"));
    if let Some(init) = &def.init {
        let value_expr = match init {
            InitVal::Expr(e) => e,
            InitVal::List(_) => {
                return Err(CompileError::Internal(
                    "array variables are not part of the compiling pipeline".into(),
                ))
            }
        };
        let v = expr::lower(value_expr, env)?;
        emit(env, format!("store {v}, {storage}"));
    }
    Ok(())
}

/// Emit the header, materialize every parameter into a local alloc,
/// lower the body, and make sure the function ends in a terminator.
pub fn lower_func_def(def: &FuncDef, env: &mut Env) -> Result<(), CompileError> {
    let returns_value = def.ret_type == BaseType::Int;
    env.current_function = Some((def.name, returns_value));
    env.in_global = false;
    env.enter_block();

    let mut param_temps = Vec::with_capacity(def.params.len());
    for p in &def.params {
        if p.array_dims.is_some() {
            return Err(CompileError::Internal(
                "array parameters are not part of the compiling pipeline".into(),
            ));
        }
        param_temps.push((p.name, env.new_temp()));
    }

    let sig = param_temps
        .iter()
        .map(|(_, t)| format!("{t}: i32"))
        .collect::<Vec<_>>()
        .join(", ");
    let ret_suffix = if returns_value { ": i32" } else { "" };
    env.code.push_str(&format!("fun @{}({sig}){ret_suffix} {{\n", def.name));
    env.code.push_str("%entry:\n");

    for (name, temp) in &param_temps {
        let storage = env.mangle_local(*name);
        declare(env, *name, Binding::variable(storage))?;
        emit(env, format!("{storage} = alloc i32"));
        emit(env, format!("store {temp}, {storage}"));
    }

    let terminated = stmt::lower_block_items(&def.body.items, env)?;
    if !terminated {
        if returns_value {
            return Err(SemanticError::MissingReturn(def.name).into());
        }
        emit(env, "ret");
    }

    env.code.push_str("}\n");
    env.exit_block();
    env.in_global = true;
    env.current_function = None;
    Ok(())
}
