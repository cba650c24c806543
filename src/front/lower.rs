//! Top-level lowering entry point.
//!
//! Two passes over the global items: first every runtime builtin and
//! every user function signature is registered, so a call occurring
//! textually before its callee's definition (including recursion and
//! mutual recursion) still resolves; second, each item is actually
//! lowered in source order.

use crate::common::id;
use crate::error::CompileError;
use crate::front::ast::{BaseType, CompUnit, GlobalItem};
use crate::front::decl;
use crate::front::env::Env;

/// SysY's library functions: declared but never defined in the unit, so
/// the backend must emit them as external symbols rather than `fun`
/// bodies. The last `getarray`/`putarray` parameter is `int*`, not a
/// plain `int`.
const RUNTIME_FUNCTIONS: &[(&str, bool, &[&str])] = &[
    ("getint", true, &[]),
    ("getch", true, &[]),
    ("getarray", true, &["*i32"]),
    ("putint", false, &["i32"]),
    ("putch", false, &["i32"]),
    ("putarray", false, &["i32", "*i32"]),
    ("starttime", false, &[]),
    ("stoptime", false, &[]),
];

pub fn lower(ast: &CompUnit, env: &mut Env) -> Result<String, CompileError> {
    for (name, returns_value, param_types) in RUNTIME_FUNCTIONS {
        env.declare_function(id(*name), *returns_value, param_types.len());
        let ret_suffix = if *returns_value { ": i32" } else { "" };
        let params = param_types.join(", ");
        env.code.push_str(&format!("decl @{name}({params}){ret_suffix}\n"));
    }
    if !RUNTIME_FUNCTIONS.is_empty() {
        env.code.push('\n');
    }

    for item in &ast.items {
        if let GlobalItem::FuncDef(def) = item {
            env.declare_function(def.name, def.ret_type == BaseType::Int, def.params.len());
        }
    }

    for item in &ast.items {
        match item {
            GlobalItem::ConstDecl(d) => decl::lower_const_decl(d, env)?,
            GlobalItem::VarDecl(d) => decl::lower_var_decl(d, env)?,
            GlobalItem::FuncDef(def) => {
                decl::lower_func_def(def, env)?;
                env.code.push('\n');
            }
        }
    }

    Ok(std::mem::take(&mut env.code))
}
