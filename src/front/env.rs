//! The frontend environment: owns the output buffer, the symbol table,
//! the scope-id stack used to mangle local names, the loop stack for
//! `break`/`continue` targets, and the monotonic counters for fresh
//! temporaries, scope ids and branch labels.

use crate::common::{id, Id, Map};
use crate::front::symtab::SymbolTable;

#[derive(Clone, Copy)]
pub struct LoopLabels {
    pub entry: Id,
    pub end: Id,
}

#[derive(Clone, Copy)]
pub struct FuncSig {
    pub returns_value: bool,
    pub param_count: usize,
}

pub struct Env {
    /// Append-only output buffer; emission order is textual order.
    pub code: String,
    pub symbols: SymbolTable,
    /// Scope ids currently open, innermost last; used to mangle local
    /// storage names as `@name_<id>`.
    scope_stack: Vec<u32>,
    loop_stack: Vec<LoopLabels>,
    /// Populated with the runtime forward declarations and every user
    /// function definition before its body is lowered, so a recursive or
    /// forward call resolves correctly.
    functions: Map<Id, FuncSig>,
    next_temp: u32,
    next_scope: u32,
    next_branch: u32,
    pub in_global: bool,
    /// `(name, returns_value)` of the function currently being lowered;
    /// consulted by `return` to check it against the declared signature.
    pub current_function: Option<(Id, bool)>,
}

impl Env {
    pub fn new() -> Self {
        Env {
            code: String::new(),
            symbols: SymbolTable::new(),
            scope_stack: Vec::new(),
            loop_stack: Vec::new(),
            functions: Map::new(),
            next_temp: 0,
            next_scope: 0,
            next_branch: 0,
            in_global: true,
            current_function: None,
        }
    }

    /// Fresh `%k` temporary, monotonically increasing for the whole
    /// compilation unit.
    pub fn new_temp(&mut self) -> Id {
        let k = self.next_temp;
        self.next_temp += 1;
        id(format!("%{k}"))
    }

    /// Fresh `%branchK` label, likewise.
    pub fn new_branch_label(&mut self) -> Id {
        let k = self.next_branch;
        self.next_branch += 1;
        id(format!("%branch{k}"))
    }

    /// Enter a lexical block: push a fresh scope id (for name mangling)
    /// together with a matching symbol-table scope.
    pub fn enter_block(&mut self) -> u32 {
        let scope_id = self.next_scope;
        self.next_scope += 1;
        self.scope_stack.push(scope_id);
        self.symbols.enter_scope();
        scope_id
    }

    pub fn exit_block(&mut self) {
        self.scope_stack.pop();
        self.symbols.exit_scope();
    }

    /// Mangled storage name for a local declared directly in the
    /// current block: `@name_<scope-id>`.
    pub fn mangle_local(&self, name: Id) -> Id {
        let scope_id = *self.scope_stack.last().expect("mangle_local outside any block");
        id(format!("@{name}_{scope_id}"))
    }

    /// Mangled storage name for a global: `@name` (unique because the top
    /// scope is unique).
    pub fn mangle_global(&self, name: Id) -> Id {
        id(format!("@{name}"))
    }

    pub fn push_loop(&mut self, entry: Id, end: Id) {
        self.loop_stack.push(LoopLabels { entry, end });
    }

    pub fn pop_loop(&mut self) {
        self.loop_stack.pop().expect("pop_loop without a matching push_loop");
    }

    pub fn current_loop(&self) -> Option<LoopLabels> {
        self.loop_stack.last().copied()
    }

    pub fn declare_function(&mut self, name: Id, returns_value: bool, param_count: usize) {
        self.functions.insert(name, FuncSig { returns_value, param_count });
    }

    pub fn function_sig(&self, name: Id) -> Option<FuncSig> {
        self.functions.get(&name).copied()
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}
