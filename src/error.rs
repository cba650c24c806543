//! Error types shared across the pipeline.
//!
//! Per the three error kinds the front/back end can raise: lexer/parser
//! failures, semantic errors caught during lowering, and internal
//! inconsistencies (malformed raw IR) that indicate a compiler bug rather
//! than a user mistake. All three surface as a single [`CompileError`] so
//! the CLI driver has one place to print a diagnostic and exit nonzero.

use derive_more::{Display, Error};

use crate::common::Id;

#[derive(Debug, Display, Error)]
pub enum CompileError {
    #[display("lex error: unexpected character {_1:?} at byte {_0}")]
    Lex(usize, char),

    #[display("{_0}")]
    #[error(ignore)]
    Parse(String),

    #[display("{_0}")]
    Semantic(SemanticError),

    #[display("internal compiler error: {_0}")]
    #[error(ignore)]
    Internal(String),
}

impl From<SemanticError> for CompileError {
    fn from(e: SemanticError) -> Self {
        CompileError::Semantic(e)
    }
}

impl From<crate::front::lex::LexError> for CompileError {
    fn from(e: crate::front::lex::LexError) -> Self {
        CompileError::Lex(e.0, e.1)
    }
}

impl From<crate::front::parse::ParseError> for CompileError {
    fn from(e: crate::front::parse::ParseError) -> Self {
        CompileError::Parse(e.to_string())
    }
}

/// Semantic errors detected during AST -> IR lowering.
#[derive(Debug, Display, Error)]
pub enum SemanticError {
    #[display("'{_0}' is already declared in this scope")]
    #[error(ignore)]
    DuplicateDeclaration(Id),

    #[display("use of undeclared identifier '{_0}'")]
    #[error(ignore)]
    UndeclaredIdentifier(Id),

    #[display("call to undeclared function '{_0}'")]
    #[error(ignore)]
    UndeclaredFunction(Id),

    #[display("'{name}' takes {expected} argument(s), {got} given")]
    WrongArgumentCount { name: Id, expected: usize, got: usize },

    #[display("cannot assign to constant '{_0}'")]
    #[error(ignore)]
    AssignToConstant(Id),

    #[display("'break' outside of a loop")]
    BreakOutsideLoop,

    #[display("'continue' outside of a loop")]
    ContinueOutsideLoop,

    #[display("expression is not a compile-time constant")]
    NotConstant,

    #[display("function '{_0}' returns a value but falls off the end without a return")]
    #[error(ignore)]
    MissingReturn(Id),

    #[display("void function '{_0}' may not return a value")]
    #[error(ignore)]
    VoidReturnsValue(Id),

    #[display("non-void function '{_0}' has a bare 'return'")]
    #[error(ignore)]
    NonVoidEmptyReturn(Id),
}
