//! The parser.
//!
//! Recursive descent rather than a generated LALR grammar. Operator
//! precedence follows the conventional C ladder: `||` < `&&` <
//! `==`/`!=` < relational < `+`/`-` < `*`/`/`/`%` < unary.

use std::fmt::Debug;

use derive_more::derive::Display;

use crate::common::id;

use super::ast::*;
use super::lex::*;

#[derive(Display)]
#[display("Parse error: {}", self.0)]
pub struct ParseError(String);

impl Debug for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

fn err(msg: impl Into<String>) -> ParseError {
    ParseError(msg.into())
}

pub fn parse(input: &str) -> Result<CompUnit, ParseError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        match lexer.next() {
            Ok(Some(tok)) => tokens.push(tok),
            Ok(None) => break,
            Err(e) => return Err(err(e.to_string())),
        }
    }
    let mut p = Parser { tokens, pos: 0 };
    let unit = p.comp_unit()?;
    if p.pos != p.tokens.len() {
        return Err(err("trailing tokens after compilation unit"));
    }
    Ok(unit)
}

struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<Token<'src>> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn bump(&mut self) -> Result<Token<'src>, ParseError> {
        let tok = self.peek().ok_or_else(|| err("unexpected end of input"))?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'src>, ParseError> {
        let tok = self.bump()?;
        if tok.kind != kind {
            return Err(err(format!("expected {kind}, found {}", tok.kind)));
        }
        Ok(tok)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Result<crate::common::Id, ParseError> {
        let tok = self.expect(TokenKind::Id)?;
        Ok(id(tok.text))
    }

    fn number(&mut self) -> Result<i32, ParseError> {
        let tok = self.expect(TokenKind::Num)?;
        let text = tok.text;
        let val = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16).map_err(|e| err(e.to_string()))?
        } else if text.len() > 1 && text.starts_with('0') {
            i64::from_str_radix(text, 8).map_err(|e| err(e.to_string()))?
        } else {
            text.parse::<i64>().map_err(|e| err(e.to_string()))?
        };
        Ok(val as i32)
    }

    // CompUnit -> { Decl | FuncDef }
    fn comp_unit(&mut self) -> Result<CompUnit, ParseError> {
        let mut items = Vec::new();
        while self.peek().is_some() {
            items.push(self.global_item()?);
        }
        Ok(CompUnit { items })
    }

    fn global_item(&mut self) -> Result<GlobalItem, ParseError> {
        // Decide decl vs func-def by lookahead: `const` always starts a
        // decl; otherwise a base type followed by `ident (` is a func-def.
        if self.peek_kind() == Some(TokenKind::KwConst) {
            return Ok(GlobalItem::ConstDecl(self.const_decl()?));
        }
        let base = self.base_type()?;
        let name = self.ident()?;
        if self.peek_kind() == Some(TokenKind::LParen) {
            Ok(GlobalItem::FuncDef(self.func_def_rest(base, name)?))
        } else {
            Ok(GlobalItem::VarDecl(self.var_decl_rest(name)?))
        }
    }

    fn base_type(&mut self) -> Result<BaseType, ParseError> {
        match self.bump()?.kind {
            TokenKind::KwInt => Ok(BaseType::Int),
            TokenKind::KwVoid => Ok(BaseType::Void),
            k => Err(err(format!("expected a type, found {k}"))),
        }
    }

    fn const_decl(&mut self) -> Result<ConstDecl, ParseError> {
        self.expect(TokenKind::KwConst)?;
        self.expect(TokenKind::KwInt)?;
        let mut defs = vec![self.const_def()?];
        while self.eat(TokenKind::Comma) {
            defs.push(self.const_def()?);
        }
        self.expect(TokenKind::Semi)?;
        Ok(ConstDecl { defs })
    }

    fn const_def(&mut self) -> Result<ConstDef, ParseError> {
        let name = self.ident()?;
        let mut dims = Vec::new();
        while self.eat(TokenKind::LBracket) {
            dims.push(self.expr()?);
            self.expect(TokenKind::RBracket)?;
        }
        self.expect(TokenKind::Assign)?;
        let init = self.const_init_val()?;
        Ok(ConstDef { name, dims, init })
    }

    fn const_init_val(&mut self) -> Result<ConstInitVal, ParseError> {
        if self.eat(TokenKind::LBrace) {
            let mut items = Vec::new();
            if self.peek_kind() != Some(TokenKind::RBrace) {
                items.push(self.const_init_val()?);
                while self.eat(TokenKind::Comma) {
                    items.push(self.const_init_val()?);
                }
            }
            self.expect(TokenKind::RBrace)?;
            Ok(ConstInitVal::List(items))
        } else {
            Ok(ConstInitVal::Expr(self.expr()?))
        }
    }

    // Top-level `int x, y[3];` after the leading `int` and first ident have
    // already been consumed by `global_item`.
    fn var_decl_rest(&mut self, first_name: crate::common::Id) -> Result<VarDecl, ParseError> {
        let mut defs = vec![self.var_def_rest(first_name)?];
        while self.eat(TokenKind::Comma) {
            let name = self.ident()?;
            defs.push(self.var_def_rest(name)?);
        }
        self.expect(TokenKind::Semi)?;
        Ok(VarDecl { defs })
    }

    fn var_decl(&mut self) -> Result<VarDecl, ParseError> {
        self.expect(TokenKind::KwInt)?;
        let name = self.ident()?;
        self.var_decl_rest(name)
    }

    fn var_def_rest(&mut self, name: crate::common::Id) -> Result<VarDef, ParseError> {
        let mut dims = Vec::new();
        while self.eat(TokenKind::LBracket) {
            dims.push(self.expr()?);
            self.expect(TokenKind::RBracket)?;
        }
        let init = if self.eat(TokenKind::Assign) {
            Some(self.init_val()?)
        } else {
            None
        };
        Ok(VarDef { name, dims, init })
    }

    fn init_val(&mut self) -> Result<InitVal, ParseError> {
        if self.eat(TokenKind::LBrace) {
            let mut items = Vec::new();
            if self.peek_kind() != Some(TokenKind::RBrace) {
                items.push(self.init_val()?);
                while self.eat(TokenKind::Comma) {
                    items.push(self.init_val()?);
                }
            }
            self.expect(TokenKind::RBrace)?;
            Ok(InitVal::List(items))
        } else {
            Ok(InitVal::Expr(self.expr()?))
        }
    }

    fn func_def_rest(
        &mut self,
        ret_type: BaseType,
        name: crate::common::Id,
    ) -> Result<FuncDef, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if self.peek_kind() != Some(TokenKind::RParen) {
            params.push(self.func_fparam()?);
            while self.eat(TokenKind::Comma) {
                params.push(self.func_fparam()?);
            }
        }
        self.expect(TokenKind::RParen)?;
        let body = self.block()?;
        Ok(FuncDef { ret_type, name, params, body })
    }

    fn func_fparam(&mut self) -> Result<FuncFParam, ParseError> {
        self.expect(TokenKind::KwInt)?;
        let name = self.ident()?;
        if self.eat(TokenKind::LBracket) {
            self.expect(TokenKind::RBracket)?;
            let mut dims = Vec::new();
            while self.eat(TokenKind::LBracket) {
                dims.push(self.expr()?);
                self.expect(TokenKind::RBracket)?;
            }
            Ok(FuncFParam { name, array_dims: Some(dims) })
        } else {
            Ok(FuncFParam { name, array_dims: None })
        }
    }

    fn block(&mut self) -> Result<Block, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();
        while self.peek_kind() != Some(TokenKind::RBrace) {
            items.push(self.block_item()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Block { items })
    }

    fn block_item(&mut self) -> Result<BlockItem, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::KwConst) => Ok(BlockItem::ConstDecl(self.const_decl()?)),
            Some(TokenKind::KwInt) => Ok(BlockItem::VarDecl(self.var_decl()?)),
            _ => Ok(BlockItem::Stmt(self.stmt()?)),
        }
    }

    fn stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::LBrace) => Ok(Stmt::Block(self.block()?)),
            Some(TokenKind::KwIf) => {
                self.bump()?;
                self.expect(TokenKind::LParen)?;
                let cond = self.expr()?;
                self.expect(TokenKind::RParen)?;
                let then_branch = Box::new(self.stmt()?);
                let else_branch = if self.eat(TokenKind::KwElse) {
                    Some(Box::new(self.stmt()?))
                } else {
                    None
                };
                Ok(Stmt::If { cond, then_branch, else_branch })
            }
            Some(TokenKind::KwWhile) => {
                self.bump()?;
                self.expect(TokenKind::LParen)?;
                let cond = self.expr()?;
                self.expect(TokenKind::RParen)?;
                let body = Box::new(self.stmt()?);
                Ok(Stmt::While { cond, body })
            }
            Some(TokenKind::KwBreak) => {
                self.bump()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Break)
            }
            Some(TokenKind::KwContinue) => {
                self.bump()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Continue)
            }
            Some(TokenKind::KwReturn) => {
                self.bump()?;
                let value = if self.peek_kind() != Some(TokenKind::Semi) {
                    Some(self.expr()?)
                } else {
                    None
                };
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Return(value))
            }
            Some(TokenKind::Semi) => {
                self.bump()?;
                Ok(Stmt::Expr(None))
            }
            Some(TokenKind::Id) if self.looks_like_assignment() => {
                let target = self.lval()?;
                self.expect(TokenKind::Assign)?;
                let value = self.expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Assign { target, value })
            }
            _ => {
                let e = self.expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Expr(Some(e)))
            }
        }
    }

    /// Disambiguate `ident (\[expr\])* =` (assignment) from an
    /// expression-statement starting with the same identifier, without
    /// backtracking through the full expression grammar.
    fn looks_like_assignment(&self) -> bool {
        let mut i = self.pos;
        if self.tokens.get(i).map(|t| t.kind) != Some(TokenKind::Id) {
            return false;
        }
        i += 1;
        loop {
            match self.tokens.get(i).map(|t| t.kind) {
                Some(TokenKind::LBracket) => {
                    // Skip a balanced `[ ... ]`.
                    i += 1;
                    let mut depth = 1usize;
                    while depth > 0 {
                        match self.tokens.get(i).map(|t| t.kind) {
                            Some(TokenKind::LBracket) => depth += 1,
                            Some(TokenKind::RBracket) => depth -= 1,
                            Some(_) => {}
                            None => return false,
                        }
                        i += 1;
                    }
                }
                _ => break,
            }
        }
        self.tokens.get(i).map(|t| t.kind) == Some(TokenKind::Assign)
    }

    fn lval(&mut self) -> Result<LVal, ParseError> {
        let name = self.ident()?;
        let mut indices = Vec::new();
        while self.eat(TokenKind::LBracket) {
            indices.push(self.expr()?);
            self.expect(TokenKind::RBracket)?;
        }
        Ok(LVal { name, indices })
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.lor_expr()
    }

    fn lor_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.land_expr()?;
        while self.eat(TokenKind::OrOr) {
            let rhs = self.land_expr()?;
            lhs = Expr::Logical { op: LogicalOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn land_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.eq_expr()?;
        while self.eat(TokenKind::AndAnd) {
            let rhs = self.eq_expr()?;
            lhs = Expr::Logical { op: LogicalOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn eq_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.rel_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Eq) => RelOp::Eq,
                Some(TokenKind::Ne) => RelOp::Ne,
                _ => break,
            };
            self.bump()?;
            let rhs = self.rel_expr()?;
            lhs = Expr::Rel { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn rel_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.add_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Lt) => RelOp::Lt,
                Some(TokenKind::Le) => RelOp::Le,
                Some(TokenKind::Gt) => RelOp::Gt,
                Some(TokenKind::Ge) => RelOp::Ge,
                _ => break,
            };
            self.bump()?;
            let rhs = self.add_expr()?;
            lhs = Expr::Rel { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => break,
            };
            self.bump()?;
            let rhs = self.mul_expr()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                Some(TokenKind::Percent) => BinOp::Mod,
                _ => break,
            };
            self.bump()?;
            let rhs = self.unary_expr()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Plus) => Some(UnaryOp::Plus),
            Some(TokenKind::Minus) => Some(UnaryOp::Neg),
            Some(TokenKind::Not) => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.bump()?;
            let operand = Box::new(self.unary_expr()?);
            return Ok(Expr::Unary { op, operand });
        }
        // A call looks like `ident (`, which otherwise would be mistaken
        // for the start of an `LVal` in `primary_expr`.
        if self.peek_kind() == Some(TokenKind::Id)
            && self.tokens.get(self.pos + 1).map(|t| t.kind) == Some(TokenKind::LParen)
        {
            let callee = self.ident()?;
            self.expect(TokenKind::LParen)?;
            let mut args = Vec::new();
            if self.peek_kind() != Some(TokenKind::RParen) {
                args.push(self.expr()?);
                while self.eat(TokenKind::Comma) {
                    args.push(self.expr()?);
                }
            }
            self.expect(TokenKind::RParen)?;
            return Ok(Expr::Call { callee, args });
        }
        self.primary_expr()
    }

    fn primary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::LParen) => {
                self.bump()?;
                let e = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            Some(TokenKind::Num) => Ok(Expr::Number(self.number()?)),
            Some(TokenKind::Id) => Ok(Expr::LVal(self.lval()?)),
            other => Err(err(format!("expected an expression, found {:?}", other))),
        }
    }
}
