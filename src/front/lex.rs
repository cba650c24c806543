//! The lexer.

use derive_more::Display;
use regex::Regex;

/// Tokens in the program
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("kind: '{kind}', part of input: '{text}'")]
pub struct Token<'src> {
    /// What token class this token belongs to.
    pub kind: TokenKind,
    /// What part of the input this token carries.
    pub text: &'src str,
}

/// Token classes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display, Debug)]
pub enum TokenKind {
    #[display("id")]
    Id,
    #[display("num")]
    Num,
    #[display("int")]
    KwInt,
    #[display("void")]
    KwVoid,
    #[display("const")]
    KwConst,
    #[display("if")]
    KwIf,
    #[display("else")]
    KwElse,
    #[display("while")]
    KwWhile,
    #[display("break")]
    KwBreak,
    #[display("continue")]
    KwContinue,
    #[display("return")]
    KwReturn,
    #[display("=")]
    Assign,
    #[display("(")]
    LParen,
    #[display(")")]
    RParen,
    #[display("{{")]
    LBrace,
    #[display("}}")]
    RBrace,
    #[display("[")]
    LBracket,
    #[display("]")]
    RBracket,
    #[display(",")]
    Comma,
    #[display(";")]
    Semi,
    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("*")]
    Star,
    #[display("/")]
    Slash,
    #[display("%")]
    Percent,
    #[display("<")]
    Lt,
    #[display("<=")]
    Le,
    #[display(">")]
    Gt,
    #[display(">=")]
    Ge,
    #[display("==")]
    Eq,
    #[display("!=")]
    Ne,
    #[display("&&")]
    AndAnd,
    #[display("||")]
    OrOr,
    #[display("!")]
    Not,
}

pub struct LexError(pub usize, pub char);

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lexer error: unexpected character {:?} at {}", self.1, self.0)
    }
}

impl std::fmt::Debug for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lexer error: unexpected character {:?} at {}", self.1, self.0)
    }
}

/// Keywords, checked against an identifier match before it is accepted as
/// a plain `Id` token.
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("int", TokenKind::KwInt),
    ("void", TokenKind::KwVoid),
    ("const", TokenKind::KwConst),
    ("if", TokenKind::KwIf),
    ("else", TokenKind::KwElse),
    ("while", TokenKind::KwWhile),
    ("break", TokenKind::KwBreak),
    ("continue", TokenKind::KwContinue),
    ("return", TokenKind::KwReturn),
];

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    whitespace: Regex,
    matchers: Vec<(Regex, TokenKind)>,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        // Two-character operators are listed before their one-character
        // prefixes so the regex scan below tries them first.
        let matchers = vec![
            (Regex::new(r"\A[A-Za-z_][A-Za-z0-9_]*").unwrap(), TokenKind::Id),
            (Regex::new(r"\A(?:0[xX][0-9a-fA-F]+|0[0-7]*|[1-9][0-9]*)").unwrap(), TokenKind::Num),
            (Regex::new(r"\A<=").unwrap(), TokenKind::Le),
            (Regex::new(r"\A>=").unwrap(), TokenKind::Ge),
            (Regex::new(r"\A==").unwrap(), TokenKind::Eq),
            (Regex::new(r"\A!=").unwrap(), TokenKind::Ne),
            (Regex::new(r"\A&&").unwrap(), TokenKind::AndAnd),
            (Regex::new(r"\A\|\|").unwrap(), TokenKind::OrOr),
            (Regex::new(r"\A=").unwrap(), TokenKind::Assign),
            (Regex::new(r"\A\(").unwrap(), TokenKind::LParen),
            (Regex::new(r"\A\)").unwrap(), TokenKind::RParen),
            (Regex::new(r"\A\{").unwrap(), TokenKind::LBrace),
            (Regex::new(r"\A\}").unwrap(), TokenKind::RBrace),
            (Regex::new(r"\A\[").unwrap(), TokenKind::LBracket),
            (Regex::new(r"\A\]").unwrap(), TokenKind::RBracket),
            (Regex::new(r"\A,").unwrap(), TokenKind::Comma),
            (Regex::new(r"\A;").unwrap(), TokenKind::Semi),
            (Regex::new(r"\A\+").unwrap(), TokenKind::Plus),
            (Regex::new(r"\A-").unwrap(), TokenKind::Minus),
            (Regex::new(r"\A\*").unwrap(), TokenKind::Star),
            (Regex::new(r"\A/").unwrap(), TokenKind::Slash),
            (Regex::new(r"\A%").unwrap(), TokenKind::Percent),
            (Regex::new(r"\A<").unwrap(), TokenKind::Lt),
            (Regex::new(r"\A>").unwrap(), TokenKind::Gt),
            (Regex::new(r"\A!").unwrap(), TokenKind::Not),
        ];
        Lexer {
            input,
            pos: 0,
            whitespace: Regex::new(r"\A(?:[ \t\f\r\n\v]|(?://[^\n]*)|(?s:/\*.*?\*/))*").unwrap(),
            matchers,
        }
    }

    /// Has the lexer reached the end of input?
    pub fn end_of_input(&self) -> bool {
        self.pos == self.input.len()
    }

    // Skip comments and whitespace
    fn skip_whitespace(&mut self) {
        if let Some(m) = self.whitespace.find(&self.input[self.pos..]) {
            self.pos += m.end()
        }
    }

    /// Get the next token if possible.
    ///
    /// The return type distinguishes between end-of-input and lexer error.
    pub fn next(&mut self) -> Result<Option<Token<'input>>, LexError> {
        self.skip_whitespace();
        if self.end_of_input() {
            return Ok(None);
        }
        let rest = &self.input[self.pos..];
        for (re, kind) in &self.matchers {
            if let Some(m) = re.find(rest) {
                let text = m.as_str();
                let kind = if *kind == TokenKind::Id {
                    KEYWORDS
                        .iter()
                        .find(|(kw, _)| *kw == text)
                        .map(|(_, k)| *k)
                        .unwrap_or(TokenKind::Id)
                } else {
                    *kind
                };
                self.pos += text.len();
                return Ok(Some(Token { kind, text }));
            }
        }
        let bad = rest.chars().next().unwrap();
        Err(LexError(self.pos, bad))
    }
}
