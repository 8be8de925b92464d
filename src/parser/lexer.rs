//! Logos-based lexer for the transformation language (§4.1).
//!
//! Fast tokenization using the logos crate: a thin hand-written
//! `Token`/`Lexer` pair wraps a derive-generated `LogosToken` enum and
//! converts it to [`SyntaxKind`] one token at a time.

use super::syntax_kind::SyntaxKind;
use logos::Logos;
use rowan::TextSize;

/// A token with its kind, source text, and byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: SyntaxKind,
    pub text: &'a str,
    pub offset: TextSize,
}

/// Lexer wrapping the logos-generated tokenizer.
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, LogosToken>,
    offset: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            inner: LogosToken::lexer(input),
            offset: 0,
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let logos_token = self.inner.next()?;
        let text = self.inner.slice();
        let offset = TextSize::new(self.offset);
        self.offset += text.len() as u32;

        let kind = match logos_token {
            Ok(t) => t.into(),
            Err(()) => SyntaxKind::ERROR,
        };

        #[cfg(debug_assertions)]
        tracing::trace!(?kind, ?offset, text, "token");

        Some(Token { kind, text, offset })
    }
}

/// Tokenize an entire string into a `Vec`, including trivia.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Lexer::new(input).collect()
}

/// Logos token enum, mapped to [`SyntaxKind`] below.
///
/// `--` starts a line comment (§4.1); a leading `-- @path ...` line is a
/// module-search directive the parser extracts separately, but at the
/// token level it is an ordinary comment.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"")]
pub enum LogosToken {
    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    #[regex(r"--[^\n]*")]
    Comment,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    #[regex(r"[0-9]+")]
    Int,

    // Single-quoted, no escape processing beyond the closing quote (§4.1).
    #[regex(r"'[^']*'")]
    String,

    #[token("->")]
    Arrow,
    #[token("<-")]
    LArrow,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<>")]
    Neq,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token("!")]
    Bang,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token("|")]
    Pipe,
}

impl From<LogosToken> for SyntaxKind {
    fn from(token: LogosToken) -> Self {
        use LogosToken::*;
        match token {
            Whitespace => SyntaxKind::WHITESPACE,
            Comment => SyntaxKind::COMMENT,
            Ident => SyntaxKind::IDENT,
            Int => SyntaxKind::INT,
            String => SyntaxKind::STRING,
            Arrow => SyntaxKind::ARROW,
            LArrow => SyntaxKind::LARROW,
            LtEq => SyntaxKind::LE,
            GtEq => SyntaxKind::GE,
            Neq => SyntaxKind::NEQ,
            Plus => SyntaxKind::PLUS,
            Minus => SyntaxKind::MINUS,
            Star => SyntaxKind::STAR,
            Slash => SyntaxKind::SLASH,
            Eq => SyntaxKind::EQ,
            Lt => SyntaxKind::LT,
            Gt => SyntaxKind::GT,
            Dot => SyntaxKind::DOT,
            Colon => SyntaxKind::COLON,
            Bang => SyntaxKind::BANG,
            LParen => SyntaxKind::LPAREN,
            RParen => SyntaxKind::RPAREN,
            LBrace => SyntaxKind::LBRACE,
            RBrace => SyntaxKind::RBRACE,
            LBracket => SyntaxKind::LBRACKET,
            RBracket => SyntaxKind::RBRACKET,
            Semicolon => SyntaxKind::SEMICOLON,
            Comma => SyntaxKind::COMMA,
            Pipe => SyntaxKind::PIPE,
        }
    }
}

/// Reclassify `IDENT` tokens that are actually keywords. Logos matches
/// `Ident` greedily before we get a chance to distinguish keywords, so this
/// runs as a cheap post-pass rather than adding 25 more logos alternatives
/// that would all need the same priority tie-break.
pub fn tokenize_with_keywords(input: &str) -> Vec<Token<'_>> {
    tokenize(input)
        .into_iter()
        .map(|mut tok| {
            if tok.kind == SyntaxKind::IDENT {
                if let Some(kw) = SyntaxKind::keyword_from_ident(tok.text) {
                    tok.kind = kw;
                }
            }
            tok
        })
        .collect()
}

/// Extract `@path` directives from the source's comment lines (§4.1/§4.3):
/// any line whose comment body (after `--`), once trimmed, begins with the
/// literal `@path ` contributes one `Name=<path>` entry, with the `@path `
/// prefix stripped and the remainder trimmed. A malformed directive (no
/// `@path ` prefix) is silently not a directive, not an error (§4.1).
pub fn extract_path_directives(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in input.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("--") {
            let rest = rest.trim_start();
            if let Some(path) = rest.strip_prefix("@path ") {
                out.push(path.trim().to_string());
            }
        }
    }
    out
}
