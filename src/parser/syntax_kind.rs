//! Token kinds for the transformation language (§4.1).

#![allow(non_camel_case_types)]

/// Every token the lexer can produce, plus the `ERROR`/`EOF` sentinels the
/// parser's cursor uses for out-of-bounds lookahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    // Trivia
    WHITESPACE,
    COMMENT,
    ERROR,
    EOF,

    // Literals
    IDENT,
    INT,
    STRING,

    // Keywords
    MODULE_KW,
    CREATE_KW,
    FROM_KW,
    HELPER_KW,
    DEF_KW,
    CONTEXT_KW,
    RULE_KW,
    QUERY_KW,
    IF_KW,
    THEN_KW,
    ELSE_KW,
    ENDIF_KW,
    AND_KW,
    OR_KW,
    NOT_KW,
    TRUE_KW,
    FALSE_KW,
    LET_KW,
    IN_KW,
    DO_KW,
    TO_KW,
    SELF_KW,
    LAZY_KW,
    INTEGER_KW,
    STRING_KW,
    BOOLEAN_KW,
    REAL_KW,

    // Operators
    PLUS,
    MINUS,
    STAR,
    SLASH,
    EQ,
    NEQ,
    LT,
    GT,
    LE,
    GE,
    ARROW,
    DOT,
    COLON,
    LARROW,
    BANG,

    // Punctuation
    LPAREN,
    RPAREN,
    LBRACE,
    RBRACE,
    LBRACKET,
    RBRACKET,
    SEMICOLON,
    COMMA,
    PIPE,
}

impl SyntaxKind {
    pub fn is_trivia(self) -> bool {
        matches!(self, Self::WHITESPACE | Self::COMMENT)
    }

    /// Map an identifier's exact text to the matching keyword kind, if any.
    /// Keywords are case-sensitive.
    pub fn keyword_from_ident(text: &str) -> Option<SyntaxKind> {
        Some(match text {
            "module" => Self::MODULE_KW,
            "create" => Self::CREATE_KW,
            "from" => Self::FROM_KW,
            "helper" => Self::HELPER_KW,
            "def" => Self::DEF_KW,
            "context" => Self::CONTEXT_KW,
            "rule" => Self::RULE_KW,
            "query" => Self::QUERY_KW,
            "if" => Self::IF_KW,
            "then" => Self::THEN_KW,
            "else" => Self::ELSE_KW,
            "endif" => Self::ENDIF_KW,
            "and" => Self::AND_KW,
            "or" => Self::OR_KW,
            "not" => Self::NOT_KW,
            "true" => Self::TRUE_KW,
            "false" => Self::FALSE_KW,
            "let" => Self::LET_KW,
            "in" => Self::IN_KW,
            "do" => Self::DO_KW,
            "to" => Self::TO_KW,
            "self" => Self::SELF_KW,
            "lazy" => Self::LAZY_KW,
            "Integer" => Self::INTEGER_KW,
            "String" => Self::STRING_KW,
            "Boolean" => Self::BOOLEAN_KW,
            "Real" => Self::REAL_KW,
            _ => return None,
        })
    }

    pub fn describe(self) -> &'static str {
        use SyntaxKind::*;
        match self {
            WHITESPACE => "whitespace",
            COMMENT => "comment",
            ERROR => "an invalid token",
            EOF => "end of file",
            IDENT => "an identifier",
            INT => "an integer literal",
            STRING => "a string literal",
            MODULE_KW => "'module'",
            CREATE_KW => "'create'",
            FROM_KW => "'from'",
            HELPER_KW => "'helper'",
            DEF_KW => "'def'",
            CONTEXT_KW => "'context'",
            RULE_KW => "'rule'",
            QUERY_KW => "'query'",
            IF_KW => "'if'",
            THEN_KW => "'then'",
            ELSE_KW => "'else'",
            ENDIF_KW => "'endif'",
            AND_KW => "'and'",
            OR_KW => "'or'",
            NOT_KW => "'not'",
            TRUE_KW => "'true'",
            FALSE_KW => "'false'",
            LET_KW => "'let'",
            IN_KW => "'in'",
            DO_KW => "'do'",
            TO_KW => "'to'",
            SELF_KW => "'self'",
            LAZY_KW => "'lazy'",
            INTEGER_KW => "'Integer'",
            STRING_KW => "'String'",
            BOOLEAN_KW => "'Boolean'",
            REAL_KW => "'Real'",
            PLUS => "'+'",
            MINUS => "'-'",
            STAR => "'*'",
            SLASH => "'/'",
            EQ => "'='",
            NEQ => "'<>'",
            LT => "'<'",
            GT => "'>'",
            LE => "'<='",
            GE => "'>='",
            ARROW => "'->'",
            DOT => "'.'",
            COLON => "':'",
            LARROW => "'<-'",
            BANG => "'!'",
            LPAREN => "'('",
            RPAREN => "')'",
            LBRACE => "'{'",
            RBRACE => "'}'",
            LBRACKET => "'['",
            RBRACKET => "']'",
            SEMICOLON => "';'",
            COMMA => "','",
            PIPE => "'|'",
        }
    }
}
