//! Parse context tracking for context-aware error messages (§4.1, §4.4).
//!
//! The parser maintains a stack of these to generate more helpful error
//! messages and to pick an appropriate set of recovery tokens when a
//! production fails partway through.

use crate::parser::SyntaxKind;

/// The current parsing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseContext {
    /// At the top of a unit, before the `module` declaration is consumed.
    TopLevel,
    /// Inside the module's top-level body (helpers and rules).
    ModuleBody,
    /// Parsing a helper declaration.
    Helper,
    /// Parsing a matched rule's `from`/`to`/`do` sections.
    MatchedRule,
    /// Parsing a called or lazy rule's parameter list and body.
    CalledRule,
    /// Parsing a binding list (`name <- expr`) inside a `to` block.
    BindingList,
    /// Parsing an expression.
    Expression,
    /// Parsing an argument list to a call or operation.
    ArgumentList,
    /// Parsing a `let`-binding.
    LetBinding,
    /// Parsing an iterator expression's variable list (`x, y | ...`).
    IteratorVars,
}

impl ParseContext {
    pub fn description(&self) -> &'static str {
        match self {
            Self::TopLevel => "at top level",
            Self::ModuleBody => "in module body",
            Self::Helper => "in helper declaration",
            Self::MatchedRule => "in matched rule",
            Self::CalledRule => "in called rule",
            Self::BindingList => "in binding list",
            Self::Expression => "in expression",
            Self::ArgumentList => "in argument list",
            Self::LetBinding => "in let binding",
            Self::IteratorVars => "in iterator variable list",
        }
    }

    pub fn expected_description(&self) -> &'static str {
        match self {
            Self::TopLevel => "a 'module' declaration",
            Self::ModuleBody => "a helper or rule declaration",
            Self::Helper => "a helper signature and body",
            Self::MatchedRule => "'from', 'to', or 'do'",
            Self::CalledRule => "a parameter list and rule body",
            Self::BindingList => "a binding name followed by '<-'",
            Self::Expression => "an expression (literal, identifier, or operator)",
            Self::ArgumentList => "an argument expression",
            Self::LetBinding => "an identifier followed by ':' and a type",
            Self::IteratorVars => "an iterator variable name",
        }
    }

    /// Tokens this context recovers at: on a parse error, the cursor skips
    /// forward until one of these is seen (or EOF), so one bad rule doesn't
    /// poison the rest of the module.
    pub fn recovery_tokens(&self) -> &'static [SyntaxKind] {
        match self {
            Self::TopLevel => &[SyntaxKind::MODULE_KW],
            Self::ModuleBody => &[
                SyntaxKind::HELPER_KW,
                SyntaxKind::RULE_KW,
                SyntaxKind::LAZY_KW,
            ],
            Self::Helper => &[
                SyntaxKind::HELPER_KW,
                SyntaxKind::RULE_KW,
                SyntaxKind::LAZY_KW,
                SyntaxKind::SEMICOLON,
            ],
            Self::MatchedRule | Self::CalledRule => &[
                SyntaxKind::HELPER_KW,
                SyntaxKind::RULE_KW,
                SyntaxKind::LAZY_KW,
                SyntaxKind::RBRACE,
            ],
            Self::BindingList => &[SyntaxKind::RBRACE, SyntaxKind::COMMA],
            Self::Expression | Self::ArgumentList => &[
                SyntaxKind::SEMICOLON,
                SyntaxKind::RPAREN,
                SyntaxKind::RBRACE,
                SyntaxKind::RBRACKET,
                SyntaxKind::COMMA,
            ],
            Self::LetBinding => &[SyntaxKind::IN_KW, SyntaxKind::SEMICOLON],
            Self::IteratorVars => &[SyntaxKind::PIPE, SyntaxKind::RPAREN],
        }
    }
}

impl Default for ParseContext {
    fn default() -> Self {
        Self::TopLevel
    }
}
