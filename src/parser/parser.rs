//! Recursive-descent parser producing the typed AST (§4.2).
//!
//! Built around a `Parser` cursor (`tokens`/`pos`/`error_recover`) but
//! without a `GreenNodeBuilder` — there is no CST here, only the typed
//! tree in [`super::ast`].

use super::ast::*;
use super::errors::ParseContext;
use super::lexer::{Token, extract_path_directives, tokenize_with_keywords};
use super::syntax_kind::SyntaxKind;
use crate::base::{LineIndex, Name, Position, Span, TextRange, TextSize};
use crate::error::CoreError;
use crate::value::{CollectionKind, Value};
use indexmap::IndexMap;
use tracing::debug;

/// The result of parsing a unit: the module, if one could be built, plus
/// every diagnostic collected along the way (parsing keeps going past an
/// error by recovering at context-appropriate tokens).
#[derive(Debug)]
pub struct Parse {
    pub module: Option<Module>,
    pub errors: Vec<CoreError>,
}

/// Parse a complete transformation unit (§4.2 top-level production) under
/// the default [`crate::config::VmConfig`] (`do`-blocks are discarded, not
/// rejected). Use [`parse_module_with_config`] to override that.
pub fn parse_module(source: &str) -> Parse {
    parse_module_with_config(source, &crate::config::VmConfig::default())
}

/// Parse a complete transformation unit, honouring
/// [`VmConfig::reject_do_bodies`]: when set, a called/lazy/matched rule's
/// `do { ... }` body is reported as [`CoreError::UnsupportedConstruct`]
/// instead of being silently brace-matched and discarded (§9).
#[tracing::instrument(level = "debug", skip_all, fields(len = source.len()))]
pub fn parse_module_with_config(source: &str, config: &crate::config::VmConfig) -> Parse {
    let tokens: Vec<Token<'_>> = tokenize_with_keywords(source)
        .into_iter()
        .filter(|t| !t.kind.is_trivia())
        .collect();
    let mut parser = Parser::new(&tokens, source, config.reject_do_bodies);
    let module = parser.parse_module_inner(source);
    Parse {
        module,
        errors: parser.errors,
    }
}

struct Parser<'a> {
    tokens: &'a [Token<'a>],
    pos: usize,
    line_index: LineIndex,
    errors: Vec<CoreError>,
    context_stack: Vec<ParseContext>,
    reject_do_bodies: bool,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token<'a>], source: &'a str, reject_do_bodies: bool) -> Self {
        Self {
            tokens,
            pos: 0,
            line_index: LineIndex::new(source),
            errors: Vec::new(),
            context_stack: vec![ParseContext::TopLevel],
            reject_do_bodies,
        }
    }

    // -- token inspection ----------------------------------------------

    fn current(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn current_kind(&self) -> SyntaxKind {
        self.current().map(|t| t.kind).unwrap_or(SyntaxKind::EOF)
    }

    fn current_text(&self) -> &'a str {
        self.current().map(|t| t.text).unwrap_or("")
    }

    fn at(&self, kind: SyntaxKind) -> bool {
        self.current_kind() == kind
    }

    fn at_any(&self, kinds: &[SyntaxKind]) -> bool {
        kinds.contains(&self.current_kind())
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn nth_kind(&self, n: usize) -> SyntaxKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| t.kind)
            .unwrap_or(SyntaxKind::EOF)
    }

    fn position_of(&self, offset: TextSize) -> Position {
        let lc = self.line_index.line_col(offset);
        Position::new(lc.line as usize, lc.col as usize)
    }

    fn current_range(&self) -> TextRange {
        match self.current() {
            Some(t) => TextRange::at(t.offset, TextSize::of(t.text)),
            None => TextRange::empty(TextSize::new(0)),
        }
    }

    fn span_from(&self, start: TextSize) -> Span {
        let end_offset = self
            .tokens
            .get(self.pos.saturating_sub(1))
            .map(|t| t.offset + TextSize::of(t.text))
            .unwrap_or(start);
        Span::new(self.position_of(start), self.position_of(end_offset))
    }

    fn start_offset(&self) -> TextSize {
        self.current()
            .map(|t| t.offset)
            .or_else(|| self.tokens.last().map(|t| t.offset + TextSize::of(t.text)))
            .unwrap_or(TextSize::new(0))
    }

    // -- token consumption -----------------------------------------------

    fn bump(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: SyntaxKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: SyntaxKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.error_unexpected(kind);
            false
        }
    }

    fn expect_ident(&mut self) -> Name {
        if self.at(SyntaxKind::IDENT) {
            let text = self.current_text();
            let name = Name::new(text);
            self.bump();
            name
        } else {
            self.error_unexpected(SyntaxKind::IDENT);
            Name::new("<error>")
        }
    }

    // -- error handling ---------------------------------------------------

    fn ctx(&self) -> ParseContext {
        *self.context_stack.last().unwrap_or(&ParseContext::TopLevel)
    }

    fn push_ctx(&mut self, ctx: ParseContext) {
        self.context_stack.push(ctx);
    }

    fn pop_ctx(&mut self) {
        self.context_stack.pop();
    }

    fn error_unexpected(&mut self, expected: SyntaxKind) {
        let range = self.current_range();
        let found = self
            .current()
            .map(|t| t.kind.describe())
            .unwrap_or("end of file");
        self.errors.push(CoreError::UnexpectedToken {
            message: format!(
                "expected {} {}, found {}",
                expected.describe(),
                self.ctx().description(),
                found
            ),
            range,
        });
    }

    fn error_invalid_syntax(&mut self, message: impl Into<String>) {
        let range = self.current_range();
        self.errors.push(CoreError::InvalidSyntax {
            message: message.into(),
            range,
        });
    }

    /// Skip tokens until one of the current context's recovery tokens (or
    /// EOF), always consuming at least one token to guarantee progress.
    fn recover(&mut self) {
        let recovery = self.ctx().recovery_tokens();
        let mut consumed = false;
        while !self.at_eof() && !self.at_any(recovery) {
            self.bump();
            consumed = true;
        }
        if !consumed && !self.at_eof() {
            self.bump();
        }
    }

    // -- top level ---------------------------------------------------------

    fn parse_module_inner(&mut self, source: &str) -> Option<Module> {
        if !self.eat(SyntaxKind::MODULE_KW) {
            self.errors.push(CoreError::MissingModule);
            return None;
        }
        let name = if self.at(SyntaxKind::IDENT) {
            let name = self.expect_ident();
            if !is_valid_module_name(name.as_str()) {
                self.errors
                    .push(CoreError::InvalidModuleName(name.as_str().to_string()));
            }
            name
        } else {
            self.error_unexpected(SyntaxKind::IDENT);
            Name::new("<error>")
        };

        let mut source_aliases = IndexMap::new();
        let mut target_aliases = IndexMap::new();

        if self.eat(SyntaxKind::CREATE_KW) {
            self.parse_create_stmt(&mut source_aliases, &mut target_aliases);
        } else {
            source_aliases.insert(Name::new("IN"), Name::new("DefaultSource"));
            target_aliases.insert(Name::new("OUT"), Name::new("DefaultTarget"));
        }

        let mut helpers = IndexMap::new();
        let mut matched_rules = Vec::new();
        let mut called_rules = IndexMap::new();

        self.push_ctx(ParseContext::ModuleBody);
        while !self.at_eof() {
            if self.eat(SyntaxKind::HELPER_KW) {
                if let Some(h) = self.parse_helper() {
                    if helpers.contains_key(&h.name) {
                        self.error_invalid_syntax(format!("duplicate helper name '{}'", h.name));
                    } else {
                        helpers.insert(h.name.clone(), h);
                    }
                }
            } else if self.at(SyntaxKind::QUERY_KW) {
                if let Some(h) = self.parse_query() {
                    helpers.insert(h.name.clone(), h);
                }
            } else if self.eat(SyntaxKind::LAZY_KW) {
                self.expect(SyntaxKind::RULE_KW);
                if let Some(r) = self.parse_called_rule(true) {
                    called_rules.insert(r.name.clone(), r);
                }
            } else if self.eat(SyntaxKind::RULE_KW) {
                if self.at(SyntaxKind::IDENT) && self.nth_kind(1) == SyntaxKind::LPAREN {
                    if let Some(r) = self.parse_called_rule(false) {
                        called_rules.insert(r.name.clone(), r);
                    }
                } else if let Some(r) = self.parse_matched_rule() {
                    matched_rules.push(r);
                }
            } else {
                self.error_invalid_syntax("expected a helper, query, or rule declaration");
                self.recover();
            }
        }
        self.pop_ctx();

        // Malformed `@path` (no `Name=path` split) is silently ignored (§4.1).
        let path_directives = extract_path_directives(source)
            .into_iter()
            .filter_map(|raw| raw.split_once('=').map(|(k, v)| (Name::new(k.trim()), v.trim().to_string())))
            .collect();

        Some(Module {
            name,
            source_aliases,
            target_aliases,
            helpers,
            matched_rules,
            called_rules,
            path_directives,
        })
    }

    fn parse_create_stmt(
        &mut self,
        source_aliases: &mut IndexMap<Name, Name>,
        target_aliases: &mut IndexMap<Name, Name>,
    ) {
        self.parse_alias_list(target_aliases);
        if self.eat(SyntaxKind::FROM_KW) {
            self.parse_alias_list(source_aliases);
        }
        self.expect(SyntaxKind::SEMICOLON);
    }

    fn parse_alias_list(&mut self, into: &mut IndexMap<Name, Name>) {
        loop {
            let alias = self.expect_ident();
            self.expect(SyntaxKind::COLON);
            let model = self.expect_ident();
            into.insert(alias, model);
            if !self.eat(SyntaxKind::COMMA) {
                break;
            }
        }
    }

    fn parse_helper(&mut self) -> Option<Helper> {
        let start = self.start_offset();
        self.push_ctx(ParseContext::Helper);
        let context_type = if self.eat(SyntaxKind::CONTEXT_KW) {
            Some(self.parse_type_expr())
        } else {
            None
        };
        self.expect(SyntaxKind::DEF_KW);
        self.expect(SyntaxKind::COLON);
        let name = self.expect_ident();
        let params = if self.eat(SyntaxKind::LPAREN) {
            let p = self.parse_param_list();
            self.expect(SyntaxKind::RPAREN);
            p
        } else {
            Vec::new()
        };
        self.expect(SyntaxKind::COLON);
        let return_type = self.parse_type_expr();
        self.expect(SyntaxKind::EQ);
        let body = self.parse_expr();
        self.expect(SyntaxKind::SEMICOLON);
        self.pop_ctx();
        Some(Helper {
            name,
            context_type,
            return_type,
            params,
            body,
            span: self.span_from(start),
        })
    }

    /// `query` is sugar for a context-free helper returning `OclAny` (§4.2).
    fn parse_query(&mut self) -> Option<Helper> {
        let start = self.start_offset();
        self.push_ctx(ParseContext::Helper);
        self.expect(SyntaxKind::QUERY_KW);
        let name = self.expect_ident();
        self.expect(SyntaxKind::EQ);
        let body = self.parse_expr();
        self.expect(SyntaxKind::SEMICOLON);
        self.pop_ctx();
        Some(Helper {
            name,
            context_type: None,
            return_type: TypeExpr::Named(Name::new("OclAny")),
            params: Vec::new(),
            body,
            span: self.span_from(start),
        })
    }

    fn parse_param_list(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        if self.at(SyntaxKind::RPAREN) {
            return params;
        }
        loop {
            let name = self.expect_ident();
            self.expect(SyntaxKind::COLON);
            let ty = self.parse_type_expr();
            params.push(Param { name, ty });
            if !self.eat(SyntaxKind::COMMA) {
                break;
            }
        }
        params
    }

    fn parse_matched_rule(&mut self) -> Option<MatchedRule> {
        let start = self.start_offset();
        self.push_ctx(ParseContext::MatchedRule);
        let name = self.expect_ident();
        self.expect(SyntaxKind::LBRACE);
        self.expect(SyntaxKind::FROM_KW);
        let source = self.parse_source_pattern();
        self.expect(SyntaxKind::TO_KW);
        let mut targets = vec![self.parse_target_pattern()];
        while self.eat(SyntaxKind::COMMA) {
            targets.push(self.parse_target_pattern());
        }
        if self.eat(SyntaxKind::DO_KW) {
            self.skip_brace_block();
        }
        self.expect(SyntaxKind::RBRACE);
        self.pop_ctx();
        Some(MatchedRule {
            name,
            source,
            targets,
            span: self.span_from(start),
        })
    }

    fn parse_called_rule(&mut self, is_lazy: bool) -> Option<CalledRule> {
        let start = self.start_offset();
        self.push_ctx(ParseContext::CalledRule);
        let name = self.expect_ident();
        let params = if is_lazy {
            self.expect(SyntaxKind::LBRACE);
            self.expect(SyntaxKind::FROM_KW);
            let param_name = self.expect_ident();
            self.expect(SyntaxKind::COLON);
            let ty = self.parse_type_expr();
            vec![Param { name: param_name, ty }]
        } else {
            self.expect(SyntaxKind::LPAREN);
            let p = self.parse_param_list();
            self.expect(SyntaxKind::RPAREN);
            self.expect(SyntaxKind::LBRACE);
            p
        };
        self.expect(SyntaxKind::TO_KW);
        let mut targets = vec![self.parse_target_pattern()];
        while self.eat(SyntaxKind::COMMA) {
            targets.push(self.parse_target_pattern());
        }
        if self.eat(SyntaxKind::DO_KW) {
            self.skip_brace_block();
        }
        self.expect(SyntaxKind::RBRACE);
        self.pop_ctx();
        Some(CalledRule {
            name,
            is_lazy,
            params,
            targets,
            span: self.span_from(start),
        })
    }

    fn parse_source_pattern(&mut self) -> SourcePattern {
        let var = self.expect_ident();
        self.expect(SyntaxKind::COLON);
        let ty = self.parse_type_expr();
        let guard = if self.eat(SyntaxKind::LPAREN) {
            let e = self.parse_expr();
            self.expect(SyntaxKind::RPAREN);
            Some(e)
        } else {
            None
        };
        SourcePattern { var, ty, guard }
    }

    fn parse_target_pattern(&mut self) -> TargetPattern {
        let var = self.expect_ident();
        self.expect(SyntaxKind::COLON);
        let ty = self.parse_type_expr();
        let mut bindings = Vec::new();
        if self.eat(SyntaxKind::LPAREN) {
            self.push_ctx(ParseContext::BindingList);
            if !self.at(SyntaxKind::RPAREN) {
                loop {
                    let property = self.expect_ident();
                    self.expect(SyntaxKind::LARROW);
                    let value = self.parse_expr();
                    bindings.push(PropertyBinding { property, value });
                    if !self.eat(SyntaxKind::COMMA) {
                        break;
                    }
                }
            }
            self.pop_ctx();
            self.expect(SyntaxKind::RPAREN);
        }
        TargetPattern { var, ty, bindings }
    }

    /// `do`-blocks are discarded after brace-matching (§4.2, §9), unless
    /// [`VmConfig::reject_do_bodies`] asks that their presence be reported
    /// instead.
    fn skip_brace_block(&mut self) {
        let start = self.start_offset();
        self.expect(SyntaxKind::LBRACE);
        let mut depth = 1;
        while depth > 0 && !self.at_eof() {
            if self.at(SyntaxKind::LBRACE) {
                depth += 1;
            } else if self.at(SyntaxKind::RBRACE) {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            self.bump();
        }
        self.expect(SyntaxKind::RBRACE);
        if self.reject_do_bodies {
            self.errors.push(CoreError::UnsupportedConstruct(
                "do-block statements are not executed".into(),
            ));
        } else {
            debug!(range = ?self.span_from(start), "discarding do-block body");
        }
    }

    // -- types --------------------------------------------------------------

    fn parse_type_expr(&mut self) -> TypeExpr {
        if self.at(SyntaxKind::IDENT) && self.current_text() == "TupleType" {
            self.bump();
            self.expect(SyntaxKind::LPAREN);
            let mut fields = Vec::new();
            if !self.at(SyntaxKind::RPAREN) {
                loop {
                    let name = self.expect_ident();
                    self.expect(SyntaxKind::COLON);
                    let ty = self.parse_type_expr();
                    fields.push((name, ty));
                    if !self.eat(SyntaxKind::COMMA) {
                        break;
                    }
                }
            }
            self.expect(SyntaxKind::RPAREN);
            return TypeExpr::Tuple(fields);
        }

        let first = self.expect_type_ident();

        if self.eat(SyntaxKind::BANG) {
            let class = self.expect_ident();
            return TypeExpr::Qualified(first, class);
        }
        if self.eat(SyntaxKind::LPAREN) {
            let inner = self.parse_type_expr();
            self.expect(SyntaxKind::RPAREN);
            return TypeExpr::Generic(first, Box::new(inner));
        }
        TypeExpr::Named(first)
    }

    /// Type names include the built-in primitive keywords (`Integer`,
    /// `String`, `Boolean`, `Real`), which the lexer tags as keywords.
    fn expect_type_ident(&mut self) -> Name {
        let text = self.current_text();
        let kind = self.current_kind();
        if kind == SyntaxKind::IDENT
            || kind == SyntaxKind::INTEGER_KW
            || kind == SyntaxKind::STRING_KW
            || kind == SyntaxKind::BOOLEAN_KW
            || kind == SyntaxKind::REAL_KW
        {
            let name = Name::new(text);
            self.bump();
            name
        } else {
            self.error_unexpected(SyntaxKind::IDENT);
            Name::new("<error>")
        }
    }

    // -- expressions ----------------------------------------------------

    fn parse_expr(&mut self) -> Expr {
        self.push_ctx(ParseContext::Expression);
        let e = self.parse_conditional();
        self.pop_ctx();
        e
    }

    fn parse_conditional(&mut self) -> Expr {
        if self.at(SyntaxKind::IF_KW) {
            let start = self.start_offset();
            self.bump();
            let cond = self.parse_conditional();
            self.expect(SyntaxKind::THEN_KW);
            let then_branch = self.parse_conditional();
            self.expect(SyntaxKind::ELSE_KW);
            let else_branch = if self.at(SyntaxKind::IF_KW) {
                // `else if` does not consume `endif`: the outer `if` owns it.
                self.parse_conditional_no_endif()
            } else {
                let e = self.parse_conditional();
                self.expect(SyntaxKind::ENDIF_KW);
                e
            };
            Expr::Conditional(
                Box::new(cond),
                Box::new(then_branch),
                Box::new(else_branch),
                self.span_from(start),
            )
        } else {
            self.parse_or()
        }
    }

    /// An `else if` chain: parses one more conditional without requiring
    /// (or consuming) its own `endif` — that belongs to the outermost `if`.
    fn parse_conditional_no_endif(&mut self) -> Expr {
        let start = self.start_offset();
        self.expect(SyntaxKind::IF_KW);
        let cond = self.parse_conditional();
        self.expect(SyntaxKind::THEN_KW);
        let then_branch = self.parse_conditional();
        self.expect(SyntaxKind::ELSE_KW);
        let else_branch = if self.at(SyntaxKind::IF_KW) {
            self.parse_conditional_no_endif()
        } else {
            self.parse_conditional()
        };
        Expr::Conditional(
            Box::new(cond),
            Box::new(then_branch),
            Box::new(else_branch),
            self.span_from(start),
        )
    }

    fn parse_or(&mut self) -> Expr {
        let start = self.start_offset();
        let mut lhs = self.parse_and();
        while self.eat(SyntaxKind::OR_KW) {
            let rhs = self.parse_and();
            lhs = Expr::BinaryOp(BinOp::Or, Box::new(lhs), Box::new(rhs), self.span_from(start));
        }
        lhs
    }

    fn parse_and(&mut self) -> Expr {
        let start = self.start_offset();
        let mut lhs = self.parse_equality();
        while self.eat(SyntaxKind::AND_KW) {
            let rhs = self.parse_equality();
            lhs = Expr::BinaryOp(BinOp::And, Box::new(lhs), Box::new(rhs), self.span_from(start));
        }
        lhs
    }

    fn parse_equality(&mut self) -> Expr {
        let start = self.start_offset();
        let mut lhs = self.parse_relational();
        loop {
            let op = if self.eat(SyntaxKind::EQ) {
                BinOp::Eq
            } else if self.eat(SyntaxKind::NEQ) {
                BinOp::Neq
            } else {
                break;
            };
            let rhs = self.parse_relational();
            lhs = Expr::BinaryOp(op, Box::new(lhs), Box::new(rhs), self.span_from(start));
        }
        lhs
    }

    fn parse_relational(&mut self) -> Expr {
        let start = self.start_offset();
        let mut lhs = self.parse_additive();
        loop {
            let op = if self.eat(SyntaxKind::LT) {
                BinOp::Lt
            } else if self.eat(SyntaxKind::LE) {
                BinOp::Le
            } else if self.eat(SyntaxKind::GT) {
                BinOp::Gt
            } else if self.eat(SyntaxKind::GE) {
                BinOp::Ge
            } else {
                break;
            };
            let rhs = self.parse_additive();
            lhs = Expr::BinaryOp(op, Box::new(lhs), Box::new(rhs), self.span_from(start));
        }
        lhs
    }

    fn parse_additive(&mut self) -> Expr {
        let start = self.start_offset();
        let mut lhs = self.parse_multiplicative();
        loop {
            let op = if self.eat(SyntaxKind::PLUS) {
                BinOp::Add
            } else if self.eat(SyntaxKind::MINUS) {
                BinOp::Sub
            } else {
                break;
            };
            let rhs = self.parse_multiplicative();
            lhs = Expr::BinaryOp(op, Box::new(lhs), Box::new(rhs), self.span_from(start));
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let start = self.start_offset();
        let mut lhs = self.parse_unary();
        loop {
            let op = if self.eat(SyntaxKind::STAR) {
                BinOp::Mul
            } else if self.eat(SyntaxKind::SLASH) {
                BinOp::Div
            } else {
                break;
            };
            let rhs = self.parse_unary();
            lhs = Expr::BinaryOp(op, Box::new(lhs), Box::new(rhs), self.span_from(start));
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        let start = self.start_offset();
        if self.eat(SyntaxKind::NOT_KW) {
            let operand = self.parse_unary();
            Expr::UnaryOp(UnOp::Not, Box::new(operand), self.span_from(start))
        } else if self.eat(SyntaxKind::MINUS) {
            let operand = self.parse_unary();
            Expr::UnaryOp(UnOp::Neg, Box::new(operand), self.span_from(start))
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> Expr {
        let start = self.start_offset();
        let mut expr = self.parse_primary();
        loop {
            if self.eat(SyntaxKind::DOT) {
                let name = self.expect_ident();
                if self.at(SyntaxKind::LPAREN) {
                    let args = self.parse_arg_list();
                    expr = Expr::MethodCall(Box::new(expr), name, args, self.span_from(start));
                } else {
                    expr = Expr::Navigation(Box::new(expr), name, self.span_from(start));
                }
            } else if self.eat(SyntaxKind::ARROW) {
                let name = self.expect_ident();
                if name.as_str() == "iterate" {
                    expr = self.parse_iterate(expr, start);
                } else {
                    self.expect(SyntaxKind::LPAREN);
                    self.push_ctx(ParseContext::ArgumentList);
                    let (iter, args) = self.parse_collection_op_args();
                    self.pop_ctx();
                    self.expect(SyntaxKind::RPAREN);
                    expr = Expr::CollectionOp {
                        source: Box::new(expr),
                        op: name,
                        iter,
                        args,
                        span: self.span_from(start),
                    };
                }
            } else {
                break;
            }
        }
        expr
    }

    fn parse_iterate(&mut self, source: Expr, start: TextSize) -> Expr {
        self.expect(SyntaxKind::LPAREN);
        let param = self.expect_ident();
        self.expect(SyntaxKind::SEMICOLON);
        let acc = self.expect_ident();
        let acc_type = if self.eat(SyntaxKind::COLON) {
            Some(self.parse_type_expr())
        } else {
            None
        };
        self.expect(SyntaxKind::EQ);
        let init = self.parse_expr();
        self.expect(SyntaxKind::PIPE);
        let body = self.parse_expr();
        self.expect(SyntaxKind::RPAREN);
        Expr::Iterate {
            source: Box::new(source),
            param,
            acc,
            acc_type,
            init: Box::new(init),
            body: Box::new(body),
            span: self.span_from(start),
        }
    }

    /// A collection-operation's argument list is either one lambda
    /// (`ident | expr`, recognised by a single-token lookahead for `|`
    /// after the identifier) or an ordinary comma-separated argument list.
    fn parse_collection_op_args(&mut self) -> (Option<Lambda>, Vec<Expr>) {
        if self.at(SyntaxKind::IDENT) && self.nth_kind(1) == SyntaxKind::PIPE {
            let param = self.expect_ident();
            self.expect(SyntaxKind::PIPE);
            let body = self.parse_expr();
            return (
                Some(Lambda {
                    param,
                    body: Box::new(body),
                }),
                Vec::new(),
            );
        }
        if self.at(SyntaxKind::RPAREN) {
            return (None, Vec::new());
        }
        let mut args = vec![self.parse_expr()];
        while self.eat(SyntaxKind::COMMA) {
            args.push(self.parse_expr());
        }
        (None, args)
    }

    /// A call's argument list (§4.2: "Method argument lists recognise the
    /// lambda form `ident | expr` in argument position by single-token
    /// lookahead; otherwise arguments are ordinary expressions"). Used for
    /// both `HelperCall` and `MethodCall` postfix forms.
    fn parse_arg_list(&mut self) -> Vec<Expr> {
        self.expect(SyntaxKind::LPAREN);
        self.push_ctx(ParseContext::ArgumentList);
        let mut args = Vec::new();
        if !self.at(SyntaxKind::RPAREN) {
            args.push(self.parse_arg());
            while self.eat(SyntaxKind::COMMA) {
                args.push(self.parse_arg());
            }
        }
        self.pop_ctx();
        self.expect(SyntaxKind::RPAREN);
        args
    }

    fn parse_arg(&mut self) -> Expr {
        let start = self.start_offset();
        if self.at(SyntaxKind::IDENT) && self.nth_kind(1) == SyntaxKind::PIPE {
            let param = self.expect_ident();
            self.expect(SyntaxKind::PIPE);
            let body = self.parse_expr();
            return Expr::Lambda(
                Lambda {
                    param,
                    body: Box::new(body),
                },
                self.span_from(start),
            );
        }
        self.parse_expr()
    }

    fn parse_primary(&mut self) -> Expr {
        let start = self.start_offset();
        match self.current_kind() {
            SyntaxKind::INT => {
                let text = self.current_text();
                let value = text.parse::<i64>().unwrap_or(0);
                self.bump();
                Expr::Literal(Value::Int(value), self.span_from(start))
            }
            SyntaxKind::STRING => {
                let text = self.current_text();
                let inner = text.get(1..text.len().saturating_sub(1)).unwrap_or("");
                self.bump();
                Expr::Literal(Value::String(inner.to_string()), self.span_from(start))
            }
            SyntaxKind::TRUE_KW => {
                self.bump();
                Expr::Literal(Value::Bool(true), self.span_from(start))
            }
            SyntaxKind::FALSE_KW => {
                self.bump();
                Expr::Literal(Value::Bool(false), self.span_from(start))
            }
            SyntaxKind::SELF_KW => {
                self.bump();
                Expr::Variable(Name::new("self"), self.span_from(start))
            }
            SyntaxKind::LPAREN => {
                self.bump();
                let inner = self.parse_expr();
                self.expect(SyntaxKind::RPAREN);
                inner
            }
            SyntaxKind::LET_KW => self.parse_let(),
            SyntaxKind::IDENT if self.current_text() == "Tuple" => self.parse_tuple_literal(),
            SyntaxKind::IDENT
                if matches!(self.current_text(), "Sequence" | "Set" | "Bag" | "OrderedSet") =>
            {
                self.parse_collection_literal()
            }
            SyntaxKind::IDENT => {
                let name = self.expect_ident();
                if self.at(SyntaxKind::LPAREN) {
                    let args = self.parse_arg_list();
                    Expr::HelperCall(name, args, self.span_from(start))
                } else if self.eat(SyntaxKind::BANG) {
                    let class = self.expect_ident();
                    Expr::TypeLiteral(TypeExpr::Qualified(name, class), self.span_from(start))
                } else {
                    Expr::Variable(name, self.span_from(start))
                }
            }
            _ => {
                self.error_unexpected(SyntaxKind::IDENT);
                self.recover();
                Expr::Literal(Value::Null, self.span_from(start))
            }
        }
    }

    fn parse_let(&mut self) -> Expr {
        let start = self.start_offset();
        self.push_ctx(ParseContext::LetBinding);
        self.expect(SyntaxKind::LET_KW);
        let name = self.expect_ident();
        let ty = if self.eat(SyntaxKind::COLON) {
            Some(self.parse_type_expr())
        } else {
            None
        };
        self.expect(SyntaxKind::EQ);
        let init = self.parse_expr();
        self.expect(SyntaxKind::IN_KW);
        self.pop_ctx();
        let body = self.parse_expr();
        Expr::Let(name, ty, Box::new(init), Box::new(body), self.span_from(start))
    }

    fn parse_tuple_literal(&mut self) -> Expr {
        let start = self.start_offset();
        self.bump();
        self.expect(SyntaxKind::LBRACE);
        let mut fields = Vec::new();
        if !self.at(SyntaxKind::RBRACE) {
            loop {
                let name = self.expect_ident();
                let ty = if self.eat(SyntaxKind::COLON) {
                    Some(self.parse_type_expr())
                } else {
                    None
                };
                self.expect(SyntaxKind::EQ);
                let value = self.parse_expr();
                fields.push((name, ty, value));
                if !self.eat(SyntaxKind::COMMA) {
                    break;
                }
            }
        }
        self.expect(SyntaxKind::RBRACE);
        Expr::Tuple(fields, self.span_from(start))
    }

    fn parse_collection_literal(&mut self) -> Expr {
        let start = self.start_offset();
        let kind = match self.current_text() {
            "Sequence" => CollKind::Sequence,
            "Set" => CollKind::Set,
            "Bag" => CollKind::Bag,
            "OrderedSet" => CollKind::OrderedSet,
            _ => unreachable!(),
        };
        self.bump();
        self.expect(SyntaxKind::LBRACE);
        let mut elems = Vec::new();
        if !self.at(SyntaxKind::RBRACE) {
            elems.push(self.parse_expr());
            while self.eat(SyntaxKind::COMMA) {
                elems.push(self.parse_expr());
            }
        }
        self.expect(SyntaxKind::RBRACE);
        Expr::CollectionLiteral(kind, elems, self.span_from(start))
    }
}

fn is_valid_module_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Map the collection's static kind to [`CollectionKind`] for the evaluator.
impl From<CollKind> for CollectionKind {
    fn from(kind: CollKind) -> Self {
        match kind {
            CollKind::Sequence => CollectionKind::Sequence,
            CollKind::Set => CollectionKind::Set,
            CollKind::Bag => CollectionKind::Bag,
            CollKind::OrderedSet => CollectionKind::OrderedSet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_module(src: &str) -> Module {
        let parse = parse_module(src);
        assert!(parse.errors.is_empty(), "unexpected errors: {:?}", parse.errors);
        parse.module.expect("module should parse")
    }

    #[test]
    fn minimal_module_gets_default_aliases() {
        let m = ok_module("module M;");
        assert_eq!(m.name.as_str(), "M");
        assert_eq!(m.source_aliases.get(&Name::new("IN")).unwrap().as_str(), "DefaultSource");
        assert_eq!(m.target_aliases.get(&Name::new("OUT")).unwrap().as_str(), "DefaultTarget");
    }

    #[test]
    fn create_statement_populates_aliases() {
        let m = ok_module("module M create OUT : Target from IN : Source;");
        assert_eq!(m.target_aliases.get(&Name::new("OUT")).unwrap().as_str(), "Target");
        assert_eq!(m.source_aliases.get(&Name::new("IN")).unwrap().as_str(), "Source");
    }

    #[test]
    fn helper_without_context_parses() {
        let m = ok_module("module M; helper def : double(x : Integer) : Integer = x * 2;");
        let h = m.helpers.get(&Name::new("double")).unwrap();
        assert_eq!(h.params.len(), 1);
        assert!(h.context_type.is_none());
    }

    #[test]
    fn query_is_a_parameterless_context_free_helper() {
        let m = ok_module("module M; query answer = 42;");
        let h = m.helpers.get(&Name::new("answer")).unwrap();
        assert!(h.params.is_empty());
        assert!(h.context_type.is_none());
    }

    #[test]
    fn matched_rule_with_guard_and_bindings() {
        let m = ok_module(
            "module M;\nrule Member2Person {\n  from s : IN!Member (s.isMale)\n  to t : OUT!Person (fullName <- s.firstName)\n}\n",
        );
        assert_eq!(m.matched_rules.len(), 1);
        let r = &m.matched_rules[0];
        assert!(r.source.guard.is_some());
        assert_eq!(r.targets[0].bindings.len(), 1);
    }

    #[test]
    fn called_rule_with_explicit_params() {
        let m = ok_module(
            "module M;\nrule makeOne(x : Integer) {\n  to t : OUT!Thing (val <- x)\n}\n",
        );
        let r = m.called_rules.get(&Name::new("makeOne")).unwrap();
        assert!(!r.is_lazy);
        assert_eq!(r.params.len(), 1);
    }

    #[test]
    fn lazy_rule_has_exactly_one_parameter() {
        let m = ok_module(
            "module M;\nlazy rule convert {\n  from x : IN!Member\n  to t : OUT!Person (fullName <- x.firstName)\n}\n",
        );
        let r = m.called_rules.get(&Name::new("convert")).unwrap();
        assert!(r.is_lazy);
        assert_eq!(r.params.len(), 1);
    }

    #[test]
    fn if_then_else_if_chain_shares_one_endif() {
        let m = ok_module("module M; helper def : h : Integer = if true then 1 else if false then 2 else 3 endif;");
        let h = m.helpers.get(&Name::new("h")).unwrap();
        assert_eq!(h.body.to_string(), "(if true then 1 else (if false then 2 else 3 endif) endif)");
    }

    #[test]
    fn method_call_and_navigation_chain() {
        let m = ok_module("module M; helper def : h : Integer = self.items.size();");
        let h = m.helpers.get(&Name::new("h")).unwrap();
        assert_eq!(h.body.to_string(), "((self.items).size())");
    }

    #[test]
    fn collection_op_with_lambda() {
        let m = ok_module("module M; helper def : h : Sequence(Integer) = self.items->select(x | x > 0);");
        let h = m.helpers.get(&Name::new("h")).unwrap();
        match &h.body {
            Expr::CollectionOp { op, iter, .. } => {
                assert_eq!(op.as_str(), "select");
                assert!(iter.is_some());
            }
            other => panic!("expected CollectionOp, got {other:?}"),
        }
    }

    #[test]
    fn invalid_module_name_is_reported() {
        let parse = parse_module("module 2Bad;");
        assert!(!parse.errors.is_empty());
    }

    #[test]
    fn do_block_is_discarded_but_balanced() {
        let m = ok_module(
            "module M;\nrule R {\n  from s : IN!A\n  to t : OUT!B ()\n  do { s.foo(); { nested } }\n}\n",
        );
        assert_eq!(m.matched_rules.len(), 1);
    }

    #[test]
    fn reject_do_bodies_reports_an_unsupported_construct_error() {
        let source =
            "module M;\nrule R {\n  from s : IN!A\n  to t : OUT!B ()\n  do { s.foo(); }\n}\n";
        let config = crate::config::VmConfig { reject_do_bodies: true, ..Default::default() };
        let parse = parse_module_with_config(source, &config);
        assert!(parse.module.is_some());
        assert!(parse
            .errors
            .iter()
            .any(|e| matches!(e, crate::error::CoreError::UnsupportedConstruct(_))));
    }

    #[test]
    fn path_directive_with_name_is_parsed_into_the_module() {
        let src = "-- @path Families=lib/Families.ecore\nmodule M;\n";
        let m = ok_module(src);
        assert_eq!(
            m.path_directives.get(&Name::new("Families")).unwrap(),
            "lib/Families.ecore"
        );
    }
}
