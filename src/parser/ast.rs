//! The typed syntax tree (§3, §4.2): owned data, not a lossless CST.
//!
//! Unlike a rowan-backed `SyntaxNode` wrapper layer, nodes here are plain
//! owned structs/enums built directly by the parser. There is no green
//! tree and no `cast`/`syntax()` accessor pattern — the tree produced *is*
//! the AST.

use crate::base::{Name, Span};
use indexmap::IndexMap;
use std::fmt;

/// A parsed, immutable transformation unit (§3 `Module`).
#[derive(Debug, Clone)]
pub struct Module {
    pub name: Name,
    /// Declaration order preserved; `source_aliases`/`target_aliases` are
    /// disjoint only within their own side (§3 invariant).
    pub source_aliases: IndexMap<Name, Name>,
    pub target_aliases: IndexMap<Name, Name>,
    pub helpers: IndexMap<Name, Helper>,
    pub matched_rules: Vec<MatchedRule>,
    pub called_rules: IndexMap<Name, CalledRule>,
    /// `@path` directives collected from comments (§4.1/§4.3), in source order.
    pub path_directives: IndexMap<Name, String>,
}

/// A named, optionally context-bound expression-valued function (§3 `Helper`).
#[derive(Debug, Clone)]
pub struct Helper {
    pub name: Name,
    pub context_type: Option<TypeExpr>,
    pub return_type: TypeExpr,
    pub params: Vec<Param>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Name,
    pub ty: TypeExpr,
}

/// A declarative matched rule (§3 `MatchedRule`).
#[derive(Debug, Clone)]
pub struct MatchedRule {
    pub name: Name,
    pub source: SourcePattern,
    pub targets: Vec<TargetPattern>,
    pub span: Span,
}

/// An explicitly invoked called or lazy rule (§3 `CalledRule`).
///
/// Lazy rules are represented with exactly one parameter (§4.2); `is_lazy`
/// distinguishes them for the engine's binding-queue bookkeeping.
#[derive(Debug, Clone)]
pub struct CalledRule {
    pub name: Name,
    pub is_lazy: bool,
    pub params: Vec<Param>,
    pub targets: Vec<TargetPattern>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SourcePattern {
    pub var: Name,
    pub ty: TypeExpr,
    pub guard: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct TargetPattern {
    pub var: Name,
    pub ty: TypeExpr,
    pub bindings: Vec<PropertyBinding>,
}

#[derive(Debug, Clone)]
pub struct PropertyBinding {
    pub property: Name,
    pub value: Expr,
}

/// A type expression per the §4.2 wire form: bare name, metamodel-qualified
/// `Alias!Class`, a generic collection `Kind(Inner)`, or a tuple type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Named(Name),
    Qualified(Name, Name),
    Generic(Name, Box<TypeExpr>),
    Tuple(Vec<(Name, TypeExpr)>),
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named(n) => write!(f, "{n}"),
            TypeExpr::Qualified(alias, name) => write!(f, "{alias}!{name}"),
            TypeExpr::Generic(kind, inner) => write!(f, "{kind}({inner})"),
            TypeExpr::Tuple(fields) => {
                write!(f, "TupleType(")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name} : {ty}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn spelling(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "=",
            BinOp::Neq => "<>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

impl UnOp {
    pub fn spelling(self) -> &'static str {
        match self {
            UnOp::Not => "not",
            UnOp::Neg => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollKind {
    Sequence,
    Set,
    Bag,
    OrderedSet,
}

impl fmt::Display for CollKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CollKind::Sequence => "Sequence",
            CollKind::Set => "Set",
            CollKind::Bag => "Bag",
            CollKind::OrderedSet => "OrderedSet",
        };
        write!(f, "{s}")
    }
}

/// A single-parameter lambda body, e.g. the `λ` in `select(x | x > 0)`.
#[derive(Debug, Clone)]
pub struct Lambda {
    pub param: Name,
    pub body: Box<Expr>,
}

/// The expression tree (§3 "Expression tree").
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(crate::value::Value, Span),
    Variable(Name, Span),
    TypeLiteral(TypeExpr, Span),
    Navigation(Box<Expr>, Name, Span),
    BinaryOp(BinOp, Box<Expr>, Box<Expr>, Span),
    UnaryOp(UnOp, Box<Expr>, Span),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>, Span),
    Let(Name, Option<TypeExpr>, Box<Expr>, Box<Expr>, Span),
    Tuple(Vec<(Name, Option<TypeExpr>, Expr)>, Span),
    HelperCall(Name, Vec<Expr>, Span),
    MethodCall(Box<Expr>, Name, Vec<Expr>, Span),
    Lambda(Lambda, Span),
    Iterate {
        source: Box<Expr>,
        param: Name,
        acc: Name,
        acc_type: Option<TypeExpr>,
        init: Box<Expr>,
        body: Box<Expr>,
        span: Span,
    },
    CollectionLiteral(CollKind, Vec<Expr>, Span),
    CollectionOp {
        source: Box<Expr>,
        op: Name,
        iter: Option<Lambda>,
        args: Vec<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, s)
            | Expr::Variable(_, s)
            | Expr::TypeLiteral(_, s)
            | Expr::Navigation(_, _, s)
            | Expr::BinaryOp(_, _, _, s)
            | Expr::UnaryOp(_, _, s)
            | Expr::Conditional(_, _, _, s)
            | Expr::Let(_, _, _, _, s)
            | Expr::Tuple(_, s)
            | Expr::HelperCall(_, _, s)
            | Expr::MethodCall(_, _, _, s)
            | Expr::Lambda(_, s)
            | Expr::CollectionLiteral(_, _, s)
            | Expr::CollectionOp { span: s, .. }
            | Expr::Iterate { span: s, .. } => *s,
        }
    }
}

/// Canonical re-emission (§4.2a): parenthesised, fully-qualified spelling,
/// sufficient that re-parsing the output yields a structurally equal tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v, _) => write!(f, "{v}"),
            Expr::Variable(name, _) => write!(f, "{name}"),
            Expr::TypeLiteral(ty, _) => write!(f, "{ty}"),
            Expr::Navigation(src, prop, _) => write!(f, "({src}.{prop})"),
            Expr::BinaryOp(op, l, r, _) => write!(f, "({l} {} {r})", op.spelling()),
            Expr::UnaryOp(op, operand, _) => match op {
                UnOp::Not => write!(f, "(not {operand})"),
                UnOp::Neg => write!(f, "(-{operand})"),
            },
            Expr::Conditional(c, t, e, _) => write!(f, "(if {c} then {t} else {e} endif)"),
            Expr::Let(name, ty, init, body, _) => {
                write!(f, "(let {name}")?;
                if let Some(ty) = ty {
                    write!(f, " : {ty}")?;
                }
                write!(f, " = {init} in {body})")
            }
            Expr::Tuple(fields, _) => {
                write!(f, "Tuple{{")?;
                for (i, (name, ty, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}")?;
                    if let Some(ty) = ty {
                        write!(f, " : {ty}")?;
                    }
                    write!(f, " = {value}")?;
                }
                write!(f, "}}")
            }
            Expr::HelperCall(name, args, _) => write_call(f, name.as_str(), args),
            Expr::MethodCall(recv, name, args, _) => {
                write!(f, "({recv}.{name}")?;
                if !args.is_empty() {
                    write!(f, "(")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{a}")?;
                    }
                    write!(f, ")")?;
                }
                write!(f, ")")
            }
            Expr::Lambda(l, _) => write!(f, "{} | {}", l.param, l.body),
            Expr::Iterate {
                source,
                param,
                acc,
                acc_type,
                init,
                body,
                ..
            } => {
                write!(f, "({source}->iterate({param}; {acc}")?;
                if let Some(ty) = acc_type {
                    write!(f, " : {ty}")?;
                }
                write!(f, " = {init} | {body}))")
            }
            Expr::CollectionLiteral(kind, elems, _) => {
                write!(f, "{kind}{{")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "}}")
            }
            Expr::CollectionOp {
                source,
                op,
                iter,
                args,
                ..
            } => {
                write!(f, "({source}->{op}(")?;
                if let Some(l) = iter {
                    write!(f, "{} | {}", l.param, l.body)?;
                } else {
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{a}")?;
                    }
                }
                write!(f, "))")
            }
        }
    }
}

fn write_call(f: &mut fmt::Formatter<'_>, name: &str, args: &[Expr]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{a}")?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Position;
    use crate::value::Value;

    fn span() -> Span {
        Span::new(Position::new(0, 0), Position::new(0, 1))
    }

    #[test]
    fn binary_op_renders_fully_parenthesised() {
        let e = Expr::BinaryOp(
            BinOp::Add,
            Box::new(Expr::Literal(Value::Int(1), span())),
            Box::new(Expr::Literal(Value::Int(2), span())),
            span(),
        );
        assert_eq!(e.to_string(), "(1 + 2)");
    }

    #[test]
    fn conditional_round_trips_textually() {
        let e = Expr::Conditional(
            Box::new(Expr::Variable(Name::new("x"), span())),
            Box::new(Expr::Literal(Value::Int(1), span())),
            Box::new(Expr::Literal(Value::Int(0), span())),
            span(),
        );
        assert_eq!(e.to_string(), "(if x then 1 else 0 endif)");
    }
}
