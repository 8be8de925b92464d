//! Tree-walking expression evaluator (§3 `Evaluator`, §4.5).
//!
//! Grounded on `src/hir/resolve.rs`'s visitor shape (one method per node
//! kind, each returning a `Result`), adapted from resolving references in
//! a HIR to evaluating an OCL-subset expression tree against an
//! [`ExecutionContext`].

mod ops;

use crate::base::Name;
use crate::context::ExecutionContext;
use crate::error::{CoreError, CoreResult};
use crate::metamodel::Metamodel;
use crate::parser::ast::{BinOp, Expr, Lambda, TypeExpr, UnOp};
use crate::value::Value;
use indexmap::IndexMap;

/// Evaluates expressions against a borrowed [`ExecutionContext`]. Built
/// fresh (cheaply — it's a single borrow) for every expression evaluated
/// by the rule engine, the way `src/hir/resolve.rs`'s resolver is
/// re-entered per reference rather than kept alive across a whole pass.
pub struct Evaluator<'a, M: Metamodel> {
    pub ctx: &'a mut ExecutionContext<M>,
}

impl<'a, M: Metamodel> Evaluator<'a, M> {
    pub fn new(ctx: &'a mut ExecutionContext<M>) -> Self {
        Self { ctx }
    }

    pub fn eval(&mut self, expr: &Expr) -> CoreResult<Value> {
        match expr {
            Expr::Literal(v, _) => Ok(v.clone()),
            Expr::Variable(name, _) => self.ctx.get_var(name),
            Expr::TypeLiteral(ty, _) => Ok(Value::Type(ty.to_string())),
            Expr::Navigation(src, prop, _) => self.eval_navigation(src, prop),
            Expr::BinaryOp(op, lhs, rhs, _) => self.eval_binary(*op, lhs, rhs),
            Expr::UnaryOp(op, operand, _) => self.eval_unary(*op, operand),
            Expr::Conditional(cond, then_branch, else_branch, _) => {
                let c = self.eval(cond)?;
                if matches!(c, Value::Bool(true)) {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            Expr::Let(name, _ty, init, body, _) => {
                let v = self.eval(init)?;
                self.ctx.push_scope();
                self.ctx.set_var(name.clone(), v);
                let result = self.eval(body);
                self.ctx.pop_scope();
                result
            }
            Expr::Tuple(fields, _) => {
                let mut map = IndexMap::new();
                for (name, _ty, value_expr) in fields {
                    let v = self.eval(value_expr)?;
                    map.insert(name.clone(), v);
                }
                Ok(Value::Tuple(map))
            }
            Expr::HelperCall(name, args, _) => self.eval_helper_call(name, args),
            Expr::MethodCall(recv, name, args, _) => self.eval_method_call(recv, name, args),
            Expr::Lambda(_, _) => Err(CoreError::InvalidExpression(
                "a lambda is only meaningful as an argument to a collection operation".into(),
            )),
            Expr::Iterate {
                source,
                param,
                acc,
                init,
                body,
                ..
            } => self.eval_iterate(source, param, acc, init, body),
            Expr::CollectionLiteral(kind, elems, _) => {
                let mut values = Vec::with_capacity(elems.len());
                for e in elems {
                    values.push(self.eval(e)?);
                }
                Ok(Value::collection((*kind).into(), values))
            }
            Expr::CollectionOp {
                source,
                op,
                iter,
                args,
                ..
            } => {
                let recv = self.eval(source)?;
                self.dispatch_op(op.as_str(), recv, iter.as_ref(), args)
            }
        }
    }

    fn eval_navigation(&mut self, src: &Expr, prop: &Name) -> CoreResult<Value> {
        let v = self.eval(src)?;
        if v.is_null() {
            return Ok(Value::Null);
        }
        self.ctx.record_navigation();
        match &v {
            Value::ObjectRef(obj) => match self.ctx.metamodel().read_feature(*obj, prop.as_str()) {
                Ok(val) => Ok(val),
                Err(crate::error::MetamodelError::UnknownFeature(..)) => {
                    if let Some(helper) = self.find_context_helper(prop, &v) {
                        self.invoke_helper_with_self(&helper, v, &[])
                    } else {
                        Err(CoreError::Navigation(prop.clone()))
                    }
                }
                Err(e) => Err(CoreError::Metamodel(e)),
            },
            Value::Tuple(fields) => fields
                .get(prop)
                .cloned()
                .ok_or_else(|| CoreError::Navigation(prop.clone())),
            _ => Err(CoreError::Navigation(prop.clone())),
        }
    }

    fn eval_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> CoreResult<Value> {
        let l = self.eval(lhs)?;
        let r = self.eval(rhs)?;
        match op {
            BinOp::Add => match (&l, &r) {
                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                _ => numeric_binop(&l, &r, |a, b| a + b, "+"),
            },
            BinOp::Sub => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
                _ => numeric_binop(&l, &r, |a, b| a - b, "-"),
            },
            BinOp::Mul => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
                _ => numeric_binop(&l, &r, |a, b| a * b, "*"),
            },
            BinOp::Div => match (&l, &r) {
                (Value::Int(_) | Value::Real(_), Value::Int(_) | Value::Real(_)) => {
                    let rv = r.as_f64().unwrap();
                    if rv == 0.0 {
                        Err(CoreError::DivisionByZero)
                    } else {
                        numeric_binop(&l, &r, |a, b| a / b, "/")
                    }
                }
                _ => Err(CoreError::TypeError(format!(
                    "'/' requires two numbers, got {} and {}",
                    l.type_name(),
                    r.type_name()
                ))),
            },
            BinOp::Eq => Ok(Value::Bool(crate::value::values_equal(&l, &r))),
            BinOp::Neq => Ok(Value::Bool(!crate::value::values_equal(&l, &r))),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(op, &l, &r),
            BinOp::And => match (l.as_bool(), r.as_bool()) {
                (Some(a), Some(b)) => Ok(Value::Bool(a && b)),
                _ => Err(CoreError::TypeError("'and' requires two booleans".into())),
            },
            BinOp::Or => match (l.as_bool(), r.as_bool()) {
                (Some(a), Some(b)) => Ok(Value::Bool(a || b)),
                _ => Err(CoreError::TypeError("'or' requires two booleans".into())),
            },
        }
    }

    fn eval_unary(&mut self, op: UnOp, operand: &Expr) -> CoreResult<Value> {
        let v = self.eval(operand)?;
        match op {
            UnOp::Not => v
                .as_bool()
                .map(|b| Value::Bool(!b))
                .ok_or_else(|| CoreError::TypeError(format!("'not' requires a boolean, got {}", v.type_name()))),
            UnOp::Neg => match v {
                Value::Int(i) => Ok(Value::Int(-i)),
                Value::Real(r) => Ok(Value::Real(-r)),
                _ => Err(CoreError::TypeError(format!(
                    "unary '-' requires a number, got {}",
                    v.type_name()
                ))),
            },
        }
    }

    fn eval_iterate(
        &mut self,
        source: &Expr,
        param: &Name,
        acc: &Name,
        init: &Expr,
        body: &Expr,
    ) -> CoreResult<Value> {
        let src = self.eval(source)?;
        let elems: Vec<Value> = match &src {
            Value::Collection(_, e) => e.clone(),
            _ => {
                return Err(CoreError::TypeError(format!(
                    "'iterate' requires a collection, got {}",
                    src.type_name()
                )));
            }
        };
        let mut acc_val = self.eval(init)?;
        self.ctx.push_scope();
        for elem in elems {
            self.ctx.set_var(param.clone(), elem);
            self.ctx.set_var(acc.clone(), acc_val.clone());
            acc_val = match self.eval(body) {
                Ok(v) => v,
                Err(e) => {
                    self.ctx.pop_scope();
                    return Err(e);
                }
            };
        }
        self.ctx.pop_scope();
        Ok(acc_val)
    }

    fn eval_helper_call(&mut self, name: &Name, args: &[Expr]) -> CoreResult<Value> {
        let helper = self
            .ctx
            .helper(name)
            .cloned()
            .ok_or_else(|| CoreError::HelperNotFound(name.clone()))?;
        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(self.eval(a)?);
        }
        self.ctx.record_helper_invocation();
        self.ctx.push_scope();
        for (i, param) in helper.params.iter().enumerate() {
            let v = values.get(i).cloned().unwrap_or(Value::Null);
            self.ctx.set_var(param.name.clone(), v);
        }
        let result = self.eval(&helper.body);
        self.ctx.pop_scope();
        result
    }

    fn eval_method_call(&mut self, recv: &Expr, name: &Name, args: &[Expr]) -> CoreResult<Value> {
        let recv_val = self.eval(recv)?;
        self.dispatch_method(name.as_str(), recv_val, args)
    }

    /// Apply a lambda to a single argument: push a scope, bind the
    /// parameter, evaluate the body, pop (§4.4).
    pub(crate) fn call_lambda(&mut self, lambda: &Lambda, arg: Value) -> CoreResult<Value> {
        self.ctx.push_scope();
        self.ctx.set_var(lambda.param.clone(), arg);
        let result = self.eval(&lambda.body);
        self.ctx.pop_scope();
        result
    }

    /// Invoke a context-typed helper as if it were a method on `recv`:
    /// bind `self`, then bind the positional arguments to its params.
    fn invoke_helper_with_self(
        &mut self,
        helper: &crate::parser::ast::Helper,
        recv: Value,
        args: &[Value],
    ) -> CoreResult<Value> {
        self.ctx.record_helper_invocation();
        self.ctx.push_scope();
        self.ctx.set_var(Name::new("self"), recv);
        for (i, param) in helper.params.iter().enumerate() {
            let v = args.get(i).cloned().unwrap_or(Value::Null);
            self.ctx.set_var(param.name.clone(), v);
        }
        let result = self.eval(&helper.body);
        self.ctx.pop_scope();
        result
    }

    /// Look up a context-typed helper by name, checking that `recv`'s
    /// runtime type matches (or is a subtype of) the helper's declared
    /// context (§4.5's Navigation fallback, generalised to `MethodCall`).
    fn find_context_helper(&self, name: &Name, recv: &Value) -> Option<crate::parser::ast::Helper> {
        let helper = self.ctx.helper(name)?;
        let ctx_ty = helper.context_type.as_ref()?;
        if self.context_matches(ctx_ty, recv) {
            Some(helper.clone())
        } else {
            None
        }
    }

    fn context_matches(&self, ctx_ty: &TypeExpr, recv: &Value) -> bool {
        match ctx_ty {
            TypeExpr::Named(n) => n.as_str() == "OclAny" || n.as_str() == recv.type_name(),
            TypeExpr::Qualified(alias, class) => {
                if let Value::ObjectRef(obj) = recv {
                    let mm = self.ctx.metamodel();
                    if let (Ok(obj_class), Ok(ctx_class)) = (
                        mm.class_of(*obj),
                        mm.resolve_classifier(alias.as_str(), class.as_str()),
                    ) {
                        return mm.is_kind_of(&obj_class, &ctx_class);
                    }
                }
                false
            }
            _ => false,
        }
    }

    pub(crate) fn dispatch_method(&mut self, name: &str, recv: Value, args: &[Expr]) -> CoreResult<Value> {
        ops::dispatch_method(self, name, recv, args)
    }

    pub(crate) fn dispatch_op(
        &mut self,
        op: &str,
        recv: Value,
        lambda: Option<&Lambda>,
        args: &[Expr],
    ) -> CoreResult<Value> {
        ops::dispatch_op(self, op, recv, lambda, args)
    }
}

fn numeric_binop(l: &Value, r: &Value, f: impl Fn(f64, f64) -> f64, spelling: &str) -> CoreResult<Value> {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => {
            if matches!(l, Value::Real(_)) || matches!(r, Value::Real(_)) {
                Ok(Value::Real(f(a, b)))
            } else {
                Ok(Value::Int(f(a, b) as i64))
            }
        }
        _ => Err(CoreError::TypeError(format!(
            "'{spelling}' requires two numbers, got {} and {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn compare(op: BinOp, l: &Value, r: &Value) -> CoreResult<Value> {
    use std::cmp::Ordering;
    let ordering = match (l, r) {
        (Value::Int(_) | Value::Real(_), Value::Int(_) | Value::Real(_)) => {
            l.as_f64().unwrap().partial_cmp(&r.as_f64().unwrap())
        }
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => {
            return Err(CoreError::TypeError(format!(
                "'{}' requires two numbers or two strings, got {} and {}",
                op.spelling(),
                l.type_name(),
                r.type_name()
            )));
        }
    };
    let ordering = ordering.ok_or_else(|| CoreError::TypeError("uncomparable values (NaN)".into()))?;
    let result = match op {
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{Position, Span};
    use crate::metamodel::memory::MemoryModel;

    fn span() -> Span {
        Span::new(Position::new(0, 0), Position::new(0, 1))
    }

    fn eval_expr(expr: &Expr) -> CoreResult<Value> {
        let mut ctx = ExecutionContext::new(MemoryModel::new());
        let mut ev = Evaluator::new(&mut ctx);
        ev.eval(expr)
    }

    #[test]
    fn arithmetic_widens_int_and_real() {
        let e = Expr::BinaryOp(
            BinOp::Add,
            Box::new(Expr::Literal(Value::Int(1), span())),
            Box::new(Expr::Literal(Value::Real(2.5), span())),
            span(),
        );
        let v = eval_expr(&e).unwrap();
        assert_eq!(v.as_f64(), Some(3.5));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let e = Expr::BinaryOp(
            BinOp::Div,
            Box::new(Expr::Literal(Value::Int(1), span())),
            Box::new(Expr::Literal(Value::Int(0), span())),
            span(),
        );
        assert!(matches!(eval_expr(&e), Err(CoreError::DivisionByZero)));
    }

    #[test]
    fn null_navigation_short_circuits_to_null() {
        let e = Expr::Navigation(
            Box::new(Expr::Literal(Value::Null, span())),
            Name::new("x"),
            span(),
        );
        assert!(matches!(eval_expr(&e), Ok(Value::Null)));
    }

    #[test]
    fn null_arithmetic_is_a_type_error() {
        let e = Expr::BinaryOp(
            BinOp::Add,
            Box::new(Expr::Literal(Value::Null, span())),
            Box::new(Expr::Literal(Value::Int(1), span())),
            span(),
        );
        assert!(matches!(eval_expr(&e), Err(CoreError::TypeError(_))));
    }

    #[test]
    fn conditional_treats_non_boolean_as_false() {
        let e = Expr::Conditional(
            Box::new(Expr::Literal(Value::Int(1), span())),
            Box::new(Expr::Literal(Value::Int(1), span())),
            Box::new(Expr::Literal(Value::Int(0), span())),
            span(),
        );
        assert_eq!(eval_expr(&e).unwrap().as_i64(), Some(0));
    }

    #[test]
    fn let_binding_is_scoped_to_its_body() {
        let e = Expr::Let(
            Name::new("x"),
            None,
            Box::new(Expr::Literal(Value::Int(7), span())),
            Box::new(Expr::Variable(Name::new("x"), span())),
            span(),
        );
        assert_eq!(eval_expr(&e).unwrap().as_i64(), Some(7));
    }

    #[test]
    fn and_or_are_not_short_circuiting_and_require_booleans() {
        let e = Expr::BinaryOp(
            BinOp::And,
            Box::new(Expr::Literal(Value::Bool(true), span())),
            Box::new(Expr::Literal(Value::Int(1), span())),
            span(),
        );
        assert!(matches!(eval_expr(&e), Err(CoreError::TypeError(_))));
    }
}
