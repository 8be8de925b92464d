//! The built-in scalar and collection operation table (§4.5.1).
//!
//! Split out of `eval/mod.rs` the way large dispatch tables live in their
//! own module elsewhere in this crate (e.g. `src/hir/builtins.rs`-style
//! files): one big `match` on operation name, grouped by receiver shape.

use super::Evaluator;
use crate::base::Name;
use crate::error::{CoreError, CoreResult};
use crate::metamodel::Metamodel;
use crate::parser::ast::{Expr, Lambda};
use crate::value::{CollectionKind, Value};

/// Dispatch a `.`-form method call: no lambda, arguments are ordinary
/// expressions. Tries the built-in table first; on a name miss, falls back
/// to a context-typed helper (so `self.isPositive()` reaches a user helper
/// the same way a bare `self.isPositive` navigation would).
pub(super) fn dispatch_method<M: Metamodel>(
    ev: &mut Evaluator<M>,
    name: &str,
    recv: Value,
    args: &[Expr],
) -> CoreResult<Value> {
    if name == "oclIsUndefined" {
        return Ok(Value::Bool(recv.is_null()));
    }
    if recv.is_null() {
        return Err(CoreError::TypeError(format!("cannot call '{name}' on Null")));
    }

    match try_builtin(ev, name, &recv, None, args)? {
        Some(v) => Ok(v),
        None => {
            let mut values = Vec::with_capacity(args.len());
            for a in args {
                values.push(ev.eval(a)?);
            }
            if let Some(helper) = ev.find_context_helper(&Name::new(name), &recv) {
                ev.invoke_helper_with_self(&helper, recv, &values)
            } else {
                Err(CoreError::UnsupportedOperation {
                    operation: name.to_string(),
                    receiver_type: recv.type_name(),
                })
            }
        }
    }
}

/// Dispatch a `->`-form collection operation: may carry a lambda (`iter`)
/// or ordinary arguments, never both.
pub(super) fn dispatch_op<M: Metamodel>(
    ev: &mut Evaluator<M>,
    op: &str,
    recv: Value,
    lambda: Option<&Lambda>,
    args: &[Expr],
) -> CoreResult<Value> {
    if recv.is_null() {
        return Err(CoreError::TypeError(format!("cannot call '{op}' on Null")));
    }
    match try_builtin(ev, op, &recv, lambda, args)? {
        Some(v) => Ok(v),
        None => Err(CoreError::UnsupportedOperation {
            operation: op.to_string(),
            receiver_type: recv.type_name(),
        }),
    }
}

/// Attempt the built-in table. Returns `Ok(None)` on a name miss so the
/// caller can fall back to helper dispatch (method-call path only).
fn try_builtin<M: Metamodel>(
    ev: &mut Evaluator<M>,
    name: &str,
    recv: &Value,
    lambda: Option<&Lambda>,
    args: &[Expr],
) -> CoreResult<Option<Value>> {
    // Operations requiring a lambda (select/reject/collect/exists/forAll/
    // one/sortedBy) are only reachable when one was supplied; a missing
    // lambda is a TypeError, not a silent pass-through (design decision).
    match name {
        "select" | "reject" | "collect" | "exists" | "forAll" | "one" | "sortedBy" => {
            let (kind, elems) = expect_collection(recv, name)?;
            let lambda = lambda.ok_or_else(|| {
                CoreError::TypeError(format!("'{name}' requires a lambda argument"))
            })?;
            return Ok(Some(match name {
                "select" => filter_collection(ev, kind, elems, lambda, true)?,
                "reject" => filter_collection(ev, kind, elems, lambda, false)?,
                "collect" => collect_collection(ev, kind, elems, lambda)?,
                "exists" => exists_collection(ev, elems, lambda, true)?,
                "forAll" => exists_collection(ev, elems, lambda, false)?,
                "one" => one_collection(ev, elems, lambda)?,
                "sortedBy" => sorted_by(ev, kind, elems, lambda)?,
                _ => unreachable!(),
            }));
        }
        _ => {}
    }

    match (name, recv) {
        ("size", Value::Collection(_, e)) => Ok(Some(Value::Int(e.len() as i64))),
        ("size", Value::String(s)) => Ok(Some(Value::Int(s.chars().count() as i64))),
        ("isEmpty", Value::Collection(_, e)) => Ok(Some(Value::Bool(e.is_empty()))),
        ("notEmpty", Value::Collection(_, e)) => Ok(Some(Value::Bool(!e.is_empty()))),
        ("first", Value::Collection(_, e)) => e
            .first()
            .cloned()
            .map(Some)
            .ok_or_else(|| CoreError::RuntimeError("'first' on an empty collection".into())),
        ("last", Value::Collection(_, e)) => e
            .last()
            .cloned()
            .map(Some)
            .ok_or_else(|| CoreError::RuntimeError("'last' on an empty collection".into())),
        ("includes", Value::Collection(_, e)) => {
            let arg = eval_one(ev, args)?;
            Ok(Some(Value::Bool(
                e.iter().any(|x| crate::value::values_equal(x, &arg)),
            )))
        }
        ("excludes", Value::Collection(_, e)) => {
            let arg = eval_one(ev, args)?;
            Ok(Some(Value::Bool(
                !e.iter().any(|x| crate::value::values_equal(x, &arg)),
            )))
        }
        ("union", Value::Collection(kind, e)) => {
            let other = eval_one(ev, args)?;
            let (_, other_elems) = expect_collection(&other, "union")?;
            let mut combined = e.clone();
            combined.extend(other_elems.iter().cloned());
            Ok(Some(Value::collection(*kind, combined)))
        }
        ("intersection", Value::Collection(kind, e)) => {
            let other = eval_one(ev, args)?;
            let (_, other_elems) = expect_collection(&other, "intersection")?;
            let kept: Vec<Value> = e
                .iter()
                .filter(|x| other_elems.iter().any(|y| crate::value::values_equal(x, y)))
                .cloned()
                .collect();
            Ok(Some(Value::collection(*kind, kept)))
        }
        ("flatten", Value::Collection(kind, e)) => {
            let mut flat = Vec::new();
            for elem in e {
                match elem {
                    Value::Collection(_, inner) => flat.extend(inner.iter().cloned()),
                    other => flat.push(other.clone()),
                }
            }
            Ok(Some(Value::collection(*kind, flat)))
        }
        ("asSequence", Value::Collection(_, e)) => {
            Ok(Some(Value::collection(CollectionKind::Sequence, e.clone())))
        }
        ("asSet", Value::Collection(_, e)) => Ok(Some(Value::collection(CollectionKind::Set, e.clone()))),
        ("asBag", Value::Collection(_, e)) => Ok(Some(Value::collection(CollectionKind::Bag, e.clone()))),
        ("asOrderedSet", Value::Collection(_, e)) => {
            Ok(Some(Value::collection(CollectionKind::OrderedSet, e.clone())))
        }
        ("mod", Value::Int(a)) => {
            let b = eval_int(ev, args, "mod")?;
            if b == 0 {
                Err(CoreError::DivisionByZero)
            } else {
                Ok(Some(Value::Int(a.rem_euclid(b))))
            }
        }
        ("power", Value::Int(a)) => {
            let b = eval_int(ev, args, "power")?;
            if b < 0 {
                Err(CoreError::InvalidOperation("'power' does not support negative exponents".into()))
            } else {
                Ok(Some(Value::Int(a.pow(b as u32))))
            }
        }
        ("isEven", Value::Int(a)) => Ok(Some(Value::Bool(a % 2 == 0))),
        ("square", Value::Int(a)) => Ok(Some(Value::Int(a * a))),
        ("square", Value::Real(a)) => Ok(Some(Value::Real(a * a))),
        ("toString", v) => Ok(Some(Value::String(stringify(v)))),
        ("toUpperCase", Value::String(s)) => Ok(Some(Value::String(s.to_uppercase()))),
        ("reverse", Value::String(s)) => Ok(Some(Value::String(s.chars().rev().collect()))),
        ("reverse", Value::Collection(kind, e)) => {
            let mut rev = e.clone();
            rev.reverse();
            Ok(Some(Value::Collection(*kind, rev)))
        }
        ("allInstances", Value::Type(qualified)) => Ok(Some(all_instances(ev, qualified)?)),
        _ => Ok(None),
    }
}

fn expect_collection<'v>(v: &'v Value, op: &str) -> CoreResult<(CollectionKind, &'v [Value])> {
    v.as_collection()
        .ok_or_else(|| CoreError::TypeError(format!("'{op}' requires a collection, got {}", v.type_name())))
}

fn eval_one<M: Metamodel>(ev: &mut Evaluator<M>, args: &[Expr]) -> CoreResult<Value> {
    let arg = args
        .first()
        .ok_or_else(|| CoreError::InvalidOperation("expected one argument".into()))?;
    ev.eval(arg)
}

fn eval_int<M: Metamodel>(ev: &mut Evaluator<M>, args: &[Expr], op: &str) -> CoreResult<i64> {
    let v = eval_one(ev, args)?;
    v.as_i64()
        .ok_or_else(|| CoreError::TypeError(format!("'{op}' requires an integer argument")))
}

fn as_predicate(v: &Value) -> bool {
    matches!(v, Value::Bool(true))
}

fn filter_collection<M: Metamodel>(
    ev: &mut Evaluator<M>,
    kind: CollectionKind,
    elems: &[Value],
    lambda: &Lambda,
    keep_when_true: bool,
) -> CoreResult<Value> {
    let mut kept = Vec::new();
    for elem in elems {
        let result = ev.call_lambda(lambda, elem.clone())?;
        if as_predicate(&result) == keep_when_true {
            kept.push(elem.clone());
        }
    }
    Ok(Value::collection(kind, kept))
}

fn collect_collection<M: Metamodel>(
    ev: &mut Evaluator<M>,
    kind: CollectionKind,
    elems: &[Value],
    lambda: &Lambda,
) -> CoreResult<Value> {
    let mut mapped = Vec::with_capacity(elems.len());
    for elem in elems {
        mapped.push(ev.call_lambda(lambda, elem.clone())?);
    }
    // OCL convention: `collect` over an ordered source stays ordered,
    // otherwise it collapses to a Bag (duplicates from the mapping are
    // expected and kept).
    let result_kind = match kind {
        CollectionKind::Sequence | CollectionKind::OrderedSet => CollectionKind::Sequence,
        CollectionKind::Set | CollectionKind::Bag => CollectionKind::Bag,
    };
    Ok(Value::collection(result_kind, mapped))
}

fn exists_collection<M: Metamodel>(
    ev: &mut Evaluator<M>,
    elems: &[Value],
    lambda: &Lambda,
    want: bool,
) -> CoreResult<Value> {
    for elem in elems {
        let result = ev.call_lambda(lambda, elem.clone())?;
        let matched = as_predicate(&result);
        if matched == want {
            return Ok(Value::Bool(want));
        }
    }
    Ok(Value::Bool(!want))
}

fn one_collection<M: Metamodel>(ev: &mut Evaluator<M>, elems: &[Value], lambda: &Lambda) -> CoreResult<Value> {
    let mut count = 0;
    for elem in elems {
        let result = ev.call_lambda(lambda, elem.clone())?;
        if as_predicate(&result) {
            count += 1;
        }
    }
    Ok(Value::Bool(count == 1))
}

fn sorted_by<M: Metamodel>(
    ev: &mut Evaluator<M>,
    kind: CollectionKind,
    elems: &[Value],
    lambda: &Lambda,
) -> CoreResult<Value> {
    let mut keyed = Vec::with_capacity(elems.len());
    for elem in elems {
        let key = ev.call_lambda(lambda, elem.clone())?;
        keyed.push((key, elem.clone()));
    }
    let mut err = None;
    keyed.sort_by(|(ka, _), (kb, _)| match (ka.as_f64(), kb.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
        _ => match (ka.as_str(), kb.as_str()) {
            (Some(a), Some(b)) => a.cmp(b),
            _ => {
                err.get_or_insert_with(|| {
                    CoreError::TypeError("'sortedBy' key must be a number or a string".into())
                });
                std::cmp::Ordering::Equal
            }
        },
    });
    if let Some(e) = err {
        return Err(e);
    }
    Ok(Value::collection(
        match kind {
            CollectionKind::Set | CollectionKind::Bag => CollectionKind::Sequence,
            other => other,
        },
        keyed.into_iter().map(|(_, v)| v).collect(),
    ))
}

fn all_instances<M: Metamodel>(ev: &mut Evaluator<M>, qualified: &str) -> CoreResult<Value> {
    let (alias, class_name) = qualified.split_once('!').ok_or_else(|| {
        CoreError::InvalidOperation(format!("'{qualified}' is not an alias-qualified type"))
    })?;
    let class = ev
        .ctx
        .metamodel()
        .resolve_classifier(alias, class_name)
        .map_err(CoreError::Metamodel)?;
    let instances = ev
        .ctx
        .metamodel()
        .instances_of(alias, &class)
        .map_err(CoreError::Metamodel)?;
    Ok(Value::collection(
        CollectionKind::Sequence,
        instances.into_iter().map(Value::ObjectRef).collect(),
    ))
}

/// Plain textual rendering for `toString()`, distinct from `Value`'s
/// `Display` impl, which quotes strings for the canonical expression form.
fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
