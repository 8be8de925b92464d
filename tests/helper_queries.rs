//! Parse-then-evaluate tests for context-free helpers: the lexer, the
//! recursive-descent parser, and the tree-walking evaluator exercised
//! together as the embedding host would use them.

use atl::metamodel::memory::MemoryModel;
use atl::{ExecutionContext, Evaluator, Value, parse_module};

fn helper_body(source: &str, name: &str) -> atl::parser::Expr {
    let parse = parse_module(source);
    assert!(parse.errors.is_empty(), "{:?}", parse.errors);
    let module = parse.module.expect("module parsed");
    module
        .helpers
        .get(&atl::Name::new(name))
        .expect("helper present")
        .body
        .clone()
}

fn eval_helper(source: &str, name: &str) -> Value {
    let expr = helper_body(source, name);
    let mut ctx = ExecutionContext::new(MemoryModel::new());
    let mut ev = Evaluator::new(&mut ctx);
    ev.eval(&expr).expect("helper body evaluates")
}

#[test]
fn addition_helper_invoked_through_a_helper_call() {
    let source = "module M;\n\
        helper def : addNumbers(a : Integer, b : Integer) : Integer = a + b;\n\
        helper def : q : Integer = addNumbers(2, 3);\n";
    let v = eval_helper(source, "q");
    assert_eq!(v.as_i64(), Some(5));
}

#[test]
fn collection_filter_keeps_only_matching_elements() {
    let source = "module M;\n\
        helper def : q : Sequence(Integer) = \
        Sequence{1, 2, 3, 4, 5}->select(n | n.mod(2) = 0);\n";
    let v = eval_helper(source, "q");
    let (_, items) = v.as_collection().expect("a collection");
    let ints: Vec<i64> = items.iter().map(|x| x.as_i64().unwrap()).collect();
    assert_eq!(ints, vec![2, 4]);
}

#[test]
fn iterate_accumulates_a_running_sum() {
    let source = "module M;\n\
        helper def : q : Integer = \
        Sequence{1, 2, 3}->iterate(n; s : Integer = 0 | s + n);\n";
    let v = eval_helper(source, "q");
    assert_eq!(v.as_i64(), Some(6));
}

#[test]
fn context_helper_is_dispatched_by_receiver_type() {
    let source = "module M;\n\
        helper context Integer def : isPositive : Boolean = self > 0;\n\
        helper def : negative : Boolean = (0 - 3).isPositive();\n\
        helper def : positive : Boolean = 5.isPositive();\n";
    assert_eq!(eval_helper(source, "negative").as_bool(), Some(false));
    assert_eq!(eval_helper(source, "positive").as_bool(), Some(true));
}

#[test]
fn expression_tree_round_trips_through_canonical_text() {
    let source = "module M; helper def : q : Integer = if 1 < 2 then 10 else 20 endif;";
    let expr = helper_body(source, "q");
    let rendered = expr.to_string();

    let reparsed_source = format!("module M; helper def : q2 : Integer = {rendered};");
    let reparsed = helper_body(&reparsed_source, "q2");
    assert_eq!(expr.to_string(), reparsed.to_string());
}
