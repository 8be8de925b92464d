//! Table-driven coverage of the collection algebra's boundary behaviours
//! (§8) and the binary-operator numeric coercion matrix, parsed and
//! evaluated as a host embedding this crate would.

use atl::metamodel::memory::MemoryModel;
use atl::{CoreError, Evaluator, ExecutionContext, Value, parse_module};
use rstest::rstest;

fn eval(expr_source: &str) -> atl::CoreResult<Value> {
    let source = format!("module M; helper def : q : OclAny = {expr_source};");
    let parse = parse_module(&source);
    assert!(parse.errors.is_empty(), "{:?}", parse.errors);
    let module = parse.module.expect("module parsed");
    let expr = module
        .helpers
        .get(&atl::Name::new("q"))
        .expect("helper q present")
        .body
        .clone();
    let mut ctx = ExecutionContext::new(MemoryModel::new());
    let mut ev = Evaluator::new(&mut ctx);
    ev.eval(&expr)
}

#[rstest]
#[case("Sequence{}->first()")]
#[case("Sequence{}->last()")]
fn empty_collection_first_and_last_fail(#[case] expr: &str) {
    assert!(matches!(eval(expr), Err(CoreError::RuntimeError(_))), "{expr}");
}

#[rstest]
#[case("Sequence{}->isEmpty()", true)]
#[case("Sequence{1}->isEmpty()", false)]
#[case("Sequence{}->notEmpty()", false)]
fn empty_collection_emptiness_checks(#[case] expr: &str, #[case] want: bool) {
    assert_eq!(eval(expr).unwrap().as_bool(), Some(want), "{expr}");
}

#[rstest]
#[case("Sequence{}->forAll(x | false)", true)]
#[case("Sequence{}->exists(x | true)", false)]
fn empty_collection_quantifiers(#[case] expr: &str, #[case] want: bool) {
    assert_eq!(eval(expr).unwrap().as_bool(), Some(want), "{expr}");
}

#[test]
fn empty_collection_iterate_returns_the_initial_accumulator() {
    let v = eval("Sequence{}->iterate(x; acc : Integer = 42 | acc + x)").unwrap();
    assert_eq!(v.as_i64(), Some(42));
}

#[rstest]
#[case("1 / 0")]
#[case("1.0 / 0")]
#[case("1 / 0.0")]
fn division_by_zero_is_an_error_for_both_numeric_kinds(#[case] expr: &str) {
    assert!(matches!(eval(expr), Err(CoreError::DivisionByZero)), "{expr}");
}

#[rstest]
#[case("not null")]
#[case("null + 1")]
#[case("null.size()")]
fn null_participates_in_arithmetic_and_logic_as_a_type_error(#[case] expr: &str) {
    assert!(matches!(eval(expr), Err(CoreError::TypeError(_))), "{expr}");
}

#[test]
fn null_ocl_is_undefined_is_the_one_documented_exception() {
    assert_eq!(eval("null.oclIsUndefined()").unwrap().as_bool(), Some(true));
}

/// Mixed-mode arithmetic widens to `Real` only when at least one operand
/// already is one; two `Int`s stay `Int` (§9).
#[rstest]
#[case("1 + 2", false)]
#[case("1 + 2.0", true)]
#[case("2.0 + 1", true)]
#[case("3 - 1", false)]
#[case("3.0 - 1", true)]
#[case("2 * 3", false)]
#[case("2 * 3.0", true)]
#[case("7 / 2", false)]
#[case("7.0 / 2", true)]
fn mixed_mode_arithmetic_widens_only_when_an_operand_is_real(
    #[case] expr: &str,
    #[case] expect_real: bool,
) {
    let v = eval(expr).unwrap();
    assert_eq!(matches!(v, Value::Real(_)), expect_real, "{expr} -> {v:?}");
}

#[rstest]
#[case("1 < 2", true)]
#[case("2 < 1", false)]
#[case("2 <= 2", true)]
#[case("'a' < 'b'", true)]
#[case("'b' < 'a'", false)]
fn comparisons_on_numbers_and_strings(#[case] expr: &str, #[case] want: bool) {
    assert_eq!(eval(expr).unwrap().as_bool(), Some(want), "{expr}");
}

#[rstest]
#[case("1 = 1", true)]
#[case("1 = 1.0", true)]
#[case("1 = '1'", false)]
#[case("'x' = 'x'", true)]
#[case("null = null", true)]
#[case("null = 1", false)]
fn equality_is_structural_not_stringified(#[case] expr: &str, #[case] want: bool) {
    assert_eq!(eval(expr).unwrap().as_bool(), Some(want), "{expr}");
}

/// §9's open question: a `select`/`reject`/`collect` call whose argument was
/// not written as a lambda (`ident | expr`) is a `TypeError`, not a silent
/// pass-through of the receiver.
#[rstest]
#[case("Sequence{1,2,3}->select(1)")]
#[case("Sequence{1,2,3}->reject(1)")]
#[case("Sequence{1,2,3}->collect(1)")]
fn select_reject_collect_reject_a_non_lambda_argument_as_a_type_error(#[case] expr: &str) {
    assert!(matches!(eval(expr), Err(CoreError::TypeError(_))), "{expr}");
}
