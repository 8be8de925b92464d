//! End-to-end tests driving the parser and the rule engine together: real
//! ATL-style source text, parsed into a `Module`, executed by a
//! `VirtualMachine` against an in-memory metamodel.

use atl::metamodel::memory::MemoryModel;
use atl::metamodel::FeatureInfo;
use atl::{ExecutionContext, Name, Value, VirtualMachine, VmConfig, parse_module};

fn members_model() -> MemoryModel {
    let mut mm = MemoryModel::new();
    mm.register_model("DefaultSource", true);
    mm.register_model("DefaultTarget", false);
    mm.register_class(
        "DefaultSource",
        "Member",
        None,
        vec![
            FeatureInfo { name: "firstName".into(), upper_bound: Some(1), containment: false },
            FeatureInfo { name: "isMale".into(), upper_bound: Some(1), containment: false },
        ],
    );
    mm.register_class(
        "DefaultTarget",
        "Person",
        None,
        vec![FeatureInfo { name: "fullName".into(), upper_bound: Some(1), containment: false }],
    );
    mm.seed_instance(
        "DefaultSource",
        "Member",
        vec![("firstName", Value::String("Ada".into())), ("isMale", Value::Bool(false))],
    );
    mm.seed_instance(
        "DefaultSource",
        "Member",
        vec![("firstName", Value::String("Bob".into())), ("isMale", Value::Bool(true))],
    );
    mm
}

#[test]
fn guard_restricts_which_source_elements_fire_the_rule() {
    let source = "module M;\n\
        rule Male2Person {\n  from s : IN!Member (s.isMale)\n  to t : OUT!Person (fullName <- s.firstName)\n}\n";
    let parse = parse_module(source);
    assert!(parse.errors.is_empty(), "{:?}", parse.errors);
    let module = parse.module.unwrap();

    let vm = VirtualMachine::new(module, VmConfig::default());
    let mut ctx = ExecutionContext::new(members_model());
    ctx.add_source(Name::new("DefaultSource"));
    ctx.add_target(Name::new("DefaultTarget"));

    let stats = vm.execute(&mut ctx, None);
    assert!(stats.successful, "{:?}", stats.last_error);
    assert_eq!(stats.source_elements_visited, 2);
    // Only Bob (isMale) passes the guard.
    assert_eq!(stats.matched_rules_fired, 1);
    assert_eq!(stats.targets_created, 1);
    assert_eq!(ctx.traces().len(), 1);
}

#[test]
fn every_matched_rule_firing_records_exactly_one_trace_link() {
    let source = "module M;\n\
        rule Member2Person {\n  from s : IN!Member\n  to t : OUT!Person (fullName <- s.firstName)\n}\n";
    let parse = parse_module(source);
    let module = parse.module.unwrap();

    let vm = VirtualMachine::new(module, VmConfig::default());
    let mut ctx = ExecutionContext::new(members_model());
    ctx.add_source(Name::new("DefaultSource"));
    ctx.add_target(Name::new("DefaultTarget"));

    let stats = vm.execute(&mut ctx, None);
    assert!(stats.successful, "{:?}", stats.last_error);
    assert_eq!(stats.matched_rules_fired, 2);
    assert_eq!(ctx.traces().len(), 2);
    for trace in ctx.traces() {
        assert_eq!(trace.targets.len(), 1);
    }
}

#[test]
fn missing_source_alias_registration_fails_before_any_rule_runs() {
    let source = "module M;\n\
        rule Member2Person {\n  from s : IN!Member\n  to t : OUT!Person (fullName <- s.firstName)\n}\n";
    let parse = parse_module(source);
    let module = parse.module.unwrap();

    let vm = VirtualMachine::new(module, VmConfig::default());
    // Deliberately omit ctx.add_source/add_target.
    let mut ctx = ExecutionContext::new(members_model());

    let stats = vm.execute(&mut ctx, None);
    assert!(!stats.successful);
    assert_eq!(stats.matched_rules_fired, 0);
}

#[test]
fn empty_collection_first_is_a_runtime_error() {
    use atl::Evaluator;
    let source = "module M; helper def : q : Integer = Sequence{}->first();";
    let parse = parse_module(source);
    let module = parse.module.unwrap();
    let expr = &module.helpers.get(&Name::new("q")).unwrap().body;

    let mut ctx = ExecutionContext::new(MemoryModel::new());
    let mut ev = Evaluator::new(&mut ctx);
    let err = ev.eval(expr).unwrap_err();
    assert!(matches!(err, atl::CoreError::RuntimeError(_)));
}
