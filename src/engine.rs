//! The rule engine (§3 `VirtualMachine`, §4.6/§4.7/§4.8).
//!
//! Grounded on `src/hir/resolve.rs`'s two-phase collect-then-resolve shape
//! (one pass instantiates and binds, a second pass resolves what the first
//! couldn't) and `src/project/workspace_loader.rs`'s `tracing::debug!`
//! progress-logging idiom around a multi-file pass.

use crate::base::Name;
use crate::config::VmConfig;
use crate::context::ExecutionContext;
use crate::error::{CoreError, CoreResult};
use crate::eval::Evaluator;
use crate::metamodel::Metamodel;
use crate::parser::ast::{MatchedRule, Module, TargetPattern, TypeExpr};
use crate::value::Value;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Observable side effects of a completed (or aborted) `execute()` call
/// (§6 `Statistics`).
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub duration: Duration,
    pub successful: bool,
    pub matched_rules_fired: u64,
    pub called_rules_invoked: u64,
    pub source_elements_visited: u64,
    pub targets_created: u64,
    pub traces_recorded: u64,
    pub lazy_bindings_resolved: u64,
    pub helper_invocations: u64,
    pub navigations: u64,
    pub warnings: Vec<String>,
    pub last_error: Option<String>,
}

/// Runs a parsed [`Module`] against an [`ExecutionContext`] (§4.6).
pub struct VirtualMachine {
    module: Module,
    config: VmConfig,
}

impl VirtualMachine {
    pub fn new(module: Module, config: VmConfig) -> Self {
        Self { module, config }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Run the full matched-rule pass followed by the lazy-binding drain
    /// (§4.6). Returns partial statistics even on a fatal error, with
    /// `successful = false` and `last_error` set.
    #[tracing::instrument(level = "debug", skip_all, fields(module = %self.module.name))]
    pub fn execute<M: Metamodel>(
        &self,
        ctx: &mut ExecutionContext<M>,
        cancellation: Option<&CancellationToken>,
    ) -> Statistics {
        let start = Instant::now();
        let mut stats = Statistics::default();

        if let Err(e) = self.validate_aliases(ctx) {
            stats.duration = start.elapsed();
            stats.last_error = Some(e.to_string());
            return stats;
        }

        for helper in self.module.helpers.values() {
            ctx.register_helper(helper.clone());
        }

        debug!(module = %self.module.name, rules = self.module.matched_rules.len(), "starting matched-rule pass");

        if let Err(e) = self.run_matched_rules(ctx, cancellation, &mut stats) {
            stats.duration = start.elapsed();
            stats.last_error = Some(e.to_string());
            self.finish(ctx, &mut stats);
            return stats;
        }

        debug!(queued = ctx.lazy_queue_len(), "draining lazy-binding queue");
        if let Err(e) = self.drain_lazy_bindings(ctx, cancellation, &mut stats) {
            stats.duration = start.elapsed();
            stats.last_error = Some(e.to_string());
            self.finish(ctx, &mut stats);
            return stats;
        }

        stats.successful = true;
        stats.duration = start.elapsed();
        self.finish(ctx, &mut stats);
        stats
    }

    fn finish<M: Metamodel>(&self, ctx: &ExecutionContext<M>, stats: &mut Statistics) {
        stats.traces_recorded = ctx.traces().len() as u64;
        stats.helper_invocations = ctx.helper_invocations();
        stats.navigations = ctx.navigations();
        if !stats.successful && !ctx.lazy_queue_is_empty() {
            let msg = format!(
                "{} lazy binding(s) still unresolved after an unsuccessful run",
                ctx.lazy_queue_len()
            );
            warn!("{msg}");
            stats.warnings.push(msg);
        }
    }

    fn validate_aliases<M: Metamodel>(&self, ctx: &ExecutionContext<M>) -> CoreResult<()> {
        for alias in self.module.source_aliases.values() {
            if !ctx.has_source_alias(alias) {
                return Err(CoreError::RuntimeError(format!(
                    "source alias '{alias}' has no registered model"
                )));
            }
        }
        for alias in self.module.target_aliases.values() {
            if !ctx.has_target_alias(alias) {
                return Err(CoreError::RuntimeError(format!(
                    "target alias '{alias}' has no registered model"
                )));
            }
        }
        Ok(())
    }

    fn run_matched_rules<M: Metamodel>(
        &self,
        ctx: &mut ExecutionContext<M>,
        cancellation: Option<&CancellationToken>,
        stats: &mut Statistics,
    ) -> CoreResult<()> {
        for rule in &self.module.matched_rules {
            let (alias, class) = self.resolve_source(ctx, &rule.source.ty)?;
            let instances = ctx
                .metamodel()
                .instances_of(alias.as_str(), &class)
                .map_err(CoreError::Metamodel)?;

            for source_obj in instances {
                if let Some(token) = cancellation {
                    if token.is_cancelled() {
                        return Err(CoreError::Cancelled);
                    }
                }
                stats.source_elements_visited += 1;
                self.fire_matched_rule(ctx, rule, source_obj, stats)?;
            }
        }
        Ok(())
    }

    fn fire_matched_rule<M: Metamodel>(
        &self,
        ctx: &mut ExecutionContext<M>,
        rule: &MatchedRule,
        source_obj: crate::metamodel::ObjectRef,
        stats: &mut Statistics,
    ) -> CoreResult<()> {
        ctx.push_scope();
        ctx.set_var(rule.source.var.clone(), Value::ObjectRef(source_obj));

        let guard_result = match &rule.source.guard {
            Some(guard) => {
                let mut ev = Evaluator::new(ctx);
                ev.eval(guard)
            }
            None => Ok(Value::Bool(true)),
        };
        let passed = match guard_result {
            // Guard evaluation failure is always fatal (§4.8).
            Err(e) => {
                ctx.pop_scope();
                return Err(e);
            }
            Ok(v) => matches!(v, Value::Bool(true)),
        };
        if !passed {
            ctx.pop_scope();
            return Ok(());
        }

        let mut target_objs = Vec::with_capacity(rule.targets.len());
        for target in &rule.targets {
            let obj = self.instantiate_and_bind(ctx, target, stats)?;
            target_objs.push(obj);
        }

        ctx.add_trace(rule.name.clone(), source_obj, target_objs);
        stats.matched_rules_fired += 1;
        ctx.pop_scope();
        Ok(())
    }

    /// Create a target instance, bind it, and evaluate every property
    /// binding. A recoverable binding failure (`Navigation`/
    /// `VariableNotFound`) is queued rather than aborting the rule;
    /// anything else is fatal (§4.8).
    fn instantiate_and_bind<M: Metamodel>(
        &self,
        ctx: &mut ExecutionContext<M>,
        target: &TargetPattern,
        stats: &mut Statistics,
    ) -> CoreResult<crate::metamodel::ObjectRef> {
        let (alias, class) = self.resolve_target(ctx, &target.ty)?;
        let obj = ctx
            .metamodel_mut()
            .create_instance(alias.as_str(), &class)
            .map_err(CoreError::Metamodel)?;
        stats.targets_created += 1;
        ctx.set_var(target.var.clone(), Value::ObjectRef(obj));

        for binding in &target.bindings {
            let mut ev = Evaluator::new(ctx);
            match ev.eval(&binding.value) {
                Ok(value) => {
                    ctx.metamodel_mut()
                        .write_feature(obj, binding.property.as_str(), value)
                        .map_err(CoreError::Metamodel)?;
                }
                Err(e) if e.is_recoverable() => {
                    warn!(property = %binding.property, target = %obj, error = %e, "binding deferred");
                    ctx.add_lazy_binding(obj, binding.property.clone(), binding.value.clone());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(obj)
    }

    /// Drain the lazy-binding queue in one FIFO pass (§9's recommended
    /// option: replay against the scope captured at enqueue time). A
    /// failure here is always fatal (§4.8): there is no second queue to
    /// defer into.
    fn drain_lazy_bindings<M: Metamodel>(
        &self,
        ctx: &mut ExecutionContext<M>,
        cancellation: Option<&CancellationToken>,
        stats: &mut Statistics,
    ) -> CoreResult<()> {
        for _pass in 0..self.config.max_lazy_binding_drain_passes.max(1) {
            if ctx.lazy_queue_is_empty() {
                break;
            }
            let mut queue = ctx.take_lazy_queue();
            while let Some(entry) = queue.pop_front() {
                if let Some(token) = cancellation {
                    if token.is_cancelled() {
                        // Put the unfinished work back so `finish` can report
                        // how much was left undone (§5: no transactional
                        // rollback, but the count is still observable).
                        queue.push_front(entry);
                        for remaining in queue.into_iter().rev() {
                            ctx.push_front_lazy(remaining);
                        }
                        return Err(CoreError::Cancelled);
                    }
                }
                let saved = ctx.swap_scopes(entry.scope_snapshot.clone());
                let mut ev = Evaluator::new(ctx);
                let result = ev.eval(&entry.expr);
                ctx.swap_scopes(saved);
                let value = match result {
                    Ok(v) => v,
                    Err(e) => {
                        queue.push_front(entry);
                        for remaining in queue.into_iter().rev() {
                            ctx.push_front_lazy(remaining);
                        }
                        return Err(e);
                    }
                };
                if let Err(e) = ctx
                    .metamodel_mut()
                    .write_feature(entry.target, entry.property.as_str(), value)
                {
                    for remaining in queue.into_iter().rev() {
                        ctx.push_front_lazy(remaining);
                    }
                    return Err(CoreError::Metamodel(e));
                }
                stats.lazy_bindings_resolved += 1;
            }
        }
        Ok(())
    }

    /// Invoke a called or lazy rule by name (§3, §4.6): push a scope, bind
    /// parameters positionally, instantiate and bind each target pattern,
    /// pop, and return the created target objects. Trace links are not
    /// recorded for called rules (only matched rules build the trace).
    pub fn execute_called_rule<M: Metamodel>(
        &self,
        ctx: &mut ExecutionContext<M>,
        name: &Name,
        args: Vec<Value>,
        stats: &mut Statistics,
    ) -> CoreResult<Vec<crate::metamodel::ObjectRef>> {
        let rule = self
            .module
            .called_rules
            .get(name)
            .ok_or_else(|| CoreError::RuntimeError(format!("no called rule named '{name}'")))?
            .clone();

        ctx.push_scope();
        for (i, param) in rule.params.iter().enumerate() {
            let v = args.get(i).cloned().unwrap_or(Value::Null);
            ctx.set_var(param.name.clone(), v);
        }

        let mut created = Vec::with_capacity(rule.targets.len());
        let result = (|| -> CoreResult<()> {
            for target in &rule.targets {
                let obj = self.instantiate_and_bind(ctx, target, stats)?;
                created.push(obj);
            }
            Ok(())
        })();

        ctx.pop_scope();
        result?;
        stats.called_rules_invoked += 1;
        Ok(created)
    }

    /// Resolve a matched-rule source type's written alias (e.g. the `IN` in
    /// `IN!Member`) through the module's declared `source_aliases` mapping
    /// to the model name the host registered via `ExecutionContext::
    /// add_source`, then resolve the classifier against that model.
    fn resolve_source<M: Metamodel>(
        &self,
        ctx: &ExecutionContext<M>,
        ty: &TypeExpr,
    ) -> CoreResult<(Name, crate::metamodel::ClassId)> {
        let (alias, class) = match ty {
            TypeExpr::Qualified(alias, class) => (alias, class),
            other => {
                return Err(CoreError::RuntimeError(format!(
                    "matched rule source type must be alias-qualified, got '{other}'"
                )));
            }
        };
        let model = self.module.source_aliases.get(alias).ok_or_else(|| {
            CoreError::RuntimeError(format!("undeclared source alias '{alias}'"))
        })?;
        let classifier = ctx
            .metamodel()
            .resolve_classifier(model.as_str(), class.as_str())
            .map_err(CoreError::Metamodel)?;
        Ok((model.clone(), classifier))
    }

    /// Same as [`Self::resolve_source`] but through `target_aliases`, for a
    /// target pattern's `OUT!Person`-style type.
    fn resolve_target<M: Metamodel>(
        &self,
        ctx: &ExecutionContext<M>,
        ty: &TypeExpr,
    ) -> CoreResult<(Name, crate::metamodel::ClassId)> {
        let (alias, class) = match ty {
            TypeExpr::Qualified(alias, class) => (alias, class),
            other => {
                return Err(CoreError::RuntimeError(format!(
                    "target pattern type must be alias-qualified, got '{other}'"
                )));
            }
        };
        let model = self.module.target_aliases.get(alias).ok_or_else(|| {
            CoreError::RuntimeError(format!("undeclared target alias '{alias}'"))
        })?;
        let classifier = ctx
            .metamodel()
            .resolve_classifier(model.as_str(), class.as_str())
            .map_err(CoreError::Metamodel)?;
        Ok((model.clone(), classifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{Position, Span};
    use crate::metamodel::memory::MemoryModel;
    use crate::metamodel::FeatureInfo;
    use crate::parser::ast::*;

    fn span() -> Span {
        Span::new(Position::new(0, 0), Position::new(0, 1))
    }

    fn family_model() -> MemoryModel {
        let mut mm = MemoryModel::new();
        mm.register_model("IN", true);
        mm.register_model("OUT", false);
        mm.register_class(
            "IN",
            "Member",
            None,
            vec![FeatureInfo {
                name: "firstName".into(),
                upper_bound: Some(1),
                containment: false,
            }],
        );
        mm.register_class(
            "OUT",
            "Person",
            None,
            vec![FeatureInfo {
                name: "fullName".into(),
                upper_bound: Some(1),
                containment: false,
            }],
        );
        mm.seed_instance("IN", "Member", vec![("firstName", Value::String("Ada".into()))]);
        mm
    }

    fn simple_module() -> Module {
        let mut source_aliases = indexmap::IndexMap::new();
        source_aliases.insert(Name::new("IN"), Name::new("IN"));
        let mut target_aliases = indexmap::IndexMap::new();
        target_aliases.insert(Name::new("OUT"), Name::new("OUT"));

        let rule = MatchedRule {
            name: Name::new("Member2Person"),
            source: SourcePattern {
                var: Name::new("m"),
                ty: TypeExpr::Qualified(Name::new("IN"), Name::new("Member")),
                guard: None,
            },
            targets: vec![TargetPattern {
                var: Name::new("p"),
                ty: TypeExpr::Qualified(Name::new("OUT"), Name::new("Person")),
                bindings: vec![PropertyBinding {
                    property: Name::new("fullName"),
                    value: Expr::Navigation(
                        Box::new(Expr::Variable(Name::new("m"), span())),
                        Name::new("firstName"),
                        span(),
                    ),
                }],
            }],
            span: span(),
        };

        Module {
            name: Name::new("Families2Persons"),
            source_aliases,
            target_aliases,
            helpers: indexmap::IndexMap::new(),
            matched_rules: vec![rule],
            called_rules: indexmap::IndexMap::new(),
            path_directives: indexmap::IndexMap::new(),
        }
    }

    #[test]
    fn matched_rule_fires_and_binds_property() {
        let mm = family_model();
        let module = simple_module();
        let vm = VirtualMachine::new(module, VmConfig::default());
        let mut ctx = ExecutionContext::new(mm);
        ctx.add_source(Name::new("IN"));
        ctx.add_target(Name::new("OUT"));

        let stats = vm.execute(&mut ctx, None);
        assert!(stats.successful, "{:?}", stats.last_error);
        assert_eq!(stats.matched_rules_fired, 1);
        assert_eq!(stats.targets_created, 1);
        assert_eq!(ctx.traces().len(), 1);
    }

    /// A rule's first target pattern binds a property by navigating through
    /// a second target pattern's variable before that variable exists,
    /// which defers the binding (§4.8). The drain still resolves it because
    /// the deferred scope snapshot shares its frames with the live scope,
    /// which gains the missing variable moments later in the same firing.
    #[test]
    fn forward_reference_to_a_sibling_target_resolves_on_drain() {
        let mut mm = family_model();
        mm.register_class(
            "OUT",
            "Person",
            None,
            vec![
                FeatureInfo { name: "fullName".into(), upper_bound: Some(1), containment: false },
                FeatureInfo { name: "peerName".into(), upper_bound: Some(1), containment: false },
            ],
        );

        let mut source_aliases = indexmap::IndexMap::new();
        source_aliases.insert(Name::new("IN"), Name::new("IN"));
        let mut target_aliases = indexmap::IndexMap::new();
        target_aliases.insert(Name::new("OUT"), Name::new("OUT"));

        let rule = MatchedRule {
            name: Name::new("Member2Person"),
            source: SourcePattern {
                var: Name::new("m"),
                ty: TypeExpr::Qualified(Name::new("IN"), Name::new("Member")),
                guard: None,
            },
            targets: vec![
                TargetPattern {
                    var: Name::new("p"),
                    ty: TypeExpr::Qualified(Name::new("OUT"), Name::new("Person")),
                    bindings: vec![PropertyBinding {
                        property: Name::new("peerName"),
                        value: Expr::Navigation(
                            Box::new(Expr::Variable(Name::new("q"), span())),
                            Name::new("fullName"),
                            span(),
                        ),
                    }],
                },
                TargetPattern {
                    var: Name::new("q"),
                    ty: TypeExpr::Qualified(Name::new("OUT"), Name::new("Person")),
                    bindings: vec![PropertyBinding {
                        property: Name::new("fullName"),
                        value: Expr::Literal(Value::String("Peer".into()), span()),
                    }],
                },
            ],
            span: span(),
        };

        let module = Module {
            name: Name::new("Families2Persons"),
            source_aliases,
            target_aliases,
            helpers: indexmap::IndexMap::new(),
            matched_rules: vec![rule],
            called_rules: indexmap::IndexMap::new(),
            path_directives: indexmap::IndexMap::new(),
        };

        let vm = VirtualMachine::new(module, VmConfig::default());
        let mut ctx = ExecutionContext::new(mm);
        ctx.add_source(Name::new("IN"));
        ctx.add_target(Name::new("OUT"));

        let stats = vm.execute(&mut ctx, None);
        assert!(stats.successful, "{:?}", stats.last_error);
        assert_eq!(stats.lazy_bindings_resolved, 1);
        assert!(ctx.lazy_queue_is_empty());

        let person = ctx.metamodel().resolve_classifier("OUT", "Person").unwrap();
        let created = ctx.metamodel().instances_of("OUT", &person).unwrap();
        assert_eq!(created.len(), 2);
        let p = created[0];
        assert_eq!(
            ctx.metamodel().read_feature(p, "peerName").unwrap().as_str(),
            Some("Peer")
        );
    }
}
