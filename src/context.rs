//! The scoped execution context (§3 `ExecutionContext`, §4.4): variable
//! scopes, the helper registry, trace links, and the lazy-binding queue.
//!
//! Grounded on `src/semantic/symbol_table/scope.rs`'s `Scope { parent,
//! symbols, children }` tree, adapted from a tree of scopes to the linear
//! push/pop stack §4.4/§9 describe ("a stack of ordered maps... push/pop
//! is RAII-like").

use crate::base::Name;
use crate::error::{CoreError, CoreResult};
use crate::metamodel::{Metamodel, ObjectRef};
use crate::parser::ast::{Expr, Helper};
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// One scope frame. Shared via `Rc<RefCell<_>>` rather than cloned by value
/// so that a lazy binding's captured snapshot (§4.8) keeps seeing bindings
/// written to a still-live frame after the snapshot was taken — e.g. a
/// sibling target pattern of the same rule firing that hasn't bound its
/// variable yet when an earlier target's binding expression is deferred.
pub type ScopeFrame = Rc<RefCell<IndexMap<Name, Value>>>;

/// An immutable record binding the source object that caused a matched-rule
/// firing to the target objects it produced (§3 "Trace link").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLink {
    pub rule: Name,
    pub source: ObjectRef,
    pub targets: Vec<ObjectRef>,
}

/// A deferred property assignment, enqueued when its value expression fails
/// with a recoverable error during the main pass (§3, §4.8).
///
/// `scope_snapshot` captures the scope stack at the moment of enqueueing
/// (§9's "recommended" option) rather than relying on drain-time state,
/// which is otherwise empty once the main pass has finished. Because each
/// frame is a shared cell, a binding that a sibling target pattern writes
/// into one of these frames before it is popped is still visible when the
/// binding is replayed at drain time.
#[derive(Debug, Clone)]
pub struct LazyBinding {
    pub target: ObjectRef,
    pub property: Name,
    pub expr: Expr,
    pub scope_snapshot: Vec<ScopeFrame>,
}

/// Owns everything scoped to a single `execute()` call (§3 "Lifetime: one
/// per `execute()` call; cleared between calls"): the variable scope
/// stack, the helper registry, trace links, the lazy-binding FIFO queue,
/// and the metamodel handle both sides of the transformation talk to.
pub struct ExecutionContext<M: Metamodel> {
    metamodel: M,
    scopes: Vec<ScopeFrame>,
    helpers: IndexMap<Name, Helper>,
    traces: Vec<TraceLink>,
    lazy_queue: VecDeque<LazyBinding>,
    source_aliases: Vec<Name>,
    target_aliases: Vec<Name>,
    helper_invocations: u64,
    navigations: u64,
}

impl<M: Metamodel> ExecutionContext<M> {
    pub fn new(metamodel: M) -> Self {
        Self {
            metamodel,
            scopes: vec![Rc::new(RefCell::new(IndexMap::new()))],
            helpers: IndexMap::new(),
            traces: Vec::new(),
            lazy_queue: VecDeque::new(),
            source_aliases: Vec::new(),
            target_aliases: Vec::new(),
            helper_invocations: 0,
            navigations: 0,
        }
    }

    // -- scopes -----------------------------------------------------------

    /// Push a fresh, empty scope (§4.4: around helper bodies, `let`,
    /// lambda evaluation, `iterate`, and each matched-rule application).
    pub fn push_scope(&mut self) {
        self.scopes.push(Rc::new(RefCell::new(IndexMap::new())));
    }

    /// Pop the current scope, restoring the previous one. The outermost
    /// (module-level) scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn set_var(&mut self, name: Name, value: Value) {
        self.scopes
            .last()
            .expect("scope stack is never empty")
            .borrow_mut()
            .insert(name, value);
    }

    /// Look up a variable: current scope first, then walk the stack from
    /// top to bottom, returning the deepest match (§4.4).
    pub fn get_var(&self, name: &Name) -> CoreResult<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.borrow().get(name) {
                return Ok(v.clone());
            }
        }
        Err(CoreError::VariableNotFound(name.clone()))
    }

    /// Replace the whole scope stack, returning the previous one. Used by
    /// the rule engine to replay a lazy binding's captured snapshot.
    pub fn swap_scopes(&mut self, scopes: Vec<ScopeFrame>) -> Vec<ScopeFrame> {
        std::mem::replace(&mut self.scopes, scopes)
    }

    /// Snapshot the current scope stack. Cloning only bumps each frame's
    /// `Rc` refcount, so a binding written to a still-live frame after this
    /// snapshot was taken remains visible through it (§4.8).
    pub fn scopes_snapshot(&self) -> Vec<ScopeFrame> {
        self.scopes.clone()
    }

    // -- model aliases ------------------------------------------------------

    pub fn add_source(&mut self, alias: Name) {
        self.source_aliases.push(alias);
    }

    pub fn add_target(&mut self, alias: Name) {
        self.target_aliases.push(alias);
    }

    pub fn has_source_alias(&self, alias: &Name) -> bool {
        self.source_aliases.contains(alias)
    }

    pub fn has_target_alias(&self, alias: &Name) -> bool {
        self.target_aliases.contains(alias)
    }

    // -- helpers --------------------------------------------------------

    pub fn register_helper(&mut self, helper: Helper) {
        self.helpers.insert(helper.name.clone(), helper);
    }

    pub fn helper(&self, name: &Name) -> Option<&Helper> {
        self.helpers.get(name)
    }

    pub(crate) fn record_helper_invocation(&mut self) {
        self.helper_invocations += 1;
    }

    pub(crate) fn record_navigation(&mut self) {
        self.navigations += 1;
    }

    pub fn helper_invocations(&self) -> u64 {
        self.helper_invocations
    }

    pub fn navigations(&self) -> u64 {
        self.navigations
    }

    // -- trace links -------------------------------------------------------

    pub fn add_trace(&mut self, rule: Name, source: ObjectRef, targets: Vec<ObjectRef>) {
        self.traces.push(TraceLink { rule, source, targets });
    }

    pub fn traces(&self) -> &[TraceLink] {
        &self.traces
    }

    // -- lazy bindings -----------------------------------------------------

    /// Enqueue a lazy binding, capturing the current scope stack (§9).
    pub fn add_lazy_binding(&mut self, target: ObjectRef, property: Name, expr: Expr) {
        self.lazy_queue.push_back(LazyBinding {
            target,
            property,
            expr,
            scope_snapshot: self.scopes_snapshot(),
        });
    }

    pub fn lazy_queue_is_empty(&self) -> bool {
        self.lazy_queue.is_empty()
    }

    pub fn lazy_queue_len(&self) -> usize {
        self.lazy_queue.len()
    }

    /// Drain the entire queue for one resolution pass, in FIFO order.
    pub fn take_lazy_queue(&mut self) -> VecDeque<LazyBinding> {
        std::mem::take(&mut self.lazy_queue)
    }

    /// Re-enqueue an entry at the front (used when a drain pass fails and
    /// the caller wants the queue left exactly as it was for reporting).
    pub fn push_front_lazy(&mut self, binding: LazyBinding) {
        self.lazy_queue.push_front(binding);
    }

    // -- metamodel -----------------------------------------------------

    pub fn metamodel(&self) -> &M {
        &self.metamodel
    }

    pub fn metamodel_mut(&mut self) -> &mut M {
        &mut self.metamodel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{Position, Span};
    use crate::metamodel::memory::MemoryModel;

    fn ctx() -> ExecutionContext<MemoryModel> {
        ExecutionContext::new(MemoryModel::new())
    }

    #[test]
    fn variable_lookup_walks_the_scope_stack() {
        let mut c = ctx();
        c.set_var(Name::new("x"), Value::Int(1));
        c.push_scope();
        assert_eq!(c.get_var(&Name::new("x")).unwrap().as_i64(), Some(1));
        c.set_var(Name::new("x"), Value::Int(2));
        assert_eq!(c.get_var(&Name::new("x")).unwrap().as_i64(), Some(2));
        c.pop_scope();
        assert_eq!(c.get_var(&Name::new("x")).unwrap().as_i64(), Some(1));
    }

    #[test]
    fn push_then_pop_restores_prior_binding() {
        let mut c = ctx();
        c.set_var(Name::new("n"), Value::Int(10));
        let before = c.get_var(&Name::new("n")).unwrap().as_i64();
        c.push_scope();
        c.set_var(Name::new("n"), Value::Int(20));
        c.pop_scope();
        let after = c.get_var(&Name::new("n")).unwrap().as_i64();
        assert_eq!(before, after);
    }

    #[test]
    fn missing_variable_is_an_error() {
        let c = ctx();
        assert!(matches!(
            c.get_var(&Name::new("nope")),
            Err(CoreError::VariableNotFound(_))
        ));
    }

    #[test]
    fn lazy_queue_drains_in_fifo_order() {
        let mut c = ctx();
        let span = Span::new(Position::new(0, 0), Position::new(0, 1));
        let obj = ObjectRef { model: 0, id: 0 };
        c.add_lazy_binding(obj, Name::new("a"), Expr::Literal(Value::Int(1), span));
        c.add_lazy_binding(obj, Name::new("b"), Expr::Literal(Value::Int(2), span));
        let drained: Vec<_> = c.take_lazy_queue().into_iter().collect();
        assert_eq!(drained[0].property.as_str(), "a");
        assert_eq!(drained[1].property.as_str(), "b");
        assert!(c.lazy_queue_is_empty());
    }
}
