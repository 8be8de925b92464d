//! The metamodel interface (§6): the collaborator contract the core
//! consumes for classes, features, and instances.
//!
//! This is deliberately a small trait, not a full reflective type system —
//! the actual object store (an EMF-like typed object graph, XMI loading,
//! etc.) lives outside this crate. What's here is the seam: everything C2
//! through C8 talk to models only through [`Metamodel`].

pub mod memory;

use crate::error::MetamodelError;
use crate::value::Value;
use std::fmt;

/// A stable identity for an object living in some model/resource.
///
/// Carries the alias of the model it was created in so the core can
/// resolve it back to the right [`Metamodel`] call without threading an
/// extra parameter through every evaluator frame. The `u64` is an opaque
/// arena slot — "the object graph is cyclic... represented by stable ids
/// in an arena; pointer-style ownership is not used" (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub model: u32,
    pub id: u64,
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.model, self.id)
    }
}

/// A classifier (class) identity: the qualified name the metamodel
/// resolved a bare class name to, e.g. `Families!Member`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassId(pub String);

impl ClassId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A structural feature (attribute or reference) of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureInfo {
    pub name: String,
    /// `None` means unbounded (`*`).
    pub upper_bound: Option<u32>,
    pub containment: bool,
}

/// The metamodel interface the core consumes (§6).
///
/// Implementations back one or more named model resources (source models
/// are read-only to the core; target models are mutated only through
/// `create_instance`/`write_feature`). All operations that can fail return
/// the fixed error taxonomy from §6/§7 (`ReadOnlyModel`, `UnknownClass`,
/// `UnknownFeature`, `WrongKind`).
pub trait Metamodel {
    /// Resolve a classifier by simple name within a named model alias,
    /// including walking into that model's declared package.
    fn resolve_classifier(&self, model_alias: &str, class_name: &str)
        -> Result<ClassId, MetamodelError>;

    /// List the structural features of a class.
    fn features(&self, class: &ClassId) -> Result<Vec<FeatureInfo>, MetamodelError>;

    /// Whether `sub` is `sup` or a (possibly transitive) subclass of `sup`.
    fn is_kind_of(&self, sub: &ClassId, sup: &ClassId) -> bool;

    /// Create a new instance of `class` in the named target model.
    fn create_instance(
        &mut self,
        model_alias: &str,
        class: &ClassId,
    ) -> Result<ObjectRef, MetamodelError>;

    /// Read a feature value on an instance.
    fn read_feature(&self, obj: ObjectRef, feature: &str) -> Result<Value, MetamodelError>;

    /// Write a feature value on an instance. Fails with `ReadOnlyModel` if
    /// the instance's owning model was registered as a source.
    fn write_feature(
        &mut self,
        obj: ObjectRef,
        feature: &str,
        value: Value,
    ) -> Result<(), MetamodelError>;

    /// The class of an already-created instance.
    fn class_of(&self, obj: ObjectRef) -> Result<ClassId, MetamodelError>;

    /// All instances of `class` (including subclasses) in the named model,
    /// in a deterministic, insertion-consistent order (§4.7).
    fn instances_of(
        &self,
        model_alias: &str,
        class: &ClassId,
    ) -> Result<Vec<ObjectRef>, MetamodelError>;

    /// Resolve an object by identity across a given named resource. Used
    /// when a lazy binding is drained against a target that may live in a
    /// different target model than the one that originally created it.
    fn resolve(&self, model_alias: &str, obj: ObjectRef) -> Result<ObjectRef, MetamodelError>;
}
