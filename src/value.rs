//! The runtime value union (§3 `Value`) and the collection kinds it carries.

use crate::base::Name;
use crate::metamodel::ObjectRef;
use indexmap::IndexMap;
use std::fmt;

/// One of the four OCL-style collection kinds.
///
/// `Sequence`/`Bag` preserve duplicates and insertion order; `Set`/
/// `OrderedSet` deduplicate on construction, keeping the first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Sequence,
    Set,
    Bag,
    OrderedSet,
}

impl CollectionKind {
    pub fn is_unique(self) -> bool {
        matches!(self, Self::Set | Self::OrderedSet)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sequence => "Sequence",
            Self::Set => "Set",
            Self::Bag => "Bag",
            Self::OrderedSet => "OrderedSet",
        }
    }
}

/// A tagged runtime value (§3).
///
/// `Collection` carries its kind alongside the element vector so dedup
/// semantics and iteration order travel with the value rather than being
/// inferred elsewhere. `Tuple` is an [`IndexMap`] to preserve field
/// declaration order, as required for deterministic debugging output.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    String(String),
    Uuid(uuid::Uuid),
    ObjectRef(ObjectRef),
    Collection(CollectionKind, Vec<Value>),
    Tuple(IndexMap<Name, Value>),
    /// A type literal, e.g. `Alias!Class`, stored as its fully-qualified
    /// spelling for later resolution against a metamodel handle.
    Type(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "OclVoid",
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Integer",
            Value::Real(_) => "Real",
            Value::String(_) => "String",
            Value::Uuid(_) => "UUID",
            Value::ObjectRef(_) => "Object",
            Value::Collection(kind, _) => kind.name(),
            Value::Tuple(_) => "Tuple",
            Value::Type(_) => "OclType",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Widen an `Int`/`Real` value to `f64`; returns `None` for anything else.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<(CollectionKind, &[Value])> {
        match self {
            Value::Collection(kind, elems) => Some((*kind, elems.as_slice())),
            _ => None,
        }
    }

    pub fn as_object_ref(&self) -> Option<ObjectRef> {
        match self {
            Value::ObjectRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Build a collection value, deduplicating by structural equality (first
    /// occurrence kept) when `kind` demands uniqueness.
    pub fn collection(kind: CollectionKind, elems: Vec<Value>) -> Value {
        if kind.is_unique() {
            let mut deduped: Vec<Value> = Vec::with_capacity(elems.len());
            for elem in elems {
                if !deduped.iter().any(|existing| values_equal(existing, &elem)) {
                    deduped.push(elem);
                }
            }
            Value::Collection(kind, deduped)
        } else {
            Value::Collection(kind, elems)
        }
    }
}

/// Structural equality per §3: `Null` equals only `Null`; `Int`/`Real` compare
/// via widened `Real`; collections compare kind-and-element-wise in order
/// (this is positional equality, not multiset equality — callers that want
/// multiset comparisons, e.g. the `select`/`reject`/`union` testable
/// property, do their own counting); everything else must match variant and
/// value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(_) | Value::Real(_), Value::Int(_) | Value::Real(_)) => {
            a.as_f64() == b.as_f64()
        }
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Uuid(x), Value::Uuid(y)) => x == y,
        (Value::ObjectRef(x), Value::ObjectRef(y)) => x == y,
        (Value::Collection(k1, e1), Value::Collection(k2, e2)) => {
            k1 == k2
                && e1.len() == e2.len()
                && e1.iter().zip(e2.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Value::Tuple(x), Value::Tuple(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|((kx, vx), (ky, vy))| kx == ky && values_equal(vx, vy))
        }
        (Value::Type(x), Value::Type(y)) => x == y,
        _ => false,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::String(s) => write!(f, "'{s}'"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::ObjectRef(id) => write!(f, "{id}"),
            Value::Collection(kind, elems) => {
                write!(f, "{}{{", kind.name())?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "}}")
            }
            Value::Tuple(fields) => {
                write!(f, "Tuple{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} = {v}")?;
                }
                write!(f, "}}")
            }
            Value::Type(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_equals_only_null() {
        assert!(values_equal(&Value::Null, &Value::Null));
        assert!(!values_equal(&Value::Null, &Value::Int(0)));
        assert!(!values_equal(&Value::Int(0), &Value::Null));
    }

    #[test]
    fn mixed_mode_numeric_equality() {
        assert!(values_equal(&Value::Int(2), &Value::Real(2.0)));
        assert!(!values_equal(&Value::Int(2), &Value::Real(2.1)));
    }

    #[test]
    fn set_dedups_preserving_first_occurrence() {
        let v = Value::collection(
            CollectionKind::Set,
            vec![Value::Int(1), Value::Int(2), Value::Int(1), Value::Int(3)],
        );
        match v {
            Value::Collection(CollectionKind::Set, elems) => {
                assert_eq!(elems.len(), 3);
                assert_eq!(elems[0].as_i64(), Some(1));
                assert_eq!(elems[1].as_i64(), Some(2));
                assert_eq!(elems[2].as_i64(), Some(3));
            }
            _ => panic!("expected a Set"),
        }
    }

    #[test]
    fn sequence_preserves_duplicates() {
        let v = Value::collection(CollectionKind::Sequence, vec![Value::Int(1), Value::Int(1)]);
        match v {
            Value::Collection(CollectionKind::Sequence, elems) => assert_eq!(elems.len(), 2),
            _ => panic!("expected a Sequence"),
        }
    }

    #[test]
    fn tuple_equality_is_order_independent_of_insertion_but_field_sensitive() {
        let mut a = IndexMap::new();
        a.insert(Name::new("x"), Value::Int(1));
        let mut b = IndexMap::new();
        b.insert(Name::new("x"), Value::Int(1));
        assert!(values_equal(&Value::Tuple(a), &Value::Tuple(b)));
    }
}
