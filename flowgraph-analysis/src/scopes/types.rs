//! Storage location references.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::ScopeId;

/// What a [`Ref`] refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefKind {
    /// A local variable (parameters included), owned by its scope.
    Local { scope: ScopeId },
    /// The receiver of an instance method.
    This,
    /// An instance or static field, qualified by its declaring klass.
    Field { klass: String, is_static: bool },
    /// All elements of all arrays sharing one element type. One ref per
    /// element type, globally — an intentional approximation.
    ArrayElem,
    /// The method return slot.
    Return,
    /// One slot per exception type the method may propagate.
    Exception,
    /// A read-only snapshot of an outer local captured by a lambda.
    Captured,
}

#[derive(Debug)]
struct RefData {
    kind: RefKind,
    /// Canonical, globally unique name; the sole identity.
    name: String,
    ty: String,
}

/// An addressable storage location.
///
/// Cheap to clone; identity, ordering, and hashing all follow the
/// canonical name so ref sets iterate deterministically.
#[derive(Debug, Clone)]
pub struct Ref(Arc<RefData>);

/// A deterministic set of refs, ordered by canonical name.
pub type RefSet = BTreeSet<Ref>;

impl Ref {
    fn new(kind: RefKind, name: String, ty: String) -> Self {
        Self(Arc::new(RefData { kind, name, ty }))
    }

    pub fn local(scope: ScopeId, scope_path: &str, name: &str, ty: &str) -> Self {
        Self::new(
            RefKind::Local { scope },
            format!("{scope_path}:{name}"),
            ty.to_string(),
        )
    }

    pub fn this(klass: &str) -> Self {
        Self::new(RefKind::This, format!("{klass}#this"), klass.to_string())
    }

    pub fn field(klass: &str, name: &str, is_static: bool, ty: &str) -> Self {
        Self::new(
            RefKind::Field {
                klass: klass.to_string(),
                is_static,
            },
            format!("{klass}.{name}"),
            ty.to_string(),
        )
    }

    pub fn array_elem(elem_ty: &str) -> Self {
        Self::new(
            RefKind::ArrayElem,
            format!("%{elem_ty}[]"),
            elem_ty.to_string(),
        )
    }

    pub fn return_slot(method_path: &str, ty: &str) -> Self {
        Self::new(
            RefKind::Return,
            format!("{method_path}#return"),
            ty.to_string(),
        )
    }

    pub fn exception(method_path: &str, ty: &str) -> Self {
        Self::new(
            RefKind::Exception,
            format!("{method_path}#exc:{ty}"),
            ty.to_string(),
        )
    }

    pub fn captured(lambda_path: &str, name: &str, ty: &str) -> Self {
        Self::new(
            RefKind::Captured,
            format!("{lambda_path}#cap:{name}"),
            ty.to_string(),
        )
    }

    pub fn kind(&self) -> &RefKind {
        &self.0.kind
    }

    /// Canonical name; unique across one analysis run.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Declared type name of the stored value.
    pub fn type_name(&self) -> &str {
        &self.0.ty
    }

    /// True for refs visible across method boundaries — these make up a
    /// method's aggregated effect sets. Locals, the return slot, and
    /// exception slots stay method-internal.
    pub fn is_exported_effect(&self) -> bool {
        matches!(self.0.kind, RefKind::Field { .. } | RefKind::ArrayElem)
    }

    pub fn is_local(&self) -> bool {
        matches!(self.0.kind, RefKind::Local { .. })
    }
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for Ref {}

impl PartialOrd for Ref {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ref {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.name.cmp(&other.0.name)
    }
}

impl std::hash::Hash for Ref {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl std::fmt::Display for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl Serialize for Ref {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_by_name() {
        let a = Ref::field("A", "x", false, "int");
        let b = Ref::field("A", "x", false, "int");
        let c = Ref::field("B", "x", false, "int");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_set_iterates_in_name_order() {
        let mut set = RefSet::new();
        set.insert(Ref::field("B", "y", false, "int"));
        set.insert(Ref::field("A", "x", false, "int"));
        set.insert(Ref::array_elem("int"));
        let names: Vec<_> = set.iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, vec!["%int[]", "A.x", "B.y"]);
    }

    #[test]
    fn test_array_elem_is_shared_per_type() {
        assert_eq!(Ref::array_elem("int"), Ref::array_elem("int"));
        assert_ne!(Ref::array_elem("int"), Ref::array_elem("long"));
    }

    #[test]
    fn test_exported_effects() {
        assert!(Ref::field("A", "x", true, "int").is_exported_effect());
        assert!(Ref::array_elem("int").is_exported_effect());
        assert!(!Ref::return_slot("A.f()", "int").is_exported_effect());
        assert!(!Ref::this("A").is_exported_effect());
    }
}
