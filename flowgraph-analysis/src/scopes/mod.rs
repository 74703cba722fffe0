//! Reference and scope model.
//!
//! A [`Ref`] names a storage location; a [`ScopeTree`] is the lexical
//! namespace that owns local refs for one method. Both are pure data:
//! control logic lives in the frame and graph passes.

pub mod types;

use flowgraph_core::types::collections::FxHashMap;

use crate::ast::NodeId;

pub use types::{Ref, RefKind, RefSet};

/// Index of a scope within one method's [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(pub u32);

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    /// Full dotted path, used as the prefix of local ref names.
    path: String,
    bindings: FxHashMap<String, Ref>,
    children: FxHashMap<NodeId, ScopeId>,
    /// Block counter for deterministic child path segments.
    next_child: u32,
}

/// The lexical scope tree of one method.
///
/// The root is the method scope; it additionally owns the return slot
/// and the per-thrown-type exception slots. Scopes are created by the
/// frame pass and reused read-only by the graph pass, which looks
/// children up by the same [`NodeId`]s.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    return_ref: Ref,
    this_ref: Option<Ref>,
    /// Exception slots, memoized per thrown type name.
    exceptions: std::collections::BTreeMap<String, Ref>,
}

impl ScopeTree {
    /// Create the method scope. `method_path` is the canonical method
    /// signature, which prefixes every local ref name.
    pub fn new(method_path: &str, return_type: &str, this_klass: Option<&str>) -> Self {
        let root = Scope {
            parent: None,
            path: method_path.to_string(),
            bindings: FxHashMap::default(),
            children: FxHashMap::default(),
            next_child: 0,
        };
        Self {
            scopes: vec![root],
            return_ref: Ref::return_slot(method_path, return_type),
            this_ref: this_klass.map(Ref::this),
            exceptions: std::collections::BTreeMap::new(),
        }
    }

    pub const ROOT: ScopeId = ScopeId(0);

    /// Create (or fetch) the child scope attached to a syntax node.
    pub fn add_child(&mut self, parent: ScopeId, node: NodeId) -> ScopeId {
        if let Some(&existing) = self.scopes[parent.0 as usize].children.get(&node) {
            return existing;
        }
        let seq = self.scopes[parent.0 as usize].next_child;
        self.scopes[parent.0 as usize].next_child += 1;
        let path = format!("{}:b{}", self.scopes[parent.0 as usize].path, seq);
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            path,
            bindings: FxHashMap::default(),
            children: FxHashMap::default(),
            next_child: 0,
        });
        self.scopes[parent.0 as usize].children.insert(node, id);
        id
    }

    /// Fetch the child scope the frame pass created for a syntax node.
    pub fn child_of(&self, parent: ScopeId, node: NodeId) -> Option<ScopeId> {
        self.scopes[parent.0 as usize].children.get(&node).copied()
    }

    /// Install a fresh local ref. Re-declaring an identifier in a nested
    /// scope shadows the outer binding; it never errors.
    pub fn add_local(&mut self, scope: ScopeId, name: &str, ty: &str) -> Ref {
        let path = &self.scopes[scope.0 as usize].path;
        let r = Ref::local(scope, path, name, ty);
        self.scopes[scope.0 as usize]
            .bindings
            .insert(name.to_string(), r.clone());
        r
    }

    /// Resolve an identifier against this scope chain. Fields are the
    /// caller's responsibility (they live on the klass, not here).
    pub fn lookup_var(&self, scope: ScopeId, name: &str) -> Option<Ref> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let s = &self.scopes[id.0 as usize];
            if let Some(r) = s.bindings.get(name) {
                return Some(r.clone());
            }
            cur = s.parent;
        }
        None
    }

    pub fn lookup_this(&self) -> Option<Ref> {
        self.this_ref.clone()
    }

    pub fn lookup_return(&self) -> Ref {
        self.return_ref.clone()
    }

    /// Exception slot for a thrown type, created on first use.
    pub fn lookup_exception(&mut self, type_name: &str) -> Ref {
        if let Some(r) = self.exceptions.get(type_name) {
            return r.clone();
        }
        let method_path = self.scopes[0].path.clone();
        let r = Ref::exception(&method_path, type_name);
        self.exceptions.insert(type_name.to_string(), r.clone());
        r
    }

    /// All exception slots created so far, in type-name order.
    pub fn exception_refs(&self) -> impl Iterator<Item = &Ref> {
        self.exceptions.values()
    }

    /// True when `scope` is `ancestor` or lies inside it.
    pub fn is_within(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.scopes[id.0 as usize].parent;
        }
        false
    }

    /// True when a ref is a local declared inside `scope`'s subtree —
    /// such refs do not leak into enclosing frames.
    pub fn is_local_to(&self, r: &Ref, scope: ScopeId) -> bool {
        match r.kind() {
            RefKind::Local { scope: owner } => self.is_within(*owner, scope),
            _ => false,
        }
    }

    pub fn path(&self, scope: ScopeId) -> &str {
        &self.scopes[scope.0 as usize].path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeIdGen;

    fn tree() -> ScopeTree {
        ScopeTree::new("A.f(int)", "int", Some("A"))
    }

    #[test]
    fn test_shadowing_never_errors() {
        let mut t = tree();
        let mut ids = NodeIdGen::new();
        let outer = t.add_local(ScopeTree::ROOT, "x", "int");
        let inner_scope = t.add_child(ScopeTree::ROOT, ids.fresh());
        let inner = t.add_local(inner_scope, "x", "int");
        assert_ne!(outer, inner);
        assert_eq!(t.lookup_var(inner_scope, "x"), Some(inner));
        assert_eq!(t.lookup_var(ScopeTree::ROOT, "x"), Some(outer));
    }

    #[test]
    fn test_child_scope_is_stable_per_node() {
        let mut t = tree();
        let mut ids = NodeIdGen::new();
        let node = ids.fresh();
        let a = t.add_child(ScopeTree::ROOT, node);
        let b = t.add_child(ScopeTree::ROOT, node);
        assert_eq!(a, b);
        assert_eq!(t.child_of(ScopeTree::ROOT, node), Some(a));
    }

    #[test]
    fn test_exception_refs_are_memoized_and_ordered() {
        let mut t = tree();
        let io = t.lookup_exception("java.io.IOException");
        let io2 = t.lookup_exception("java.io.IOException");
        assert_eq!(io, io2);
        t.lookup_exception("java.lang.Error");
        let names: Vec<_> = t.exception_refs().map(|r| r.name().to_string()).collect();
        // BTreeMap keeps type-name order.
        assert_eq!(names.len(), 2);
        assert!(names[0].contains("java.io.IOException"));
        assert!(names[1].contains("java.lang.Error"));
    }

    #[test]
    fn test_locality() {
        let mut t = tree();
        let mut ids = NodeIdGen::new();
        let inner = t.add_child(ScopeTree::ROOT, ids.fresh());
        let local = t.add_local(inner, "tmp", "int");
        let outer_local = t.add_local(ScopeTree::ROOT, "x", "int");
        assert!(t.is_local_to(&local, inner));
        assert!(!t.is_local_to(&outer_local, inner));
        assert!(t.is_local_to(&outer_local, ScopeTree::ROOT));
    }
}
