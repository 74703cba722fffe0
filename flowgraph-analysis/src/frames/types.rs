//! Frame tree data — lexical nesting, effect sets, resolution side
//! tables shared between the two passes.

use smallvec::SmallVec;

use flowgraph_core::types::collections::{FxHashMap, FxHashSet};

use crate::ast::NodeId;
use crate::klass::{KlassId, KlassTable, MethodId};
use crate::scopes::{Ref, RefSet, ScopeId, ScopeTree};

/// Index of a frame within one method's [`FrameTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub u32);

/// What kind of construct a frame mirrors, which decides where
/// non-local exits land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLabel {
    /// Plain nesting (blocks, branches, cases).
    Block,
    /// Loop or switch body: targets of unlabeled `break`/`continue`.
    Breakable,
    /// A labeled statement: target of `break label`/`continue label`.
    Labeled(String),
    /// The method root: target of `return` and uncaught throws.
    Returnable,
    /// A catch clause for one exception type.
    Catch,
}

#[derive(Debug)]
pub struct Frame {
    pub id: FrameId,
    pub parent: Option<FrameId>,
    pub label: FrameLabel,
    /// The caught type, for `Catch` frames.
    pub catch_klass: Option<KlassId>,
    /// The scope this construct introduced; its locals do not leak into
    /// enclosing frames.
    pub scope: Option<ScopeId>,
    /// Refs read in this construct or an inner one.
    pub inputs: RefSet,
    /// Refs written in this construct or an inner one.
    pub outputs: RefSet,
    /// Resolved callees whose effects fold in after the fixpoint.
    pub call_sites: SmallVec<[MethodId; 4]>,
    children: FxHashMap<NodeId, FrameId>,
    child_order: Vec<FrameId>,
}

/// The lexical-nesting tree of one method, built by the first pass and
/// consumed read-only by the graph pass.
#[derive(Debug)]
pub struct FrameTree {
    frames: Vec<Frame>,
}

impl FrameTree {
    pub const ROOT: FrameId = FrameId(0);

    /// Create the tree with its returnable root.
    pub fn new() -> Self {
        Self {
            frames: vec![Frame {
                id: Self::ROOT,
                parent: None,
                label: FrameLabel::Returnable,
                catch_klass: None,
                scope: None,
                inputs: RefSet::new(),
                outputs: RefSet::new(),
                call_sites: SmallVec::new(),
                children: FxHashMap::default(),
                child_order: Vec::new(),
            }],
        }
    }

    pub fn frame(&self, id: FrameId) -> &Frame {
        &self.frames[id.0 as usize]
    }

    pub fn frame_mut(&mut self, id: FrameId) -> &mut Frame {
        &mut self.frames[id.0 as usize]
    }

    /// Create a child frame attached to a syntax node.
    pub fn add_child(
        &mut self,
        parent: FrameId,
        node: NodeId,
        label: FrameLabel,
        catch_klass: Option<KlassId>,
        scope: Option<ScopeId>,
    ) -> FrameId {
        if let Some(&existing) = self.frames[parent.0 as usize].children.get(&node) {
            return existing;
        }
        let id = FrameId(self.frames.len() as u32);
        self.frames.push(Frame {
            id,
            parent: Some(parent),
            label,
            catch_klass,
            scope,
            inputs: RefSet::new(),
            outputs: RefSet::new(),
            call_sites: SmallVec::new(),
            children: FxHashMap::default(),
            child_order: Vec::new(),
        });
        self.frames[parent.0 as usize].children.insert(node, id);
        self.frames[parent.0 as usize].child_order.push(id);
        id
    }

    /// Fetch the child frame the first pass created for a syntax node.
    pub fn child_of(&self, parent: FrameId, node: NodeId) -> Option<FrameId> {
        self.frames[parent.0 as usize].children.get(&node).copied()
    }

    /// Nearest enclosing target of a `break`/`continue`. Unlabeled
    /// jumps find the nearest breakable construct, skipping labeled
    /// wrappers; labeled jumps find the matching label.
    pub fn find_jump_target(&self, from: FrameId, label: Option<&str>) -> Option<FrameId> {
        let mut cur = Some(from);
        while let Some(id) = cur {
            let f = self.frame(id);
            match (&f.label, label) {
                (FrameLabel::Breakable, None) => return Some(id),
                (FrameLabel::Labeled(l), Some(want)) if l == want => return Some(id),
                _ => {}
            }
            cur = f.parent;
        }
        None
    }

    /// Nearest enclosing catch frame whose declared type is a supertype
    /// of the thrown type; the method root when nothing catches it.
    pub fn find_catch_target(
        &self,
        from: FrameId,
        thrown: Option<KlassId>,
        table: &KlassTable,
    ) -> FrameId {
        let mut cur = Some(from);
        while let Some(id) = cur {
            let f = self.frame(id);
            if let Some(catch) = f.catch_klass {
                match thrown {
                    Some(t) if table.subclass_distance(t, catch).is_some() => return id,
                    // An unknown thrown type conservatively stops at the
                    // first handler.
                    None => return id,
                    _ => {}
                }
            }
            if f.label == FrameLabel::Returnable {
                return id;
            }
            cur = f.parent;
        }
        Self::ROOT
    }

    /// The frames from `from` up to and including `target`.
    pub fn path_to(&self, from: FrameId, target: FrameId) -> Vec<FrameId> {
        let mut out = Vec::new();
        let mut cur = Some(from);
        while let Some(id) = cur {
            out.push(id);
            if id == target {
                break;
            }
            cur = self.frame(id).parent;
        }
        out
    }

    /// All frames, in creation order.
    pub fn all_frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    /// Refs both read and written across a frame — the loop-carried set.
    pub fn ins_and_outs(&self, id: FrameId) -> RefSet {
        let f = self.frame(id);
        f.inputs.intersection(&f.outputs).cloned().collect()
    }

    /// Fold descendants' effects and resolved call effects upward.
    ///
    /// Runs once, after the cross-method effect fixpoint. A child's refs
    /// merge into its parent minus anything local to the child's own
    /// scope; call sites contribute the input refs of the resolved
    /// method and every transitive overrider.
    pub fn seal(&mut self, table: &KlassTable, scopes: &ScopeTree) {
        self.seal_frame(Self::ROOT, table, scopes);
    }

    fn seal_frame(&mut self, id: FrameId, table: &KlassTable, scopes: &ScopeTree) {
        let children = self.frame(id).child_order.clone();
        for child in &children {
            self.seal_frame(*child, table, scopes);
        }
        let mut inputs = self.frame(id).inputs.clone();
        let mut outputs = self.frame(id).outputs.clone();
        for callee in self.frame(id).call_sites.clone() {
            for m in table.override_closure(callee) {
                inputs.extend(
                    table
                        .method(m)
                        .input_refs
                        .iter()
                        .filter(|r| r.is_exported_effect())
                        .cloned(),
                );
            }
        }
        for child in children {
            let child_scope = self.frame(child).scope;
            let keep = |r: &Ref| match child_scope {
                Some(s) => !scopes.is_local_to(r, s),
                None => true,
            };
            inputs.extend(self.frame(child).inputs.iter().cloned().filter(|r| keep(r)));
            outputs.extend(self.frame(child).outputs.iter().cloned().filter(|r| keep(r)));
        }
        let f = self.frame_mut(id);
        f.inputs = inputs;
        f.outputs = outputs;
    }
}

impl Default for FrameTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolution facts the first pass memoizes for the graph pass, keyed
/// by syntax node id. The graph pass never consults the klass table
/// directly.
#[derive(Debug, Default)]
pub struct Resolutions {
    /// Call expression → resolved method.
    pub calls: FxHashMap<NodeId, MethodId>,
    /// Call expressions downgraded to unknown-effect placeholders.
    pub unknown_calls: FxHashSet<NodeId>,
    /// Name/field/array expressions → the ref they read or write.
    pub refs: FxHashMap<NodeId, Ref>,
    /// Sub-expressions that turned out to denote a type, not a value.
    pub type_qualifiers: FxHashSet<NodeId>,
    /// `throw` statement → its exception slot and target frame.
    pub throws: FxHashMap<NodeId, (Ref, FrameId)>,
    /// Call expression → declared-exception exits it may raise.
    pub call_throws: FxHashMap<NodeId, Vec<(Ref, FrameId)>>,
    /// Lambda expression → (original outer local, captured snapshot).
    pub lambdas: FxHashMap<NodeId, Vec<(Ref, Ref)>>,
}
