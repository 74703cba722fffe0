//! Component: the state threaded through the graph walk.
//!
//! A component is a partial graph fragment: the current producer node
//! per ref, the open reads awaiting an outer producer, the value of the
//! expression just built, and the pending non-local exits.

use std::collections::BTreeMap;

use petgraph::stable_graph::NodeIndex;

use flowgraph_core::types::collections::FxHashMap;

use crate::frames::FrameId;
use crate::scopes::Ref;

use super::types::{EdgeLabel, Graph, NodeKind};

/// A pending non-local control transfer awaiting its target frame.
#[derive(Debug, Clone)]
pub struct Exit {
    /// The value in flight (return value, exception, or a ref's value
    /// at the jump point).
    pub node: NodeIndex,
    /// The ref whose current value this exit carries.
    pub ref_: Ref,
    pub target: FrameId,
    /// True for `continue`-style exits, which loops consume.
    pub cont: bool,
}

#[derive(Debug, Default)]
pub struct Component {
    /// Current producer per ref.
    values: FxHashMap<Ref, NodeIndex>,
    /// Open reads: refs consumed before any producer was seen in this
    /// component, mapped to their placeholder link node.
    inputs: BTreeMap<Ref, NodeIndex>,
    /// Refs written in this component, with their last producer.
    outputs: BTreeMap<Ref, NodeIndex>,
    rvalue: Option<NodeIndex>,
    lvalue: Option<NodeIndex>,
    exits: Vec<Exit>,
}

impl Component {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a ref, creating an open-read link when the
    /// component has not seen a producer yet.
    pub fn value_of(&mut self, g: &mut Graph, r: &Ref) -> NodeIndex {
        if let Some(&ix) = self.values.get(r) {
            return ix;
        }
        let link = g.add(NodeKind::Link, Some(r.clone()), None);
        self.inputs.insert(r.clone(), link);
        self.values.insert(r.clone(), link);
        link
    }

    /// Current value without creating an open read.
    pub fn peek(&self, r: &Ref) -> Option<NodeIndex> {
        self.values.get(r).copied()
    }

    /// Install a value without marking the ref written (method inputs).
    pub fn preset(&mut self, r: Ref, node: NodeIndex) {
        self.values.insert(r, node);
    }

    /// Record a write: `node` becomes the ref's current producer.
    pub fn set_output(&mut self, r: Ref, node: NodeIndex) {
        self.values.insert(r.clone(), node);
        self.outputs.insert(r, node);
    }

    /// Open reads in ref-name order.
    pub fn input_refs(&self) -> impl Iterator<Item = (&Ref, NodeIndex)> {
        self.inputs.iter().map(|(r, &ix)| (r, ix))
    }

    /// Written refs in ref-name order.
    pub fn output_refs(&self) -> impl Iterator<Item = (&Ref, NodeIndex)> {
        self.outputs.iter().map(|(r, &ix)| (r, ix))
    }

    pub fn output_of(&self, r: &Ref) -> Option<NodeIndex> {
        self.outputs.get(r).copied()
    }

    pub fn set_rvalue(&mut self, node: NodeIndex) {
        self.rvalue = Some(node);
    }

    pub fn rvalue(&self) -> Option<NodeIndex> {
        self.rvalue
    }

    pub fn set_lvalue(&mut self, node: NodeIndex) {
        self.lvalue = Some(node);
    }

    pub fn lvalue(&self) -> Option<NodeIndex> {
        self.lvalue
    }

    pub fn add_exit(&mut self, exit: Exit) {
        self.exits.push(exit);
    }

    pub fn take_exits(&mut self) -> Vec<Exit> {
        std::mem::take(&mut self.exits)
    }

    pub fn exits(&self) -> &[Exit] {
        &self.exits
    }

    /// Remove and return the exits aimed at one frame, preserving order.
    pub fn drain_exits_for(&mut self, frame: FrameId) -> Vec<Exit> {
        let (hit, keep): (Vec<Exit>, Vec<Exit>) = std::mem::take(&mut self.exits)
            .into_iter()
            .partition(|e| e.target == frame);
        self.exits = keep;
        hit
    }

    /// Close out a construct: every exit aimed at `frame` lands here,
    /// its value becoming the ref's current value. Unclosed joins pick
    /// up the pre-exit value on their missing side.
    pub fn end_frame(&mut self, g: &mut Graph, frame: FrameId) {
        for exit in self.drain_exits_for(frame) {
            if matches!(g.node(exit.node).kind, NodeKind::Join { .. })
                && !g.join_is_closed(exit.node)
            {
                let fallback = self.value_of(g, &exit.ref_);
                g.join_close(exit.node, fallback);
            }
            self.set_output(exit.ref_.clone(), exit.node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::klass::MethodId;

    fn graph() -> Graph {
        Graph::new(MethodId(0), "T.t()".into())
    }

    fn local(name: &str) -> Ref {
        Ref::local(crate::scopes::ScopeId(0), "T.t()", name, "int")
    }

    #[test]
    fn test_open_read_then_write() {
        let mut g = graph();
        let mut cpt = Component::new();
        let x = local("x");
        let first = cpt.value_of(&mut g, &x);
        assert!(matches!(g.node(first).kind, NodeKind::Link));
        assert_eq!(cpt.input_refs().count(), 1);
        let assign = g.add(NodeKind::Assign, Some(x.clone()), None);
        cpt.set_output(x.clone(), assign);
        assert_eq!(cpt.value_of(&mut g, &x), assign);
        assert_eq!(cpt.output_of(&x), Some(assign));
    }

    #[test]
    fn test_end_frame_applies_exit_values() {
        let mut g = graph();
        let mut cpt = Component::new();
        let x = local("x");
        let v = g.add(NodeKind::Const { text: "1".into() }, Some(x.clone()), None);
        cpt.add_exit(Exit {
            node: v,
            ref_: x.clone(),
            target: FrameId(0),
            cont: false,
        });
        cpt.end_frame(&mut g, FrameId(0));
        assert_eq!(cpt.peek(&x), Some(v));
        assert!(cpt.exits().is_empty());
    }
}
