//! Graph node/edge types and the per-method graph container.

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use flowgraph_core::types::Span;

use crate::klass::MethodId;
use crate::scopes::Ref;

/// What a node computes or marks.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Invisible plumbing: an open read inside a sub-component, spliced
    /// out by pruning once its producer is known.
    Link,
    /// A value entering the method boundary.
    Input,
    /// A value leaving the method boundary.
    Output,
    Const {
        text: String,
    },
    Assign,
    Unary {
        op: String,
        prefix: bool,
    },
    Binary {
        op: String,
    },
    FieldAccess,
    FieldAssign,
    ArrayAccess,
    ArrayAssign,
    ArrayValue {
        len: u32,
    },
    /// For-each iteration value drawn from an iterable.
    Iter,
    Cast {
        ty: String,
    },
    InstanceOf {
        ty: String,
    },
    /// Switch-case witness; carries its match count.
    Case {
        matches: u32,
    },
    /// Control-dependent merge of one ref's divergent values.
    Join {
        has_true: bool,
        has_false: bool,
    },
    LoopBegin,
    LoopRepeat,
    LoopEnd,
    Call {
        name: String,
        signature: Option<String>,
        /// Resolution failed; conservatively reads/writes anything.
        unknown_effect: bool,
    },
    New {
        ty: String,
        signature: Option<String>,
        unknown_effect: bool,
    },
    /// Exception raise.
    Throw,
    /// Opaque closure value over captured refs.
    Lambda {
        captures: u32,
    },
}

impl NodeKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Input => "input",
            Self::Output => "output",
            Self::Const { .. } => "const",
            Self::Assign => "assign",
            Self::Unary { .. } => "unary",
            Self::Binary { .. } => "binary",
            Self::FieldAccess => "fieldaccess",
            Self::FieldAssign => "fieldassign",
            Self::ArrayAccess => "arrayaccess",
            Self::ArrayAssign => "arrayassign",
            Self::ArrayValue { .. } => "arrayvalue",
            Self::Iter => "iter",
            Self::Cast { .. } => "cast",
            Self::InstanceOf { .. } => "instanceof",
            Self::Case { .. } => "case",
            Self::Join { .. } => "join",
            Self::LoopBegin => "begin",
            Self::LoopRepeat => "repeat",
            Self::LoopEnd => "end",
            Self::Call { .. } => "call",
            Self::New { .. } => "new",
            Self::Throw => "throw",
            Self::Lambda { .. } => "lambda",
        }
    }

    /// Extra payload for export: operator, literal text, type, or the
    /// resolved signature.
    pub fn data(&self) -> Option<String> {
        match self {
            Self::Const { text } => Some(text.clone()),
            Self::Unary { op, prefix } => Some(if *prefix {
                format!("{op}_")
            } else {
                format!("_{op}")
            }),
            Self::Binary { op } => Some(op.clone()),
            Self::ArrayValue { len } => Some(len.to_string()),
            Self::Cast { ty } | Self::InstanceOf { ty } => Some(ty.clone()),
            Self::Case { matches } => Some(if *matches == 0 {
                "default".to_string()
            } else {
                format!("case({matches})")
            }),
            Self::Call {
                name,
                signature,
                unknown_effect,
            } => Some(match (signature, unknown_effect) {
                (Some(sig), _) => sig.clone(),
                (None, true) => format!("{name}!?"),
                (None, false) => name.clone(),
            }),
            Self::New { ty, signature, .. } => {
                Some(signature.clone().unwrap_or_else(|| ty.clone()))
            }
            Self::Lambda { captures } => Some(captures.to_string()),
            _ => None,
        }
    }
}

/// Labeled edge from producer to consumer; the label disambiguates
/// multi-input nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeLabel {
    /// The default single value input.
    Value,
    L,
    R,
    Cond,
    True,
    False,
    Enter,
    Repeat,
    /// Structural begin↔end pairing of a loop quad (not value inputs).
    BeginMark,
    EndMark,
    /// End-of-iteration value feeding the repeat node.
    Loop,
    Obj,
    Array,
    Index,
    Arg(u32),
    Elem(u32),
    Match(u32),
    Exc(u32),
    /// A call's read of one of its effective input refs.
    RefRead(String),
}

impl std::fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value => Ok(()),
            Self::L => write!(f, "L"),
            Self::R => write!(f, "R"),
            Self::Cond => write!(f, "cond"),
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Enter => write!(f, "enter"),
            Self::Repeat => write!(f, "repeat"),
            Self::BeginMark => write!(f, "_begin"),
            Self::EndMark => write!(f, "_end"),
            Self::Loop => write!(f, "_loop"),
            Self::Obj => write!(f, "obj"),
            Self::Array => write!(f, "array"),
            Self::Index => write!(f, "index"),
            Self::Arg(i) => write!(f, "arg{i}"),
            Self::Elem(i) => write!(f, "elem{i}"),
            Self::Match(i) => write!(f, "match{i}"),
            Self::Exc(i) => write!(f, "exc{i}"),
            Self::RefRead(name) => write!(f, "ref:{name}"),
        }
    }
}

/// One program-graph vertex.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    /// The storage location this node produces a value for, if any.
    pub ref_: Option<Ref>,
    pub span: Option<Span>,
}

/// The dataflow graph of one method. Owns its nodes; stable indices
/// double as exported node ids and survive pruning.
#[derive(Debug)]
pub struct Graph {
    pub graph: StableDiGraph<NodeData, EdgeLabel>,
    pub method: MethodId,
    pub signature: String,
}

impl Graph {
    pub fn new(method: MethodId, signature: String) -> Self {
        Self {
            graph: StableDiGraph::new(),
            method,
            signature,
        }
    }

    pub fn add(&mut self, kind: NodeKind, ref_: Option<Ref>, span: Option<Span>) -> NodeIndex {
        self.graph.add_node(NodeData { kind, ref_, span })
    }

    pub fn connect(&mut self, producer: NodeIndex, consumer: NodeIndex, label: EdgeLabel) {
        self.graph.add_edge(producer, consumer, label);
    }

    pub fn node(&self, ix: NodeIndex) -> &NodeData {
        &self.graph[ix]
    }

    /// Producers feeding a node, with labels.
    pub fn inputs_of(&self, ix: NodeIndex) -> Vec<(NodeIndex, EdgeLabel)> {
        self.graph
            .edges_directed(ix, Direction::Incoming)
            .map(|e| (e.source(), e.weight().clone()))
            .collect()
    }

    /// Wire one side of a join, tracking closure state.
    pub fn join_recv(&mut self, join: NodeIndex, cond: bool, producer: NodeIndex) {
        self.connect(
            producer,
            join,
            if cond { EdgeLabel::True } else { EdgeLabel::False },
        );
        if let NodeKind::Join {
            has_true,
            has_false,
        } = &mut self.graph[join].kind
        {
            if cond {
                *has_true = true;
            } else {
                *has_false = true;
            }
        }
    }

    pub fn join_is_closed(&self, join: NodeIndex) -> bool {
        matches!(
            self.graph[join].kind,
            NodeKind::Join {
                has_true: true,
                has_false: true,
            }
        )
    }

    /// Feed the missing sides of a join from a default producer.
    pub fn join_close(&mut self, join: NodeIndex, producer: NodeIndex) {
        let (has_true, has_false) = match self.graph[join].kind {
            NodeKind::Join {
                has_true,
                has_false,
            } => (has_true, has_false),
            _ => return,
        };
        if !has_true {
            self.join_recv(join, true, producer);
        }
        if !has_false {
            self.join_recv(join, false, producer);
        }
    }

    /// Dead-node pruning. Splices link nodes out (reconnecting their
    /// consumers to their producer) and drops orphaned plumbing;
    /// producer-less links that still feed program nodes become
    /// boundary inputs. Program nodes are never removed.
    pub fn prune(&mut self) {
        loop {
            let links: Vec<NodeIndex> = self
                .graph
                .node_indices()
                .filter(|&ix| matches!(self.graph[ix].kind, NodeKind::Link))
                .collect();
            if links.is_empty() {
                break;
            }
            let mut changed = false;
            for ix in links {
                let producer = self
                    .graph
                    .edges_directed(ix, Direction::Incoming)
                    .map(|e| e.source())
                    .next();
                let consumers: Vec<(NodeIndex, EdgeLabel)> = self
                    .graph
                    .edges_directed(ix, Direction::Outgoing)
                    .map(|e| (e.target(), e.weight().clone()))
                    .collect();
                match producer {
                    Some(p) => {
                        for (c, label) in consumers {
                            self.graph.add_edge(p, c, label);
                        }
                        self.graph.remove_node(ix);
                        changed = true;
                    }
                    None if consumers.is_empty() => {
                        self.graph.remove_node(ix);
                        changed = true;
                    }
                    None => {
                        // An open read with no producer: surface it as a
                        // boundary input instead of dropping dataflow.
                        self.graph[ix].kind = NodeKind::Input;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Nodes of one kind tag, in id order (tests, summaries).
    pub fn nodes_tagged(&self, tag: &str) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&ix| self.graph[ix].kind.tag() == tag)
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> Graph {
        Graph::new(MethodId(0), "T.t()".into())
    }

    #[test]
    fn test_link_splicing() {
        let mut g = graph();
        let a = g.add(NodeKind::Const { text: "1".into() }, None, None);
        let link = g.add(NodeKind::Link, None, None);
        let b = g.add(NodeKind::Assign, None, None);
        g.connect(a, link, EdgeLabel::Value);
        g.connect(link, b, EdgeLabel::Value);
        g.prune();
        assert_eq!(g.node_count(), 2);
        let inputs = g.inputs_of(b);
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].0, a);
    }

    #[test]
    fn test_producerless_link_becomes_input() {
        let mut g = graph();
        let link = g.add(NodeKind::Link, None, None);
        let b = g.add(NodeKind::Assign, None, None);
        g.connect(link, b, EdgeLabel::Value);
        g.prune();
        assert_eq!(g.node_count(), 2);
        assert!(matches!(g.node(link).kind, NodeKind::Input));
    }

    #[test]
    fn test_join_closure_tracking() {
        let mut g = graph();
        let cond = g.add(NodeKind::Const { text: "c".into() }, None, None);
        let v = g.add(NodeKind::Const { text: "1".into() }, None, None);
        let pre = g.add(NodeKind::Const { text: "0".into() }, None, None);
        let join = g.add(
            NodeKind::Join {
                has_true: false,
                has_false: false,
            },
            None,
            None,
        );
        g.connect(cond, join, EdgeLabel::Cond);
        g.join_recv(join, true, v);
        assert!(!g.join_is_closed(join));
        g.join_close(join, pre);
        assert!(g.join_is_closed(join));
        let labels: Vec<String> = g
            .inputs_of(join)
            .into_iter()
            .map(|(_, l)| l.to_string())
            .collect();
        assert!(labels.contains(&"true".to_string()));
        assert!(labels.contains(&"false".to_string()));
        assert!(labels.contains(&"cond".to_string()));
    }
}
