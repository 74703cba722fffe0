//! Per-method output records.
//!
//! One record per analyzed method: signature, boundary effect sets,
//! override/caller links, and the full node/edge list. Enough structure
//! to regenerate any external serialization losslessly; the actual
//! text format is a presentation concern outside this crate.

use serde::Serialize;

use flowgraph_core::types::Span;

use crate::graph::Graph;
use crate::klass::KlassTable;

#[derive(Debug, Clone, Serialize)]
pub struct NodeRecord {
    /// Stable node id within this method's graph.
    pub id: u32,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Canonical name of the ref this node produces a value for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeRecord {
    pub producer: u32,
    pub consumer: u32,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub klass: Option<String>,
    pub name: String,
    pub signature: String,
    /// Aggregated cross-method reads at the method boundary.
    pub input_refs: Vec<String>,
    /// Aggregated cross-method writes at the method boundary.
    pub output_refs: Vec<String>,
    /// Signatures of methods calling this one.
    pub callers: Vec<String>,
    /// Signatures this method overrides.
    pub overrides: Vec<String>,
    /// Signatures overriding this method.
    pub overridden_by: Vec<String>,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

/// Flatten a built graph plus its method record into the output form.
pub fn summarize(table: &KlassTable, graph: &Graph) -> MethodSummary {
    let method = table.method(graph.method);
    let klass = method.klass.map(|k| table.klass(k).qualified.clone());

    let mut nodes: Vec<NodeRecord> = graph
        .graph
        .node_indices()
        .map(|ix| {
            let n = graph.node(ix);
            NodeRecord {
                id: ix.index() as u32,
                kind: n.kind.tag().to_string(),
                data: n.kind.data(),
                ref_name: n.ref_.as_ref().map(|r| r.name().to_string()),
                span: n.span,
            }
        })
        .collect();
    nodes.sort_by_key(|n| n.id);

    let mut edges: Vec<EdgeRecord> = Vec::new();
    for e in graph.graph.edge_indices() {
        if let Some((src, dst)) = graph.graph.edge_endpoints(e) {
            edges.push(EdgeRecord {
                producer: src.index() as u32,
                consumer: dst.index() as u32,
                label: graph.graph[e].to_string(),
            });
        }
    }
    edges.sort_by(|a, b| {
        (a.consumer, a.producer, &a.label).cmp(&(b.consumer, b.producer, &b.label))
    });

    MethodSummary {
        klass,
        name: method.name.clone(),
        signature: method.signature.clone(),
        input_refs: method.input_refs.iter().map(|r| r.name().to_string()).collect(),
        output_refs: method.output_refs.iter().map(|r| r.name().to_string()).collect(),
        callers: method
            .callers
            .iter()
            .map(|&m| table.method(m).signature.clone())
            .collect(),
        overrides: method
            .overrides
            .iter()
            .map(|&m| table.method(m).signature.clone())
            .collect(),
        overridden_by: method
            .overriders
            .iter()
            .map(|&m| table.method(m).signature.clone())
            .collect(),
        nodes,
        edges,
    }
}
