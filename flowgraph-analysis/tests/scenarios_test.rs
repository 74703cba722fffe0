//! End-to-end graph-shape scenarios: parse a snippet, analyze, assert
//! on the node/edge structure.

use flowgraph_analysis::graph::{EdgeLabel, Graph, NodeKind};
use flowgraph_analysis::Analyzer;

fn analyze(source: &str, klass: &str, method: &str) -> Graph {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut analyzer = Analyzer::default();
    analyzer.add_java("test.java", source).unwrap();
    let report = analyzer.build();
    assert!(report.is_clean(), "build errors: {:?}", report.errors);
    let m = analyzer
        .find_method(klass, method)
        .expect("method not found");
    analyzer.analyze_method(m).expect("analysis failed")
}

fn producers(g: &Graph, ix: petgraph::stable_graph::NodeIndex) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = g
        .inputs_of(ix)
        .into_iter()
        .map(|(p, l)| (g.node(p).kind.tag().to_string(), l.to_string()))
        .collect();
    out.sort();
    out
}

#[test]
fn test_straight_line_code() {
    // x = 1; y = x + 2; return y;
    let g = analyze(
        "class A { static int f() { int x = 1; int y = x + 2; return y; } }",
        "A",
        "f",
    );
    assert_eq!(g.nodes_tagged("const").len(), 2);
    assert_eq!(g.nodes_tagged("assign").len(), 2);
    assert_eq!(g.nodes_tagged("binary").len(), 1);
    assert_eq!(g.nodes_tagged("output").len(), 1);
    assert!(g.nodes_tagged("join").is_empty());
    assert!(g.nodes_tagged("begin").is_empty());

    // The binary op reads x's assigned value and the constant 2.
    let binop = g.nodes_tagged("binary")[0];
    let inputs = producers(&g, binop);
    assert_eq!(
        inputs,
        vec![
            ("assign".to_string(), "L".to_string()),
            ("const".to_string(), "R".to_string()),
        ]
    );

    // The output reads y's assign, which reads the binary op.
    let output = g.nodes_tagged("output")[0];
    let y_assign = g.inputs_of(output)[0].0;
    assert_eq!(g.node(y_assign).kind.tag(), "assign");
    let y_inputs = producers(&g, y_assign);
    assert_eq!(y_inputs, vec![("binary".to_string(), String::new())]);
}

#[test]
fn test_if_else_both_writing() {
    let g = analyze(
        "class A { static int f(boolean c) { int x = 0; if (c) { x = 1; } else { x = 2; } return x; } }",
        "A",
        "f",
    );
    let joins = g.nodes_tagged("join");
    assert_eq!(joins.len(), 1);
    let join = joins[0];
    let mut true_text = None;
    let mut false_text = None;
    for (p, label) in g.inputs_of(join) {
        let via_assign = match &g.node(p).kind {
            NodeKind::Assign => g
                .inputs_of(p)
                .first()
                .map(|&(v, _)| g.node(v).kind.data())
                .unwrap_or(None),
            _ => None,
        };
        match label {
            EdgeLabel::True => true_text = via_assign,
            EdgeLabel::False => false_text = via_assign,
            _ => {}
        }
    }
    assert_eq!(true_text.as_deref(), Some("1"));
    assert_eq!(false_text.as_deref(), Some("2"));
}

#[test]
fn test_if_single_branch_closes_with_pre_value() {
    let g = analyze(
        "class A { static int f(boolean c) { int x = 0; if (c) { x = 1; } return x; } }",
        "A",
        "f",
    );
    let joins = g.nodes_tagged("join");
    assert_eq!(joins.len(), 1);
    let join = joins[0];
    let false_side = g
        .inputs_of(join)
        .into_iter()
        .find(|(_, l)| *l == EdgeLabel::False)
        .expect("join not closed");
    // The not-taken path carries the pre-if value: x's initializer.
    let pre = false_side.0;
    assert_eq!(g.node(pre).kind.tag(), "assign");
    let init = producers(&g, pre);
    assert_eq!(init, vec![("const".to_string(), String::new())]);
}

#[test]
fn test_while_loop_quad() {
    let g = analyze(
        "class A { static int f(boolean c, int x) { while (c) { x = x + 1; } return x; } }",
        "A",
        "f",
    );
    let begins = g.nodes_tagged("begin");
    let repeats = g.nodes_tagged("repeat");
    let ends = g.nodes_tagged("end");
    assert_eq!(begins.len(), 1);
    assert_eq!(repeats.len(), 1);
    assert_eq!(ends.len(), 1);

    // Begin: exactly one enter and one repeat value input.
    let begin_labels: Vec<String> = g
        .inputs_of(begins[0])
        .into_iter()
        .map(|(_, l)| l.to_string())
        .filter(|l| l != "_end")
        .collect();
    let mut sorted = begin_labels.clone();
    sorted.sort();
    assert_eq!(sorted, vec!["enter", "repeat"]);

    // End: one cond witness and one body value, which is x's assign
    // whose input is the binary op.
    let mut body_value = None;
    for (p, l) in g.inputs_of(ends[0]) {
        match l {
            EdgeLabel::Value => body_value = Some(p),
            EdgeLabel::Cond | EdgeLabel::BeginMark => {}
            other => panic!("unexpected end input: {other}"),
        }
    }
    let body_value = body_value.expect("end has no body value");
    assert_eq!(g.node(body_value).kind.tag(), "assign");
    assert_eq!(
        producers(&g, body_value),
        vec![("binary".to_string(), String::new())]
    );

    // Repeat's sole input is the end node.
    let repeat_inputs = g.inputs_of(repeats[0]);
    assert_eq!(repeat_inputs.len(), 1);
    assert_eq!(repeat_inputs[0].0, ends[0]);
}

#[test]
fn test_do_while_builds_same_quad() {
    let g = analyze(
        "class A { static int f(boolean c, int x) { do { x = x + 1; } while (c); return x; } }",
        "A",
        "f",
    );
    assert_eq!(g.nodes_tagged("begin").len(), 1);
    assert_eq!(g.nodes_tagged("repeat").len(), 1);
    assert_eq!(g.nodes_tagged("end").len(), 1);
}

#[test]
fn test_unresolved_call_downgrades() {
    // No candidate named g exists; the call node is an unknown-effect
    // placeholder and analysis still completes.
    let g = analyze(
        "class A { static int f() { return g(1, 2); } }",
        "A",
        "f",
    );
    let calls = g.nodes_tagged("call");
    assert_eq!(calls.len(), 1);
    match &g.node(calls[0]).kind {
        NodeKind::Call {
            unknown_effect,
            signature,
            ..
        } => {
            assert!(*unknown_effect);
            assert!(signature.is_none());
        }
        other => panic!("expected call node, got {other:?}"),
    }
    assert_eq!(g.nodes_tagged("output").len(), 1);
}

#[test]
fn test_uncaught_throw_reaches_exception_output() {
    let g = analyze(
        "class A { static void f(int x) throws Exception { if (x > 0) { throw new Exception(); } } }",
        "A",
        "f",
    );
    assert_eq!(g.nodes_tagged("throw").len(), 1);
    let outputs = g.nodes_tagged("output");
    let exc_out = outputs.iter().find(|&&ix| {
        g.node(ix)
            .ref_
            .as_ref()
            .map(|r| r.name().contains("#exc:java.lang.Exception"))
            .unwrap_or(false)
    });
    assert!(exc_out.is_some(), "no exception output node");
}

#[test]
fn test_for_each_builds_iter_node() {
    let g = analyze(
        "class A { static int f(int[] xs) { int s = 0; for (int x : xs) { s = s + x; } return s; } }",
        "A",
        "f",
    );
    assert_eq!(g.nodes_tagged("iter").len(), 1);
    // s is loop-carried.
    assert!(!g.nodes_tagged("begin").is_empty());
}

#[test]
fn test_ternary_joins_both_values() {
    let g = analyze(
        "class A { static int f(boolean c) { return c ? 1 : 2; } }",
        "A",
        "f",
    );
    let joins = g.nodes_tagged("join");
    assert_eq!(joins.len(), 1);
    let labels: Vec<String> = g
        .inputs_of(joins[0])
        .into_iter()
        .map(|(_, l)| l.to_string())
        .collect();
    assert!(labels.contains(&"true".to_string()));
    assert!(labels.contains(&"false".to_string()));
    assert!(labels.contains(&"cond".to_string()));
}
