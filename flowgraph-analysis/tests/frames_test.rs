//! Frame-model behavior: effect monotonicity, loop-carried sets,
//! fallthrough, and the unchecked-exception policy.

use flowgraph_core::config::{AnalysisConfig, UncheckedExceptionPolicy};

use flowgraph_analysis::frames::{FrameLabel, FrameTree};
use flowgraph_analysis::Analyzer;

fn built(source: &str) -> Analyzer {
    let mut analyzer = Analyzer::default();
    analyzer.add_java("test.java", source).unwrap();
    let report = analyzer.build();
    assert!(report.is_clean(), "build errors: {:?}", report.errors);
    analyzer
}

#[test]
fn test_frame_effects_are_monotonic_minus_locals() {
    let analyzer = built(
        "class A { static int f(int n) {\n\
           int s = 0;\n\
           while (n > 0) { int t = n; s = s + t; n = n - 1; }\n\
           return s;\n\
         } }",
    );
    let m = analyzer.find_method("A", "f").unwrap();
    let frames = analyzer.frames_of(m).unwrap();
    let loop_frame = frames
        .all_frames()
        .find(|f| f.label == FrameLabel::Breakable)
        .expect("no loop frame");

    // t lives in the loop body's own block scope: visible in that
    // block's frame, stripped when effects merge upward.
    let body_block = frames
        .all_frames()
        .find(|f| f.inputs.iter().any(|r| r.name().ends_with(":t")))
        .expect("no frame reads t");
    assert_eq!(body_block.label, FrameLabel::Block);

    // s is declared one level up (the method body block), so the loop
    // frame keeps it; t stays behind.
    let loop_inputs: Vec<&str> = loop_frame.inputs.iter().map(|r| r.name()).collect();
    assert!(loop_inputs.iter().any(|n| n.ends_with(":n")));
    assert!(loop_inputs.iter().any(|n| n.ends_with(":s")));
    assert!(!loop_inputs.iter().any(|n| n.ends_with(":t")));

    // At the root only the parameter survives: every level strips the
    // locals of the scope it introduced.
    let root = frames.frame(FrameTree::ROOT);
    let root_inputs: Vec<&str> = root.inputs.iter().map(|r| r.name()).collect();
    assert!(root_inputs.iter().any(|n| n.ends_with(":n")));
    assert!(!root_inputs.iter().any(|n| n.ends_with(":s")));
    assert!(!root_inputs.iter().any(|n| n.ends_with(":t")));
}

#[test]
fn test_loop_carried_set_is_reads_intersect_writes() {
    let analyzer = built(
        "class A { static int f(int n, int k) {\n\
           int s = 0;\n\
           while (n > 0) { s = s + k; n = n - 1; }\n\
           return s;\n\
         } }",
    );
    let m = analyzer.find_method("A", "f").unwrap();
    let frames = analyzer.frames_of(m).unwrap();
    let loop_frame = frames
        .all_frames()
        .find(|f| f.label == FrameLabel::Breakable)
        .unwrap();
    let carried = frames.ins_and_outs(loop_frame.id);
    let names: Vec<&str> = carried.iter().map(|r| r.name()).collect();
    // k is read-only: not carried. s and n are read and written.
    assert!(names.iter().any(|n| n.ends_with(":s")));
    assert!(names.iter().any(|n| n.ends_with(":n")));
    assert!(!names.iter().any(|n| n.ends_with(":k")));
}

#[test]
fn test_switch_fallthrough_carries_into_next_case() {
    let mut analyzer = built(
        "class A { static int f(int k) {\n\
           int x = 0;\n\
           switch (k) {\n\
             case 0: x = 1;\n\
             case 1: x = x + 1; break;\n\
             default: x = 9;\n\
           }\n\
           return x;\n\
         } }",
    );
    let m = analyzer.find_method("A", "f").unwrap();
    let g = analyzer.analyze_method(m).unwrap();
    // Three labels, three case witnesses; the fallthrough group merges
    // once, so fewer joins than cases.
    assert_eq!(g.nodes_tagged("case").len(), 3);
    assert!(!g.nodes_tagged("join").is_empty());
    assert_eq!(g.nodes_tagged("output").len(), 1);
}

#[test]
fn test_declared_throws_raise_exit_candidates_by_default() {
    let analyzer = built(
        "class A {\n\
           static void risky() throws Exception { }\n\
           static int f() { try { risky(); } catch (Exception e) { return 1; } return 0; }\n\
         }",
    );
    let m = analyzer.find_method("A", "f").unwrap();
    let res = analyzer.resolutions_of(m).unwrap();
    assert_eq!(res.call_throws.len(), 1);
    let exits = res.call_throws.values().next().unwrap();
    assert!(exits[0].0.name().contains("#exc:java.lang.Exception"));
}

#[test]
fn test_ignore_policy_suppresses_call_exits() {
    let mut analyzer = Analyzer::new(AnalysisConfig {
        unchecked_exceptions: UncheckedExceptionPolicy::Ignore,
        ..AnalysisConfig::default()
    });
    analyzer
        .add_java(
            "test.java",
            "class A {\n\
               static void risky() throws Exception { }\n\
               static int f() { try { risky(); } catch (Exception e) { return 1; } return 0; }\n\
             }",
        )
        .unwrap();
    let report = analyzer.build();
    assert!(report.is_clean());
    let m = analyzer.find_method("A", "f").unwrap();
    assert!(analyzer.resolutions_of(m).unwrap().call_throws.is_empty());
}

#[test]
fn test_labeled_break_escapes_outer_loop() {
    let mut analyzer = built(
        "class A { static int f(int n) {\n\
           int s = 0;\n\
           outer:\n\
           while (n > 0) {\n\
             while (true) { s = s + 1; break outer; }\n\
           }\n\
           return s;\n\
         } }",
    );
    let m = analyzer.find_method("A", "f").unwrap();
    // The shape is unusual but must analyze without error.
    assert!(analyzer.analyze_method(m).is_ok());
}

#[test]
fn test_block_locals_do_not_leak() {
    let analyzer = built(
        "class A { static int f() {\n\
           int x = 1;\n\
           { int x2 = 2; x = x2; }\n\
           return x;\n\
         } }",
    );
    let m = analyzer.find_method("A", "f").unwrap();
    let frames = analyzer.frames_of(m).unwrap();
    // The inner block writes both; one level up x2 is gone, x remains.
    let body_block = frames
        .all_frames()
        .find(|f| {
            f.outputs.iter().any(|r| r.name().ends_with(":x"))
                && !f.outputs.iter().any(|r| r.name().ends_with(":x2"))
        })
        .expect("x2 leaked into every frame that writes x");
    assert_eq!(body_block.label, FrameLabel::Block);
    // And nothing block-local survives at the method root.
    let root = frames.frame(FrameTree::ROOT);
    assert!(!root.outputs.iter().any(|r| r.name().ends_with(":x2")));
}
