//! Driver-level behavior: per-method failure isolation, cancellation,
//! summaries, and library descriptors.

use flowgraph_core::traits::{Cancellable, CancellationToken};

use flowgraph_analysis::ast::TypeName;
use flowgraph_analysis::klass::{
    LibraryKlassDesc, LibraryMethodDesc, LibraryResolver,
};
use flowgraph_analysis::Analyzer;

#[test]
fn test_unsupported_construct_aborts_one_method_only() {
    let mut analyzer = Analyzer::default();
    analyzer
        .add_java(
            "test.java",
            "class A {\n\
               static int good() { return 1; }\n\
               static int bad(int k) {\n\
                 switch (k) { case 1 -> 1; default -> 2; };\n\
                 return 0;\n\
               }\n\
             }",
        )
        .unwrap();
    let report = analyzer.build();
    // The arrow-switch method fails; the other method still analyzes.
    assert_eq!(report.error_count(), 1);
    assert!(report.errors[0].to_string().contains("bad"));
    let good = analyzer.find_method("A", "good").unwrap();
    assert!(analyzer.analyze_method(good).is_ok());
}

#[test]
fn test_analyze_all_collects_summaries() {
    let mut analyzer = Analyzer::default();
    analyzer
        .add_java(
            "test.java",
            "class A {\n\
               int v;\n\
               int get() { return v; }\n\
               void set(int x) { v = x; }\n\
             }",
        )
        .unwrap();
    let report = analyzer.analyze_all(None);
    assert!(report.is_clean());
    assert_eq!(report.data.len(), 2);

    let get = report.data.iter().find(|s| s.name == "get").unwrap();
    assert_eq!(get.klass.as_deref(), Some("A"));
    assert_eq!(get.input_refs, vec!["A.v".to_string()]);
    assert!(get.output_refs.is_empty());
    let set = report.data.iter().find(|s| s.name == "set").unwrap();
    assert_eq!(set.output_refs, vec!["A.v".to_string()]);

    // Summaries serialize losslessly enough to regenerate any text form.
    let json = serde_json::to_string(&report.data).unwrap();
    assert!(json.contains("\"signature\":\"A.get()\""));
    assert!(json.contains("\"edges\""));
}

#[test]
fn test_cancellation_between_methods() {
    let mut analyzer = Analyzer::default();
    analyzer
        .add_java(
            "test.java",
            "class A { static int f() { return 1; } static int g() { return 2; } }",
        )
        .unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let report = analyzer.analyze_all(Some(&token));
    assert!(report.data.is_empty());
    assert_eq!(report.error_count(), 1);
}

struct OneKlass;

impl LibraryResolver for OneKlass {
    fn lookup(&self, qualified: &str) -> Option<LibraryKlassDesc> {
        (qualified == "ext.Logger").then(|| LibraryKlassDesc {
            qualified: "ext.Logger".to_string(),
            is_interface: false,
            superclass: Some("java.lang.Object".to_string()),
            interfaces: Vec::new(),
            type_params: Vec::new(),
            fields: Vec::new(),
            methods: vec![LibraryMethodDesc {
                name: "log".to_string(),
                is_static: false,
                is_constructor: false,
                params: vec![TypeName::simple("java.lang.String")],
                return_type: None,
                throws: Vec::new(),
                varargs: false,
            }],
        })
    }
}

#[test]
fn test_library_resolver_supplies_call_targets() {
    let mut analyzer = Analyzer::default();
    analyzer.install_library(Box::new(OneKlass));
    analyzer
        .add_java(
            "test.java",
            "import ext.Logger;\n\
             class A { static void f(Logger log) { log.log(\"hi\"); } }",
        )
        .unwrap();
    let report = analyzer.build();
    assert!(report.is_clean(), "build errors: {:?}", report.errors);
    let m = analyzer.find_method("A", "f").unwrap();
    let g = analyzer.analyze_method(m).unwrap();
    let calls = g.nodes_tagged("call");
    assert_eq!(calls.len(), 1);
    match &g.node(calls[0]).kind {
        flowgraph_analysis::NodeKind::Call { signature, .. } => {
            assert_eq!(signature.as_deref(), Some("ext.Logger.log(java.lang.String)"));
        }
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn test_method_failures_carry_signature() {
    let mut analyzer = Analyzer::default();
    analyzer
        .add_java(
            "test.java",
            "class A { static int bad(int k) { switch (k) { case 1 -> 1; }; return 0; } }",
        )
        .unwrap();
    let report = analyzer.build();
    assert_eq!(report.error_count(), 1);
    let text = report.errors[0].to_string();
    assert!(text.contains("A.bad(int)"), "missing signature: {text}");
}
