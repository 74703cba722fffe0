//! Overload/override resolution behavior observed through the public
//! pipeline: distances, determinism, effect aggregation, catch routing.

use flowgraph_analysis::graph::NodeKind;
use flowgraph_analysis::Analyzer;

fn built(source: &str) -> Analyzer {
    let mut analyzer = Analyzer::default();
    analyzer.add_java("test.java", source).unwrap();
    let report = analyzer.build();
    assert!(report.is_clean(), "build errors: {:?}", report.errors);
    analyzer
}

fn call_signatures(analyzer: &mut Analyzer, klass: &str, method: &str) -> Vec<String> {
    let m = analyzer.find_method(klass, method).unwrap();
    let g = analyzer.analyze_method(m).unwrap();
    let mut out = Vec::new();
    for ix in g.nodes_tagged("call") {
        if let NodeKind::Call {
            signature: Some(sig),
            ..
        } = &g.node(ix).kind
        {
            out.push(sig.clone());
        }
    }
    out
}

#[test]
fn test_overload_picks_lowest_distance() {
    let mut analyzer = built(
        "class A {\n\
           static int f(int x) { return 1; }\n\
           static int f(long x) { return 2; }\n\
           static int g() { return f(3); }\n\
         }",
    );
    let sigs = call_signatures(&mut analyzer, "A", "g");
    assert_eq!(sigs, vec!["A.f(int)".to_string()]);
}

#[test]
fn test_overload_resolution_is_deterministic() {
    let source = "class A {\n\
           static int f(int x) { return 1; }\n\
           static int f(long x) { return 2; }\n\
           static int g() { return f(3); }\n\
         }";
    let mut first = built(source);
    let mut second = built(source);
    assert_eq!(
        call_signatures(&mut first, "A", "g"),
        call_signatures(&mut second, "A", "g")
    );
}

#[test]
fn test_varargs_tail_matches_individually() {
    let mut analyzer = built(
        "class A {\n\
           static int sum(int... xs) { return 0; }\n\
           static int h() { return sum(1, 2, 3); }\n\
         }",
    );
    let sigs = call_signatures(&mut analyzer, "A", "h");
    assert_eq!(sigs, vec!["A.sum(int[])".to_string()]);
}

#[test]
fn test_widening_prefers_exact_over_widened() {
    let mut analyzer = built(
        "class A {\n\
           static int f(double x) { return 1; }\n\
           static int f(int x) { return 2; }\n\
           static int g() { return f(7); }\n\
         }",
    );
    // int argument: f(int) at distance 0 beats f(double), even though
    // f(double) is declared first.
    let sigs = call_signatures(&mut analyzer, "A", "g");
    assert_eq!(sigs, vec!["A.f(int)".to_string()]);
}

#[test]
fn test_override_effects_aggregate_at_call_sites() {
    let mut analyzer = built(
        "class Base { int v; int get() { return 1; } }\n\
         class Sub extends Base { int w; int get() { return w + v; } }\n\
         class Use { static int f(Base b) { return b.get(); } }",
    );
    let m = analyzer.find_method("Use", "f").unwrap();
    // A call statically resolved to Base.get must carry the effects of
    // every overrider: Sub.get reads Sub.w and Base.v.
    let inputs: Vec<String> = {
        let method = analyzer.table().method(m);
        method.input_refs.iter().map(|r| r.name().to_string()).collect()
    };
    assert_eq!(inputs, vec!["Base.v".to_string(), "Sub.w".to_string()]);

    // The call node reads those refs through labeled edges.
    let g = analyzer.analyze_method(m).unwrap();
    let call = g.nodes_tagged("call")[0];
    let labels: Vec<String> = g
        .inputs_of(call)
        .into_iter()
        .map(|(_, l)| l.to_string())
        .collect();
    assert!(labels.iter().any(|l| l == "ref:Base.v"));
    assert!(labels.iter().any(|l| l == "ref:Sub.w"));
}

#[test]
fn test_override_links_are_bidirectional() {
    let analyzer = built(
        "class Base { int get() { return 1; } }\n\
         class Sub extends Base { int get() { return 2; } }",
    );
    let base_get = analyzer.find_method("Base", "get").unwrap();
    let sub_get = analyzer.find_method("Sub", "get").unwrap();
    let table = analyzer.table();
    assert!(table.method(base_get).overriders.contains(&sub_get));
    assert!(table.method(sub_get).overrides.contains(&base_get));
    let closure = table.override_closure(base_get);
    assert!(closure.contains(&base_get) && closure.contains(&sub_get));
}

#[test]
fn test_callers_are_recorded() {
    let analyzer = built(
        "class A {\n\
           static int helper() { return 1; }\n\
           static int f() { return helper(); }\n\
           static int g() { return helper(); }\n\
         }",
    );
    let helper = analyzer.find_method("A", "helper").unwrap();
    let callers = &analyzer.table().method(helper).callers;
    assert_eq!(callers.len(), 2);
}

#[test]
fn test_throw_targets_first_matching_catch() {
    let analyzer = built(
        "class A { static int f() {\n\
           try { throw new RuntimeException(); }\n\
           catch (RuntimeException e) { return 1; }\n\
           catch (Exception e2) { return 2; }\n\
           return 0;\n\
         } }",
    );
    let m = analyzer.find_method("A", "f").unwrap();
    let res = analyzer.resolutions_of(m).unwrap();
    let frames = analyzer.frames_of(m).unwrap();
    assert_eq!(res.throws.len(), 1);
    let (_, target) = res.throws.values().next().unwrap();
    let catch_klass = frames.frame(*target).catch_klass.expect("not a catch frame");
    assert_eq!(
        analyzer.table().klass(catch_klass).qualified,
        "java.lang.RuntimeException"
    );
}

#[test]
fn test_inherited_method_resolves_through_base_chain() {
    let mut analyzer = built(
        "class Base { int id() { return 1; } }\n\
         class Mid extends Base { }\n\
         class Leaf extends Mid { static int f(Leaf l) { return l.id(); } }",
    );
    let sigs = call_signatures(&mut analyzer, "Leaf", "f");
    assert_eq!(sigs, vec!["Base.id()".to_string()]);
}
