//! Integration tests for navigation-chain discovery: recognition,
//! merging, depth capping, and schema validation over a realistic
//! call-site corpus.

use facet_analyze::{discover, CallSite, DiscoveryReport};
use facet_core::{
    CancelToken, DiagnosticCode, EngineOptions, Expr, SchemaModel, Severity, TypeRef,
};
use std::collections::{BTreeMap, BTreeSet};

fn facet_query(entity: &str) -> Expr {
    Expr::Call {
        receiver: Some(Box::new(Expr::static_call("query", vec![]))),
        method: "Facet".to_string(),
        type_args: vec![
            TypeRef::Named(entity.to_string()),
            TypeRef::Named(format!("{}Dto", entity)),
        ],
        args: vec![],
    }
}

fn chained_site(entity: &str, segments: &[&str], terminal: &str) -> CallSite {
    let chained = segments.iter().fold(facet_query(entity), |receiver, segment| {
        Expr::call(receiver, format!("With{}", segment), vec![])
    });
    CallSite::new("queries.rs", Expr::call(chained, terminal, vec![]))
}

fn run(corpus: &[CallSite], schema: Option<&SchemaModel>) -> DiscoveryReport {
    discover(corpus, schema, &EngineOptions::default(), &CancelToken::new()).unwrap()
}

fn paths(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn shop_schema() -> SchemaModel {
    let doc = facet_interchange::from_model_json(&serde_json::json!({
        "Contexts": [
            {
                "Context": "ShopContext",
                "Entities": [
                    {
                        "Name": "Order",
                        "Keys": [["Id"]],
                        "Properties": [{"Name": "Id", "Type": "Int"}],
                        "Navigations": [
                            {"Name": "Customer", "Target": "Customer", "IsCollection": false},
                            {"Name": "Lines", "Target": "OrderLine", "IsCollection": true},
                            {"Name": "Warehouse", "Target": "Warehouse", "IsCollection": false}
                        ]
                    },
                    {
                        "Name": "Customer",
                        "Keys": [["Id"]],
                        "Properties": [{"Name": "Id", "Type": "Int"}],
                        "Navigations": []
                    },
                    {
                        "Name": "OrderLine",
                        "Keys": [["Id"]],
                        "Properties": [{"Name": "Id", "Type": "Int"}],
                        "Navigations": []
                    },
                    {
                        "Name": "AuditEvent",
                        "Keys": [],
                        "Properties": [{"Name": "At", "Type": "DateTime"}],
                        "Navigations": []
                    }
                ]
            }
        ]
    }))
    .unwrap();
    SchemaModel::from_document(&doc).unwrap()
}

#[test]
fn test_two_call_sites_merge_to_expected_path_set() {
    // query.Facet<Order, OrderDto>().WithCustomer().WithLines().ToListAsync()
    // query.Facet<Order, OrderDto>().WithCustomer().ToListAsync()
    let corpus = vec![
        chained_site("Order", &["Customer", "Lines"], "ToListAsync"),
        chained_site("Order", &["Customer"], "ToListAsync"),
    ];
    let report = run(&corpus, None);
    assert_eq!(report.chains["Order"], paths(&["Customer", "Customer/Lines"]));
}

#[test]
fn test_chain_merge_is_a_set_union() {
    let corpus_a = vec![
        chained_site("Order", &["Customer"], "First"),
        chained_site("Order", &["Lines"], "ToList"),
    ];
    let corpus_b = vec![
        chained_site("Order", &["Customer"], "Single"),
        chained_site("Invoice", &["Issuer"], "ByKey"),
    ];

    let mut separate = run(&corpus_a, None);
    separate.merge(run(&corpus_b, None));

    let combined: Vec<CallSite> = corpus_a.iter().chain(corpus_b.iter()).cloned().collect();
    let together = run(&combined, None);

    assert_eq!(separate.chains, together.chains);
    let expected: BTreeMap<String, BTreeSet<String>> = BTreeMap::from([
        ("Invoice".to_string(), paths(&["Issuer"])),
        ("Order".to_string(), paths(&["Customer", "Lines"])),
    ]);
    assert_eq!(together.chains, expected);
}

#[test]
fn test_truncation_keeps_prefix_and_reports_once() {
    let corpus = vec![
        chained_site("Order", &["A", "B", "C", "D", "E"], "ToListAsync"),
        // Same path used twice: still one diagnostic.
        chained_site("Order", &["A", "B", "C", "D", "E"], "First"),
    ];
    let report = run(&corpus, None);

    assert_eq!(report.chains["Order"], paths(&["A/B/C"]));
    assert_eq!(report.diagnostics.count_of(DiagnosticCode::ChainDepthExceeded), 1);
    let diag = report.diagnostics.iter().next().unwrap();
    assert_eq!(diag.args[0], "A/B/C/D/E");
    assert_eq!(diag.args[1], "Order");
    assert_eq!(diag.args[2], "3");
    assert_eq!(diag.severity, Severity::Warning);
}

#[test]
fn test_configured_chain_depth() {
    let options = EngineOptions::from_options(&BTreeMap::from([(
        "max_chain_depth".to_string(),
        "2".to_string(),
    )]))
    .unwrap();
    let corpus = vec![chained_site("Order", &["A", "B", "C"], "First")];
    let report = discover(&corpus, None, &options, &CancelToken::new()).unwrap();
    assert_eq!(report.chains["Order"], paths(&["A/B"]));
}

#[test]
fn test_validation_unknown_navigation_is_warning() {
    let schema = shop_schema();
    let corpus = vec![chained_site("Order", &["Ghost"], "First")];
    let report = run(&corpus, Some(&schema));
    assert_eq!(report.diagnostics.count_of(DiagnosticCode::UnknownNavigation), 1);
    // The path is retained; discovery is observability, not enforcement.
    assert_eq!(report.chains["Order"], paths(&["Ghost"]));
}

#[test]
fn test_validation_unresolved_target_is_info() {
    let schema = shop_schema();
    let corpus = vec![chained_site("Order", &["Warehouse"], "First")];
    let report = run(&corpus, Some(&schema));
    assert_eq!(
        report
            .diagnostics
            .count_of(DiagnosticCode::UnresolvedNavigationTarget),
        1
    );
    assert_eq!(report.diagnostics.max_severity(), Some(Severity::Info));
}

#[test]
fn test_validation_missing_key_is_warning() {
    let schema = shop_schema();
    let corpus = vec![chained_site("AuditEvent", &[], "ToList")];
    let report = run(&corpus, Some(&schema));
    assert_eq!(report.diagnostics.count_of(DiagnosticCode::MissingKeyTuple), 1);
}

#[test]
fn test_validation_unknown_entity_is_info() {
    let schema = shop_schema();
    let corpus = vec![chained_site("Phantom", &["X"], "First")];
    let report = run(&corpus, Some(&schema));
    assert_eq!(report.diagnostics.count_of(DiagnosticCode::UnknownChainEntity), 1);
    assert_eq!(report.diagnostics.max_severity(), Some(Severity::Info));
}

#[test]
fn test_valid_paths_produce_no_diagnostics() {
    let schema = shop_schema();
    let corpus = vec![chained_site("Order", &["Customer"], "ToListAsync")];
    let report = run(&corpus, Some(&schema));
    assert!(report.diagnostics.is_empty());
}

#[test]
fn test_nested_lambda_composite_paths() {
    let p = facet_core::Parameter {
        id: 1,
        name: "q".to_string(),
        ty: TypeRef::Named("Order".to_string()),
    };
    let lambda = Expr::lambda(
        vec![p.clone()],
        Expr::call(
            Expr::call(Expr::parameter(&p), "WithProduct", vec![]),
            "WithVendor",
            vec![],
        ),
    );
    let chained = Expr::call(facet_query("Order"), "WithLines", vec![]);
    let corpus = vec![CallSite::new(
        "queries.rs",
        Expr::call(chained, "ToListAsync", vec![lambda]),
    )];
    let report = run(&corpus, None);
    assert_eq!(
        report.chains["Order"],
        paths(&["Lines", "Product/Vendor", "Lines/Product/Vendor"])
    );
}
