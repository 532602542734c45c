use rust_decimal::Decimal;
use sea_engine::prelude::*;
use serde_json::json;

const SUPPLY_CHAIN: &str = r#"
Entity "Supplier" in supply_chain
Entity "Distribution Center" in logistics
Entity "Retail Store" in retail
Resource "Electronics" units in products
Flow "Electronics" from "Supplier" to "Distribution Center" quantity 5000
Flow "Electronics" from "Distribution Center" to "Retail Store" quantity 3000
"#;

fn supply_chain() -> Graph {
    Graph::parse(SUPPLY_CHAIN).unwrap()
}

fn document(policy: &Policy) -> String {
    policy.to_json().unwrap()
}

#[test]
fn parsed_supply_chain_counts_and_adjacency() {
    let graph = supply_chain();
    assert_eq!(graph.entity_count(), 3);
    assert_eq!(graph.resource_count(), 1);
    assert_eq!(graph.flow_count(), 2);

    let dc = graph.find_entity_by_name("Distribution Center").unwrap();
    let incoming = graph.flows_to(&dc);
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].quantity, Decimal::from(5000));
    let outgoing = graph.flows_from(&dc);
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].quantity, Decimal::from(3000));

    let upstream: Vec<&str> = graph.upstream_entities(&dc).iter().map(|e| e.name.as_str()).collect();
    assert_eq!(upstream, vec!["Supplier"]);
}

#[test]
fn parse_failure_exposes_no_graph() {
    let err = Graph::parse("Entity \"A\"\nInvalid syntax here").unwrap_err();
    assert!(matches!(err, SeaError::Syntax { line: 2, .. }));
}

#[test]
fn literal_true_policy_holds_in_both_modes() {
    let doc = r#"{
        "id": "6f1c2a9e-3b7d-4c1e-9a2f-1d2e3f4a5b6c",
        "name": "AlwaysTrue",
        "expression": {"Literal": true},
        "modality": "Obligation"
    }"#;
    let mut graph = supply_chain();
    for three_valued in [true, false] {
        graph.set_evaluation_mode(three_valued);
        let result = graph.evaluate_policy(doc).unwrap();
        assert!(result.is_satisfied);
        assert_eq!(result.is_satisfied_tristate, Some(true));
        assert!(result.violations.is_empty());
    }
}

#[test]
fn missing_entity_is_unknown_under_three_valued_logic() {
    let doc = r#"{
        "id": "6f1c2a9e-3b7d-4c1e-9a2f-1d2e3f4a5b6d",
        "name": "GhostCapacity",
        "expression": {"Binary": {
            "op": "GreaterThan",
            "left": {"MemberAccess": {"object": "NonExistent", "member": "capacity"}},
            "right": {"Literal": 10}
        }},
        "modality": "Obligation"
    }"#;
    let mut graph = supply_chain();
    let result = graph.evaluate_policy(doc).unwrap();
    assert!(!result.is_satisfied);
    assert_eq!(result.is_satisfied_tristate, None);
    assert_eq!(result.violations.len(), 1);
    assert!(result.violations[0].message.contains("UNKNOWN"));
    assert_eq!(result.violations[0].severity, Severity::Error);

    graph.set_evaluation_mode(false);
    let result = graph.evaluate_policy(doc).unwrap();
    assert!(!result.is_satisfied);
    assert_eq!(result.is_satisfied_tristate, Some(false));
    assert_eq!(result.violations.len(), 1);
}

#[test]
fn malformed_policy_document_is_a_serialization_error() {
    let graph = supply_chain();
    let err = graph.evaluate_policy("{\"name\": 3").unwrap_err();
    assert!(matches!(err, SeaError::Serialization(_)));
}

#[test]
fn yaml_policy_documents_are_accepted() {
    let yaml = r#"
id: 6f1c2a9e-3b7d-4c1e-9a2f-1d2e3f4a5b6e
name: SupplierInChain
expression:
  Binary:
    op: Equal
    left:
      MemberAccess:
        object: Supplier
        member: namespace
    right:
      Literal: supply_chain
modality: Obligation
"#;
    let result = supply_chain().evaluate_policy(yaml).unwrap();
    assert!(result.is_satisfied);
}

#[test]
fn quantified_and_aggregated_policies() {
    let graph = supply_chain();
    let f = |name: &str| Expression::variable(name);

    let all_positive = Policy::new(
        "PositiveFlows",
        Expression::forall("f", f("flows"), Expression::gt(f("f.quantity"), Expression::number(0))),
    );
    assert!(graph.evaluate_policy(&document(&all_positive)).unwrap().is_satisfied);

    let total = Expression::aggregation(AggregateFunction::Sum, f("flows"), Some("quantity"), None);
    let under_cap = Policy::new(
        "VolumeCap",
        Expression::binary(BinaryOp::LessThanOrEqual, total, Expression::number(7000)),
    );
    let result = graph.evaluate_policy(&document(&under_cap)).unwrap();
    assert!(!result.is_satisfied);
    assert_eq!(result.is_satisfied_tristate, Some(false));
    assert_eq!(result.violations[0].message, "Policy 'VolumeCap' was violated");
}

#[test]
fn modality_sets_violation_severity() {
    let graph = supply_chain();
    let prohibition = Policy::new("NoFalse", Expression::boolean(false)).with_modality(PolicyModality::Prohibition);
    let permission = Policy::new("MayFalse", Expression::boolean(false)).with_modality(PolicyModality::Permission);
    assert_eq!(graph.evaluate(&prohibition).unwrap().violations[0].severity, Severity::Error);
    assert_eq!(graph.evaluate(&permission).unwrap().violations[0].severity, Severity::Info);
}

#[test]
fn policy_pack_validation_reports_by_priority() {
    let graph = supply_chain();
    let pack = PolicyPack::new("chain-rules", "Supply chain rules")
        .with_policy(Policy::new("Ok", Expression::boolean(true)).with_priority(5))
        .with_policy(
            Policy::new("Advisory", Expression::boolean(false))
                .with_modality(PolicyModality::Permission)
                .with_priority(1),
        )
        .with_policy(Policy::new("Broken", Expression::boolean(false)).with_priority(9));

    let report = graph.validate(&pack);
    assert_eq!(report.evaluated, 3);
    assert_eq!(report.violations.len(), 2);
    assert_eq!(report.violations[0].name, "Broken");
    assert_eq!(report.error_count(), 1);
    assert!(!report.is_valid());
}

#[test]
fn flow_identifiers_are_validated() {
    let err = Flow::from_strs("not-a-uuid", "also-bad", "nope", Decimal::ONE).unwrap_err();
    assert!(err.is_validation());

    let flow = Flow::from_strs(
        "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
        "6fa459ea-ee8a-3ca4-894e-db77e160355e",
        "886313e1-3b8a-5372-9b90-0c9aee199e5d",
        Decimal::new(105, 1),
    )
    .unwrap();
    assert_eq!(flow.quantity, Decimal::new(105, 1));
}

#[test]
fn relation_over_a_flow() {
    let source = r#"
Entity "Buyer"
Entity "Seller"
Resource "Money" USD
Flow "Money" from "Buyer" to "Seller" quantity 100
Role "Payer"
Role "Payee"
Relation "Payment"
  subject: "Payer"
  predicate: "pays"
  object: "Payee"
  via: flow "Money"
"#;
    let graph = Graph::parse(source).unwrap();
    let pays = Policy::new(
        "PaymentsExist",
        Expression::exists(
            "r",
            Expression::variable("relations"),
            Expression::eq(Expression::variable("r.predicate"), Expression::string("pays")),
        ),
    );
    assert!(graph.evaluate(&pays).unwrap().is_satisfied);
}

#[test]
fn attributes_feed_member_access() {
    let mut graph = supply_chain();
    let supplier = graph.find_entity_by_name("Supplier").unwrap();
    graph.set_attribute(&supplier, "rating", json!(4)).unwrap();

    let rated = Policy::new(
        "RatedSupplier",
        Expression::gt(Expression::member_access("Supplier", "rating"), Expression::number(3)),
    );
    assert!(graph.evaluate(&rated).unwrap().is_satisfied);
}

#[test]
fn printed_source_parses_back() {
    let graph = supply_chain();
    let reparsed = Graph::parse(&graph.to_source()).unwrap();
    assert_eq!(reparsed.entity_count(), graph.entity_count());
    assert_eq!(reparsed.flow_count(), graph.flow_count());

    let dc = reparsed.find_entity_by_name("Distribution Center").unwrap();
    assert_eq!(reparsed.get_entity(&dc).unwrap().namespace.as_deref(), Some("logistics"));
    assert_eq!(reparsed.flows_to(&dc)[0].quantity, Decimal::from(5000));
    assert_eq!(reparsed.to_source(), graph.to_source());
}
