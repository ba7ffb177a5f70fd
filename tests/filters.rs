//! Filter tree construction, validation, and wire-shape tests.

use serde_json::json;
use zteradb::{FilterBuilder, FilterNode, FilterOperand};

#[test]
fn test_and_of_equality_and_istartswith() {
  // AND(status = "A", name starts-with-insensitive "S")
  let filter = FilterBuilder::new()
    .and(vec![
      FilterBuilder::new().eq("status", "A").unwrap().into(),
      FilterBuilder::new().istarts_with("name", "S").unwrap().into(),
    ])
    .unwrap();

  assert_eq!(
    filter.to_value(),
    json!({
      "operator": "&&",
      "operand": [
        {"operator": "=", "operand": "status", "result": "A"},
        {"operator": "^i%%", "operand": "name", "result": "S"},
      ]
    })
  );
}

#[test]
fn test_or_accepts_any_list() {
  // OR, unlike the ordered comparisons, does not demand two operands
  assert!(FilterBuilder::new().or(vec![]).is_ok());
  assert!(FilterBuilder::new()
    .or(vec![FilterBuilder::new().eq("a", 1).unwrap().into()])
    .is_ok());
}

#[test]
fn test_ordered_comparisons_need_two_operands() {
  for build in [
    FilterBuilder::new().gt(vec![]),
    FilterBuilder::new().gte(vec!["age".into()]),
    FilterBuilder::new().lt(vec![1.into()]),
    FilterBuilder::new().lte(vec![]),
  ] {
    let err = build.unwrap_err();
    assert_eq!(err.code(), 40, "expected a value error, got {}", err);
  }

  let ok = FilterBuilder::new().gte(vec!["age".into(), 21.into()]).unwrap();
  assert_eq!(
    ok.to_value(),
    json!({"operator": ">=", "operand": ["age", 21]})
  );
}

#[test]
fn test_arithmetic_shapes() {
  let sum = FilterBuilder::new()
    .add(vec!["subtotal".into(), "tax".into()])
    .unwrap();
  assert_eq!(
    sum.to_value(),
    json!({"operator": "+", "operand": ["subtotal", "tax"]})
  );

  // division refuses list-shaped operands but not a zero divisor
  assert!(FilterBuilder::new()
    .div(vec!["total".into(), FilterOperand::Literal(json!([2]))])
    .is_err());
  assert!(FilterBuilder::new().div(vec!["total".into(), 0.into()]).is_ok());
  assert!(FilterBuilder::new().rem(vec!["total".into(), 3.into()]).is_ok());
}

#[test]
fn test_string_operator_tokens() {
  let cases = [
    ("%%", FilterBuilder::new().contains("name", "ann").unwrap()),
    ("^%%", FilterBuilder::new().starts_with("name", "An").unwrap()),
    ("%%$", FilterBuilder::new().ends_with("name", "na").unwrap()),
    ("i%%", FilterBuilder::new().icontains("name", "ann").unwrap()),
    ("^i%%", FilterBuilder::new().istarts_with("name", "an").unwrap()),
    ("i%%$", FilterBuilder::new().iends_with("name", "NA").unwrap()),
  ];
  for (token, filter) in cases {
    assert_eq!(filter.to_value()["operator"], token);
  }
}

#[test]
fn test_string_operators_reject_empty_arguments() {
  assert!(FilterBuilder::new().contains("", "x").is_err());
  assert!(FilterBuilder::new().ends_with("name", "").is_err());
}

#[test]
fn test_in_operator() {
  let filter = FilterBuilder::new()
    .is_in("status", vec![json!("A"), json!("B")])
    .unwrap();
  assert_eq!(
    filter.to_value(),
    json!({"operator": "IN", "operand": "status", "result": ["A", "B"]})
  );
  assert!(FilterBuilder::new().is_in("", vec![json!(1)]).is_err());
}

#[test]
fn test_nested_builder_substitution() {
  // a single-node sub-builder substitutes its node object...
  let single = FilterBuilder::new().eq("a", 1).unwrap();
  let operand: FilterOperand = single.into();
  assert!(operand.to_value().is_object());

  // ...a multi-node sub-builder substitutes the node list
  let multi = FilterBuilder::new()
    .eq("a", 1)
    .unwrap()
    .eq("b", 2)
    .unwrap();
  let operand: FilterOperand = multi.into();
  let value = operand.to_value();
  assert_eq!(value.as_array().map(Vec::len), Some(2));
}

#[test]
fn test_accumulated_form_unwraps_single_node() {
  let one = FilterBuilder::new().eq("a", 1).unwrap();
  assert!(one.to_value().is_object());

  let two = FilterBuilder::new().eq("a", 1).unwrap().ne("b", 2).unwrap();
  assert!(two.to_value().is_array());
}

#[test]
fn test_serialization_roundtrip_equivalence() {
  let filter = FilterBuilder::new()
    .and(vec![
      FilterBuilder::new().eq("status", "A").unwrap().into(),
      FilterBuilder::new()
        .gt(vec![
          FilterBuilder::new()
            .add(vec!["subtotal".into(), "tax".into()])
            .unwrap()
            .into(),
          100.into(),
        ])
        .unwrap()
        .into(),
    ])
    .unwrap()
    .is_in("region", vec![json!("eu"), json!("us")])
    .unwrap();

  for node in filter.nodes() {
    let rebuilt = FilterNode::from_value(&node.to_value()).unwrap();
    assert_eq!(&rebuilt, node);
    // and the rebuilt tree serializes identically
    assert_eq!(rebuilt.to_value(), node.to_value());
  }
}

#[test]
fn test_serde_integration() {
  let node = FilterBuilder::new().eq("status", "A").unwrap().build().remove(0);
  let text = serde_json::to_string(&node).unwrap();
  let back: FilterNode = serde_json::from_str(&text).unwrap();
  assert_eq!(back, node);
}

#[test]
fn test_field_reference_versus_literal() {
  // bare strings are field references; literals need the explicit escape
  let by_field: FilterOperand = "name".into();
  assert_eq!(by_field, FilterOperand::Field("name".into()));

  let by_value = FilterOperand::literal("name");
  assert_eq!(by_value, FilterOperand::Literal(json!("name")));
}
