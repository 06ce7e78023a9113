// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end translation scenarios (spec §8): one full `translate()` call
//! per scenario, asserting on fragment shape and metadata rather than exact
//! SQL text (`MockDialect`'s phrasing is incidental, not the contract).

mod fixtures;

use fhirpath_translator::ast::Visitor;
use fhirpath_translator::context::PendingLiteral;
use fhirpath_translator::fragment::metadata_keys;
use fhirpath_translator::{LiteralValue, OperatorKind, Translator, TypeOp};
use fixtures::*;

#[test]
fn path_navigation_with_array_unnest_and_first() {
    // Patient.name.given.first()
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Patient");

    let target = identifier("Patient.name.given");
    let ast = call_on(target, "first", vec![], "Patient.name.given.first()");

    let fragments = translator.translate(&ast).unwrap();

    // name, then name.given are both array elements per MockOracle, so two
    // unnest fragments are emitted before first()'s own fragment.
    assert!(fragments.len() >= 3, "expected at least 2 unnest steps plus first(): got {fragments:?}");
    let last = fragments.last().unwrap();
    assert!(last.requires_unnest, "first() over an unnested target stays unnest-shaped");
    assert_eq!(last.get_metadata(metadata_keys::SUBSET_FILTER), Some(&serde_json::Value::String("first".to_string())));
}

#[test]
fn where_filter_on_array_target() {
    // Patient.name.where(use = 'official')
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Patient");

    let use_eq = binary_op("=", OperatorKind::Comparison, identifier("use"), string_literal("official"), "use = 'official'");
    let ast = call_on(identifier("Patient.name"), "where", vec![use_eq], "Patient.name.where(use = 'official')");

    let fragments = translator.translate(&ast).unwrap();
    let last = fragments.last().unwrap();
    assert_eq!(last.get_metadata(metadata_keys::FUNCTION), Some(&serde_json::Value::String("where".to_string())));
    assert!(last.requires_unnest, "where() over an array-shaped target stays unnest-shaped");
    assert!(last.get_metadata(metadata_keys::WHERE_FILTER).is_some());
}

#[test]
fn union_literal_aggregate_sum() {
    // (1 | 2 | 3).aggregate($total + $this, 0)
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Patient");

    let union = union_of(vec![integer_literal(1), integer_literal(2), integer_literal(3)], "1 | 2 | 3");
    let step = binary_op("+", OperatorKind::Arithmetic, variable("$total"), variable("$this"), "$total + $this");
    let ast = call_on(union, "aggregate", vec![step, integer_literal(0)], "(1 | 2 | 3).aggregate($total + $this, 0)");

    let fragments = translator.translate(&ast).unwrap();
    let last = fragments.last().unwrap();
    assert_eq!(last.get_metadata(metadata_keys::FUNCTION), Some(&serde_json::Value::String("aggregate".to_string())));
    assert!(last.expression.contains("WITH RECURSIVE"), "aggregate lowers to a recursive CTE: {}", last.expression);
    assert!(last.expression.contains("t.value"), "step references the unnested union row: {}", last.expression);
}

#[test]
fn polymorphic_of_type_direct_field_extraction() {
    // Observation.value.ofType(Quantity) — the bare `value` identifier names
    // a polymorphic property with Quantity as a declared variant, so this
    // hits the direct-field fast path (extracts `valueQuantity`) rather than
    // the generic runtime-typed collection filter.
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Observation");

    let ast = type_op(TypeOp::OfType, identifier("value"), "Quantity", "value.ofType(Quantity)");
    let fragments = translator.translate(&ast).unwrap();

    let last = fragments.last().unwrap();
    assert_eq!(
        last.get_metadata(metadata_keys::VARIANT_PROPERTY),
        Some(&serde_json::Value::String("value".to_string()))
    );
    assert_eq!(
        last.get_metadata(metadata_keys::TARGET_TYPE),
        Some(&serde_json::Value::String("Quantity".to_string()))
    );
    // The direct fast path tags the variant, not the generic collection flag.
    assert!(last.get_metadata(metadata_keys::IS_COLLECTION).is_none());
    assert!(last.expression.contains("valueQuantity"), "expected direct field extraction: {}", last.expression);
}

#[test]
fn iif_on_empty_target_short_circuits_to_else_branch() {
    // {}.iif(true, 'a', 'b') -> the implicit target is the empty-collection
    // literal, so translate_conditional short-circuits straight to the
    // else-branch fragment without ever visiting condition or then-branch.
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Patient");

    // `iif` is surfaced by the parser as its own Conditional node (spec
    // §4.5); its implicit target comes from whatever a preceding sibling
    // left in `pending_literal_value` — here, the `{}` invocant.
    translator.context.pending_literal_value = Some(PendingLiteral {
        raw_value: LiteralValue::Empty,
        sql_expr: "NULL".to_string(),
    });

    let condition = boolean_literal(true);
    let then_branch = string_literal("a");
    let else_branch = string_literal("b");
    let fragment = translator
        .visit_conditional(&condition, &then_branch, Some(&else_branch), "{}.iif(true, 'a', 'b')")
        .unwrap();

    assert_eq!(fragment.expression, "'b'", "expected the else-branch literal verbatim, not a CASE WHEN: {}", fragment.expression);
    assert!(!fragment.expression.contains("CASE"), "must not evaluate condition/then at all: {}", fragment.expression);
}

#[test]
fn partial_precision_datetime_comparison_uses_range_semantics() {
    // @2015 < @2015-03 : mismatched precision forces a three-valued range
    // comparison rather than a direct `<` on the raw literal text.
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Patient");

    let ast = binary_op(
        "<",
        OperatorKind::Comparison,
        date_literal("2015"),
        date_literal("2015-03"),
        "@2015 < @2015-03",
    );

    let fragments = translator.translate(&ast).unwrap();
    let last = fragments.last().unwrap();
    assert!(last.expression.contains("temporal_low_boundary") || last.expression.contains("temporal_high_boundary"),
        "partial-precision comparison should route through boundary generation: {}", last.expression);
    assert!(last.expression.starts_with("CASE WHEN"), "range comparison is a three-valued CASE: {}", last.expression);
}
