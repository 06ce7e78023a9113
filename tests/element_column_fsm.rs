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

//! `current_element_column` state machine transitions (spec §4.6):
//! (none) -> active on an unnest-creating subset filter, active -> none (or
//! active -> active) on the next identifier access, `translate()` entry ->
//! none.

mod fixtures;

use fhirpath_translator::ast::walk_ast;
use fhirpath_translator::fragment::metadata_keys;
use fhirpath_translator::{ElementColumnState, Translator};
use fixtures::*;

#[test]
fn fresh_translator_starts_with_no_active_column() {
    let oracle = MockOracle;
    let dialect = MockDialect;
    let translator = Translator::new(&oracle, &dialect, "Patient");
    assert_eq!(translator.context.element_column, ElementColumnState::None);
}

#[test]
fn first_over_unnested_target_activates_the_column() {
    // Patient.name.first() — `name` is array-typed, so the target is
    // already unnest-shaped when `first()` runs.
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Patient");

    let ast = call_on(identifier("Patient.name"), "first", vec![], "Patient.name.first()");
    walk_ast(&mut translator, &ast).unwrap();

    match &translator.context.element_column {
        ElementColumnState::Active { column, element_type } => {
            assert_eq!(column, "result");
            assert_eq!(element_type.as_deref(), Some("HumanName"));
        }
        other => panic!("expected an active element column, got {other:?}"),
    }
}

#[test]
fn last_over_unnested_target_activates_the_column() {
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Patient");

    let ast = call_on(identifier("Patient.name"), "last", vec![], "Patient.name.last()");
    walk_ast(&mut translator, &ast).unwrap();

    assert!(translator.context.element_column.is_active());
}

#[test]
fn skip_over_unnested_target_also_activates_the_column() {
    // skip/take/tail on an already-unnested target are unnest-creating
    // subset filters too (spec §4.6), not just first/last.
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Patient");

    let ast = call_on(identifier("Patient.name"), "skip", vec![integer_literal(1)], "Patient.name.skip(1)");
    walk_ast(&mut translator, &ast).unwrap();

    assert!(translator.context.element_column.is_active(), "skip() over an unnested target should activate the element column");
}

#[test]
fn tail_over_unnested_target_also_activates_the_column() {
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Patient");

    let ast = call_on(identifier("Patient.name"), "tail", vec![], "Patient.name.tail()");
    walk_ast(&mut translator, &ast).unwrap();

    assert!(translator.context.element_column.is_active());
}

#[test]
fn skip_over_a_non_unnested_target_does_not_activate_the_column() {
    // A target that isn't unnest-shaped (e.g. a materialized JSON array
    // expression) has no "result" row to point at, so skip/take falls back
    // to an array-slicing expression and the FSM stays at `none`.
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Observation");

    let ast = call_on(identifier("value"), "skip", vec![integer_literal(1)], "value.skip(1)");
    walk_ast(&mut translator, &ast).unwrap();

    assert_eq!(translator.context.element_column, ElementColumnState::None);
}

#[test]
fn scalar_member_access_consumes_the_active_column() {
    // Active(HumanName) — accessing a non-array field (`given` off a
    // HumanName isn't seeded as array in the mock oracle, so this exercises
    // the scalar-extraction branch) consumes the column back to `none`.
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Patient");
    translator.context.element_column = ElementColumnState::Active {
        column: "result".to_string(),
        element_type: Some("HumanName".to_string()),
    };

    let fragment = walk_ast(&mut translator, &identifier("given")).unwrap();

    assert_eq!(translator.context.element_column, ElementColumnState::None);
    assert!(fragment.expression.contains("result"), "extraction should read off the active column: {}", fragment.expression);
}

#[test]
fn array_member_access_re_enters_the_unnest_pipeline() {
    // Active(elem_type = "Patient") — accessing `name` (an array element of
    // Patient per the mock oracle) off the active column emits a fresh
    // unnest fragment and stays active, now typed as the array's element.
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Patient");
    translator.context.element_column = ElementColumnState::Active {
        column: "elem".to_string(),
        element_type: Some("Patient".to_string()),
    };

    let fragment = walk_ast(&mut translator, &identifier("name")).unwrap();

    assert!(fragment.requires_unnest, "re-entry emits a fresh unnest fragment");
    assert_eq!(fragment.get_metadata(metadata_keys::FROM_ELEMENT_COLUMN), Some(&serde_json::Value::Bool(true)));
    match &translator.context.element_column {
        ElementColumnState::Active { element_type, .. } => {
            assert_eq!(element_type.as_deref(), Some("HumanName"), "re-entry re-derives the element type off the new array");
        }
        ElementColumnState::None => panic!("expected the column to remain active after re-entering the unnest pipeline"),
    }
}

#[test]
fn translate_entry_resets_any_leftover_active_column() {
    // translate() always starts from `none` (spec §4.6), even if a prior
    // call (or manual test setup) left the column active.
    let oracle = MockOracle;
    let dialect = MockDialect;
    let mut translator = Translator::new(&oracle, &dialect, "Patient");
    translator.context.element_column = ElementColumnState::Active {
        column: "stale".to_string(),
        element_type: Some("HumanName".to_string()),
    };

    let ast = string_literal("hello");
    translator.translate(&ast).unwrap();

    assert_eq!(translator.context.element_column, ElementColumnState::None);
}
