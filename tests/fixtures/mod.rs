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

//! Mock `TypeOracle`/`Dialect` plus small AST-building helpers shared by
//! the integration tests.

#![allow(dead_code)]

use fhirpath_translator::{BoundaryKind, CaseMode, Dialect, TypeDiscriminator, TypeMetadata, TypeOracle};
use fhirpath_translator::{AstNode, FunctionCallData, LiteralType, LiteralValue, OperatorData, OperatorKind, TypeOp};
use smallvec::smallvec;

/// A small, hand-seeded Patient/Observation-shaped StructureDefinition
/// stand-in, enough to exercise path navigation, polymorphic `value[x]`,
/// and array cardinality.
pub struct MockOracle;

impl TypeOracle for MockOracle {
    fn canonical_type_name(&self, name: &str) -> Option<String> {
        match name {
            "Quantity" | "Age" | "Duration" => Some("Quantity".to_string()),
            other => Some(other.to_string()),
        }
    }

    fn type_metadata(&self, canonical: &str) -> Option<TypeMetadata> {
        let is_resource = matches!(canonical, "Patient" | "Observation" | "Bundle");
        let is_primitive = matches!(canonical, "string" | "integer" | "decimal" | "boolean" | "date" | "dateTime" | "time");
        Some(TypeMetadata {
            is_primitive,
            is_complex: !is_primitive && !is_resource,
            is_resource,
            base_type: if is_resource { Some("DomainResource".to_string()) } else { None },
        })
    }

    fn element_type(&self, parent_type: &str, path: &str) -> Option<String> {
        match (parent_type, path) {
            ("Patient", "name") => Some("HumanName".to_string()),
            ("Patient", "name.given") => Some("string".to_string()),
            ("Patient", "name.family") => Some("string".to_string()),
            ("Patient", "name.use") => Some("string".to_string()),
            ("Observation", "value") => Some("Quantity".to_string()),
            ("Observation", "valueQuantity") => Some("Quantity".to_string()),
            ("Quantity", "value") => Some("decimal".to_string()),
            _ => None,
        }
    }

    fn is_array_element(&self, parent_type: &str, path: &str) -> bool {
        matches!((parent_type, path), ("Patient", "name") | ("Patient", "name.given"))
    }

    fn resolve_polymorphic_property(&self, base: &str) -> Option<Vec<String>> {
        match base {
            "Observation.value" | "value" => Some(vec![
                "Quantity".to_string(),
                "String".to_string(),
                "CodeableConcept".to_string(),
                "boolean".to_string(),
            ]),
            _ => None,
        }
    }

    fn resolve_polymorphic_field_for_type(&self, base: &str, target_type: &str) -> Option<String> {
        if base.ends_with("value") {
            Some(format!("value{target_type}"))
        } else {
            None
        }
    }

    fn type_discriminator(&self, canonical: &str) -> Option<TypeDiscriminator> {
        match canonical {
            "Quantity" => Some(TypeDiscriminator { required_fields: vec!["value".to_string()] }),
            "CodeableConcept" => Some(TypeDiscriminator { required_fields: vec!["coding".to_string()] }),
            _ => None,
        }
    }
}

/// A minimal Postgres-flavored `Dialect`: real JSON-operator SQL text,
/// simple enough to assert structural shape against in tests without
/// depending on any particular production dialect crate.
pub struct MockDialect;

impl Dialect for MockDialect {
    fn extract_json_field(&self, col: &str, path: &str) -> String {
        format!("{col}#>'{{{}}}'", path.trim_start_matches('$').trim_start_matches('.').replace('.', ","))
    }
    fn extract_json_object(&self, col: &str, path: &str) -> String {
        self.extract_json_field(col, path)
    }
    fn extract_primitive_value(&self, col: &str, path: &str) -> String {
        format!("{col}#>>'{{{}}}'", path.trim_start_matches('$').trim_start_matches('.').replace('.', ","))
    }
    fn extract_json_string(&self, expr: &str, path: &str) -> String {
        format!("{expr}->>'{path}'")
    }
    fn get_json_type(&self, expr: &str) -> String {
        format!("jsonb_typeof({expr})")
    }
    fn get_json_array_length(&self, col: &str, path: Option<&str>) -> String {
        match path {
            Some(p) => format!("jsonb_array_length({})", self.extract_json_field(col, p)),
            None => format!("jsonb_array_length({col})"),
        }
    }
    fn is_json_array(&self, expr: &str) -> String {
        format!("jsonb_typeof({expr}) = 'array'")
    }
    fn wrap_json_array(&self, expr: &str) -> String {
        format!("jsonb_build_array({expr})")
    }
    fn empty_json_array(&self) -> String {
        "'[]'::jsonb".to_string()
    }
    fn check_json_exists(&self, col: &str, path: &str) -> String {
        format!("{col} ? '{path}'")
    }
    fn json_array_contains(&self, arr: &str, needle: &str) -> String {
        format!("{arr} @> to_jsonb({needle})")
    }

    fn unnest_json_array(&self, col: &str, path: &str, alias: &str) -> String {
        format!("jsonb_array_elements({}) AS {alias}", self.extract_json_field(col, path))
    }
    fn enumerate_json_array(&self, expr: &str, value_alias: &str, index_alias: &str) -> String {
        format!("jsonb_array_elements({expr}) WITH ORDINALITY AS t({value_alias}, {index_alias})")
    }
    fn aggregate_to_json_array(&self, expr_with_order_by: &str) -> String {
        format!("(SELECT jsonb_agg(value) FROM ({expr_with_order_by}) agg)")
    }
    fn serialize_json_value(&self, expr: &str) -> String {
        format!("{expr}::text")
    }
    fn project_json_array(&self, arr: &str, components: &str) -> String {
        format!("jsonb_build_array({components}) FROM {arr}")
    }
    fn generate_array_first(&self, arr: &str) -> String {
        format!("{arr}->0")
    }
    fn generate_array_last(&self, arr: &str) -> String {
        format!("{arr}->-1")
    }
    fn generate_array_skip(&self, arr: &str, n: i64) -> String {
        format!("(SELECT jsonb_agg(e) FROM jsonb_array_elements({arr}) WITH ORDINALITY x(e, i) WHERE i > {n})")
    }
    fn generate_array_take(&self, arr: &str, n: i64) -> String {
        format!("(SELECT jsonb_agg(e) FROM jsonb_array_elements({arr}) WITH ORDINALITY x(e, i) WHERE i <= {n})")
    }

    fn generate_comparison(&self, l: &str, op: &str, r: &str) -> String {
        format!("({l} {op} {r})")
    }
    fn generate_logical_combine(&self, l: &str, op: &str, r: &str) -> String {
        format!("({l} {op} {r})")
    }
    fn generate_xor(&self, l: &str, r: &str) -> String {
        format!("(({l} OR {r}) AND NOT ({l} AND {r}))")
    }
    fn generate_boolean_not(&self, x: &str) -> String {
        format!("(NOT {x})")
    }
    fn generate_type_check(&self, expr: &str, ty: &str) -> String {
        format!("jsonb_typeof({expr}) = '{ty}'")
    }
    fn generate_type_cast(&self, expr: &str, ty: &str) -> String {
        format!("CAST({expr} AS {ty})")
    }
    fn generate_collection_type_filter(&self, arr: &str, ty: Option<&str>) -> String {
        match ty {
            Some(t) => format!("(SELECT jsonb_agg(e) FROM jsonb_array_elements({arr}) e WHERE jsonb_typeof(e) = '{t}')"),
            None => arr.to_string(),
        }
    }

    fn safe_cast_to_integer(&self, expr: &str) -> String {
        format!("safe_cast_int({expr})")
    }
    fn safe_cast_to_decimal(&self, expr: &str) -> String {
        format!("safe_cast_decimal({expr})")
    }
    fn safe_cast_to_date(&self, expr: &str) -> String {
        format!("safe_cast_date({expr})")
    }
    fn safe_cast_to_timestamp(&self, expr: &str) -> String {
        format!("safe_cast_timestamp({expr})")
    }
    fn safe_cast_to_boolean(&self, expr: &str) -> String {
        format!("safe_cast_bool({expr})")
    }
    fn cast_to_double(&self, expr: &str) -> String {
        format!("CAST({expr} AS DOUBLE PRECISION)")
    }

    fn generate_date_literal(&self, s: &str) -> String {
        format!("DATE '{s}'")
    }
    fn generate_datetime_literal(&self, s: &str) -> String {
        format!("TIMESTAMP '{s}'")
    }
    fn generate_time_literal(&self, s: &str) -> String {
        format!("TIME '{s}'")
    }
    fn generate_current_date(&self) -> String {
        "CURRENT_DATE".to_string()
    }
    fn generate_current_timestamp(&self) -> String {
        "CURRENT_TIMESTAMP".to_string()
    }
    fn generate_current_time(&self) -> String {
        "CURRENT_TIME".to_string()
    }
    fn generate_temporal_boundary(&self, expr: &str, ty: &str, precision: u32, kind: BoundaryKind, has_tz: bool) -> String {
        let fn_name = match kind {
            BoundaryKind::Low => "temporal_low_boundary",
            BoundaryKind::High => "temporal_high_boundary",
        };
        format!("{fn_name}({expr}, '{ty}', {precision}, {has_tz})")
    }
    fn generate_decimal_boundary(&self, expr: &str, precision: u32, kind: BoundaryKind) -> String {
        let fn_name = match kind {
            BoundaryKind::Low => "decimal_low_boundary",
            BoundaryKind::High => "decimal_high_boundary",
        };
        format!("{fn_name}({expr}, {precision})")
    }
    fn generate_temporal_interval(&self, amount: &str, unit: &str) -> String {
        format!("INTERVAL '{amount} {unit}'")
    }

    fn generate_math_function(&self, name: &str, args: &[&str]) -> String {
        format!("{}({})", name.to_ascii_uppercase(), args.join(", "))
    }
    fn generate_decimal_division(&self, n: &str, d: &str) -> String {
        format!("CASE WHEN {d} = 0 OR {d} IS NULL OR {n} IS NULL THEN NULL ELSE ({n} / {d}) END")
    }
    fn generate_integer_division(&self, n: &str, d: &str) -> String {
        format!("CASE WHEN {d} = 0 OR {d} IS NULL OR {n} IS NULL THEN NULL ELSE TRUNC({n} / {d}) END")
    }
    fn generate_modulo(&self, a: &str, b: &str) -> String {
        format!("CASE WHEN {b} = 0 OR {b} IS NULL OR {a} IS NULL THEN NULL ELSE MOD({a}, {b}) END")
    }
    fn string_concat(&self, a: &str, b: &str) -> String {
        format!("({a} || {b})")
    }
    fn generate_string_function(&self, name: &str, args: &[&str]) -> String {
        format!("{name}({})", args.join(", "))
    }
    fn generate_substring_check(&self, s: &str, sub: &str) -> String {
        format!("({s} LIKE '%' || {sub} || '%')")
    }
    fn generate_prefix_check(&self, s: &str, p: &str) -> String {
        format!("starts_with({s}, {p})")
    }
    fn generate_suffix_check(&self, s: &str, p: &str) -> String {
        format!("({s} LIKE '%' || {p})")
    }
    fn generate_case_conversion(&self, s: &str, mode: CaseMode) -> String {
        match mode {
            CaseMode::Upper => format!("UPPER({s})"),
            CaseMode::Lower => format!("LOWER({s})"),
        }
    }
    fn generate_trim(&self, s: &str) -> String {
        format!("TRIM({s})")
    }
    fn generate_char_array(&self, s: &str) -> String {
        format!("string_to_char_array({s})")
    }
    fn generate_regex_match(&self, s: &str, p: &str) -> String {
        format!("({s} ~ {p})")
    }
    fn generate_regex_replace(&self, s: &str, p: &str, sub: &str) -> String {
        format!("regexp_replace({s}, {p}, {sub}, 'g')")
    }
    fn split_string(&self, s: &str, d: &str) -> String {
        format!("to_jsonb(string_to_array({s}, {d}))")
    }
    fn generate_string_join(&self, coll: &str, sep: &str, is_json: bool) -> String {
        if is_json {
            format!("(SELECT string_agg(e #>> '{{}}', {sep}) FROM jsonb_array_elements({coll}) e)")
        } else {
            format!("string_agg({coll}, {sep})")
        }
    }
    fn generate_array_to_string(&self, arr: &str, sep: &str) -> String {
        format!("array_to_string({arr}, {sep})")
    }

    fn generate_aggregate_function(&self, name: &str, expr: &str, filter: Option<&str>, distinct: bool) -> String {
        let distinct_kw = if distinct { "DISTINCT " } else { "" };
        match filter {
            Some(f) => format!("{}({distinct_kw}{expr}) FILTER (WHERE {f})", name.to_ascii_uppercase()),
            None => format!("{}({distinct_kw}{expr})", name.to_ascii_uppercase()),
        }
    }
    fn generate_all_check(&self, col: &str, path: &str, alias: &str, cond: &str) -> String {
        format!(
            "NOT EXISTS (SELECT 1 FROM {} {alias} WHERE NOT ({cond}))",
            self.unnest_json_array(col, path, alias)
        )
    }
    fn generate_all_true(&self, arr: &str) -> String {
        format!("NOT EXISTS (SELECT 1 FROM jsonb_array_elements({arr}) e WHERE e::text::boolean IS NOT TRUE)")
    }
    fn generate_any_true(&self, arr: &str) -> String {
        format!("EXISTS (SELECT 1 FROM jsonb_array_elements({arr}) e WHERE e::text::boolean IS TRUE)")
    }
    fn generate_all_false(&self, arr: &str) -> String {
        format!("NOT EXISTS (SELECT 1 FROM jsonb_array_elements({arr}) e WHERE e::text::boolean IS NOT FALSE)")
    }
    fn generate_any_false(&self, arr: &str) -> String {
        format!("EXISTS (SELECT 1 FROM jsonb_array_elements({arr}) e WHERE e::text::boolean IS FALSE)")
    }
    fn generate_distinct(&self, x: &str) -> String {
        format!("(SELECT jsonb_agg(DISTINCT e) FROM jsonb_array_elements({x}) e)")
    }
    fn generate_is_distinct(&self, x: &str) -> String {
        format!(
            "(jsonb_array_length({x}) = (SELECT COUNT(DISTINCT e) FROM jsonb_array_elements({x}) e))"
        )
    }
    fn is_finite(&self, expr: &str) -> String {
        format!("({expr} IS NOT NULL AND {expr} NOT IN ('NaN', 'Infinity', '-Infinity'))")
    }
}

pub fn identifier(text: &str) -> AstNode {
    AstNode::Identifier {
        text: text.to_string(),
        components: text.split('.').map(str::to_string).collect(),
        source_text: text.to_string(),
    }
}

pub fn string_literal(s: &str) -> AstNode {
    AstNode::Literal {
        value: LiteralValue::String(s.to_string()),
        literal_type: LiteralType::String,
        source_text: format!("'{s}'"),
    }
}

pub fn integer_literal(i: i64) -> AstNode {
    AstNode::Literal {
        value: LiteralValue::Integer(i),
        literal_type: LiteralType::Integer,
        source_text: i.to_string(),
    }
}

pub fn boolean_literal(b: bool) -> AstNode {
    AstNode::Literal {
        value: LiteralValue::Boolean(b),
        literal_type: LiteralType::Boolean,
        source_text: b.to_string(),
    }
}

pub fn date_literal(s: &str) -> AstNode {
    AstNode::Literal {
        value: LiteralValue::Date(s.to_string()),
        literal_type: LiteralType::Date,
        source_text: format!("@{s}"),
    }
}

pub fn datetime_literal(s: &str) -> AstNode {
    AstNode::Literal {
        value: LiteralValue::DateTime(s.to_string()),
        literal_type: LiteralType::DateTime,
        source_text: format!("@{s}"),
    }
}

pub fn empty_literal() -> AstNode {
    AstNode::Literal {
        value: LiteralValue::Empty,
        literal_type: LiteralType::EmptyCollection,
        source_text: "{}".to_string(),
    }
}

pub fn variable(name: &str) -> AstNode {
    AstNode::Variable {
        name: name.to_string(),
        source_text: name.to_string(),
    }
}

/// A no-explicit-target function call (`target` implicit in `source_text`,
/// resolved via the pending-fragment-result/pending-literal/current-context
/// chain — spec §4.5 priority order).
pub fn call(name: &str, args: Vec<AstNode>, source_text: &str) -> AstNode {
    AstNode::FunctionCall {
        data: FunctionCallData {
            name: name.to_string(),
            arguments: args,
            target: None,
        },
        source_text: source_text.to_string(),
    }
}

/// A function call with an explicit `target` edge (e.g. `name.given.first()`
/// where the parser supplies `name.given` as the call's target directly).
pub fn call_on(target: AstNode, name: &str, args: Vec<AstNode>, source_text: &str) -> AstNode {
    AstNode::FunctionCall {
        data: FunctionCallData {
            name: name.to_string(),
            arguments: args,
            target: Some(Box::new(target)),
        },
        source_text: source_text.to_string(),
    }
}

pub fn union_of(children: Vec<AstNode>, source_text: &str) -> AstNode {
    AstNode::Operator {
        data: OperatorData {
            symbol: "|".to_string(),
            kind: OperatorKind::Union,
            children: children.into_iter().map(Box::new).collect(),
        },
        source_text: source_text.to_string(),
    }
}

pub fn binary_op(symbol: &str, kind: OperatorKind, left: AstNode, right: AstNode, source_text: &str) -> AstNode {
    AstNode::Operator {
        data: OperatorData {
            symbol: symbol.to_string(),
            kind,
            children: smallvec![Box::new(left), Box::new(right)],
        },
        source_text: source_text.to_string(),
    }
}

pub fn conditional(condition: AstNode, then_branch: AstNode, else_branch: Option<AstNode>, source_text: &str) -> AstNode {
    AstNode::Conditional {
        condition: Box::new(condition),
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
        source_text: source_text.to_string(),
    }
}

pub fn type_op(op: TypeOp, target: AstNode, target_type: &str, source_text: &str) -> AstNode {
    AstNode::TypeOperation {
        op,
        target: Box::new(target),
        target_type: target_type.to_string(),
        source_text: source_text.to_string(),
    }
}
