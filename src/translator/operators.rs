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

//! Operator translation (spec §4.4): unary, union (linearized), arithmetic,
//! comparison, logical, and the remaining binary operators (`&`, `~`/`!~`).

use serde_json::Value;

use crate::ast::{AstNode, OperatorData, OperatorKind};
use crate::dialect::CaseMode;
use crate::error::Result;
use crate::fragment::{metadata_keys, Fragment};

use super::temporal;
use super::Translator;

pub(super) fn translate_operator(translator: &mut Translator<'_>, data: &OperatorData, source_text: &str) -> Result<Fragment> {
    match data.kind {
        OperatorKind::Unary => translate_unary(translator, data, source_text),
        OperatorKind::Union => translate_union(translator, data),
        OperatorKind::Arithmetic => {
            let (left, right) = translate_binary_children(translator, data, source_text)?;
            translate_arithmetic(translator, &data.symbol, &left, &right)
        }
        OperatorKind::Comparison => {
            let (left, right) = translate_binary_children(translator, data, source_text)?;
            translate_comparison(translator, &data.symbol, &left, &right)
        }
        OperatorKind::Logical => {
            let (left, right) = translate_binary_children(translator, data, source_text)?;
            translate_logical(translator, &data.symbol, &left, &right)
        }
        OperatorKind::Binary => {
            let (left, right) = translate_binary_children(translator, data, source_text)?;
            translate_binary(translator, &data.symbol, &left, &right)
        }
    }
}

fn translate_unary(translator: &mut Translator<'_>, data: &OperatorData, source_text: &str) -> Result<Fragment> {
    let child = data
        .children
        .first()
        .ok_or_else(|| translator.validation_error("missing_operand", "unary operator with no operand", source_text))?;
    let operand = translator.visit_node(child)?;
    let expr = match data.symbol.as_str() {
        "not" => translator.dialect.generate_boolean_not(&operand.expression),
        "-" => format!("(-({}))", operand.expression),
        "+" => operand.expression.clone(),
        other => {
            return Err(translator.validation_error(
                "unsupported_operator",
                format!("unsupported unary operator: {other}"),
                source_text,
            ))
        }
    };
    let mut fragment = Fragment::new(expr, operand.source_table.clone())?;
    fragment = fragment.with_dependencies(operand.dependencies.clone());
    fragment.set_metadata(metadata_keys::OPERATOR, data.symbol.clone());
    Ok(fragment)
}

/// Collect every operand of a left-associative `|`/`union` chain without
/// translating any of them (spec §4.4, §9): the parser may already have
/// flattened the chain into one `Union` node's children, or may have left
/// it as nested binary `Union` nodes — either shape flattens to the same
/// linear operand list here.
fn collect_union_operands<'n>(node: &'n AstNode, out: &mut Vec<&'n AstNode>) {
    match node.unwrap() {
        AstNode::Operator { data, .. } if data.kind == OperatorKind::Union => {
            for child in &data.children {
                collect_union_operands(child, out);
            }
        }
        other => out.push(other),
    }
}

fn translate_union(translator: &mut Translator<'_>, data: &OperatorData) -> Result<Fragment> {
    let mut operand_nodes: Vec<&AstNode> = Vec::new();
    for child in &data.children {
        collect_union_operands(child, &mut operand_nodes);
    }

    let base_snapshot = translator.context.snapshot();
    let mut operand_fragments = Vec::with_capacity(operand_nodes.len());
    for node in &operand_nodes {
        translator.context.restore(base_snapshot.clone());
        let fragment = translator.visit_node(node)?;
        operand_fragments.push(fragment);
    }
    translator.context.restore(base_snapshot);

    let mut rows = Vec::with_capacity(operand_fragments.len());
    let mut dependencies = Vec::new();
    for (idx, frag) in operand_fragments.iter().enumerate() {
        rows.push(format!("SELECT {idx} AS op_idx, 0 AS item_idx, {} AS value", frag.expression));
        if !dependencies.contains(&frag.source_table) {
            dependencies.push(frag.source_table.clone());
        }
        for dep in &frag.dependencies {
            if !dependencies.contains(dep) {
                dependencies.push(dep.clone());
            }
        }
    }
    let union_sql = rows.join(" UNION ALL ");
    let ordered = format!("(SELECT value FROM ({union_sql}) AS union_operands ORDER BY op_idx, item_idx)");
    let expr = translator.dialect.aggregate_to_json_array(&ordered);

    let table = translator.context.current_table.clone();
    let mut fragment = Fragment::new(expr, table)?;
    fragment = fragment.with_dependencies(dependencies);
    fragment.set_metadata(metadata_keys::OPERATOR, "union");
    fragment.set_metadata(metadata_keys::IS_COLLECTION, true);
    Ok(fragment)
}

fn translate_binary_children(translator: &mut Translator<'_>, data: &OperatorData, source_text: &str) -> Result<(Fragment, Fragment)> {
    if data.children.len() != 2 {
        return Err(translator.validation_error(
            "wrong_operand_count",
            format!("binary operator `{}` expects 2 operands, got {}", data.symbol, data.children.len()),
            source_text,
        ));
    }
    let left = translator.visit_node(&data.children[0])?;
    let right = translator.visit_node(&data.children[1])?;
    Ok((left, right))
}

fn is_integer_literal(fragment: &Fragment) -> bool {
    matches!(fragment.get_metadata(metadata_keys::LITERAL_TYPE), Some(Value::String(s)) if s == "integer")
}

fn literal_type(fragment: &Fragment) -> Option<&str> {
    match fragment.get_metadata(metadata_keys::LITERAL_TYPE) {
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

fn is_collection(fragment: &Fragment) -> bool {
    matches!(fragment.get_metadata(metadata_keys::IS_COLLECTION), Some(Value::Bool(true)))
}

fn has_quantity_metadata(fragment: &Fragment) -> bool {
    fragment.get_metadata(metadata_keys::QUANTITY_UNIT).is_some()
}

fn quantity_parts(fragment: &Fragment) -> Option<(String, String)> {
    let amount = match fragment.get_metadata(metadata_keys::QUANTITY_AMOUNT)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let unit = match fragment.get_metadata(metadata_keys::QUANTITY_UNIT)? {
        Value::String(s) => s.clone(),
        _ => return None,
    };
    Some((amount, unit))
}

fn try_temporal_quantity_arithmetic(translator: &mut Translator<'_>, symbol: &str, left: &Fragment, right: &Fragment) -> Option<String> {
    if !matches!(symbol, "+" | "-") {
        return None;
    }
    let is_temporal = matches!(literal_type(left), Some("date") | Some("datetime") | Some("time"));
    if !is_temporal || !has_quantity_metadata(right) {
        return None;
    }
    let (amount, unit) = quantity_parts(right)?;
    let interval = translator.dialect.generate_temporal_interval(&amount, &unit);
    Some(format!("({} {symbol} {interval})", left.expression))
}

fn translate_arithmetic(translator: &mut Translator<'_>, symbol: &str, left: &Fragment, right: &Fragment) -> Result<Fragment> {
    let expr = if let Some(expr) = try_temporal_quantity_arithmetic(translator, symbol, left, right) {
        expr
    } else {
        match symbol {
            "/" => translator.dialect.generate_decimal_division(&left.expression, &right.expression),
            "div" => translator.dialect.generate_integer_division(&left.expression, &right.expression),
            "mod" => translator.dialect.generate_modulo(&left.expression, &right.expression),
            "+" | "-" | "*" => format!("({} {symbol} {})", left.expression, right.expression),
            other => {
                return Err(translator.validation_error(
                    "unsupported_operator",
                    format!("unsupported arithmetic operator: {other}"),
                    "",
                ))
            }
        }
    };

    let table = translator.context.current_table.clone();
    let mut fragment = Fragment::new(expr, table)?;
    fragment = fragment.with_dependencies(left.dependencies.iter().chain(right.dependencies.iter()).cloned());
    fragment.set_metadata(metadata_keys::OPERATOR, symbol.to_string());
    if symbol != "/" && is_integer_literal(left) && is_integer_literal(right) {
        fragment.set_metadata(metadata_keys::RESULT_TYPE, "integer");
    } else {
        fragment.set_metadata(metadata_keys::RESULT_TYPE, "decimal");
    }
    Ok(fragment)
}

fn translate_comparison(translator: &mut Translator<'_>, symbol: &str, left: &Fragment, right: &Fragment) -> Result<Fragment> {
    let expr = if left.is_empty_collection() || right.is_empty_collection() {
        "FALSE".to_string()
    } else if (is_collection(left) || is_collection(right)) && matches!(symbol, "=" | "!=") {
        let l = translator.dialect.serialize_json_value(&left.expression);
        let r = translator.dialect.serialize_json_value(&right.expression);
        translator.dialect.generate_comparison(&l, symbol, &r)
    } else if let (Some(l_kind), Some(r_kind)) = (temporal::literal_temporal_kind(left), temporal::literal_temporal_kind(right)) {
        if temporal::needs_range_comparison(left, right) {
            temporal::translate_range_comparison(translator, symbol, left, right, l_kind, r_kind)?
        } else {
            translator.dialect.generate_comparison(&left.expression, symbol, &right.expression)
        }
    } else {
        let (l_expr, r_expr) = apply_safe_casts(translator, left, right);
        translator.dialect.generate_comparison(&l_expr, symbol, &r_expr)
    };

    let table = translator.context.current_table.clone();
    let mut fragment = Fragment::new(expr, table)?;
    fragment = fragment.with_dependencies(left.dependencies.iter().chain(right.dependencies.iter()).cloned());
    fragment.set_metadata(metadata_keys::OPERATOR, symbol.to_string());
    Ok(fragment)
}

/// When one side is a typed literal and the other a bare JSON extraction,
/// safe-cast the extracted side to the literal's type before comparing.
fn apply_safe_casts(translator: &Translator<'_>, left: &Fragment, right: &Fragment) -> (String, String) {
    match (literal_type(left), literal_type(right)) {
        (Some(_), None) => (left.expression.clone(), safe_cast_for(translator, literal_type(left), &right.expression)),
        (None, Some(_)) => (safe_cast_for(translator, literal_type(right), &left.expression), right.expression.clone()),
        _ => (left.expression.clone(), right.expression.clone()),
    }
}

fn safe_cast_for(translator: &Translator<'_>, ty: Option<&str>, expr: &str) -> String {
    match ty {
        Some("integer") => translator.dialect.safe_cast_to_integer(expr),
        Some("decimal") => translator.dialect.safe_cast_to_decimal(expr),
        Some("date") => translator.dialect.safe_cast_to_date(expr),
        Some("datetime") => translator.dialect.safe_cast_to_timestamp(expr),
        Some("boolean") => translator.dialect.safe_cast_to_boolean(expr),
        _ => expr.to_string(),
    }
}

fn translate_logical(translator: &mut Translator<'_>, symbol: &str, left: &Fragment, right: &Fragment) -> Result<Fragment> {
    let expr = match symbol {
        "and" | "or" => translator.dialect.generate_logical_combine(&left.expression, symbol, &right.expression),
        "xor" => translator.dialect.generate_xor(&left.expression, &right.expression),
        "implies" => translate_implies(translator, left, right),
        other => {
            return Err(translator.validation_error(
                "unsupported_operator",
                format!("unsupported logical operator: {other}"),
                "",
            ))
        }
    };
    let table = translator.context.current_table.clone();
    let mut fragment = Fragment::new(expr, table)?;
    fragment = fragment.with_dependencies(left.dependencies.iter().chain(right.dependencies.iter()).cloned());
    fragment.set_metadata(metadata_keys::OPERATOR, symbol.to_string());
    Ok(fragment)
}

/// `implies`, spec-mandated empty handling: `{} implies false -> {}`,
/// `{} implies truthy -> truthy`, `true implies {} -> {}`,
/// `false implies anything -> true`.
fn translate_implies(translator: &mut Translator<'_>, left: &Fragment, right: &Fragment) -> String {
    if left.is_empty_collection() {
        return format!(
            "CASE WHEN {r} IS TRUE THEN TRUE WHEN {r} IS FALSE THEN NULL ELSE NULL END",
            r = right.expression
        );
    }
    let not_l = translator.dialect.generate_boolean_not(&left.expression);
    let combine = translator.dialect.generate_logical_combine(&not_l, "or", &right.expression);
    format!(
        "CASE WHEN {l} IS FALSE THEN TRUE WHEN {r} IS NULL THEN NULL ELSE {combine} END",
        l = left.expression,
        r = right.expression,
    )
}

fn translate_binary(translator: &mut Translator<'_>, symbol: &str, left: &Fragment, right: &Fragment) -> Result<Fragment> {
    let expr = match symbol {
        "&" => {
            let l = format!("COALESCE({}, '')", left.expression);
            let r = format!("COALESCE({}, '')", right.expression);
            translator.dialect.string_concat(&l, &r)
        }
        "~" => translate_equivalence(translator, false, left, right),
        "!~" => translate_equivalence(translator, true, left, right),
        other => {
            return Err(translator.validation_error(
                "unsupported_operator",
                format!("unsupported binary operator: {other}"),
                "",
            ))
        }
    };
    let table = translator.context.current_table.clone();
    let mut fragment = Fragment::new(expr, table)?;
    fragment = fragment.with_dependencies(left.dependencies.iter().chain(right.dependencies.iter()).cloned());
    fragment.set_metadata(metadata_keys::OPERATOR, symbol.to_string());
    Ok(fragment)
}

/// `~`/`!~` equivalence: case-insensitive for strings, equality otherwise,
/// with NULL-to-NULL yielding true for `~` and false for `!~`.
fn translate_equivalence(translator: &mut Translator<'_>, negate: bool, left: &Fragment, right: &Fragment) -> String {
    let is_string = literal_type(left) == Some("string") || literal_type(right) == Some("string");
    let base_cmp = if is_string {
        let l = translator.dialect.generate_case_conversion(&left.expression, CaseMode::Lower);
        let r = translator.dialect.generate_case_conversion(&right.expression, CaseMode::Lower);
        translator.dialect.generate_comparison(&l, "=", &r)
    } else {
        translator.dialect.generate_comparison(&left.expression, "=", &right.expression)
    };
    let cmp_result = if negate { format!("NOT ({base_cmp})") } else { base_cmp };
    let both_null_result = if negate { "FALSE" } else { "TRUE" };
    let one_null_result = if negate { "TRUE" } else { "FALSE" };
    format!(
        "CASE WHEN {l} IS NULL AND {r} IS NULL THEN {both_null_result} WHEN {l} IS NULL OR {r} IS NULL THEN {one_null_result} ELSE {cmp_result} END",
        l = left.expression,
        r = right.expression,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_integer_literal_reads_metadata() {
        let mut f = Fragment::from_resource("1").unwrap();
        f.set_metadata(metadata_keys::LITERAL_TYPE, "integer");
        assert!(is_integer_literal(&f));
    }

    #[test]
    fn collect_union_operands_flattens_nested_chain() {
        use crate::ast::{LiteralType, LiteralValue};
        use smallvec::smallvec;

        let leaf = |n: i64| AstNode::Literal {
            value: LiteralValue::Integer(n),
            literal_type: LiteralType::Integer,
            source_text: n.to_string(),
        };
        let inner = AstNode::Operator {
            data: OperatorData {
                symbol: "|".into(),
                kind: OperatorKind::Union,
                children: smallvec![Box::new(leaf(1)), Box::new(leaf(2))],
            },
            source_text: "1 | 2".into(),
        };
        let outer = AstNode::Operator {
            data: OperatorData {
                symbol: "|".into(),
                kind: OperatorKind::Union,
                children: smallvec![Box::new(inner), Box::new(leaf(3))],
            },
            source_text: "1 | 2 | 3".into(),
        };
        let mut out = Vec::new();
        collect_union_operands(&outer, &mut out);
        assert_eq!(out.len(), 3);
    }
}
