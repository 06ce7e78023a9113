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

//! Conversion functions (spec §4.5): `to*` casts and the generic
//! `convertsTo*` dispatcher.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{AstNode, LiteralValue};
use crate::error::Result;
use crate::fragment::{metadata_keys, Fragment};

use super::require_args;
use crate::translator::quantity;
use crate::translator::{FunctionTarget, Translator};

static BOOLEAN_TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(true|false|t|f|1|0|yes|no)$").unwrap());
static INTEGER_TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());
static DECIMAL_TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+(\.\d+)?$").unwrap());
static DATETIME_TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}(-\d{2}(-\d{2}(T\d{2}(:\d{2}(:\d{2}(\.\d+)?)?)?(Z|[+-]\d{2}:\d{2})?)?)?)?$").unwrap());
static TIME_TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^T?\d{2}(:\d{2}(:\d{2}(\.\d+)?)?)?$").unwrap());
static QUANTITY_TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+(\.\d+)?\s*'[^']*'$").unwrap());

pub(crate) fn translate_to_boolean(translator: &mut Translator<'_>, target: &FunctionTarget) -> Result<Fragment> {
    let expr = translator.dialect.safe_cast_to_boolean(&target.fragment.expression);
    tagged(target, expr, "toBoolean")
}

pub(crate) fn translate_to_integer(translator: &mut Translator<'_>, target: &FunctionTarget) -> Result<Fragment> {
    let expr = translator.dialect.safe_cast_to_integer(&target.fragment.expression);
    tagged(target, expr, "toInteger")
}

pub(crate) fn translate_to_string(translator: &mut Translator<'_>, target: &FunctionTarget) -> Result<Fragment> {
    let expr = translator.dialect.generate_type_cast(&target.fragment.expression, "string");
    tagged(target, expr, "toString")
}

pub(crate) fn translate_to_decimal(translator: &mut Translator<'_>, target: &FunctionTarget) -> Result<Fragment> {
    let expr = translator.dialect.safe_cast_to_decimal(&target.fragment.expression);
    tagged(target, expr, "toDecimal")
}

pub(crate) fn translate_to_datetime(translator: &mut Translator<'_>, target: &FunctionTarget) -> Result<Fragment> {
    let expr = translator.dialect.safe_cast_to_timestamp(&target.fragment.expression);
    tagged(target, expr, "toDateTime")
}

pub(crate) fn translate_to_time(translator: &mut Translator<'_>, target: &FunctionTarget) -> Result<Fragment> {
    let expr = translator.dialect.generate_type_cast(&target.fragment.expression, "time");
    tagged(target, expr, "toTime")
}

/// `toQuantity()` on a bare string is not implemented and always returns
/// NULL (spec §4.5 — out of scope beyond the `quantity()` constructor).
pub(crate) fn translate_to_quantity(translator: &mut Translator<'_>, target: &Fragment) -> Result<Fragment> {
    let mut fragment = Fragment::new("NULL", target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, "toQuantity");
    let _ = translator;
    Ok(fragment)
}

fn tagged(target: &FunctionTarget, expr: String, fn_name: &str) -> Result<Fragment> {
    let mut fragment = Fragment::new(expr, target.fragment.source_table.clone())?;
    fragment.add_dependency(target.fragment.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, fn_name.to_string());
    Ok(fragment)
}

/// `quantity(amount, unit)` (or a single combined `"amount unit"` string
/// argument) — the pseudo-function constructor for FHIR `Quantity` literals.
pub(crate) fn translate_quantity_constructor(translator: &mut Translator<'_>, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    match args.len() {
        2 => {
            let parts = require_args(translator, args, 2, "quantity", source_text)?;
            quantity::translate_quantity_literal(translator, &parts[0].expression, &parts[1].expression)
        }
        1 => {
            let parts = require_args(translator, args, 1, "quantity", source_text)?;
            let combined = parts[0].expression.trim_matches('\'').to_string();
            let (amount, unit) = combined
                .split_once(' ')
                .map(|(a, u)| (a.to_string(), u.to_string()))
                .ok_or_else(|| translator.validation_error("invalid_quantity", format!("cannot split quantity literal: {combined}"), source_text))?;
            quantity::translate_quantity_literal(translator, &amount, &unit)
        }
        other => Err(translator.validation_error("wrong_argument_count", format!("quantity expects 1 or 2 arguments, got {other}"), source_text)),
    }
}

/// Generic `convertsTo*` dispatcher: when the target is a known literal,
/// evaluate the conversion at compile time against the raw value's text;
/// otherwise emit a safe-cast-succeeded boolean check.
pub(crate) fn translate_converts_to(translator: &mut Translator<'_>, target: &FunctionTarget, type_name: &str) -> Result<Fragment> {
    if let Some(literal) = &target.literal {
        let converts = literal_converts_to(&literal.raw_value, type_name);
        let expr = if converts { "TRUE" } else { "FALSE" };
        return tagged(target, expr.to_string(), &format!("convertsTo{}", capitalize(type_name)));
    }

    if type_name == "string" {
        // Every primitive FHIRPath value has a string representation.
        return tagged(target, "TRUE".to_string(), "convertsToString");
    }

    let cast_expr = match type_name {
        "boolean" => translator.dialect.safe_cast_to_boolean(&target.fragment.expression),
        "integer" => translator.dialect.safe_cast_to_integer(&target.fragment.expression),
        "decimal" => translator.dialect.safe_cast_to_decimal(&target.fragment.expression),
        "datetime" => translator.dialect.safe_cast_to_timestamp(&target.fragment.expression),
        "time" => translator.dialect.generate_type_cast(&target.fragment.expression, "time"),
        "quantity" => translator.dialect.generate_type_cast(&target.fragment.expression, "Quantity"),
        other => translator.dialect.generate_type_cast(&target.fragment.expression, other),
    };
    let expr = format!("CASE WHEN {cast_expr} IS NOT NULL THEN TRUE ELSE FALSE END");
    tagged(target, expr, &format!("convertsTo{}", capitalize(type_name)))
}

fn literal_converts_to(value: &LiteralValue, type_name: &str) -> bool {
    match type_name {
        "boolean" => matches!(value, LiteralValue::Boolean(_)) || matches_text(value, &BOOLEAN_TEXT_RE),
        "integer" => matches!(value, LiteralValue::Integer(_)) || matches_text(value, &INTEGER_TEXT_RE),
        "decimal" => matches!(value, LiteralValue::Integer(_) | LiteralValue::Decimal(_)) || matches_text(value, &DECIMAL_TEXT_RE),
        "string" => true,
        "datetime" => matches!(value, LiteralValue::DateTime(_) | LiteralValue::Date(_)) || matches_text(value, &DATETIME_TEXT_RE),
        "time" => matches!(value, LiteralValue::Time(_)) || matches_text(value, &TIME_TEXT_RE),
        "quantity" => matches_text(value, &QUANTITY_TEXT_RE),
        _ => false,
    }
}

fn matches_text(value: &LiteralValue, pattern: &Regex) -> bool {
    match value {
        LiteralValue::String(s) | LiteralValue::Unknown(s) => pattern.is_match(s.trim()),
        _ => false,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
