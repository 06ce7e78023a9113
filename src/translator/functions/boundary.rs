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

//! `highBoundary(precision)` / `lowBoundary(precision)` (spec §4.5).
//!
//! Determines the input's FHIR type through a priority chain — literal
//! type, cast/`ofType` target type, element type resolved off an unnest,
//! then the path's declared type via the Type Oracle — and dispatches to
//! the matching boundary generator. Quantity literals are special-cased:
//! their boundary is computed at translation time as a half-ULP interval
//! rather than delegated to the dialect.

use crate::ast::AstNode;
use crate::dialect::BoundaryKind;
use crate::error::Result;
use crate::fragment::{metadata_keys, Fragment};

use super::translate_argument;
use crate::translator::quantity;
use crate::translator::{FunctionTarget, Translator};

const TEMPORAL_TYPES: &[&str] = &["date", "datetime", "time", "instant"];

fn resolve_fhir_type(translator: &Translator<'_>, target: &FunctionTarget) -> Option<String> {
    let fragment = &target.fragment;

    if fragment.get_metadata(metadata_keys::QUANTITY_AMOUNT).is_some() {
        return Some("quantity".to_string());
    }
    if let Some(literal_type) = fragment.get_metadata(metadata_keys::LITERAL_TYPE).and_then(|v| v.as_str().map(str::to_string)) {
        return Some(literal_type);
    }
    if let Some(target_type) = fragment.get_metadata(metadata_keys::TARGET_TYPE).and_then(|v| v.as_str().map(str::to_string)) {
        return Some(target_type.to_ascii_lowercase());
    }
    if let Some(element_type) = fragment.get_metadata(metadata_keys::ELEMENT_TYPE).and_then(|v| v.as_str().map(str::to_string)) {
        return Some(element_type.to_ascii_lowercase());
    }
    translator
        .oracle
        .element_type(&translator.context.current_resource_type, &translator.context.parent_path.join("."))
        .map(|t| t.to_ascii_lowercase())
}

fn has_timezone_offset(text: &str) -> bool {
    text.ends_with('Z') || (text.len() > 10 && (text[10..].contains('+') || text[10..].contains('-')))
}

pub(crate) fn translate_boundary(
    translator: &mut Translator<'_>,
    target: &FunctionTarget,
    args: &[AstNode],
    kind: BoundaryKind,
    source_text: &str,
) -> Result<Fragment> {
    if args.len() > 1 {
        return Err(translator.validation_error("wrong_argument_count", format!("boundary functions expect 0 or 1 arguments, got {}", args.len()), source_text));
    }
    let precision: Option<i64> = if args.is_empty() {
        None
    } else {
        let arg = translate_argument(translator, &args[0])?;
        arg.expression
            .parse::<i64>()
            .map_err(|_| translator.validation_error("non_literal_precision", "boundary precision must be a literal integer".to_string(), source_text))
            .map(Some)?
    };
    if let Some(p) = precision {
        if !(0..=31).contains(&p) {
            return fallback_null(target);
        }
    }

    let fhir_type = resolve_fhir_type(translator, target);
    let fn_name = match kind {
        BoundaryKind::High => "highBoundary",
        BoundaryKind::Low => "lowBoundary",
    };

    match fhir_type.as_deref() {
        Some("quantity") => {
            let amount_text = target
                .fragment
                .get_metadata(metadata_keys::QUANTITY_AMOUNT)
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            match quantity::translate_quantity_boundary(&amount_text, kind) {
                Some(boundary) => tagged(target, boundary, fn_name),
                None => fallback_null(target),
            }
        }
        Some("decimal") | Some("integer") => {
            let p = precision.unwrap_or(8) as u32;
            let expr = translator.dialect.generate_decimal_boundary(&target.fragment.expression, p, kind);
            tagged(target, expr, fn_name)
        }
        Some(ty) if TEMPORAL_TYPES.contains(&ty) => {
            let raw = target
                .fragment
                .get_metadata(metadata_keys::LITERAL_RAW_VALUE)
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let has_tz = has_timezone_offset(&raw);
            let p = precision.unwrap_or(if ty == "date" { 8 } else { 17 }) as u32;
            let expr = translator.dialect.generate_temporal_boundary(&target.fragment.expression, ty, p, kind, has_tz);
            tagged(target, expr, fn_name)
        }
        _ => fallback_null(target),
    }
}

fn tagged(target: &FunctionTarget, expr: String, fn_name: &str) -> Result<Fragment> {
    let mut fragment = Fragment::new(expr, target.fragment.source_table.clone())?;
    fragment.add_dependency(target.fragment.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, fn_name);
    Ok(fragment)
}

fn fallback_null(target: &FunctionTarget) -> Result<Fragment> {
    let mut fragment = Fragment::new("NULL", target.fragment.source_table.clone())?;
    fragment.add_dependency(target.fragment.source_table.clone());
    Ok(fragment)
}
