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

//! The function-call dispatcher (spec §4.5): a single entry point that
//! lowercases the call name, resolves its target via
//! `Translator::resolve_function_target`, and routes to the submodule that
//! implements it.

mod boundary;
mod collection;
mod conversion;
mod math;
mod string;

use crate::ast::{AstNode, FunctionCallData};
use crate::error::Result;
use crate::fragment::Fragment;

use super::Translator;

pub(crate) fn dispatch(translator: &mut Translator<'_>, data: &FunctionCallData, source_text: &str) -> Result<Fragment> {
    let name = data.name.to_ascii_lowercase();
    let target = translator.resolve_function_target(data)?;
    let t = &target.fragment;

    let result = match name.as_str() {
        "where" | "exists" => collection::translate_where_or_exists(translator, &name, t, &data.arguments, source_text),
        "empty" => collection::translate_empty(translator, t),
        "select" => collection::translate_select(translator, t, &data.arguments, source_text),
        "first" => collection::translate_first_or_last(translator, t, "first"),
        "last" => collection::translate_first_or_last(translator, t, "last"),
        "skip" => collection::translate_skip_or_take(translator, t, &data.arguments, "skip", source_text),
        "take" => collection::translate_skip_or_take(translator, t, &data.arguments, "take", source_text),
        "tail" => collection::translate_tail(translator, t),
        "single" => collection::translate_single(translator, t),
        "distinct" => collection::translate_distinct(translator, t),
        "isdistinct" => collection::translate_is_distinct(translator, t),
        "intersect" => collection::translate_intersect_or_exclude(translator, t, &data.arguments, true, source_text),
        "exclude" => collection::translate_intersect_or_exclude(translator, t, &data.arguments, false, source_text),
        "subsetof" => collection::translate_subset_or_superset(translator, t, &data.arguments, true, source_text),
        "supersetof" => collection::translate_subset_or_superset(translator, t, &data.arguments, false, source_text),
        "combine" => collection::translate_combine(translator, t, &data.arguments, source_text),
        "aggregate" => collection::translate_aggregate(translator, t, &data.arguments, source_text),
        "repeat" => collection::translate_repeat(translator, t, &data.arguments, source_text),
        "all" => collection::translate_all(translator, t, &data.arguments, source_text),
        "alltrue" => collection::translate_quantifier(translator, t, "all_true"),
        "anytrue" => collection::translate_quantifier(translator, t, "any_true"),
        "allfalse" => collection::translate_quantifier(translator, t, "all_false"),
        "anyfalse" => collection::translate_quantifier(translator, t, "any_false"),
        "count" => collection::translate_count(translator, t),

        "length" => string::translate_length(translator, t),
        "substring" => string::translate_substring(translator, t, &data.arguments, source_text),
        "indexof" => string::translate_index_of(translator, t, &data.arguments, source_text),
        "replace" => string::translate_replace(translator, t, &data.arguments, source_text),
        "split" => string::translate_split(translator, t, &data.arguments, source_text),
        "upper" => string::translate_case(translator, t, crate::dialect::CaseMode::Upper),
        "lower" => string::translate_case(translator, t, crate::dialect::CaseMode::Lower),
        "trim" => string::translate_trim(translator, t),
        "contains" => string::translate_substring_check(translator, t, &data.arguments, source_text),
        "startswith" => string::translate_prefix_check(translator, t, &data.arguments, source_text),
        "endswith" => string::translate_suffix_check(translator, t, &data.arguments, source_text),
        "matches" => string::translate_regex_match(translator, t, &data.arguments, source_text),
        "replacematches" => string::translate_regex_replace(translator, t, &data.arguments, source_text),
        "tochars" => string::translate_to_chars(translator, t),
        "join" => string::translate_join(translator, t, &data.arguments, source_text),

        "abs" | "ceiling" | "floor" | "round" | "truncate" | "sqrt" | "exp" | "ln" => {
            math::translate_unary_math(translator, &name, t, &data.arguments)
        }
        "log" => math::translate_log(translator, t, &data.arguments, source_text),
        "power" => math::translate_power(translator, t, &data.arguments, source_text),

        "toboolean" => conversion::translate_to_boolean(translator, &target),
        "tointeger" => conversion::translate_to_integer(translator, &target),
        "tostring" => conversion::translate_to_string(translator, &target),
        "todecimal" => conversion::translate_to_decimal(translator, &target),
        "toquantity" => conversion::translate_to_quantity(translator, t),
        "todatetime" => conversion::translate_to_datetime(translator, &target),
        "totime" => conversion::translate_to_time(translator, &target),
        "quantity" => conversion::translate_quantity_constructor(translator, &data.arguments, source_text),

        "convertstoboolean" => conversion::translate_converts_to(translator, &target, "boolean"),
        "convertstointeger" => conversion::translate_converts_to(translator, &target, "integer"),
        "convertstostring" => conversion::translate_converts_to(translator, &target, "string"),
        "convertstodecimal" => conversion::translate_converts_to(translator, &target, "decimal"),
        "convertstoquantity" => conversion::translate_converts_to(translator, &target, "quantity"),
        "convertstodatetime" => conversion::translate_converts_to(translator, &target, "datetime"),
        "convertstotime" => conversion::translate_converts_to(translator, &target, "time"),

        "highboundary" => boundary::translate_boundary(translator, &target, &data.arguments, crate::dialect::BoundaryKind::High, source_text),
        "lowboundary" => boundary::translate_boundary(translator, &target, &data.arguments, crate::dialect::BoundaryKind::Low, source_text),

        other => Err(translator.validation_error("unknown_function", format!("unknown function: {other}"), source_text)),
    };

    translator.context.restore(target.snapshot);
    result
}

/// `Aggregation{function}`: a bare aggregate function reference (used
/// inside a reduction context) — equivalent to calling that function by
/// name with the current context as its implicit target.
pub(crate) fn dispatch_bare_aggregate(translator: &mut Translator<'_>, function: &str, source_text: &str) -> Result<Fragment> {
    let expr = translator.current_context_expression();
    let table = translator.context.current_table.clone();
    let sql = translator.dialect.generate_aggregate_function(&function.to_ascii_lowercase(), &expr, None, false);
    let mut fragment = Fragment::new(sql, table.clone())?;
    fragment.add_dependency(table);
    fragment.is_aggregate = true;
    let _ = source_text;
    Ok(fragment)
}

/// Translate a function argument node, restoring path-state afterward so
/// sibling arguments don't see each other's path mutations.
pub(super) fn translate_argument(translator: &mut Translator<'_>, node: &AstNode) -> Result<Fragment> {
    let snapshot = translator.context.snapshot();
    let fragment = translator.visit_node(node)?;
    translator.context.restore(snapshot);
    Ok(fragment)
}

/// Require exactly `n` arguments, translating each.
pub(super) fn require_args(translator: &mut Translator<'_>, args: &[AstNode], n: usize, fn_name: &str, source_text: &str) -> Result<Vec<Fragment>> {
    if args.len() != n {
        return Err(translator.validation_error(
            "wrong_argument_count",
            format!("{fn_name} expects {n} argument(s), got {}", args.len()),
            source_text,
        ));
    }
    args.iter().map(|a| translate_argument(translator, a)).collect()
}
