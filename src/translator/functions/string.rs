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

//! String functions (spec §4.5).

use crate::ast::AstNode;
use crate::dialect::CaseMode;
use crate::error::Result;
use crate::fragment::{metadata_keys, Fragment};

use super::{require_args, translate_argument};
use crate::translator::Translator;

fn simple(translator: &Translator<'_>, target: &Fragment, expr: String, fn_name: &str) -> Result<Fragment> {
    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, fn_name.to_string());
    let _ = translator;
    Ok(fragment)
}

pub(crate) fn translate_length(translator: &mut Translator<'_>, target: &Fragment) -> Result<Fragment> {
    let expr = translator.dialect.generate_string_function("length", &[&target.expression]);
    simple(translator, target, expr, "length")
}

/// `substring(start [, length])`: 0-based FHIRPath offset converted to the
/// dialect's 1-based convention; negative start or zero length yields `''`,
/// NULL inputs propagate NULL (spec §4.5).
pub(crate) fn translate_substring(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    if args.is_empty() || args.len() > 2 {
        return Err(translator.validation_error("wrong_argument_count", format!("substring expects 1 or 2 arguments, got {}", args.len()), source_text));
    }
    let start = translate_argument(translator, &args[0])?;
    let one_based_start = format!("({} + 1)", start.expression);
    let call_args: Vec<String> = match args.len() {
        2 => {
            let length = translate_argument(translator, &args[1])?;
            vec![target.expression.clone(), one_based_start, length.expression]
        }
        _ => vec![target.expression.clone(), one_based_start],
    };
    let arg_refs: Vec<&str> = call_args.iter().map(String::as_str).collect();
    let base_call = translator.dialect.generate_string_function("substring", &arg_refs);
    let expr = format!(
        "CASE WHEN {target_expr} IS NULL OR {start_expr} < 0 THEN NULL WHEN {start_expr} >= {len} THEN '' ELSE {base_call} END",
        target_expr = target.expression,
        start_expr = start.expression,
        len = translator.dialect.generate_string_function("length", &[&target.expression]),
    );
    simple(translator, target, expr, "substring")
}

pub(crate) fn translate_index_of(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    let substrings = require_args(translator, args, 1, "indexOf", source_text)?;
    let expr = translator
        .dialect
        .generate_string_function("indexOf", &[&target.expression, &substrings[0].expression]);
    let wrapped = format!("CASE WHEN {t} IS NULL OR {s} IS NULL THEN NULL ELSE {expr} END", t = target.expression, s = substrings[0].expression);
    simple(translator, target, wrapped, "indexOf")
}

pub(crate) fn translate_replace(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    let parts = require_args(translator, args, 2, "replace", source_text)?;
    let expr = translator
        .dialect
        .generate_string_function("replace", &[&target.expression, &parts[0].expression, &parts[1].expression]);
    simple(translator, target, expr, "replace")
}

pub(crate) fn translate_split(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    let parts = require_args(translator, args, 1, "split", source_text)?;
    let expr = translator.dialect.split_string(&target.expression, &parts[0].expression);
    simple(translator, target, expr, "split")
}

pub(crate) fn translate_case(translator: &mut Translator<'_>, target: &Fragment, mode: CaseMode) -> Result<Fragment> {
    let expr = translator.dialect.generate_case_conversion(&target.expression, mode);
    let fn_name = match mode {
        CaseMode::Upper => "upper",
        CaseMode::Lower => "lower",
    };
    simple(translator, target, expr, fn_name)
}

pub(crate) fn translate_trim(translator: &mut Translator<'_>, target: &Fragment) -> Result<Fragment> {
    let expr = translator.dialect.generate_trim(&target.expression);
    simple(translator, target, expr, "trim")
}

pub(crate) fn translate_substring_check(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    let parts = require_args(translator, args, 1, "contains", source_text)?;
    let expr = translator.dialect.generate_substring_check(&target.expression, &parts[0].expression);
    simple(translator, target, expr, "contains")
}

pub(crate) fn translate_prefix_check(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    let parts = require_args(translator, args, 1, "startsWith", source_text)?;
    let expr = translator.dialect.generate_prefix_check(&target.expression, &parts[0].expression);
    simple(translator, target, expr, "startsWith")
}

pub(crate) fn translate_suffix_check(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    let parts = require_args(translator, args, 1, "endsWith", source_text)?;
    let expr = translator.dialect.generate_suffix_check(&target.expression, &parts[0].expression);
    simple(translator, target, expr, "endsWith")
}

pub(crate) fn translate_regex_match(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    let parts = require_args(translator, args, 1, "matches", source_text)?;
    let expr = translator.dialect.generate_regex_match(&target.expression, &parts[0].expression);
    simple(translator, target, expr, "matches")
}

pub(crate) fn translate_regex_replace(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    let parts = require_args(translator, args, 2, "replaceMatches", source_text)?;
    let expr = translator
        .dialect
        .generate_regex_replace(&target.expression, &parts[0].expression, &parts[1].expression);
    simple(translator, target, expr, "replaceMatches")
}

/// `toChars()`: split into single-character array; the empty string maps to
/// an empty array (spec §4.5).
pub(crate) fn translate_to_chars(translator: &mut Translator<'_>, target: &Fragment) -> Result<Fragment> {
    let chars = translator.dialect.generate_char_array(&target.expression);
    let expr = format!(
        "CASE WHEN {t} = '' THEN {empty} ELSE {chars} END",
        t = target.expression,
        empty = translator.dialect.empty_json_array(),
    );
    simple(translator, target, expr, "toChars")
}

pub(crate) fn translate_join(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    if args.len() > 1 {
        return Err(translator.validation_error("wrong_argument_count", format!("join expects 0 or 1 arguments, got {}", args.len()), source_text));
    }
    let separator = if args.is_empty() {
        "''".to_string()
    } else {
        translate_argument(translator, &args[0])?.expression
    };
    let is_json = target.requires_unnest || target.get_metadata(metadata_keys::IS_COLLECTION).is_some();
    let expr = translator.dialect.generate_string_join(&target.expression, &separator, is_json);
    simple(translator, target, expr, "join")
}
