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

//! Math functions (spec §4.5): the unary set, `log`, and `power`, with the
//! domain guards FHIRPath mandates (negative `sqrt`, non-positive `log`
//! args/base, `power` of zero/negative base with non-integer exponent all
//! evaluate to `{}`/NULL rather than erroring).

use crate::ast::AstNode;
use crate::error::Result;
use crate::fragment::{metadata_keys, Fragment};

use super::translate_argument;
use crate::translator::Translator;

fn finite_guard(translator: &Translator<'_>, expr: &str) -> String {
    format!("CASE WHEN {guard} THEN {expr} ELSE NULL END", guard = translator.dialect.is_finite(expr))
}

/// `abs` / `ceiling` / `floor` / `round` / `truncate` / `sqrt` / `exp` / `ln`.
pub(crate) fn translate_unary_math(translator: &mut Translator<'_>, name: &str, target: &Fragment, args: &[AstNode]) -> Result<Fragment> {
    let call_args = if name == "round" && !args.is_empty() {
        let precision = translate_argument(translator, &args[0])?;
        vec![translator.dialect.cast_to_double(&target.expression), translator.dialect.cast_to_double(&precision.expression)]
    } else {
        vec![translator.dialect.cast_to_double(&target.expression)]
    };
    let arg_refs: Vec<&str> = call_args.iter().map(String::as_str).collect();
    let raw = translator.dialect.generate_math_function(name, &arg_refs);

    let expr = match name {
        "sqrt" => format!(
            "CASE WHEN {t} < 0 THEN NULL ELSE {guarded} END",
            t = target.expression,
            guarded = finite_guard(translator, &raw)
        ),
        "ln" | "exp" => finite_guard(translator, &raw),
        _ => raw,
    };

    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, name.to_string());
    Ok(fragment)
}

/// `log(base)`: non-positive argument, non-positive base, or base `= 1`
/// evaluate to NULL. Implemented as `ln(x) / ln(base)` since the dialect has
/// no dedicated arbitrary-base logarithm primitive.
pub(crate) fn translate_log(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    if args.len() != 1 {
        return Err(translator.validation_error("wrong_argument_count", format!("log expects 1 argument, got {}", args.len()), source_text));
    }
    let base = translate_argument(translator, &args[0])?;
    let x_double = translator.dialect.cast_to_double(&target.expression);
    let base_double = translator.dialect.cast_to_double(&base.expression);
    let ln_x = translator.dialect.generate_math_function("ln", &[&x_double]);
    let ln_base = translator.dialect.generate_math_function("ln", &[&base_double]);
    let division = translator.dialect.generate_decimal_division(&ln_x, &ln_base);
    let expr = format!(
        "CASE WHEN {x} <= 0 OR {b} <= 0 OR {b} = 1 THEN NULL ELSE {division} END",
        x = target.expression,
        b = base.expression,
    );
    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.add_dependency(base.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, "log");
    Ok(fragment)
}

/// `power(exponent)`: `power(0, 0) = 1`; `power(0, negative) = NULL`;
/// `power(negative, non-integer) = NULL`.
pub(crate) fn translate_power(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    if args.len() != 1 {
        return Err(translator.validation_error("wrong_argument_count", format!("power expects 1 argument, got {}", args.len()), source_text));
    }
    let exponent = translate_argument(translator, &args[0])?;
    let base_double = translator.dialect.cast_to_double(&target.expression);
    let exponent_double = translator.dialect.cast_to_double(&exponent.expression);
    let raw = translator
        .dialect
        .generate_math_function("power", &[&base_double, &exponent_double]);
    let is_integer_exponent = format!("({exp} = FLOOR({exp}))", exp = exponent.expression);
    let expr = format!(
        "CASE WHEN {base} = 0 AND {exp} = 0 THEN 1 WHEN {base} = 0 AND {exp} < 0 THEN NULL WHEN {base} < 0 AND NOT {is_int} THEN NULL ELSE {guarded} END",
        base = target.expression,
        exp = exponent.expression,
        is_int = is_integer_exponent,
        guarded = finite_guard(translator, &raw),
    );
    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.add_dependency(exponent.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, "power");
    Ok(fragment)
}
