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

//! Collection functions (spec §4.5): `where`/`exists`/`empty`, `select`,
//! subsetting (`first`/`last`/`skip`/`take`/`tail`/`single`), set operations
//! (`distinct`/`isDistinct`/`intersect`/`exclude`/`subsetOf`/`supersetOf`/
//! `combine`), the recursive `aggregate`/`repeat`, quantifiers, and `count`.

use crate::ast::AstNode;
use crate::context::{ElementColumnState, VariableBinding};
use crate::error::Result;
use crate::fragment::{metadata_keys, Fragment};

use super::{require_args, translate_argument};
use crate::translator::Translator;

fn exists_no_criterion(translator: &Translator<'_>, target: &Fragment) -> String {
    let trimmed = target.expression.trim_start();
    if trimmed.starts_with("(SELECT") || trimmed.starts_with("SELECT") {
        format!("EXISTS({})", target.expression)
    } else {
        let len = translator.dialect.get_json_array_length(&target.expression, None);
        format!("CASE WHEN {len} > 0 THEN TRUE ELSE FALSE END")
    }
}

/// `where(cond)` / `exists([cond])`.
pub(crate) fn translate_where_or_exists(
    translator: &mut Translator<'_>,
    name: &str,
    target: &Fragment,
    args: &[AstNode],
    source_text: &str,
) -> Result<Fragment> {
    if name == "exists" && args.is_empty() {
        let expr = exists_no_criterion(translator, target);
        let mut fragment = Fragment::new(expr, target.source_table.clone())?;
        fragment.add_dependency(target.source_table.clone());
        fragment.set_metadata(metadata_keys::FUNCTION, "exists");
        return Ok(fragment);
    }
    if args.len() != 1 {
        return Err(translator.validation_error(
            "wrong_argument_count",
            format!("{name} expects 1 argument, got {}", args.len()),
            source_text,
        ));
    }

    let this_expr = target.expression.clone();
    translator.context.push_variable_scope(true);
    translator.context.bind_variable("$this", VariableBinding::simple(this_expr.clone()));
    translator.context.bind_variable("$index", VariableBinding::simple("(ROW_NUMBER() OVER () - 1)"));
    let total_expr = translator.dialect.get_json_array_length(&target.expression, None);
    translator.context.bind_variable("$total", VariableBinding::simple(total_expr));
    let condition_result = translator.visit_node(&args[0]);
    translator.context.pop_variable_scope().ok();
    let condition_fragment = condition_result?;

    let mut fragment = if target.requires_unnest {
        let mut f = Fragment::new(this_expr, target.source_table.clone())?;
        f.requires_unnest = true;
        f.set_metadata(metadata_keys::WHERE_FILTER, condition_fragment.expression.clone());
        f
    } else {
        let unnest = translator.dialect.unnest_json_array(&target.expression, "$[*]", "t");
        let inline = format!("(SELECT t AS value FROM {unnest} WHERE {})", condition_fragment.expression);
        Fragment::new(inline, target.source_table.clone())?
    };
    fragment.add_dependency(target.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, name.to_string());
    Ok(fragment)
}

/// `empty()`: the symmetric negation of a criterion-less `exists()`.
pub(crate) fn translate_empty(translator: &mut Translator<'_>, target: &Fragment) -> Result<Fragment> {
    let exists_expr = exists_no_criterion(translator, target);
    let expr = translator.dialect.generate_boolean_not(&exists_expr);
    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, "empty");
    Ok(fragment)
}

/// `select(projection)`.
pub(crate) fn translate_select(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    if args.len() != 1 {
        return Err(translator.validation_error("wrong_argument_count", format!("select expects 1 argument, got {}", args.len()), source_text));
    }
    translator.context.push_variable_scope(true);
    translator.context.bind_variable("$this", VariableBinding::simple("t.value"));
    translator.context.bind_variable("$index", VariableBinding::simple("t.idx"));
    let proj_result = translator.visit_node(&args[0]);
    translator.context.pop_variable_scope().ok();
    let proj_expr = proj_result?.expression;

    let enumerated = translator.dialect.enumerate_json_array(&target.expression, "value", "idx");
    let rows = format!("SELECT {proj_expr} AS value FROM {enumerated} t ORDER BY t.idx");
    let expr = translator.dialect.aggregate_to_json_array(&rows);

    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.is_aggregate = true;
    fragment.set_metadata(metadata_keys::FUNCTION, "select");
    Ok(fragment)
}

/// `first()` / `last()`.
pub(crate) fn translate_first_or_last(translator: &mut Translator<'_>, target: &Fragment, mode: &str) -> Result<Fragment> {
    if target.requires_unnest {
        let mut fragment = Fragment::new(target.expression.clone(), target.source_table.clone())?;
        fragment.requires_unnest = true;
        fragment.add_dependency(target.source_table.clone());
        fragment.set_metadata(metadata_keys::SUBSET_FILTER, mode.to_string());
        fragment.set_metadata(metadata_keys::UNNEST_COUNT, translator.fragment_count_where_unnest() as i64);

        let element_type = translator
            .oracle
            .element_type(&translator.context.current_resource_type, &translator.context.parent_path.join("."));
        if let Some(ref ty) = element_type {
            fragment.set_metadata(metadata_keys::ELEMENT_TYPE, ty.clone());
        }
        translator.context.element_column = ElementColumnState::Active {
            column: "result".to_string(),
            element_type,
        };
        Ok(fragment)
    } else {
        let expr = match mode {
            "first" => translator.dialect.generate_array_first(&target.expression),
            "last" => translator.dialect.generate_array_last(&target.expression),
            _ => unreachable!("mode is first or last"),
        };
        let mut fragment = Fragment::new(expr, target.source_table.clone())?;
        fragment.add_dependency(target.source_table.clone());
        fragment.set_metadata(metadata_keys::SUBSET_FILTER, mode.to_string());
        Ok(fragment)
    }
}

fn parse_count_argument(translator: &mut Translator<'_>, args: &[AstNode], fn_name: &str, source_text: &str) -> Result<i64> {
    if args.len() != 1 {
        return Err(translator.validation_error("wrong_argument_count", format!("{fn_name} expects 1 argument, got {}", args.len()), source_text));
    }
    let fragment = translate_argument(translator, &args[0])?;
    fragment.expression.trim().parse::<i64>().map_err(|_| {
        translator.validation_error("non_literal_count_argument", format!("{fn_name} requires a literal integer argument"), source_text)
    })
}

/// `skip(n)` / `take(n)`.
pub(crate) fn translate_skip_or_take(
    translator: &mut Translator<'_>,
    target: &Fragment,
    args: &[AstNode],
    mode: &str,
    source_text: &str,
) -> Result<Fragment> {
    let n = parse_count_argument(translator, args, mode, source_text)?;
    build_subset(translator, target, mode, n)
}

/// `tail()`: sugar for `skip(1)`.
pub(crate) fn translate_tail(translator: &mut Translator<'_>, target: &Fragment) -> Result<Fragment> {
    build_subset(translator, target, "skip", 1)
}

fn build_subset(translator: &mut Translator<'_>, target: &Fragment, mode: &str, n: i64) -> Result<Fragment> {
    if target.requires_unnest {
        let mut fragment = Fragment::new(target.expression.clone(), target.source_table.clone())?;
        fragment.requires_unnest = true;
        fragment.add_dependency(target.source_table.clone());
        fragment.set_metadata(metadata_keys::SUBSET_FILTER, mode.to_string());
        fragment.set_metadata(metadata_keys::SUBSET_COUNT, n);

        let element_type = translator
            .oracle
            .element_type(&translator.context.current_resource_type, &translator.context.parent_path.join("."));
        if let Some(ref ty) = element_type {
            fragment.set_metadata(metadata_keys::ELEMENT_TYPE, ty.clone());
        }
        translator.context.element_column = ElementColumnState::Active {
            column: "result".to_string(),
            element_type,
        };
        Ok(fragment)
    } else {
        let expr = match mode {
            "skip" => translator.dialect.generate_array_skip(&target.expression, n),
            "take" => translator.dialect.generate_array_take(&target.expression, n),
            _ => unreachable!("mode is skip or take"),
        };
        let mut fragment = Fragment::new(expr, target.source_table.clone())?;
        fragment.add_dependency(target.source_table.clone());
        fragment.set_metadata(metadata_keys::SUBSET_FILTER, mode.to_string());
        fragment.set_metadata(metadata_keys::SUBSET_COUNT, n);
        Ok(fragment)
    }
}

/// `single()`: the one element, or NULL if the collection doesn't have
/// exactly one.
pub(crate) fn translate_single(translator: &mut Translator<'_>, target: &Fragment) -> Result<Fragment> {
    let len = translator.dialect.get_json_array_length(&target.expression, None);
    let first = translator.dialect.generate_array_first(&target.expression);
    let expr = format!("CASE WHEN {len} = 1 THEN {first} ELSE NULL END");
    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, "single");
    Ok(fragment)
}

/// `distinct()`.
pub(crate) fn translate_distinct(translator: &mut Translator<'_>, target: &Fragment) -> Result<Fragment> {
    let expr = translator.dialect.generate_distinct(&target.expression);
    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, "distinct");
    Ok(fragment)
}

/// `isDistinct()`.
pub(crate) fn translate_is_distinct(translator: &mut Translator<'_>, target: &Fragment) -> Result<Fragment> {
    let expr = translator.dialect.generate_is_distinct(&target.expression);
    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, "is_distinct");
    Ok(fragment)
}

/// `intersect(other)` / `exclude(other)`. Intersect deduplicates and
/// preserves left-side order; exclude does not deduplicate (spec §4.5).
pub(crate) fn translate_intersect_or_exclude(
    translator: &mut Translator<'_>,
    target: &Fragment,
    args: &[AstNode],
    is_intersect: bool,
    source_text: &str,
) -> Result<Fragment> {
    let fn_name = if is_intersect { "intersect" } else { "exclude" };
    let others = require_args(translator, args, 1, fn_name, source_text)?;
    let other = &others[0];

    let enumerated = translator.dialect.enumerate_json_array(&target.expression, "value", "idx");
    let membership = translator.dialect.json_array_contains(&other.expression, "t.value");
    let predicate = if is_intersect { membership } else { format!("NOT ({membership})") };
    let distinct_clause = if is_intersect { "DISTINCT " } else { "" };
    let rows = format!("SELECT {distinct_clause}t.value AS value FROM {enumerated} t WHERE {predicate} ORDER BY t.idx");
    let expr = translator.dialect.aggregate_to_json_array(&rows);

    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.add_dependency(other.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, fn_name.to_string());
    Ok(fragment)
}

/// `subsetOf(other)` / `supersetOf(other)`: an empty candidate subset is
/// always a subset.
pub(crate) fn translate_subset_or_superset(
    translator: &mut Translator<'_>,
    target: &Fragment,
    args: &[AstNode],
    is_subset: bool,
    source_text: &str,
) -> Result<Fragment> {
    let fn_name = if is_subset { "subsetOf" } else { "supersetOf" };
    let others = require_args(translator, args, 1, fn_name, source_text)?;
    let other = &others[0];

    let (subset_expr, superset_expr) = if is_subset {
        (target.expression.clone(), other.expression.clone())
    } else {
        (other.expression.clone(), target.expression.clone())
    };
    let enumerated = translator.dialect.enumerate_json_array(&subset_expr, "value", "idx");
    let membership = translator.dialect.json_array_contains(&superset_expr, "t.value");
    let expr = format!("(NOT EXISTS (SELECT 1 FROM {enumerated} t WHERE NOT ({membership})))");

    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.add_dependency(other.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, fn_name.to_string());
    Ok(fragment)
}

/// `combine(other)`: union shape with no dedup and no cross-pair flattening
/// (spec §9: repeated pairwise application, not N-ary flattening).
pub(crate) fn translate_combine(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    let others = require_args(translator, args, 1, "combine", source_text)?;
    let other = &others[0];

    let left = format!("SELECT 0 AS op_idx, t.idx AS item_idx, t.value AS value FROM {} t", translator.dialect.enumerate_json_array(&target.expression, "value", "idx"));
    let right = format!("SELECT 1 AS op_idx, t.idx AS item_idx, t.value AS value FROM {} t", translator.dialect.enumerate_json_array(&other.expression, "value", "idx"));
    let unioned = format!("(SELECT value FROM ({left} UNION ALL {right}) AS combined ORDER BY op_idx, item_idx)");
    let expr = translator.dialect.aggregate_to_json_array(&unioned);

    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.add_dependency(other.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, "combine");
    Ok(fragment)
}

/// `aggregate(expr [, init])`: a recursive CTE enumerating the input,
/// base-casing at the minimum index and joining successive elements to the
/// accumulated total (spec §4.5, §9 — emitted inline, never split across
/// fragments).
pub(crate) fn translate_aggregate(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    if args.is_empty() || args.len() > 2 {
        return Err(translator.validation_error("wrong_argument_count", format!("aggregate expects 1 or 2 arguments, got {}", args.len()), source_text));
    }
    let init_expr = if args.len() == 2 {
        Some(translate_argument(translator, &args[1])?.expression)
    } else {
        None
    };

    translator.context.push_variable_scope(true);
    translator.context.bind_variable("$this", VariableBinding::simple("t.value"));
    translator.context.bind_variable("$total", VariableBinding::simple("a.total"));
    let step_result = translator.visit_node(&args[0]);
    translator.context.pop_variable_scope().ok();
    let step_expr = step_result?.expression;

    let base_total = match &init_expr {
        Some(init) => init.clone(),
        None => format!("COALESCE({step_expr}, t.value)"),
    };

    let cte = translator.context.next_cte_name();
    let enumerated = translator.dialect.enumerate_json_array(&target.expression, "value", "idx");
    let sql = format!(
        "(WITH RECURSIVE {cte}(idx, total) AS (\
SELECT t.idx, {base_total} AS total FROM {enumerated} t WHERE t.idx = (SELECT MIN(idx) FROM {enumerated_base} t) \
UNION ALL \
SELECT t.idx, {step_expr} AS total FROM {enumerated_next} t JOIN {cte} a ON t.idx = a.idx + 1\
) SELECT total FROM {cte} ORDER BY idx DESC LIMIT 1)",
        enumerated_base = translator.dialect.enumerate_json_array(&target.expression, "value", "idx"),
        enumerated_next = translator.dialect.enumerate_json_array(&target.expression, "value", "idx"),
    );

    let mut fragment = Fragment::new(sql, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, "aggregate");
    Ok(fragment)
}

/// `repeat(expr)`: recursive CTE with cycle detection (path-membership
/// check) and a depth cap of 100 (spec §4.5).
pub(crate) fn translate_repeat(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    if args.len() != 1 {
        return Err(translator.validation_error("wrong_argument_count", format!("repeat expects 1 argument, got {}", args.len()), source_text));
    }

    translator.context.push_variable_scope(true);
    translator.context.bind_variable("$this", VariableBinding::simple("t.value"));
    let step_result = translator.visit_node(&args[0]);
    translator.context.pop_variable_scope().ok();
    let step_expr = step_result?.expression;

    let cte = translator.context.next_cte_name();
    let enumerated = translator.dialect.enumerate_json_array(&target.expression, "value", "idx");
    let seed_path = translator.dialect.wrap_json_array("t.value");
    let contains_check = translator.dialect.json_array_contains("r.path", &step_expr);
    let append_path = format!("r.path || {}", translator.dialect.wrap_json_array(&step_expr));

    let recursive_sql = format!(
        "WITH RECURSIVE {cte}(value, depth, path) AS (\
SELECT t.value, 0, {seed_path} FROM {enumerated} t \
UNION ALL \
SELECT {step_expr}, r.depth + 1, {append_path} FROM {cte} r WHERE r.depth < 100 AND NOT {contains_check}\
) SELECT DISTINCT value FROM {cte} ORDER BY value"
    );
    let expr = translator.dialect.aggregate_to_json_array(&format!("(SELECT value FROM ({recursive_sql}) AS repeated)"));

    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, "repeat");
    Ok(fragment)
}

/// `all(condition)`.
pub(crate) fn translate_all(translator: &mut Translator<'_>, target: &Fragment, args: &[AstNode], source_text: &str) -> Result<Fragment> {
    if args.len() != 1 {
        return Err(translator.validation_error("wrong_argument_count", format!("all expects 1 argument, got {}", args.len()), source_text));
    }
    translator.context.push_variable_scope(true);
    translator.context.bind_variable("$this", VariableBinding::simple("t.value"));
    let cond_result = translator.visit_node(&args[0]);
    translator.context.pop_variable_scope().ok();
    let cond_expr = cond_result?.expression;

    let expr = translator.dialect.generate_all_check(&target.expression, "$[*]", "t", &cond_expr);
    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, "all");
    Ok(fragment)
}

/// `allTrue` / `anyTrue` / `allFalse` / `anyFalse`.
pub(crate) fn translate_quantifier(translator: &mut Translator<'_>, target: &Fragment, kind: &str) -> Result<Fragment> {
    let expr = match kind {
        "all_true" => translator.dialect.generate_all_true(&target.expression),
        "any_true" => translator.dialect.generate_any_true(&target.expression),
        "all_false" => translator.dialect.generate_all_false(&target.expression),
        "any_false" => translator.dialect.generate_any_false(&target.expression),
        other => return Err(translator.validation_error("unknown_function", format!("unknown quantifier: {other}"), "")),
    };
    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.set_metadata(metadata_keys::FUNCTION, kind.to_string());
    Ok(fragment)
}

/// `count()`: on an unnamed (unnest) source, an aggregate `COUNT(*)` the
/// assembler folds in; on a materialized collection expression, an array
/// length that is not itself an aggregate (spec §4.5).
pub(crate) fn translate_count(translator: &mut Translator<'_>, target: &Fragment) -> Result<Fragment> {
    let (expr, is_aggregate) = if target.requires_unnest {
        (translator.dialect.generate_aggregate_function("count", &target.expression, None, false), true)
    } else {
        (translator.dialect.get_json_array_length(&target.expression, None), false)
    };
    let mut fragment = Fragment::new(expr, target.source_table.clone())?;
    fragment.add_dependency(target.source_table.clone());
    fragment.is_aggregate = is_aggregate;
    fragment.set_metadata(metadata_keys::FUNCTION, "count");
    Ok(fragment)
}
