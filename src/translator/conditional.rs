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

//! `iif`-shaped conditional translation (spec §4.5, §8 scenario 5).
//!
//! The node's `condition` is the criterion; its implicit target/invocant is
//! resolved the same way a function call's target is (`pending_fragment_result`
//! then `pending_literal_value` then current context) — an empty-collection
//! target short-circuits to the otherwise branch before the criterion is
//! even translated.

use crate::ast::{AstNode, LiteralValue};
use crate::error::Result;
use crate::fragment::Fragment;

use super::Translator;

pub(super) fn translate_conditional(
    translator: &mut Translator<'_>,
    condition: &AstNode,
    then_branch: &AstNode,
    else_branch: Option<&AstNode>,
    source_text: &str,
) -> Result<Fragment> {
    let snapshot = translator.context.snapshot();

    if let Some(pending) = translator.context.take_pending_fragment_result() {
        if pending.is_multi_item {
            return Err(translator.validation_error(
                "iif_target_must_be_single_item",
                "iif invoked on a statically-detectable multi-item collection",
                source_text,
            ));
        }
    } else if let Some(literal) = translator.context.take_pending_literal() {
        if matches!(literal.raw_value, LiteralValue::Empty) {
            return match else_branch {
                Some(else_node) => translator.visit_node(else_node),
                None => Fragment::new("NULL", translator.context.current_table.clone()),
            };
        }
    }

    let condition_fragment = translator.visit_node(condition)?;
    if let Some(literal_type) = condition_fragment.get_metadata(crate::fragment::metadata_keys::LITERAL_TYPE) {
        if literal_type.as_str() != Some("boolean") {
            return Err(translator.validation_error(
                "iif_criterion_must_be_boolean",
                format!("iif criterion must be boolean, got {literal_type}"),
                source_text,
            ));
        }
    }

    let then_fragment = translator.visit_node(then_branch)?;
    let else_fragment = match else_branch {
        Some(node) => Some(translator.visit_node(node)?),
        None => None,
    };

    let else_expr = else_fragment.as_ref().map(|f| f.expression.as_str()).unwrap_or("NULL");
    let expr = format!(
        "CASE WHEN {} THEN {} ELSE {} END",
        condition_fragment.expression, then_fragment.expression, else_expr
    );

    translator.context.restore(snapshot);
    let table = translator.context.current_table.clone();
    let mut fragment = Fragment::new(expr, table)?;
    fragment.add_dependency(condition_fragment.source_table.clone());
    fragment.add_dependency(then_fragment.source_table.clone());
    if let Some(ref f) = else_fragment {
        fragment.add_dependency(f.source_table.clone());
    }
    Ok(fragment)
}
