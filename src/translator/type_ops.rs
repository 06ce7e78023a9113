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

//! `is`/`as`/`ofType` translation (spec §4.5).

use crate::ast::{AstNode, TypeOp};
use crate::error::Result;
use crate::fragment::{metadata_keys, Fragment};
use crate::oracle;

use super::identifier;
use super::Translator;

pub(super) fn translate_type_operation(
    translator: &mut Translator<'_>,
    op: TypeOp,
    target: &AstNode,
    target_type: &str,
    source_text: &str,
) -> Result<Fragment> {
    let canonical = translator
        .oracle
        .canonical_type_name(target_type)
        .ok_or_else(|| translator.validation_error("unknown_type", format!("unknown FHIR type: {target_type}"), source_text))?;

    match op {
        TypeOp::Is => translate_is(translator, target, &canonical),
        TypeOp::As => translate_as(translator, target, &canonical),
        TypeOp::OfType => translate_of_type(translator, target, &canonical),
    }
}

fn translate_is(translator: &mut Translator<'_>, target: &AstNode, canonical: &str) -> Result<Fragment> {
    let target_fragment = translator.visit_node(target)?;
    let metadata = translator.oracle.type_metadata(canonical);
    let is_primitive = metadata.as_ref().map(|m| m.is_primitive).unwrap_or(false);

    let expr = if is_primitive {
        translator.dialect.generate_type_check(&target_fragment.expression, canonical)
    } else {
        match translator.oracle.type_discriminator(canonical) {
            Some(d) if !d.required_fields.is_empty() => {
                let checks: Vec<String> = d
                    .required_fields
                    .iter()
                    .map(|f| translator.dialect.check_json_exists(&target_fragment.expression, &format!("$.{f}")))
                    .collect();
                format!("CASE WHEN {} THEN TRUE ELSE FALSE END", checks.join(" AND "))
            }
            _ => translator.dialect.generate_type_check(&target_fragment.expression, canonical),
        }
    };

    let mut fragment = Fragment::new(expr, target_fragment.source_table.clone())?;
    fragment.add_dependency(target_fragment.source_table);
    fragment.set_metadata(metadata_keys::TARGET_TYPE, canonical.to_string());
    Ok(fragment)
}

fn translate_as(translator: &mut Translator<'_>, target: &AstNode, canonical: &str) -> Result<Fragment> {
    let metadata = translator.oracle.type_metadata(canonical);
    let is_primitive = metadata.as_ref().map(|m| m.is_primitive).unwrap_or(true);

    if is_primitive {
        let target_fragment = translator.visit_node(target)?;
        let expr = translator.dialect.generate_type_cast(&target_fragment.expression, canonical);
        let mut fragment = Fragment::new(expr, target_fragment.source_table.clone())?;
        fragment.add_dependency(target_fragment.source_table);
        fragment.set_metadata(metadata_keys::TARGET_TYPE, canonical.to_string());
        return Ok(fragment);
    }

    if let Some(fragment) = try_polymorphic_direct(translator, target, canonical)? {
        return Ok(fragment);
    }

    let target_fragment = translator.visit_node(target)?;
    let expr = match translator.oracle.type_discriminator(canonical) {
        Some(d) if !d.required_fields.is_empty() => {
            let checks: Vec<String> = d
                .required_fields
                .iter()
                .map(|f| translator.dialect.check_json_exists(&target_fragment.expression, &format!("$.{f}")))
                .collect();
            format!("CASE WHEN {} THEN {} ELSE NULL END", checks.join(" AND "), target_fragment.expression)
        }
        _ => target_fragment.expression.clone(),
    };

    let mut fragment = Fragment::new(expr, target_fragment.source_table.clone())?;
    fragment.add_dependency(target_fragment.source_table);
    fragment.set_metadata(metadata_keys::TARGET_TYPE, canonical.to_string());
    Ok(fragment)
}

fn translate_of_type(translator: &mut Translator<'_>, target: &AstNode, canonical: &str) -> Result<Fragment> {
    if let Some(fragment) = try_polymorphic_direct(translator, target, canonical)? {
        return Ok(fragment);
    }

    let target_fragment = translator.visit_node(target)?;
    let expr = translator.dialect.generate_collection_type_filter(&target_fragment.expression, Some(canonical));
    let mut fragment = Fragment::new(expr, target_fragment.source_table.clone())?;
    fragment.add_dependency(target_fragment.source_table);
    fragment.set_metadata(metadata_keys::TARGET_TYPE, canonical.to_string());
    fragment.set_metadata(metadata_keys::IS_COLLECTION, true);
    Ok(fragment)
}

/// When `target` is a direct polymorphic-property identifier (`value` in
/// `Observation.value`) and `canonical` names one of its declared variants,
/// resolve the concrete field directly and skip the `COALESCE` an ordinary
/// identifier visit would otherwise build (spec §4.3, §4.5).
fn try_polymorphic_direct(translator: &mut Translator<'_>, target: &AstNode, canonical: &str) -> Result<Option<Fragment>> {
    let node = target.unwrap();
    let components = match node {
        AstNode::Identifier { components, .. } => components,
        _ => return Ok(None),
    };
    let Some(last) = components.last() else {
        return Ok(None);
    };
    let Some(variants) = translator.oracle.resolve_polymorphic_property(last) else {
        return Ok(None);
    };
    let aliased = oracle::quantity_aliased_type(canonical);
    if !variants.iter().any(|v| v == aliased) {
        return Ok(None);
    }

    let prefix: Vec<String> = components[..components.len() - 1].to_vec();
    let snapshot = translator.context.snapshot();
    let prefix_fragment = if prefix.is_empty() {
        let table = translator.context.current_table.clone();
        Fragment::new(table.clone(), table)?
    } else {
        identifier::translate_identifier_components(translator, &prefix)?
    };
    translator.context.restore(snapshot);

    let field = translator
        .oracle
        .resolve_polymorphic_field_for_type(last, aliased)
        .unwrap_or_else(|| format!("{last}{aliased}"));
    let json_path = format!("$.{field}");
    let expr = translator.dialect.extract_json_field(&prefix_fragment.expression, &json_path);

    let mut fragment = Fragment::new(expr, prefix_fragment.source_table.clone())?;
    fragment.add_dependency(prefix_fragment.source_table);
    fragment.set_metadata(metadata_keys::VARIANT_PROPERTY, last.clone());
    fragment.set_metadata(metadata_keys::TARGET_TYPE, canonical.to_string());
    Ok(Some(fragment))
}
