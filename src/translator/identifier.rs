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

//! Identifier and variable translation: path navigation, array-aware
//! unnesting, polymorphic property resolution, and `current_element_column`
//! consumption (spec §4.3, §4.6).

use crate::context::ElementColumnState;
use crate::error::Result;
use crate::fragment::{metadata_keys, Fragment};
use crate::oracle;

use super::Translator;

/// Translate a (possibly dotted) identifier path.
///
/// A leading `$`-component is a variable reference; everything after it is
/// rendered as plain JSON extraction over the variable's expression, not
/// the full array-aware pipeline below (spec §4.3: "a member access on a
/// variable is rendered as JSON extraction over the variable's expression").
pub(super) fn translate_identifier(
    translator: &mut Translator<'_>,
    _text: &str,
    components: &[String],
    source_text: &str,
) -> Result<Fragment> {
    if components.is_empty() {
        return Fragment::new(translator.context.current_table.clone(), translator.context.current_table.clone());
    }

    if components[0].starts_with('$') {
        return translate_variable_path(translator, components, source_text);
    }

    let components = strip_resource_type_prefix(components, &translator.context.current_resource_type);
    if components.is_empty() {
        let table = translator.context.current_table.clone();
        return Fragment::new(table.clone(), table);
    }

    if translator.context.element_column.is_active() {
        let column = translator
            .context
            .element_column
            .column()
            .expect("is_active checked")
            .to_string();
        let element_type = translator.context.element_column.element_type().map(str::to_string);
        return extract_from_element_column(translator, &column, element_type, &components);
    }

    translate_identifier_components(translator, &components)
}

/// Visit a `$`-prefixed variable reference with no further member access.
pub(super) fn translate_variable(translator: &mut Translator<'_>, name: &str, _source_text: &str) -> Result<Fragment> {
    let binding = translator
        .context
        .get_variable(name)
        .cloned()
        .ok_or_else(|| translator.validation_error("unbound_variable", format!("unbound variable: {name}"), name))?;

    let table = binding.source_table.clone().unwrap_or_else(|| translator.context.current_table.clone());
    let mut fragment = Fragment::new(binding.expression, table)?;
    fragment.requires_unnest = binding.requires_unnest;
    fragment.is_aggregate = binding.is_aggregate;
    fragment = fragment.with_dependencies(binding.dependencies);
    Ok(fragment)
}

fn translate_variable_path(translator: &mut Translator<'_>, components: &[String], _source_text: &str) -> Result<Fragment> {
    let name = &components[0];
    let binding = translator
        .context
        .get_variable(name)
        .cloned()
        .ok_or_else(|| translator.validation_error("unbound_variable", format!("unbound variable: {name}"), name))?;

    let table = binding.source_table.clone().unwrap_or_else(|| translator.context.current_table.clone());
    if components.len() == 1 {
        let mut fragment = Fragment::new(binding.expression, table)?;
        fragment.requires_unnest = binding.requires_unnest;
        fragment.is_aggregate = binding.is_aggregate;
        fragment = fragment.with_dependencies(binding.dependencies);
        return Ok(fragment);
    }

    let rest = components[1..].join(".");
    let json_path = format!("$.{rest}");
    let expr = translator.dialect.extract_json_string(&binding.expression, &json_path);
    let mut fragment = Fragment::new(expr, table)?;
    fragment = fragment.with_dependencies(binding.dependencies);
    Ok(fragment)
}

/// Root-relative array-aware path walk (spec §4.3): scans components in
/// order, emitting an unnest fragment at each array-typed component and
/// folding trailing scalar/object components into JSON field extraction
/// relative to the most recent unnest alias (or the root table, if none
/// has been emitted yet).
pub(super) fn translate_identifier_components(translator: &mut Translator<'_>, components: &[String]) -> Result<Fragment> {
    let resource_type = translator.context.current_resource_type.clone();
    let mut table = translator.context.current_table.clone();
    let mut cumulative: Vec<String> = translator.context.parent_path.clone();
    let mut pending_object_components: Vec<String> = Vec::new();
    let mut last_fragment: Option<Fragment> = None;

    for component in components {
        translator.context.push_path(component.clone());
        cumulative.push(component.clone());
        let joined = cumulative.join(".");

        if let Some(variants) = translator.oracle.resolve_polymorphic_property(component) {
            let frag = build_polymorphic_coalesce(translator, &table, &pending_object_components, component, &variants)?;
            pending_object_components.clear();
            last_fragment = Some(frag);
            continue;
        }

        let is_array = translator.oracle.is_array_element(&resource_type, &joined)
            || (translator.oracle.element_type(&resource_type, &joined).is_none()
                && oracle::is_primitive_collection_heuristic(component));

        if is_array {
            let mut unnest_path_components = pending_object_components.clone();
            unnest_path_components.push(component.clone());
            let json_path = format!("$.{}[*]", unnest_path_components.join("."));
            let alias = translator.context.unique_alias(&format!("{}_item", sanitize(component)));

            let mut fragment = Fragment::new(translator.dialect.unnest_json_array(&table, &json_path, &alias), alias.clone())?;
            fragment.requires_unnest = true;
            fragment.add_dependency(table.clone());
            let unnest_level = translator.fragment_count_where_unnest() as i64 + 1;
            fragment.set_metadata(metadata_keys::SOURCE_PATH, json_path);
            fragment.set_metadata(metadata_keys::RESULT_ALIAS, alias.clone());
            fragment.set_metadata(metadata_keys::ARRAY_COLUMN, alias.clone());
            fragment.set_metadata(metadata_keys::PROJECTION_EXPRESSION, alias.clone());
            fragment.set_metadata(metadata_keys::UNNEST_LEVEL, unnest_level);
            translator.push_fragment(&fragment);

            translator.context.register_column_alias(component.clone(), alias.clone());
            translator.context.current_table = alias.clone();
            table = alias;
            pending_object_components.clear();
            last_fragment = Some(fragment);
        } else {
            pending_object_components.push(component.clone());
            let json_path = format!("$.{}", pending_object_components.join("."));
            let expr = translator.dialect.extract_json_field(&table, &json_path);
            last_fragment = Some(Fragment::new(expr, table.clone())?);
        }
    }

    last_fragment.map(Ok).unwrap_or_else(|| Fragment::new(table.clone(), table))
}

/// Consume `current_element_column` (spec §4.6): identifier access off an
/// already-extracted element, re-entering the unnest pipeline if the
/// accessed field is itself an array, else falling back to `None`.
fn extract_from_element_column(
    translator: &mut Translator<'_>,
    column: &str,
    element_type: Option<String>,
    components: &[String],
) -> Result<Fragment> {
    let mut current_col = column.to_string();
    let mut elem_type = element_type;
    let mut last_fragment: Option<Fragment> = None;

    for component in components {
        let is_array = elem_type
            .as_deref()
            .map(|t| translator.oracle.is_array_element(t, component))
            .unwrap_or(false);

        if is_array {
            let json_path = format!("$.{component}[*]");
            let alias = translator.context.unique_alias(&format!("{}_item", sanitize(component)));
            let mut fragment = Fragment::new(translator.dialect.unnest_json_array(&current_col, &json_path, &alias), alias.clone())?;
            fragment.requires_unnest = true;
            fragment.add_dependency(current_col.clone());
            fragment.set_metadata(metadata_keys::FROM_ELEMENT_COLUMN, true);
            fragment.set_metadata(metadata_keys::SOURCE_PATH, json_path);
            fragment.set_metadata(metadata_keys::RESULT_ALIAS, alias.clone());
            fragment.set_metadata(metadata_keys::ARRAY_COLUMN, alias.clone());
            translator.push_fragment(&fragment);

            let new_elem_type = elem_type.as_deref().and_then(|t| translator.oracle.element_type(t, component));
            translator.context.element_column = ElementColumnState::Active {
                column: alias.clone(),
                element_type: new_elem_type.clone(),
            };
            current_col = alias;
            elem_type = new_elem_type;
            last_fragment = Some(fragment);
        } else {
            let new_elem_type = elem_type.as_deref().and_then(|t| translator.oracle.element_type(t, component));
            let is_complex = new_elem_type
                .as_deref()
                .and_then(|t| translator.oracle.type_metadata(t))
                .map(|m| m.is_complex || m.is_resource)
                .unwrap_or(false);

            let json_path = format!("$.{component}");
            let expr = if is_complex {
                translator.dialect.extract_json_object(&current_col, &json_path)
            } else {
                translator.dialect.extract_primitive_value(&current_col, &json_path)
            };

            translator.context.element_column = ElementColumnState::None;
            last_fragment = Some(Fragment::new(expr, current_col.clone())?);
            elem_type = new_elem_type;
        }
    }

    last_fragment.map(Ok).unwrap_or_else(|| Fragment::new(current_col.clone(), current_col))
}

fn build_polymorphic_coalesce(
    translator: &mut Translator<'_>,
    table: &str,
    prefix: &[String],
    component: &str,
    variants: &[String],
) -> Result<Fragment> {
    let mut parts = Vec::with_capacity(variants.len());
    for variant in variants {
        let field = translator
            .oracle
            .resolve_polymorphic_field_for_type(component, variant)
            .unwrap_or_else(|| format!("{component}{variant}"));
        let mut path_components = prefix.to_vec();
        path_components.push(field);
        let json_path = format!("$.{}", path_components.join("."));
        parts.push(translator.dialect.extract_json_field(table, &json_path));
    }
    let expr = format!("COALESCE({})", parts.join(", "));
    let mut fragment = Fragment::new(expr, table.to_string())?;
    fragment.set_metadata(metadata_keys::VARIANT_PROPERTY, component.to_string());
    Ok(fragment)
}

/// Strip a single leading component that names the context resource type
/// (e.g. `Patient.name` -> `name`, when translating against `"Patient"`).
fn strip_resource_type_prefix(components: &[String], resource_type: &str) -> Vec<String> {
    match components.split_first() {
        Some((first, rest)) if first == resource_type => rest.to_vec(),
        _ => components.to_vec(),
    }
}

/// Replace characters invalid in a bare SQL identifier with `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_non_identifier_chars() {
        assert_eq!(sanitize("value-x"), "value_x");
        assert_eq!(sanitize("given"), "given");
    }

    #[test]
    fn strip_resource_type_prefix_only_strips_once() {
        let components = vec!["Patient".to_string(), "name".to_string()];
        assert_eq!(strip_resource_type_prefix(&components, "Patient"), vec!["name".to_string()]);

        let components = vec!["name".to_string()];
        assert_eq!(strip_resource_type_prefix(&components, "Patient"), vec!["name".to_string()]);
    }
}
