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

//! The [`Fragment`] value type: one step of a translated FHIRPath
//! expression pipeline, later assembled by an external CTE builder.

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::{Result, TranslationError};

/// One logical step of a translated FHIRPath expression.
///
/// Fragments are append-only: once emitted by the translator they are not
/// mutated. `add_dependency`/`set_metadata` exist for convenience while a
/// fragment is still being built, before it is handed to the output list.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// The generated SQL expression. Never empty.
    pub expression: String,
    /// The table or CTE this fragment selects from. Never empty.
    pub source_table: String,
    /// Whether this fragment involves array unnesting (`LATERAL UNNEST`
    /// or equivalent).
    pub requires_unnest: bool,
    /// Whether this fragment contains an aggregate operation and therefore
    /// needs `GROUP BY`/ordering handling downstream.
    pub is_aggregate: bool,
    /// Ordered, duplicate-free list of table/CTE names this fragment
    /// depends on.
    pub dependencies: Vec<String>,
    /// Free-form metadata consumed by the CTE assembler. See the crate
    /// docs for the reserved key list.
    pub metadata: FxHashMap<String, Value>,
}

impl Fragment {
    /// Construct a fragment, validating the invariants the spec requires
    /// of every emitted fragment (non-empty expression/source_table).
    pub fn new(expression: impl Into<String>, source_table: impl Into<String>) -> Result<Self> {
        let expression = expression.into();
        let source_table = source_table.into();
        if expression.is_empty() {
            return Err(TranslationError::translation(
                "fragment expression must be non-empty",
            ));
        }
        if source_table.is_empty() {
            return Err(TranslationError::translation(
                "fragment source_table must be non-empty",
            ));
        }
        Ok(Self {
            expression,
            source_table,
            requires_unnest: false,
            is_aggregate: false,
            dependencies: Vec::new(),
            metadata: FxHashMap::default(),
        })
    }

    /// Construct a fragment against the default `"resource"` source table.
    pub fn from_resource(expression: impl Into<String>) -> Result<Self> {
        Self::new(expression, "resource")
    }

    /// Mark this fragment as requiring array unnesting.
    pub fn with_unnest(mut self, requires_unnest: bool) -> Self {
        self.requires_unnest = requires_unnest;
        self
    }

    /// Mark this fragment as an aggregate.
    pub fn with_aggregate(mut self, is_aggregate: bool) -> Self {
        self.is_aggregate = is_aggregate;
        self
    }

    /// Add a CTE/table dependency, de-duplicating against existing entries.
    pub fn add_dependency(&mut self, dependency: impl Into<String>) {
        let dependency = dependency.into();
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
    }

    /// Fluent form of [`Fragment::add_dependency`].
    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.add_dependency(dependency);
        self
    }

    /// Fluent form that copies in a full list of dependencies, de-duplicating.
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = String>) -> Self {
        for dep in dependencies {
            self.add_dependency(dep);
        }
        self
    }

    /// Set a metadata value.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Fluent form of [`Fragment::set_metadata`].
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_metadata(key, value);
        self
    }

    /// Get a metadata value, if present.
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// True if `metadata.is_empty_collection` was set by the `{}` literal.
    pub fn is_empty_collection(&self) -> bool {
        matches!(self.metadata.get("is_empty_collection"), Some(Value::Bool(true)))
    }
}

/// Reserved metadata keys a `CteAssembler` may look for. Kept as constants
/// so call sites don't retype string literals inconsistently.
pub mod metadata_keys {
    pub const LITERAL_TYPE: &str = "literal_type";
    pub const IS_LITERAL: &str = "is_literal";
    pub const IS_EMPTY_COLLECTION: &str = "is_empty_collection";
    pub const IS_JSON_STRING: &str = "is_json_string";
    pub const IS_COLLECTION: &str = "is_collection";
    pub const FROM_ELEMENT_COLUMN: &str = "from_element_column";
    pub const ARRAY_COLUMN: &str = "array_column";
    pub const RESULT_ALIAS: &str = "result_alias";
    pub const SOURCE_PATH: &str = "source_path";
    pub const PROJECTION_EXPRESSION: &str = "projection_expression";
    pub const UNNEST_LEVEL: &str = "unnest_level";
    pub const SUBSET_FILTER: &str = "subset_filter";
    pub const SUBSET_COUNT: &str = "subset_count";
    pub const UNNEST_COUNT: &str = "unnest_count";
    pub const ELEMENT_TYPE: &str = "element_type";
    pub const WHERE_FILTER: &str = "where_filter";
    pub const FUNCTION: &str = "function";
    pub const RESULT_TYPE: &str = "result_type";
    pub const OPERATOR: &str = "operator";
    pub const TARGET_TYPE: &str = "target_type";
    pub const VARIANT_PROPERTY: &str = "variant_property";
    pub const JSON_PATH: &str = "json_path";
    pub const MODE: &str = "mode";
    pub const PASS_THROUGH: &str = "pass_through";
    pub const HAS_CARDINALITY_CHECK: &str = "has_cardinality_check";
    pub const QUANTITY_AMOUNT: &str = "quantity_amount";
    pub const QUANTITY_UNIT: &str = "quantity_unit";
    pub const LITERAL_RAW_VALUE: &str = "literal_raw_value";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_expression() {
        assert!(Fragment::new("", "resource").is_err());
    }

    #[test]
    fn rejects_empty_source_table() {
        assert!(Fragment::new("SELECT 1", "").is_err());
    }

    #[test]
    fn add_dependency_dedupes() {
        let mut f = Fragment::from_resource("SELECT 1").unwrap();
        f.add_dependency("cte_1");
        f.add_dependency("cte_1");
        assert_eq!(f.dependencies, vec!["cte_1".to_string()]);
    }

    #[test]
    fn default_source_table_helper() {
        let f = Fragment::from_resource("SELECT 1").unwrap();
        assert_eq!(f.source_table, "resource");
    }
}
