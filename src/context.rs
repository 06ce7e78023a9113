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

//! Mutable translation state threaded through one `Translator::translate`
//! call: the current source table, path stack, variable scopes, CTE
//! counter, and single-consumer pending-value slots.

use rustc_hash::FxHashMap;

use crate::ast::LiteralValue;
use crate::error::{Result, TranslationError};
use crate::fragment::Fragment;
use crate::oracle::TypeOracle;

/// A FHIRPath variable bound within the current lambda scope (`$this`,
/// `$index`, `$total`, or a user `defineVariable`).
#[derive(Debug, Clone, PartialEq)]
pub struct VariableBinding {
    /// The SQL expression the variable resolves to.
    pub expression: String,
    /// The table/CTE the expression is scoped to, if any.
    pub source_table: Option<String>,
    /// Whether resolving this variable requires unnesting.
    pub requires_unnest: bool,
    /// Whether this variable's expression is itself an aggregate.
    pub is_aggregate: bool,
    /// Dependencies carried along from the fragment this variable was
    /// bound from, if any.
    pub dependencies: Vec<String>,
}

impl VariableBinding {
    /// A binding with no source table, unnest, or dependency metadata —
    /// just a bare SQL expression.
    pub fn simple(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            source_table: None,
            requires_unnest: false,
            is_aggregate: false,
            dependencies: Vec::new(),
        }
    }
}

impl From<&Fragment> for VariableBinding {
    fn from(fragment: &Fragment) -> Self {
        Self {
            expression: fragment.expression.clone(),
            source_table: Some(fragment.source_table.clone()),
            requires_unnest: fragment.requires_unnest,
            is_aggregate: fragment.is_aggregate,
            dependencies: fragment.dependencies.clone(),
        }
    }
}

/// The `current_element_column` state machine (spec §4.6).
///
/// Becomes `Active` after an unnest-based subset filter (`first`/`last`/
/// `skip`/`take`/`tail`) runs against an already-unnested target; the next
/// identifier access consumes it, returning the state to `None` unless the
/// accessed field is itself an array (in which case a fresh unnest fragment
/// is emitted and the state stays `Active` on the new column).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ElementColumnState {
    /// No pending extracted element; identifiers resolve against the
    /// current source table / path as usual.
    #[default]
    None,
    /// A post-unnest subset filter produced this column; the next
    /// identifier access should extract from it.
    Active {
        /// The SQL column/alias holding the extracted element.
        column: String,
        /// The FHIR type of the element, if known.
        element_type: Option<String>,
    },
}

impl ElementColumnState {
    /// The active column name, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            ElementColumnState::Active { column, .. } => Some(column.as_str()),
            ElementColumnState::None => None,
        }
    }

    /// The active element type, if any.
    pub fn element_type(&self) -> Option<&str> {
        match self {
            ElementColumnState::Active { element_type, .. } => element_type.as_deref(),
            ElementColumnState::None => None,
        }
    }

    /// True if a column is active.
    pub fn is_active(&self) -> bool {
        matches!(self, ElementColumnState::Active { .. })
    }
}

/// `pending_literal_value`: the raw value and SQL rendering of the literal
/// most recently visited, consumed by a following function call in the
/// same invocation chain (e.g. `1.convertsToInteger()`).
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLiteral {
    /// The literal's parsed value.
    pub raw_value: LiteralValue,
    /// The SQL expression the literal was rendered as.
    pub sql_expr: String,
}

/// `pending_fragment_result`: the previous step's result, consumed by a
/// following function so chains like `'1.1'.toInteger().empty()` don't need
/// to re-resolve their target from source text.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFragmentResult {
    /// The SQL expression of the previous step.
    pub expression: String,
    /// The path stack at the point the previous step was produced.
    pub parent_path: Vec<String>,
    /// Whether the previous step is known, at translation time, to
    /// produce more than one item (used for `iif`'s multi-item check).
    pub is_multi_item: bool,
}

type Scope = FxHashMap<String, VariableBinding>;

/// A restorable snapshot of the path-state fields of [`Context`] — table,
/// path stack, CTE counter, element-column state. Deliberately excludes
/// the variable-scope stack, which is managed separately via
/// `push_variable_scope`/`pop_variable_scope` so the two mechanisms can't
/// be conflated (a documented source of correctness bugs in nested lambdas).
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    current_table: String,
    current_resource_type: String,
    parent_path: Vec<String>,
    cte_counter: usize,
    element_column: ElementColumnState,
}

/// Mutable state threaded through one `translate` call.
#[derive(Debug, Clone)]
pub struct Context {
    /// The current source table or CTE name being queried from.
    pub current_table: String,
    /// The FHIR resource type being processed (e.g. `"Patient"`).
    pub current_resource_type: String,
    /// Path components built up while descending into nested structures.
    pub parent_path: Vec<String>,
    /// CTE name counter; increases monotonically within one translation.
    cte_counter: usize,
    /// The `current_element_column` state machine.
    pub element_column: ElementColumnState,
    /// Single-consumer slot for a just-visited literal.
    pub pending_literal_value: Option<PendingLiteral>,
    /// Single-consumer slot for a just-emitted fragment result.
    pub pending_fragment_result: Option<PendingFragmentResult>,
    /// Logical-to-physical CTE column alias registry.
    cte_column_aliases: FxHashMap<String, String>,
    /// Disambiguation counters for generated unnest aliases (spec §4.3).
    alias_counts: FxHashMap<String, u32>,
    scope_stack: Vec<Scope>,
}

impl Context {
    /// Create a new context for a resource type, with the root `$this`
    /// binding pointing at the root resource table.
    pub fn new(resource_type: impl Into<String>) -> Self {
        let mut root_scope = Scope::default();
        root_scope.insert("$this".to_string(), VariableBinding::simple("resource"));
        Self {
            current_table: "resource".to_string(),
            current_resource_type: resource_type.into(),
            parent_path: Vec::new(),
            cte_counter: 0,
            element_column: ElementColumnState::None,
            pending_literal_value: None,
            pending_fragment_result: None,
            cte_column_aliases: FxHashMap::default(),
            alias_counts: FxHashMap::default(),
            scope_stack: vec![root_scope],
        }
    }

    /// Generate a unique SQL alias from `base`, appending a numeric suffix
    /// on repeat use (`name_item`, `name_item_2`, `name_item_3`, ...).
    pub fn unique_alias(&mut self, base: &str) -> String {
        let count = self.alias_counts.entry(base.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base.to_string()
        } else {
            format!("{base}_{count}")
        }
    }

    /// The current CTE counter value (for tests/assertions only — use
    /// `next_cte_name` to generate names).
    pub fn cte_counter(&self) -> usize {
        self.cte_counter
    }

    /// Generate the next unique CTE name: `cte_1`, `cte_2`, ...
    pub fn next_cte_name(&mut self) -> String {
        self.cte_counter += 1;
        format!("cte_{}", self.cte_counter)
    }

    /// Push a path component (e.g. descending into `.family`).
    pub fn push_path(&mut self, component: impl Into<String>) {
        self.parent_path.push(component.into());
    }

    /// Pop the most recently pushed path component.
    pub fn pop_path(&mut self) -> Option<String> {
        self.parent_path.pop()
    }

    /// Build `$.a.b[*].c`, consulting the oracle for array cardinality at
    /// each prefix. Oracle errors (can't determine) are swallowed as "not
    /// an array" — a deliberate best-effort fallback, not a bug.
    pub fn json_path(&self, oracle: &dyn TypeOracle) -> String {
        if self.parent_path.is_empty() {
            return "$".to_string();
        }
        let mut parts = Vec::with_capacity(self.parent_path.len());
        for i in 0..self.parent_path.len() {
            let element_path = self.parent_path[..=i].join(".");
            let is_array = oracle.is_array_element(&self.current_resource_type, &element_path);
            if is_array {
                parts.push(format!("{}[*]", self.parent_path[i]));
            } else {
                parts.push(self.parent_path[i].clone());
            }
        }
        format!("$.{}", parts.join("."))
    }

    /// Push a new variable scope. When `preserve` is true the new scope
    /// starts as a copy of the current innermost scope (lambdas normally
    /// preserve outer bindings so `$this` from an enclosing `where` is
    /// still visible, shadowed only by the new scope's own bindings).
    pub fn push_variable_scope(&mut self, preserve: bool) {
        let new_scope = if preserve {
            self.scope_stack.last().cloned().unwrap_or_default()
        } else {
            Scope::default()
        };
        self.scope_stack.push(new_scope);
    }

    /// Pop the current variable scope, restoring the parent. Refuses to
    /// pop the root scope.
    pub fn pop_variable_scope(&mut self) -> Result<Scope> {
        if self.scope_stack.len() == 1 {
            return Err(TranslationError::translation(
                "cannot pop the root variable scope",
            ));
        }
        Ok(self.scope_stack.pop().expect("checked len above"))
    }

    /// Bind a variable in the current (innermost) scope.
    pub fn bind_variable(&mut self, name: impl Into<String>, binding: VariableBinding) {
        self.scope_stack
            .last_mut()
            .expect("root scope always present")
            .insert(name.into(), binding);
    }

    /// Resolve a variable, searching scopes innermost-to-outermost.
    pub fn get_variable(&self, name: &str) -> Option<&VariableBinding> {
        self.scope_stack
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
    }

    /// Clear all bindings in the current (innermost) scope only.
    pub fn clear_variables(&mut self) {
        if let Some(scope) = self.scope_stack.last_mut() {
            scope.clear();
        }
    }

    /// Shallow-copy the whole scope stack (used around union-operand
    /// translation and type-cast children, alongside `restore_variable_scopes`).
    pub fn snapshot_variable_scopes(&self) -> Vec<Scope> {
        self.scope_stack.clone()
    }

    /// Restore a previously captured scope stack.
    pub fn restore_variable_scopes(&mut self, scopes: Vec<Scope>) {
        self.scope_stack = if scopes.is_empty() {
            vec![Scope::default()]
        } else {
            scopes
        };
    }

    /// Snapshot the path-state fields (not the variable-scope stack —
    /// that is managed separately, see [`ContextSnapshot`]).
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            current_table: self.current_table.clone(),
            current_resource_type: self.current_resource_type.clone(),
            parent_path: self.parent_path.clone(),
            cte_counter: self.cte_counter,
            element_column: self.element_column.clone(),
        }
    }

    /// Restore path-state fields from a snapshot.
    pub fn restore(&mut self, snapshot: ContextSnapshot) {
        self.current_table = snapshot.current_table;
        self.current_resource_type = snapshot.current_resource_type;
        self.parent_path = snapshot.parent_path;
        self.cte_counter = snapshot.cte_counter;
        self.element_column = snapshot.element_column;
    }

    /// Take (clear-on-read) the pending literal slot.
    pub fn take_pending_literal(&mut self) -> Option<PendingLiteral> {
        self.pending_literal_value.take()
    }

    /// Take (clear-on-read) the pending fragment-result slot.
    pub fn take_pending_fragment_result(&mut self) -> Option<PendingFragmentResult> {
        self.pending_fragment_result.take()
    }

    /// Register a logical→physical CTE column alias.
    pub fn register_column_alias(&mut self, logical_name: impl Into<String>, actual_column: impl Into<String>) {
        self.cte_column_aliases.insert(logical_name.into(), actual_column.into());
    }

    /// Resolve a column name through the alias registry, falling back to
    /// the input unchanged if there's no registered alias.
    pub fn resolve_column_alias<'a>(&'a self, column_name: &'a str) -> &'a str {
        self.cte_column_aliases
            .get(column_name)
            .map(String::as_str)
            .unwrap_or(column_name)
    }

    /// Clear all registered column aliases.
    pub fn clear_column_aliases(&mut self) {
        self.cte_column_aliases.clear();
    }

    /// Reset to the initial state for a fresh `translate` call, preserving
    /// only the global `$this` binding (not `$index`/`$total`/user
    /// variables) the way `reset()` does in the Python original.
    pub fn reset(&mut self) {
        let this_binding = self.get_variable("$this").cloned();
        let mut root = Scope::default();
        if let Some(binding) = this_binding {
            root.insert("$this".to_string(), binding);
        } else {
            root.insert("$this".to_string(), VariableBinding::simple("resource"));
        }
        self.current_table = "resource".to_string();
        self.parent_path.clear();
        self.cte_counter = 0;
        self.element_column = ElementColumnState::None;
        self.pending_literal_value = None;
        self.pending_fragment_result = None;
        self.cte_column_aliases.clear();
        self.alias_counts.clear();
        self.scope_stack = vec![root];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{TypeDiscriminator, TypeMetadata};

    struct NoArraysOracle;
    impl TypeOracle for NoArraysOracle {
        fn canonical_type_name(&self, name: &str) -> Option<String> {
            Some(name.to_string())
        }
        fn type_metadata(&self, _canonical: &str) -> Option<TypeMetadata> {
            None
        }
        fn element_type(&self, _parent_type: &str, _path: &str) -> Option<String> {
            None
        }
        fn is_array_element(&self, _parent_type: &str, path: &str) -> bool {
            path == "name"
        }
        fn resolve_polymorphic_property(&self, _base: &str) -> Option<Vec<String>> {
            None
        }
        fn resolve_polymorphic_field_for_type(&self, _base: &str, _target_type: &str) -> Option<String> {
            None
        }
        fn type_discriminator(&self, _canonical: &str) -> Option<TypeDiscriminator> {
            None
        }
    }

    #[test]
    fn root_scope_cannot_be_popped() {
        let mut ctx = Context::new("Patient");
        assert!(ctx.pop_variable_scope().is_err());
    }

    #[test]
    fn cte_counter_increments() {
        let mut ctx = Context::new("Patient");
        assert_eq!(ctx.next_cte_name(), "cte_1");
        assert_eq!(ctx.next_cte_name(), "cte_2");
    }

    #[test]
    fn json_path_marks_arrays() {
        let mut ctx = Context::new("Patient");
        ctx.push_path("name");
        ctx.push_path("family");
        let oracle = NoArraysOracle;
        assert_eq!(ctx.json_path(&oracle), "$.name[*].family");
    }

    #[test]
    fn reset_preserves_only_this() {
        let mut ctx = Context::new("Patient");
        ctx.bind_variable("$index", VariableBinding::simple("0"));
        ctx.push_path("name");
        ctx.next_cte_name();
        ctx.reset();
        assert!(ctx.parent_path.is_empty());
        assert_eq!(ctx.cte_counter(), 0);
        assert!(ctx.get_variable("$this").is_some());
        assert!(ctx.get_variable("$index").is_none());
    }

    #[test]
    fn scopes_shadow_inner_to_outer() {
        let mut ctx = Context::new("Patient");
        ctx.push_variable_scope(true);
        ctx.bind_variable("$this", VariableBinding::simple("name_item"));
        assert_eq!(ctx.get_variable("$this").unwrap().expression, "name_item");
        ctx.pop_variable_scope().unwrap();
        assert_eq!(ctx.get_variable("$this").unwrap().expression, "resource");
    }
}
