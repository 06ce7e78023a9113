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

//! The Translator: a visitor over AST node variants that owns all
//! FHIRPath semantics, emitting [`Fragment`]s by consulting the
//! [`TypeOracle`] and [`Dialect`] and reading/mutating a [`Context`].

mod conditional;
pub(crate) mod functions;
mod identifier;
mod literal;
mod operators;
mod quantity;
mod temporal;
mod type_ops;

use crate::ast::{self, AstNode, FunctionCallData, LiteralType, LiteralValue, OperatorData, TypeOp, Visitor};
use crate::config::TranslatorConfig;
use crate::context::{Context, ContextSnapshot, PendingLiteral};
use crate::cte::CteAssembler;
use crate::dialect::Dialect;
use crate::error::{Result, TranslationError};
use crate::fragment::Fragment;
use crate::oracle::TypeOracle;

/// The outcome of resolving a function call's implicit or explicit target
/// (spec §4.5's `_resolve_function_target`): the fragment to operate on,
/// the raw literal backing it when the target was itself a literal (for
/// compile-time evaluation), and a path-state snapshot taken before
/// resolution so the caller can restore it once the function is translated.
pub(crate) struct FunctionTarget {
    pub fragment: Fragment,
    pub literal: Option<PendingLiteral>,
    pub snapshot: ContextSnapshot,
}

/// Visitor over FHIRPath ASTs that lowers them into SQL [`Fragment`]s.
///
/// Not thread-safe and not reentrant: one `Translator` owns one [`Context`]
/// and should be used for one `translate` call at a time. Concurrent
/// translations need separate instances (the [`TypeOracle`] and [`Dialect`]
/// they borrow are read-only and may be freely shared).
pub struct Translator<'a> {
    /// Mutable traversal state for the current translation.
    pub context: Context,
    pub(crate) oracle: &'a dyn TypeOracle,
    pub(crate) dialect: &'a dyn Dialect,
    pub(crate) config: TranslatorConfig,
    fragments: Vec<Fragment>,
}

impl<'a> Translator<'a> {
    /// Create a translator for `resource_type`, using the default config.
    pub fn new(oracle: &'a dyn TypeOracle, dialect: &'a dyn Dialect, resource_type: impl Into<String>) -> Self {
        Self::with_config(oracle, dialect, resource_type, TranslatorConfig::default())
    }

    /// Create a translator with explicit configuration.
    pub fn with_config(
        oracle: &'a dyn TypeOracle,
        dialect: &'a dyn Dialect,
        resource_type: impl Into<String>,
        config: TranslatorConfig,
    ) -> Self {
        Self {
            context: Context::new(resource_type),
            oracle,
            dialect,
            config,
            fragments: Vec::new(),
        }
    }

    /// Translate `ast` into its ordered fragment list.
    ///
    /// Clears any fragments from a previous call, resets the context, then
    /// visits the root node. The last fragment describes the top-level
    /// operation; if the root node wasn't itself "significant" (spec §3 —
    /// a bare identifier or operator, say), its fragment is appended so
    /// the list is never empty.
    pub fn translate(&mut self, ast: &AstNode) -> Result<Vec<Fragment>> {
        self.fragments.clear();
        self.context.reset();

        let final_fragment = self.visit_node(ast)?;
        let already_present = self
            .fragments
            .last()
            .map(|f| f == &final_fragment)
            .unwrap_or(false);
        if !already_present {
            self.fragments.push(final_fragment);
        }

        // A literal or chained step may leave its pending slot set even when
        // nothing downstream ever consumes it (e.g. a literal used only as
        // an operator operand, never as a function target) — drop both
        // rather than asserting they were consumed (spec §8).
        self.context.pending_literal_value = None;
        self.context.pending_fragment_result = None;

        Ok(std::mem::take(&mut self.fragments))
    }

    /// Translate `ast` and hand the resulting fragment list to `assembler`.
    pub fn translate_to_sql(&mut self, ast: &AstNode, assembler: &dyn CteAssembler) -> Result<String> {
        let fragments = self.translate(ast)?;
        assembler.assemble(&fragments)
    }

    /// Visit a node, recording it as a fragment-list entry iff it's
    /// "significant" (spec §3/§4.1). Recursion through child visits
    /// naturally orders child fragments before parent fragments, since a
    /// parent only computes its own fragment after resolving its children.
    pub(crate) fn visit_node(&mut self, node: &AstNode) -> Result<Fragment> {
        let significant = node.is_significant();
        let fragment = ast::walk_ast(self, node)?;
        if significant {
            self.fragments.push(fragment.clone());
            let is_multi_item = matches!(
                fragment.get_metadata(crate::fragment::metadata_keys::IS_COLLECTION),
                Some(serde_json::Value::Bool(true))
            );
            self.context.pending_fragment_result = Some(crate::context::PendingFragmentResult {
                expression: fragment.expression.clone(),
                parent_path: self.context.parent_path.clone(),
                is_multi_item,
            });
        }
        Ok(fragment)
    }

    pub(crate) fn push_fragment(&mut self, fragment: &Fragment) {
        self.fragments.push(fragment.clone());
    }

    /// Count of fragments emitted so far that require unnesting, used to
    /// number `unnest_level` metadata as array navigation descends.
    pub(crate) fn fragment_count_where_unnest(&self) -> usize {
        self.fragments.iter().filter(|f| f.requires_unnest).count()
    }

    /// The SQL expression denoting "whatever the context currently points
    /// at": the active element column when one is set, else a JSON
    /// extraction of the current path off the current table.
    pub(crate) fn current_context_expression(&self) -> String {
        if let Some(column) = self.context.element_column.column() {
            return column.to_string();
        }
        let path = self.context.json_path(self.oracle);
        self.dialect.extract_json_field(&self.context.current_table, &path)
    }

    /// Resolve a function call's target per spec §4.5 priority order:
    /// pending fragment result (chained step) > pending literal value >
    /// explicit `target` AST edge > current context. A snapshot of
    /// path-state is always captured first so callers can restore it
    /// after translating the function.
    pub(crate) fn resolve_function_target(&mut self, data: &FunctionCallData) -> Result<FunctionTarget> {
        let snapshot = self.context.snapshot();

        if let Some(pending) = self.context.take_pending_fragment_result() {
            let fragment = Fragment::new(pending.expression, self.context.current_table.clone())?;
            return Ok(FunctionTarget {
                fragment,
                literal: None,
                snapshot,
            });
        }

        if let Some(literal) = self.context.take_pending_literal() {
            let fragment = Fragment::new(literal.sql_expr.clone(), self.context.current_table.clone())?;
            return Ok(FunctionTarget {
                fragment,
                literal: Some(literal),
                snapshot,
            });
        }

        if let Some(target) = &data.target {
            let fragment = self.visit_node(target)?;
            return Ok(FunctionTarget {
                fragment,
                literal: None,
                snapshot,
            });
        }

        let expr = self.current_context_expression();
        let fragment = Fragment::new(expr, self.context.current_table.clone())?;
        Ok(FunctionTarget {
            fragment,
            literal: None,
            snapshot,
        })
    }

    /// Validation-error helper: unknown function name, wrong arg count, etc.
    pub(crate) fn validation_error(
        &self,
        rule: &str,
        message: impl Into<String>,
        source_text: &str,
    ) -> TranslationError {
        TranslationError::validation(rule, message, source_text)
    }
}

impl<'a> Visitor for Translator<'a> {
    type Output = Result<Fragment>;

    fn visit_literal(&mut self, value: &LiteralValue, literal_type: LiteralType, source_text: &str) -> Self::Output {
        literal::translate_literal(self, value, literal_type, source_text)
    }

    fn visit_identifier(&mut self, text: &str, components: &[String], source_text: &str) -> Self::Output {
        identifier::translate_identifier(self, text, components, source_text)
    }

    fn visit_variable(&mut self, name: &str, source_text: &str) -> Self::Output {
        identifier::translate_variable(self, name, source_text)
    }

    fn visit_function_call(&mut self, data: &FunctionCallData, source_text: &str) -> Self::Output {
        functions::dispatch(self, data, source_text)
    }

    fn visit_operator(&mut self, data: &OperatorData, source_text: &str) -> Self::Output {
        operators::translate_operator(self, data, source_text)
    }

    fn visit_conditional(
        &mut self,
        condition: &AstNode,
        then_branch: &AstNode,
        else_branch: Option<&AstNode>,
        source_text: &str,
    ) -> Self::Output {
        conditional::translate_conditional(self, condition, then_branch, else_branch, source_text)
    }

    fn visit_aggregation(&mut self, function: &str, source_text: &str) -> Self::Output {
        functions::dispatch_bare_aggregate(self, function, source_text)
    }

    fn visit_type_operation(
        &mut self,
        op: TypeOp,
        target: &AstNode,
        target_type: &str,
        source_text: &str,
    ) -> Self::Output {
        type_ops::translate_type_operation(self, op, target, target_type, source_text)
    }
}
