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

//! Visitor pattern for AST traversal.

use super::expression::{AstNode, FunctionCallData, LiteralType, LiteralValue, OperatorData, TypeOp};

/// Visits each AST node variant. Implemented once, by the `Translator`;
/// the dispatch is a monomorphic `match` (`walk_ast`) rather than runtime
/// `isinstance`-style checks, since the node set is finite and closed.
pub trait Visitor {
    /// The result type of visiting a node.
    type Output;

    /// Visit a literal.
    fn visit_literal(&mut self, value: &LiteralValue, literal_type: LiteralType, source_text: &str) -> Self::Output;
    /// Visit an identifier.
    fn visit_identifier(&mut self, text: &str, components: &[String], source_text: &str) -> Self::Output;
    /// Visit a `$`-prefixed variable reference.
    fn visit_variable(&mut self, name: &str, source_text: &str) -> Self::Output;
    /// Visit a function/method call.
    fn visit_function_call(&mut self, data: &FunctionCallData, source_text: &str) -> Self::Output;
    /// Visit a unary/binary operator application.
    fn visit_operator(&mut self, data: &OperatorData, source_text: &str) -> Self::Output;
    /// Visit a conditional (`iif`-shaped) expression.
    fn visit_conditional(
        &mut self,
        condition: &AstNode,
        then_branch: &AstNode,
        else_branch: Option<&AstNode>,
        source_text: &str,
    ) -> Self::Output;
    /// Visit a bare aggregate function reference.
    fn visit_aggregation(&mut self, function: &str, source_text: &str) -> Self::Output;
    /// Visit a type operation (`is`/`as`/`ofType`).
    fn visit_type_operation(
        &mut self,
        op: TypeOp,
        target: &AstNode,
        target_type: &str,
        source_text: &str,
    ) -> Self::Output;
}

/// Dispatch `node` to the matching `Visitor` method, transparently
/// unwrapping any chain of `Wrapper` container nodes first.
pub fn walk_ast<V: Visitor>(visitor: &mut V, node: &AstNode) -> V::Output {
    match node {
        AstNode::Wrapper { child, .. } => walk_ast(visitor, child),
        AstNode::Literal {
            value,
            literal_type,
            source_text,
        } => visitor.visit_literal(value, *literal_type, source_text),
        AstNode::Identifier {
            text,
            components,
            source_text,
        } => visitor.visit_identifier(text, components, source_text),
        AstNode::Variable { name, source_text } => visitor.visit_variable(name, source_text),
        AstNode::FunctionCall { data, source_text } => visitor.visit_function_call(data, source_text),
        AstNode::Operator { data, source_text } => visitor.visit_operator(data, source_text),
        AstNode::Conditional {
            condition,
            then_branch,
            else_branch,
            source_text,
        } => visitor.visit_conditional(condition, then_branch, else_branch.as_deref(), source_text),
        AstNode::Aggregation { function, source_text } => visitor.visit_aggregation(function, source_text),
        AstNode::TypeOperation {
            op,
            target,
            target_type,
            source_text,
        } => visitor.visit_type_operation(*op, target, target_type, source_text),
    }
}
