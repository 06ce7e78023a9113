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

//! The AST node shapes, closed over a finite set of FHIRPath syntax forms.

use rust_decimal::Decimal;
use smallvec::SmallVec;

/// Tag identifying how a [`LiteralValue`] should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralType {
    /// A quoted string literal.
    String,
    /// An integer literal.
    Integer,
    /// A decimal literal.
    Decimal,
    /// `true`/`false`.
    Boolean,
    /// `@YYYY-MM-DD` (partial precision allowed).
    Date,
    /// `@YYYY-MM-DDThh:mm:ss` (partial precision allowed).
    DateTime,
    /// `@Thh:mm:ss` (partial precision allowed).
    Time,
    /// `{}`.
    EmptyCollection,
    /// A literal whose type could not be determined at parse time.
    Unknown,
}

/// The parsed value of a literal node.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// String literal, unescaped.
    String(String),
    /// Integer literal.
    Integer(i64),
    /// Decimal literal, preserving source precision.
    Decimal(Decimal),
    /// Boolean literal.
    Boolean(bool),
    /// Date literal, raw source text (e.g. `"2015-03"`).
    Date(String),
    /// DateTime literal, raw source text.
    DateTime(String),
    /// Time literal, raw source text.
    Time(String),
    /// `{}` — the empty collection.
    Empty,
    /// Unparsed/unknown literal text.
    Unknown(String),
}

/// Classification of a binary/unary [`OperatorData`] node, dispatched on
/// by `translator::operators`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    /// `not`, unary `+`/`-`.
    Unary,
    /// Any other non-comparison, non-logical, non-union, non-arithmetic
    /// binary operator (`&` string concat, `~`/`!~` equivalence).
    Binary,
    /// `=`, `!=`, `<`, `<=`, `>`, `>=`.
    Comparison,
    /// `and`, `or`, `xor`, `implies`.
    Logical,
    /// `|` / `union`.
    Union,
    /// `+`, `-`, `*`, `/`, `div`, `mod`.
    Arithmetic,
}

/// A type operation (spec §4.5): `is`, `as`, `ofType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOp {
    /// `x is Type`.
    Is,
    /// `x as Type`.
    As,
    /// `x.ofType(Type)`.
    OfType,
}

/// The data carried by a `FunctionCall` node.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallData {
    /// Function name, as written (the translator lowercases for dispatch).
    pub name: String,
    /// Argument expressions.
    pub arguments: Vec<AstNode>,
    /// The explicit target of the call, when the parser supplies one as a
    /// `target` edge rather than leaving it implicit in `source_text`
    /// (see `_resolve_function_target`, spec §4.5).
    pub target: Option<Box<AstNode>>,
}

/// The data carried by an `Operator` node.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorData {
    /// The operator token (`"+"`, `"and"`, `"|"`, ...).
    pub symbol: String,
    /// Dispatch classification.
    pub kind: OperatorKind,
    /// Operand sub-trees. Unary operators have one child; binary have two;
    /// a left-associative chain of `|` may be pre-flattened by the parser
    /// into more than two, which union linearization (spec §4.4, §9)
    /// requires.
    pub children: SmallVec<[Box<AstNode>; 2]>,
}

/// A FHIRPath AST node.
///
/// `Wrapper` models the "enhanced" transparent container nodes (
/// `InvocationExpression`, `TermExpression`, `UnionExpression`, ...) some
/// parsers emit around a single real child; the translator's visitor walks
/// straight through them (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// A literal value.
    Literal {
        /// Parsed value.
        value: LiteralValue,
        /// Rendering tag.
        literal_type: LiteralType,
        /// Original source text.
        source_text: String,
    },
    /// A path identifier (possibly dotted, e.g. `name.family`).
    Identifier {
        /// Full identifier text as written.
        text: String,
        /// Dot-split components.
        components: Vec<String>,
        /// Original source text.
        source_text: String,
    },
    /// A `$`-prefixed variable reference (`$this`, `$index`, `$total`, or
    /// a user `defineVariable` name).
    Variable {
        /// Variable name, including the leading `$`.
        name: String,
        /// Original source text.
        source_text: String,
    },
    /// A function/method call.
    FunctionCall {
        /// Call data.
        data: FunctionCallData,
        /// Original source text, including the implicit target if any —
        /// needed to parse the text preceding `.functionName(` when no
        /// explicit `target` edge is present (spec §4.5).
        source_text: String,
    },
    /// A unary or binary operator application.
    Operator {
        /// Operator data.
        data: OperatorData,
        /// Original source text.
        source_text: String,
    },
    /// `iif`-shaped conditional: `condition ? then : else`, surfaced by the
    /// parser as its own node rather than a generic function call.
    Conditional {
        /// The boolean condition.
        condition: Box<AstNode>,
        /// The branch taken when `condition` is true.
        then_branch: Box<AstNode>,
        /// The branch taken when `condition` is false, if present.
        else_branch: Option<Box<AstNode>>,
        /// Original source text.
        source_text: String,
    },
    /// A bare aggregate function reference (e.g. as used inside a
    /// reduction context).
    Aggregation {
        /// The aggregate function name.
        function: String,
        /// Original source text.
        source_text: String,
    },
    /// A type operation: `is`, `as`, `ofType`.
    TypeOperation {
        /// Which operation.
        op: TypeOp,
        /// The expression being checked/cast.
        target: Box<AstNode>,
        /// The FHIR type name operated against.
        target_type: String,
        /// Original source text.
        source_text: String,
    },
    /// A transparent single-child container node from the parser.
    Wrapper {
        /// The wrapper's node kind name, for diagnostics only.
        kind: String,
        /// The real child.
        child: Box<AstNode>,
    },
}

impl AstNode {
    /// The original FHIRPath source text this node was parsed from.
    pub fn source_text(&self) -> &str {
        match self {
            AstNode::Literal { source_text, .. }
            | AstNode::Identifier { source_text, .. }
            | AstNode::Variable { source_text, .. }
            | AstNode::FunctionCall { source_text, .. }
            | AstNode::Operator { source_text, .. }
            | AstNode::Conditional { source_text, .. }
            | AstNode::Aggregation { source_text, .. }
            | AstNode::TypeOperation { source_text, .. } => source_text,
            AstNode::Wrapper { child, .. } => child.source_text(),
        }
    }

    /// Whether this node is "significant": a function call or type
    /// operation, the only node kinds that yield their own fragment in the
    /// output list (spec §3, §4.1). Literals, identifiers, variables, and
    /// nested operators fold into their significant parent's fragment.
    pub fn is_significant(&self) -> bool {
        match self {
            AstNode::FunctionCall { .. } | AstNode::TypeOperation { .. } => true,
            AstNode::Wrapper { child, .. } => child.is_significant(),
            _ => false,
        }
    }

    /// Unwrap any chain of transparent `Wrapper` nodes, returning the real
    /// node underneath.
    pub fn unwrap(&self) -> &AstNode {
        match self {
            AstNode::Wrapper { child, .. } => child.unwrap(),
            other => other,
        }
    }
}
