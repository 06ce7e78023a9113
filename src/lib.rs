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

//! AST-to-SQL translation core for FHIRPath.
//!
//! This crate lowers a parsed FHIRPath expression tree into an ordered list
//! of [`Fragment`]s: dependency-linked SQL expressions that a separate CTE
//! assembler stitches into a final query. It owns none of the parsing, the
//! CTE assembly, dialect implementations, or the FHIR type registry itself —
//! those are consumed as the [`TypeOracle`], [`Dialect`], and [`CteAssembler`]
//! traits.

pub mod ast;
pub mod config;
pub mod context;
pub mod cte;
pub mod dialect;
pub mod error;
pub mod fragment;
pub mod oracle;
pub mod translator;

pub use ast::{AstNode, FunctionCallData, LiteralType, LiteralValue, OperatorData, OperatorKind, TypeOp};
pub use config::TranslatorConfig;
pub use context::{Context, ElementColumnState, VariableBinding};
pub use cte::CteAssembler;
pub use dialect::{BoundaryKind, CaseMode, Dialect};
pub use error::{Result, TranslationError};
pub use fragment::Fragment;
pub use oracle::{TypeDiscriminator, TypeMetadata, TypeOracle};
pub use translator::Translator;
