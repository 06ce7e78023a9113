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

//! Error types for AST-to-SQL translation.
//!
//! Three kinds, matching the three the spec distinguishes: a
//! [`TranslationError::Validation`] for statically ill-formed FHIRPath, a
//! [`TranslationError::Translation`] for internal/dialect contract
//! violations, and a [`TranslationError::Evaluation`] for spec-mandated
//! runtime errors the translator can prove at compile time (e.g. `iif` on a
//! literal multi-item union). None of these are retried or recovered within
//! this crate.

use thiserror::Error;

/// Result alias used throughout the translator.
pub type Result<T> = std::result::Result<T, TranslationError>;

/// An error raised while translating a FHIRPath AST into SQL fragments.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// The FHIRPath expression is statically ill-typed or ill-formed
    /// (unknown function, wrong argument count, unknown FHIR type, unbound
    /// variable, non-boolean `iif` criterion, ...).
    #[error("{rule}: {message} (in `{expression}`)")]
    Validation {
        /// Short, stable rule identifier (e.g. `iif_criterion_must_be_boolean`).
        rule: String,
        /// Human-readable description.
        message: String,
        /// Source text of the offending expression.
        expression: String,
    },

    /// Internal inconsistency, or a dialect/type-oracle contract violation
    /// (unresolvable function target, unparseable quantity literal, a type
    /// cast to a complex type with no structural variants, ...).
    #[error("translation error: {message}")]
    Translation {
        /// Human-readable description.
        message: String,
    },

    /// The FHIRPath spec mandates a runtime error, and the translator can
    /// prove it holds at translation time (e.g. `iif` invoked on a
    /// statically-detectable multi-item collection).
    #[error("{rule}: {message} (in `{expression}`)")]
    Evaluation {
        /// Short, stable rule identifier.
        rule: String,
        /// Human-readable description.
        message: String,
        /// Source text of the offending expression.
        expression: String,
    },
}

impl TranslationError {
    /// Build a [`TranslationError::Validation`].
    pub fn validation(
        rule: impl Into<String>,
        message: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        TranslationError::Validation {
            rule: rule.into(),
            message: message.into(),
            expression: expression.into(),
        }
    }

    /// Build a [`TranslationError::Translation`].
    pub fn translation(message: impl Into<String>) -> Self {
        TranslationError::Translation {
            message: message.into(),
        }
    }

    /// Build a [`TranslationError::Evaluation`].
    pub fn evaluation(
        rule: impl Into<String>,
        message: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        TranslationError::Evaluation {
            rule: rule.into(),
            message: message.into(),
            expression: expression.into(),
        }
    }

    /// The short rule identifier, if this is a validation or evaluation error.
    pub fn rule(&self) -> Option<&str> {
        match self {
            TranslationError::Validation { rule, .. } | TranslationError::Evaluation { rule, .. } => {
                Some(rule)
            }
            TranslationError::Translation { .. } => None,
        }
    }
}
