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

//! Translator configuration.

/// Tunables for the translator. Defaults reproduce the spec's documented
/// behavior exactly; only change these if you know what you're doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorConfig {
    /// Maximum recursion depth for `repeat()`'s cycle-detecting recursive
    /// CTE. The spec fixes this at 100.
    pub repeat_max_depth: u32,

    /// When the Type Oracle cannot answer whether a collection is a
    /// primitive collection, prefer it over the hardcoded field-name
    /// heuristic whenever it *can* answer. Set false only for diagnosing
    /// the heuristic path itself.
    pub prefer_structure_definition_cardinality: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            repeat_max_depth: 100,
            prefer_structure_definition_cardinality: true,
        }
    }
}
