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

//! The CTE assembler seam. Turning a fragment list into final SQL is a
//! separately specified component; the translator only needs a place to
//! hand its fragment list to.

use crate::error::Result;
use crate::fragment::Fragment;

/// Assembles an ordered [`Fragment`] list into a final SQL string (a chain
/// of Common Table Expressions). Implementations live outside this crate;
/// `Translator::translate_to_sql` is the only place this trait is called.
pub trait CteAssembler {
    /// Assemble `fragments` (in dependency order, as produced by
    /// `Translator::translate`) into a complete SQL statement.
    fn assemble(&self, fragments: &[Fragment]) -> Result<String>;
}
