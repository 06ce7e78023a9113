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

//! The Dialect: a pure, synchronous interface supplying database-specific
//! SQL syntax primitives. The translator never emits raw dialect-specific
//! syntax itself; every JSON-access, array, cast, temporal, math, string,
//! or aggregate primitive is requested from a `Dialect` implementation.
//! Dialect implementations themselves are out of this crate's scope.

/// Which end of an interval a boundary function should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    /// The smallest value consistent with the input's precision.
    Low,
    /// The largest value consistent with the input's precision.
    High,
}

/// Case-conversion direction for `generate_case_conversion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    /// `upper()`.
    Upper,
    /// `lower()`.
    Lower,
}

/// Database-specific SQL syntax primitives consumed by the translator.
/// Every method is pure: given the same arguments it returns the same SQL
/// text, with no side effects and no I/O.
pub trait Dialect: Send + Sync {
    // ---- JSON access -----------------------------------------------

    /// Extract a JSON field as its raw JSON representation.
    fn extract_json_field(&self, col: &str, path: &str) -> String;
    /// Extract a JSON field as a JSON object (for further navigation).
    fn extract_json_object(&self, col: &str, path: &str) -> String;
    /// Extract a JSON field as its unwrapped scalar SQL value.
    fn extract_primitive_value(&self, col: &str, path: &str) -> String;
    /// Extract a JSON string field from an arbitrary SQL expression.
    fn extract_json_string(&self, expr: &str, path: &str) -> String;
    /// The runtime JSON type tag of an expression (`"string"`, `"array"`, ...).
    fn get_json_type(&self, expr: &str) -> String;
    /// The length of a JSON array, optionally navigating to `path` first.
    fn get_json_array_length(&self, col: &str, path: Option<&str>) -> String;
    /// A boolean SQL predicate: is `expr` a JSON array.
    fn is_json_array(&self, expr: &str) -> String;
    /// Wrap a scalar expression as a single-element JSON array.
    fn wrap_json_array(&self, expr: &str) -> String;
    /// The SQL literal for an empty JSON array.
    fn empty_json_array(&self) -> String;
    /// A boolean SQL predicate: does `path` exist on `col`.
    fn check_json_exists(&self, col: &str, path: &str) -> String;
    /// A boolean SQL predicate: does JSON array `arr` contain `needle`.
    fn json_array_contains(&self, arr: &str, needle: &str) -> String;

    // ---- Array operations --------------------------------------------

    /// `LATERAL`-unnest the JSON array at `path` on `col`, aliased `alias`.
    fn unnest_json_array(&self, col: &str, path: &str, alias: &str) -> String;
    /// Enumerate a JSON array's elements with a value and index alias.
    fn enumerate_json_array(&self, expr: &str, value_alias: &str, index_alias: &str) -> String;
    /// Aggregate rows (already shaped by `expr`, which embeds its own
    /// `ORDER BY`) back into a JSON array.
    fn aggregate_to_json_array(&self, expr_with_order_by: &str) -> String;
    /// Canonical serialization of a value for equality/membership comparison.
    fn serialize_json_value(&self, expr: &str) -> String;
    /// Project each element of a JSON array through `components`.
    fn project_json_array(&self, arr: &str, components: &str) -> String;
    /// The first element of a JSON array.
    fn generate_array_first(&self, arr: &str) -> String;
    /// The last element of a JSON array.
    fn generate_array_last(&self, arr: &str) -> String;
    /// All but the first `n` elements of a JSON array.
    fn generate_array_skip(&self, arr: &str, n: i64) -> String;
    /// The first `n` elements of a JSON array.
    fn generate_array_take(&self, arr: &str, n: i64) -> String;

    // ---- Comparisons & logic -------------------------------------------

    /// `l op r` for comparison operators (`=`, `!=`, `<`, `<=`, `>`, `>=`).
    fn generate_comparison(&self, l: &str, op: &str, r: &str) -> String;
    /// Three-valued-logic `and`/`or` combinator.
    fn generate_logical_combine(&self, l: &str, op: &str, r: &str) -> String;
    /// `xor` combinator (empty treated as FALSE per spec §4.4).
    fn generate_xor(&self, l: &str, r: &str) -> String;
    /// Three-valued-logic negation.
    fn generate_boolean_not(&self, x: &str) -> String;
    /// A boolean SQL predicate testing whether `expr`'s runtime type is `ty`.
    fn generate_type_check(&self, expr: &str, ty: &str) -> String;
    /// Cast `expr` to primitive type `ty`, NULL on failure.
    fn generate_type_cast(&self, expr: &str, ty: &str) -> String;
    /// Filter a JSON array's elements down to those whose type matches `ty`
    /// (or all elements, if `ty` is `None`, for `ofType` with no match).
    fn generate_collection_type_filter(&self, arr: &str, ty: Option<&str>) -> String;

    // ---- Safe casts (NULL on failure) ----------------------------------

    /// Safe cast to integer.
    fn safe_cast_to_integer(&self, expr: &str) -> String;
    /// Safe cast to decimal.
    fn safe_cast_to_decimal(&self, expr: &str) -> String;
    /// Safe cast to date.
    fn safe_cast_to_date(&self, expr: &str) -> String;
    /// Safe cast to timestamp.
    fn safe_cast_to_timestamp(&self, expr: &str) -> String;
    /// Safe cast to boolean.
    fn safe_cast_to_boolean(&self, expr: &str) -> String;
    /// Cast to double precision (used by math functions).
    fn cast_to_double(&self, expr: &str) -> String;

    // ---- Temporal -------------------------------------------------------

    /// A properly-typed `date` literal from a FHIRPath date string.
    fn generate_date_literal(&self, s: &str) -> String;
    /// A properly-typed `datetime` literal.
    fn generate_datetime_literal(&self, s: &str) -> String;
    /// A properly-typed `time` literal.
    fn generate_time_literal(&self, s: &str) -> String;
    /// `today()`.
    fn generate_current_date(&self) -> String;
    /// `now()`.
    fn generate_current_timestamp(&self) -> String;
    /// `timeOfDay()`.
    fn generate_current_time(&self) -> String;
    /// The low/high boundary of a temporal value at a given precision.
    /// `has_tz` propagates whether the input carries a timezone offset.
    fn generate_temporal_boundary(
        &self,
        expr: &str,
        ty: &str,
        precision: u32,
        kind: BoundaryKind,
        has_tz: bool,
    ) -> String;
    /// The low/high boundary of a decimal value at a given precision.
    fn generate_decimal_boundary(&self, expr: &str, precision: u32, kind: BoundaryKind) -> String;
    /// A dialect interval expression for `amount unit` (e.g. `INTERVAL '3' DAY`),
    /// used by `date/datetime/time +/- quantity` arithmetic.
    fn generate_temporal_interval(&self, amount: &str, unit: &str) -> String;

    // ---- Math & strings -------------------------------------------------

    /// A one- or two-argument math function by FHIRPath name
    /// (`abs`, `ceiling`, `floor`, `round`, `truncate`, `sqrt`, `exp`,
    /// `ln`, `log`, `power`).
    fn generate_math_function(&self, name: &str, args: &[&str]) -> String;
    /// `n / d` with NULL-on-zero/NULL guards, always decimal.
    fn generate_decimal_division(&self, n: &str, d: &str) -> String;
    /// `n div d`, integer truncation, with NULL-on-zero/NULL guards.
    fn generate_integer_division(&self, n: &str, d: &str) -> String;
    /// `a mod b`, with NULL-on-zero/NULL guards.
    fn generate_modulo(&self, a: &str, b: &str) -> String;
    /// String concatenation (`&` operator; operands are pre-coalesced).
    fn string_concat(&self, a: &str, b: &str) -> String;
    /// A string function by FHIRPath name not covered by a more specific
    /// method below (`length`, `replace`, `split`, ...).
    fn generate_string_function(&self, name: &str, args: &[&str]) -> String;
    /// `contains()`.
    fn generate_substring_check(&self, s: &str, sub: &str) -> String;
    /// `startsWith()`.
    fn generate_prefix_check(&self, s: &str, p: &str) -> String;
    /// `endsWith()`.
    fn generate_suffix_check(&self, s: &str, p: &str) -> String;
    /// `upper()`/`lower()`.
    fn generate_case_conversion(&self, s: &str, mode: CaseMode) -> String;
    /// `trim()`.
    fn generate_trim(&self, s: &str) -> String;
    /// `toChars()`: split a string into an array of single characters.
    fn generate_char_array(&self, s: &str) -> String;
    /// `matches()`.
    fn generate_regex_match(&self, s: &str, p: &str) -> String;
    /// `replaceMatches()`.
    fn generate_regex_replace(&self, s: &str, p: &str, sub: &str) -> String;
    /// `split()`.
    fn split_string(&self, s: &str, d: &str) -> String;
    /// `join()` over a collection, `is_json` when the collection is a JSON
    /// array rather than a relational row set.
    fn generate_string_join(&self, coll: &str, sep: &str, is_json: bool) -> String;
    /// Array-to-string join (used internally, distinct from `join()`'s
    /// collection-aware variant above).
    fn generate_array_to_string(&self, arr: &str, sep: &str) -> String;

    // ---- Aggregates -------------------------------------------------------

    /// A named aggregate function (`count`, `sum`, ...) with optional
    /// filter predicate and `DISTINCT`.
    fn generate_aggregate_function(&self, name: &str, expr: &str, filter: Option<&str>, distinct: bool) -> String;
    /// `all(condition)` over an unnested collection.
    fn generate_all_check(&self, col: &str, path: &str, alias: &str, cond: &str) -> String;
    /// `allTrue()`.
    fn generate_all_true(&self, arr: &str) -> String;
    /// `anyTrue()`.
    fn generate_any_true(&self, arr: &str) -> String;
    /// `allFalse()`.
    fn generate_all_false(&self, arr: &str) -> String;
    /// `anyFalse()`.
    fn generate_any_false(&self, arr: &str) -> String;
    /// `distinct()`.
    fn generate_distinct(&self, x: &str) -> String;
    /// `isDistinct()`.
    fn generate_is_distinct(&self, x: &str) -> String;
    /// A boolean SQL predicate: is `expr` finite (not NaN/Infinity).
    fn is_finite(&self, expr: &str) -> String;
}
