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

//! Temporal comparison range semantics (spec §4.4): partial-precision date
//! literals compare via `[low, high)` boundaries and a three-valued CASE,
//! per the FHIRPath temporal spec.

use serde_json::Value;

use crate::dialect::BoundaryKind;
use crate::error::Result;
use crate::fragment::{metadata_keys, Fragment};

use super::Translator;

/// The literal's temporal kind (`"date"`/`"datetime"`/`"time"`), if it is
/// one — read from the `literal_type` metadata `translator::literal` sets.
pub(crate) fn literal_temporal_kind(fragment: &Fragment) -> Option<&'static str> {
    match fragment.get_metadata(metadata_keys::LITERAL_TYPE) {
        Some(Value::String(s)) if s == "date" => Some("date"),
        Some(Value::String(s)) if s == "datetime" => Some("datetime"),
        Some(Value::String(s)) if s == "time" => Some("time"),
        _ => None,
    }
}

fn raw_value(fragment: &Fragment) -> Option<&str> {
    match fragment.get_metadata(metadata_keys::LITERAL_RAW_VALUE) {
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// Count of date/time components present in a raw FHIRPath temporal
/// literal's source text (`"2015"` -> 1, `"2015-03"` -> 2,
/// `"2015-03-12T10:00"` -> 5, ...).
fn component_count(raw: &str) -> u32 {
    raw.split(|c: char| matches!(c, '-' | ':' | 'T' | '.' | '+'))
        .filter(|s| !s.is_empty() && s.chars().any(|c| c.is_ascii_digit()))
        .count() as u32
}

fn has_timezone(raw: &str) -> bool {
    raw.ends_with('Z') || raw.contains('+') || raw.matches('-').count() > 2
}

/// Whether either side's precision is reduced relative to the other,
/// requiring range (rather than direct value) comparison semantics.
pub(crate) fn needs_range_comparison(left: &Fragment, right: &Fragment) -> bool {
    match (raw_value(left), raw_value(right)) {
        (Some(l), Some(r)) => component_count(l) != component_count(r) || component_count(l) < 3 || component_count(r) < 3,
        _ => false,
    }
}

/// Three-valued (TRUE/FALSE/NULL) range comparison between two temporal
/// literals of potentially different precision.
pub(crate) fn translate_range_comparison(
    translator: &mut Translator<'_>,
    symbol: &str,
    left: &Fragment,
    right: &Fragment,
    l_kind: &'static str,
    r_kind: &'static str,
) -> Result<String> {
    let l_raw = raw_value(left).unwrap_or_default();
    let r_raw = raw_value(right).unwrap_or_default();
    let l_prec = component_count(l_raw);
    let r_prec = component_count(r_raw);
    let l_tz = has_timezone(l_raw);
    let r_tz = has_timezone(r_raw);

    let l_low = translator.dialect.generate_temporal_boundary(&left.expression, l_kind, l_prec, BoundaryKind::Low, l_tz);
    let l_high = translator.dialect.generate_temporal_boundary(&left.expression, l_kind, l_prec, BoundaryKind::High, l_tz);
    let r_low = translator.dialect.generate_temporal_boundary(&right.expression, r_kind, r_prec, BoundaryKind::Low, r_tz);
    let r_high = translator.dialect.generate_temporal_boundary(&right.expression, r_kind, r_prec, BoundaryKind::High, r_tz);

    let (true_cond, false_cond) = match symbol {
        "<" => (format!("{l_high} < {r_low}"), format!("{l_low} >= {r_high}")),
        "<=" => (format!("{l_high} <= {r_high}"), format!("{l_low} > {r_high}")),
        ">" => (format!("{l_low} > {r_high}"), format!("{l_high} <= {r_low}")),
        ">=" => (format!("{l_low} >= {r_low}"), format!("{l_high} < {r_low}")),
        "=" => (
            format!("{l_low} = {r_low} AND {l_high} = {r_high}"),
            format!("{l_high} < {r_low} OR {l_low} > {r_high}"),
        ),
        "!=" => (
            format!("{l_high} < {r_low} OR {l_low} > {r_high}"),
            format!("{l_low} = {r_low} AND {l_high} = {r_high}"),
        ),
        other => {
            return Err(translator.validation_error(
                "unsupported_operator",
                format!("unsupported range comparison operator: {other}"),
                "",
            ))
        }
    };

    Ok(format!("CASE WHEN {true_cond} THEN TRUE WHEN {false_cond} THEN FALSE ELSE NULL END"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_count_reads_partial_precision() {
        assert_eq!(component_count("2015"), 1);
        assert_eq!(component_count("2015-03"), 2);
        assert_eq!(component_count("2015-03-12"), 3);
    }

    #[test]
    fn needs_range_comparison_detects_mismatched_precision() {
        let mut l = Fragment::from_resource("x").unwrap();
        l.set_metadata(metadata_keys::LITERAL_RAW_VALUE, "2015");
        let mut r = Fragment::from_resource("y").unwrap();
        r.set_metadata(metadata_keys::LITERAL_RAW_VALUE, "2015-03-12");
        assert!(needs_range_comparison(&l, &r));
    }
}
