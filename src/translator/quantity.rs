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

//! FHIR `Quantity` literal construction and half-ULP boundary math
//! (spec §4.5 boundary functions; grounded on
//! `fhir4ds/main/fhirpath/types/quantity_builder.py`).

use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::dialect::BoundaryKind;
use crate::error::Result;
use crate::fragment::{metadata_keys, Fragment};
use crate::translator::literal::escape_sql_string;

use super::Translator;

const UCUM_SYSTEM_URL: &str = "http://unitsofmeasure.org";

/// Build the FHIR `Quantity` JSON object for `amount unit` (`{"value":
/// 10, "unit": "mg", "system": "http://unitsofmeasure.org", "code": "mg"}`).
pub(crate) fn build_quantity_json(amount: &Decimal, unit: &str) -> Value {
    let value: Value = if amount.scale() == 0 {
        json!(amount.to_string().parse::<i64>().unwrap_or_default())
    } else {
        json!(amount.to_string().parse::<f64>().unwrap_or_default())
    };
    json!({
        "value": value,
        "unit": unit,
        "system": UCUM_SYSTEM_URL,
        "code": unit,
    })
}

/// Translate a `quantity(amount, unit)` (or single `"amount unit"` string
/// argument) call into a Fragment carrying the constructed JSON literal
/// plus `quantity_amount`/`quantity_unit` metadata for temporal arithmetic
/// and boundary functions to consume.
pub(crate) fn translate_quantity_literal(translator: &mut Translator<'_>, amount_text: &str, unit_text: &str) -> Result<Fragment> {
    let amount = Decimal::from_str(amount_text.trim())
        .map_err(|_| translator.validation_error("invalid_quantity", format!("not a valid quantity amount: {amount_text}"), amount_text))?;
    let unit = unit_text.trim().trim_matches('\'').trim_matches('"').to_string();

    let json_value = build_quantity_json(&amount, &unit);
    let sql = format!("'{}'", escape_sql_string(&json_value.to_string()));

    let table = translator.context.current_table.clone();
    let mut fragment = Fragment::new(sql, table)?;
    fragment.set_metadata(metadata_keys::QUANTITY_AMOUNT, amount_text.trim().to_string());
    fragment.set_metadata(metadata_keys::QUANTITY_UNIT, unit);
    Ok(fragment)
}

/// Number of digits after the decimal point in a raw numeric literal's
/// source text (`"10"` -> 0, `"10.50"` -> 2).
pub(crate) fn decimal_precision_from_text(raw: &str) -> u32 {
    match raw.split_once('.') {
        Some((_, frac)) => frac.chars().filter(|c| c.is_ascii_digit()).count() as u32,
        None => 0,
    }
}

/// The low/high boundary of `value` at `precision` decimal places, as a
/// half-ULP interval (`value ± 5 * 10^-(precision+1)`).
pub(crate) fn half_ulp_boundary(value: Decimal, precision: u32, kind: BoundaryKind) -> Decimal {
    let half_ulp = Decimal::new(5, precision + 1);
    match kind {
        BoundaryKind::Low => value - half_ulp,
        BoundaryKind::High => value + half_ulp,
    }
}

/// Compute a quantity literal's boundary at translation time, returning a
/// formatted decimal string literal (spec §4.5: "For quantity literals,
/// compute the boundary at translation time... producing a formatted
/// string literal").
pub(crate) fn translate_quantity_boundary(amount_text: &str, kind: BoundaryKind) -> Option<String> {
    let amount = Decimal::from_str(amount_text.trim()).ok()?;
    let precision = decimal_precision_from_text(amount_text.trim());
    let boundary = half_ulp_boundary(amount, precision, kind);
    Some(boundary.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_ucum_quantity_json() {
        let value = Decimal::from_str("10.5").unwrap();
        let json = build_quantity_json(&value, "mg");
        assert_eq!(json["unit"], "mg");
        assert_eq!(json["system"], UCUM_SYSTEM_URL);
        assert_eq!(json["code"], "mg");
    }

    #[test]
    fn decimal_precision_counts_fraction_digits() {
        assert_eq!(decimal_precision_from_text("10"), 0);
        assert_eq!(decimal_precision_from_text("10.50"), 2);
    }

    #[test]
    fn half_ulp_boundary_brackets_the_value() {
        let value = Decimal::from_str("1.0").unwrap();
        let low = half_ulp_boundary(value, 1, BoundaryKind::Low);
        let high = half_ulp_boundary(value, 1, BoundaryKind::High);
        assert!(low < value);
        assert!(high > value);
    }
}
