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

//! Literal translation (spec §4.2).

use crate::ast::{LiteralType, LiteralValue};
use crate::context::PendingLiteral;
use crate::error::Result;
use crate::fragment::{metadata_keys, Fragment};

use super::Translator;

/// Single-quote-escape a string literal, doubling any embedded quote.
pub fn escape_sql_string(s: &str) -> String {
    s.replace('\'', "''")
}

pub(super) fn translate_literal(
    translator: &mut Translator<'_>,
    value: &LiteralValue,
    literal_type: LiteralType,
    _source_text: &str,
) -> Result<Fragment> {
    let sql = match (value, literal_type) {
        (LiteralValue::String(s), _) => format!("'{}'", escape_sql_string(s)),
        (LiteralValue::Integer(i), _) => i.to_string(),
        (LiteralValue::Decimal(d), _) => d.to_string(),
        (LiteralValue::Boolean(b), _) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
        (LiteralValue::Date(s), _) => translator.dialect.generate_date_literal(s),
        (LiteralValue::DateTime(s), _) => translator.dialect.generate_datetime_literal(s),
        (LiteralValue::Time(s), _) => translator.dialect.generate_time_literal(s),
        (LiteralValue::Empty, _) | (_, LiteralType::EmptyCollection) => "NULL".to_string(),
        (LiteralValue::Unknown(s), _) => s.clone(),
    };

    let mut fragment = Fragment::new(sql.clone(), translator.context.current_table.clone())?;
    fragment.set_metadata(metadata_keys::IS_LITERAL, true);
    fragment.set_metadata(metadata_keys::LITERAL_TYPE, literal_type_name(literal_type));
    if matches!(value, LiteralValue::Empty) || matches!(literal_type, LiteralType::EmptyCollection) {
        fragment.set_metadata(metadata_keys::IS_EMPTY_COLLECTION, true);
    }
    if let LiteralValue::Date(s) | LiteralValue::DateTime(s) | LiteralValue::Time(s) = value {
        fragment.set_metadata(metadata_keys::LITERAL_RAW_VALUE, s.clone());
    }

    translator.context.pending_literal_value = Some(PendingLiteral {
        raw_value: value.clone(),
        sql_expr: sql,
    });

    Ok(fragment)
}

pub(crate) fn literal_type_name(literal_type: LiteralType) -> &'static str {
    match literal_type {
        LiteralType::String => "string",
        LiteralType::Integer => "integer",
        LiteralType::Decimal => "decimal",
        LiteralType::Boolean => "boolean",
        LiteralType::Date => "date",
        LiteralType::DateTime => "datetime",
        LiteralType::Time => "time",
        LiteralType::EmptyCollection => "empty_collection",
        LiteralType::Unknown => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_embedded_quotes() {
        assert_eq!(escape_sql_string("O'Brien"), "O''Brien");
    }
}
