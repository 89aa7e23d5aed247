use tracing::warn;

use crate::config::Settings;
use crate::error::{AdminError, Result};
use crate::export::dateformat;
use crate::export::options::{CellFormat, ExportOptions};
use crate::value::Value;

/// A formatted value, ready for one of the serializers.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number { value: f64, text: String },
    Bool(bool),
    /// A spreadsheet formula and the plain text it stands for.
    Formula { formula: String, text: String },
}

impl Cell {
    /// Rendering for outputs without native types.
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(text) => text.clone(),
            Cell::Number { text, .. } => text.clone(),
            Cell::Bool(true) => "True".to_string(),
            Cell::Bool(false) => "False".to_string(),
            Cell::Formula { text, .. } => text.clone(),
        }
    }
}

/// A fully formatted document: optional header labels, one format per
/// column and the data rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub header: Option<Vec<String>>,
    pub formats: Vec<CellFormat>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn width(&self) -> usize {
        self.formats.len()
    }
}

fn number(value: f64, text: String) -> Cell {
    Cell::Number { value, text }
}

/// Largest magnitude a spreadsheet number holds without rounding.
const MAX_EXACT_INTEGER: u64 = 1 << 53;

/// Turn a resolved value into a cell using the column's format and the
/// date patterns of `options`. Integers too large for a spreadsheet number
/// are kept as text.
pub fn format_cell(
    value: Value,
    format: &CellFormat,
    options: &ExportOptions,
    settings: &Settings,
) -> Result<Cell> {
    if value.is_null() {
        return Ok(Cell::Empty);
    }
    if let CellFormat::Formatter { formatter } = format {
        let text = value.to_string();
        return Ok(Cell::Formula {
            formula: formatter.formula(&text),
            text,
        });
    }

    let cell = match value {
        Value::Null => Cell::Empty,
        Value::Bool(b) => Cell::Bool(b),
        Value::Int(i) if i.unsigned_abs() > MAX_EXACT_INTEGER => Cell::Text(i.to_string()),
        Value::Int(i) => number(i as f64, i.to_string()),
        Value::Decimal(d) => {
            let text = d.to_string();
            let parsed = text
                .parse::<f64>()
                .map_err(|e| AdminError::Formatting(format!("{}: {}", text, e)))?;
            number(parsed, text)
        }
        Value::Date(d) => Cell::Text(dateformat::format_date(d, &options.date_format)?),
        Value::Time(t) => Cell::Text(dateformat::format_time(t, &options.time_format)?),
        Value::DateTime(dt) => {
            let local = dt.with_timezone(&settings.time_zone);
            Cell::Text(dateformat::format_datetime(&local, &options.datetime_format)?)
        }
        Value::NaiveDateTime(dt) => {
            warn!(value = %dt, "naive datetime formatted without time zone conversion");
            Cell::Text(dateformat::format_naive_datetime(dt, &options.datetime_format)?)
        }
        other @ (Value::Text(_) | Value::Bytes(_) | Value::List(_)) => Cell::Text(other.to_string()),
    };
    Ok(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::options::NamedFormatter;
    use bigdecimal::BigDecimal;
    use chrono::{FixedOffset, NaiveDate, TimeZone};
    use std::str::FromStr;

    fn general() -> CellFormat {
        CellFormat::pattern("general")
    }

    fn fmt(value: Value) -> Cell {
        format_cell(value, &general(), &ExportOptions::default(), &Settings::default()).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(fmt(Value::Null), Cell::Empty);
        assert_eq!(fmt(Value::Bool(true)).text(), "True");
        assert_eq!(fmt(Value::Int(42)), number(42.0, "42".to_string()));
        assert_eq!(
            fmt(Value::Decimal(BigDecimal::from_str("12.50").unwrap())),
            number(12.5, "12.50".to_string())
        );
        assert_eq!(
            fmt(Value::List(vec![Value::from("a"), Value::from("b")])),
            Cell::Text("a, b".to_string())
        );
    }

    #[test]
    fn test_big_integers_stay_exact() {
        let format = CellFormat::pattern("#,##");
        let options = ExportOptions::default();
        let settings = Settings::default();

        let edge = 1_i64 << 53;
        assert_eq!(
            format_cell(Value::Int(edge), &format, &options, &settings).unwrap(),
            Cell::Number {
                value: edge as f64,
                text: edge.to_string()
            }
        );
        assert_eq!(
            format_cell(Value::Int(edge + 1), &format, &options, &settings).unwrap(),
            Cell::Text("9007199254740993".to_string())
        );
        assert_eq!(
            format_cell(Value::Int(i64::MIN), &format, &options, &settings).unwrap(),
            Cell::Text(i64::MIN.to_string())
        );
    }

    #[test]
    fn test_date_uses_pattern() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(fmt(Value::Date(date)), Cell::Text("05/03/2024".to_string()));
    }

    #[test]
    fn test_aware_datetime_is_converted() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let dt = offset.with_ymd_and_hms(2024, 1, 15, 23, 30, 0).unwrap();
        let settings = Settings::with_time_zone("Europe/Rome").unwrap();

        let cell = format_cell(
            Value::DateTime(dt),
            &general(),
            &ExportOptions::default(),
            &settings,
        )
        .unwrap();
        assert_eq!(cell, Cell::Text("Jan. 16, 2024, 12:30 a.m.".to_string()));
    }

    #[test]
    fn test_naive_datetime_is_not_converted() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(23, 30, 0)
            .unwrap();
        let settings = Settings::with_time_zone("Europe/Rome").unwrap();

        let cell = format_cell(
            Value::NaiveDateTime(dt),
            &general(),
            &ExportOptions::default(),
            &settings,
        )
        .unwrap();
        assert_eq!(cell, Cell::Text("Jan. 15, 2024, 11:30 p.m.".to_string()));
    }

    #[test]
    fn test_formatter_yields_formula() {
        let format = CellFormat::formatter(NamedFormatter::MailtoLink);
        let cell = format_cell(
            Value::from("ada@example.com"),
            &format,
            &ExportOptions::default(),
            &Settings::default(),
        )
        .unwrap();
        assert_eq!(cell.text(), "ada@example.com");
        assert!(matches!(cell, Cell::Formula { ref formula, .. } if formula.starts_with("HYPERLINK(")));
    }

    #[test]
    fn test_bad_pattern_is_formatting_error() {
        let options = ExportOptions {
            date_format: "H:i".to_string(),
            ..ExportOptions::default()
        };
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let result = format_cell(Value::Date(date), &general(), &options, &Settings::default());
        assert!(matches!(result, Err(AdminError::Formatting(_))));
    }
}
