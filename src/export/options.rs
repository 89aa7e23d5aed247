use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AdminError, Result};
use crate::schema::{FieldDef, FieldType};

pub const ALLOWED_DELIMITERS: &str = ",;|:";
pub const ALLOWED_QUOTECHARS: &str = "'\"`";
pub const ALLOWED_ESCAPECHARS: &str = " \\";

/// Pattern applied when nothing more specific is configured.
pub const GENERAL: &str = "general";

/// Functions that turn a value into a spreadsheet formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedFormatter {
    MailtoLink,
    UrlLink,
}

fn quote_formula_string(value: &str) -> String {
    value.replace('"', "\"\"")
}

impl NamedFormatter {
    pub fn formula(&self, value: &str) -> String {
        let value = quote_formula_string(value);
        match self {
            NamedFormatter::MailtoLink => format!("HYPERLINK(\"mailto:{}\",\"{}\")", value, value),
            NamedFormatter::UrlLink => format!("HYPERLINK(\"{}\",\"{}\")", value, value),
        }
    }
}

/// Per-column formatting: a number-format pattern or a named formatter.
///
/// Deserializes from either a bare string (`"#,##0.00"`) or an object
/// (`{"formatter": "mailto_link"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellFormat {
    Pattern(String),
    Formatter { formatter: NamedFormatter },
}

impl CellFormat {
    pub fn pattern(pattern: &str) -> Self {
        CellFormat::Pattern(pattern.to_string())
    }

    pub fn formatter(formatter: NamedFormatter) -> Self {
        CellFormat::Formatter { formatter }
    }

    /// Number-format string for spreadsheet cells, if one applies.
    pub fn num_format(&self) -> Option<&str> {
        match self {
            CellFormat::Pattern(p) if p != GENERAL && p != "boolean" => Some(p),
            _ => None,
        }
    }
}

/// Built-in format for a field type, keyed the same way as the overrides.
pub fn default_format(field_type: &FieldType) -> Option<CellFormat> {
    let format = match field_type {
        FieldType::Date => CellFormat::pattern("DD MMM-YY"),
        FieldType::DateTime => CellFormat::pattern("DD MMD YY hh:mm"),
        FieldType::Time => CellFormat::pattern("hh:mm"),
        FieldType::Integer
        | FieldType::PositiveInteger
        | FieldType::SmallInteger
        | FieldType::BigInteger => CellFormat::pattern("#,##"),
        FieldType::Decimal => CellFormat::pattern("#,##0.00"),
        FieldType::Boolean | FieldType::NullBoolean => CellFormat::pattern("boolean"),
        FieldType::Currency => CellFormat::pattern("\"$\"#,##0.00);[Red](\"$\"#,##0.00)"),
        FieldType::Email => CellFormat::formatter(NamedFormatter::MailtoLink),
        FieldType::Url => CellFormat::formatter(NamedFormatter::UrlLink),
        _ => return None,
    };
    Some(format)
}

/// CSV quoting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quoting {
    All,
    Minimal,
    NonNumeric,
    None,
}

impl From<Quoting> for csv::QuoteStyle {
    fn from(quoting: Quoting) -> Self {
        match quoting {
            Quoting::All => csv::QuoteStyle::Always,
            Quoting::Minimal => csv::QuoteStyle::Necessary,
            Quoting::NonNumeric => csv::QuoteStyle::NonNumeric,
            Quoting::None => csv::QuoteStyle::Never,
        }
    }
}

/// Options shared by every output format. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub date_format: String,
    pub datetime_format: String,
    pub time_format: String,
    pub sheet_name: String,
    pub use_display: bool,
    pub delimiter: char,
    pub quotechar: char,
    pub quoting: Quoting,
    pub escapechar: char,
    pub doublequote: bool,
    /// Overrides keyed by field name or field type name.
    pub formats: BTreeMap<String, CellFormat>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            date_format: "d/m/Y".to_string(),
            datetime_format: "N j, Y, P".to_string(),
            time_format: "P".to_string(),
            sheet_name: "Sheet1".to_string(),
            use_display: false,
            delimiter: ';',
            quotechar: '"',
            quoting: Quoting::All,
            escapechar: '\\',
            doublequote: true,
            formats: BTreeMap::new(),
        }
    }
}

fn check_char(kind: &str, value: char, allowed: &str) -> Result<()> {
    if allowed.contains(value) {
        Ok(())
    } else {
        Err(AdminError::Configuration(format!(
            "Invalid {} {:?}, expected one of {:?}",
            kind, value, allowed
        )))
    }
}

impl ExportOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        let options: ExportOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        check_char("delimiter", self.delimiter, ALLOWED_DELIMITERS)?;
        check_char("quotechar", self.quotechar, ALLOWED_QUOTECHARS)?;
        check_char("escapechar", self.escapechar, ALLOWED_ESCAPECHARS)?;
        if self.sheet_name.is_empty() {
            return Err(AdminError::Configuration("Empty sheet name".to_string()));
        }
        Ok(())
    }

    pub fn with_format(mut self, key: &str, format: CellFormat) -> Self {
        self.formats.insert(key.to_string(), format);
        self
    }

    /// Format of a column: override by field name, override by type name,
    /// built-in default by type, then `general`.
    pub fn format_for(&self, field: &FieldDef) -> CellFormat {
        self.formats
            .get(&field.name)
            .or_else(|| self.formats.get(field.field_type.type_name()))
            .cloned()
            .or_else(|| default_format(&field.field_type))
            .unwrap_or_else(|| CellFormat::pattern(GENERAL))
    }
}
