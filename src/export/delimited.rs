use csv::WriterBuilder;

use crate::error::{AdminError, Result};
use crate::export::cell::{Cell, Table};
use crate::export::options::ExportOptions;

fn ascii(kind: &str, c: char) -> Result<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| AdminError::Configuration(format!("{} must be ASCII: {:?}", kind, c)))
}

/// Serialize `table` as delimited text in the dialect of `options`. Formulas
/// are written as their plain text.
pub fn write_csv(table: &Table, options: &ExportOptions) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .delimiter(ascii("delimiter", options.delimiter)?)
        .quote(ascii("quotechar", options.quotechar)?)
        .escape(ascii("escapechar", options.escapechar)?)
        .double_quote(options.doublequote)
        .quote_style(options.quoting.into())
        .from_writer(Vec::new());

    if let Some(header) = &table.header {
        writer.write_record(header)?;
    }
    for row in &table.rows {
        writer.write_record(row.iter().map(Cell::text))?;
    }

    writer.into_inner().map_err(|e| AdminError::Io(e.into_error()))
}
