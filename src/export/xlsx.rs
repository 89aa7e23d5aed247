use rust_xlsxwriter::{ColNum, Format, FormatAlign, Formula, RowNum, Workbook, Worksheet, XlsxError};
use tracing::warn;

use crate::error::{AdminError, Result};
use crate::export::cell::{Cell, Table};
use crate::export::options::ExportOptions;

/// 5000 units of 1/256 character.
const COLUMN_WIDTH: f64 = 5000.0 / 256.0;
const HEADER_HEIGHT: f64 = 25.0;

fn column(index: usize) -> Result<ColNum> {
    ColNum::try_from(index)
        .map_err(|_| AdminError::Configuration(format!("Too many columns: {}", index)))
}

fn write_cell(
    sheet: &mut Worksheet,
    row: RowNum,
    col: ColNum,
    cell: &Cell,
    format: &Format,
) -> std::result::Result<(), XlsxError> {
    match cell {
        Cell::Empty => {}
        Cell::Text(text) => {
            sheet.write_string_with_format(row, col, text, format)?;
        }
        Cell::Number { value, .. } => {
            sheet.write_number_with_format(row, col, *value, format)?;
        }
        Cell::Bool(b) => {
            sheet.write_boolean_with_format(row, col, *b, format)?;
        }
        Cell::Formula { formula, .. } => {
            sheet.write_formula_with_format(row, col, Formula::new(formula), format)?;
        }
    }
    Ok(())
}

/// Serialize `table` as a single-sheet Open XML workbook.
///
/// The first column holds the 1-based row number. A cell the worksheet
/// rejects (too long, bad formula) gets the error text instead.
pub fn write_xlsx(table: &Table, options: &ExportOptions) -> Result<Vec<u8>> {
    let header_format = Format::new()
        .set_bold()
        .set_text_wrap()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let formats: Vec<Format> = table
        .formats
        .iter()
        .map(|f| match f.num_format() {
            Some(pattern) => Format::new().set_num_format(pattern),
            None => Format::new(),
        })
        .collect();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(&options.sheet_name)?;

    let mut row: RowNum = 0;
    if let Some(header) = &table.header {
        sheet.set_row_height(row, HEADER_HEIGHT)?;
        sheet.write_string_with_format(row, 0, "#", &header_format)?;
        for (i, label) in header.iter().enumerate() {
            let col = column(i + 1)?;
            sheet.write_string_with_format(row, col, label, &header_format)?;
            sheet.set_column_width(col, COLUMN_WIDTH)?;
        }
        row += 1;
    }

    for (index, cells) in table.rows.iter().enumerate() {
        sheet.write_number(row, 0, (index + 1) as f64)?;
        for (i, (cell, format)) in cells.iter().zip(&formats).enumerate() {
            let col = column(i + 1)?;
            if let Err(e) = write_cell(sheet, row, col, cell, format) {
                warn!(row, col, error = %e, "cell rejected by worksheet");
                sheet.write_string(row, col, e.to_string())?;
            }
        }
        row += 1;
    }

    Ok(workbook.save_to_buffer()?)
}
