//! Legacy `.xls` output as a BIFF2 worksheet stream.
//!
//! One worksheet with cell records carrying inline attributes. Formula
//! cells are written as their text.

use std::collections::BTreeMap;

use crate::error::{AdminError, Result};
use crate::export::cell::{Cell, Table};

const DIMENSIONS: u16 = 0x0000;
const NUMBER: u16 = 0x0003;
const LABEL: u16 = 0x0004;
const BOOLERR: u16 = 0x0005;
const BOF: u16 = 0x0009;
const EOF: u16 = 0x000A;
const FORMAT: u16 = 0x001E;
const COLWIDTH: u16 = 0x0024;
const FONT: u16 = 0x0031;
const CODEPAGE: u16 = 0x0042;

pub const MAX_ROWS: usize = 16_384;
pub const MAX_COLUMNS: usize = 256;
const MAX_STRING: usize = 255;
/// Six bits of the cell attributes address the format table.
const MAX_FORMATS: usize = 64;
const COLUMN_WIDTH: u16 = 5000;
const FONT_HEIGHT: u16 = 200;
const WINDOWS_1252: u16 = 1252;

const REGULAR_FONT: u8 = 0;
const BOLD_FONT: u8 = 1;
const ALIGN_CENTRE: u8 = 0x02;

struct BiffWriter {
    buf: Vec<u8>,
}

/// Code points of the 0x80..=0x9F range of Windows-1252. Zero marks the
/// five unassigned bytes.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\0', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\0', '\u{017D}', '\0',
    '\0', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\0', '\u{017E}', '\u{0178}',
];

fn cp1252_byte(c: char) -> u8 {
    match u32::from(c) {
        0x00..=0x7F | 0xA0..=0xFF => c as u8,
        _ => CP1252_HIGH
            .iter()
            .position(|high| *high == c)
            .map_or(b'?', |i| 0x80 + i as u8),
    }
}

/// Windows-1252 bytes of `text`, `?` for anything outside it, at most 255
/// bytes.
fn cp1252(text: &str) -> Vec<u8> {
    text.chars().take(MAX_STRING).map(cp1252_byte).collect()
}

fn attributes(format_index: u8, font: u8, align: u8) -> [u8; 3] {
    [0x00, (format_index & 0x3F) | (font << 6), align]
}

impl BiffWriter {
    fn new() -> Self {
        BiffWriter { buf: Vec::new() }
    }

    fn record(&mut self, id: u16, data: &[u8]) {
        self.buf.extend_from_slice(&id.to_le_bytes());
        self.buf.extend_from_slice(&(data.len() as u16).to_le_bytes());
        self.buf.extend_from_slice(data);
    }

    fn short_string(data: &mut Vec<u8>, text: &str) {
        let bytes = cp1252(text);
        data.push(bytes.len() as u8);
        data.extend_from_slice(&bytes);
    }

    fn font(&mut self, bold: bool) {
        let mut data = Vec::new();
        data.extend_from_slice(&FONT_HEIGHT.to_le_bytes());
        data.extend_from_slice(&u16::from(bold).to_le_bytes());
        Self::short_string(&mut data, "Arial");
        self.record(FONT, &data);
    }

    fn format(&mut self, pattern: &str) {
        let mut data = Vec::new();
        Self::short_string(&mut data, pattern);
        self.record(FORMAT, &data);
    }

    fn cell_prefix(row: u16, col: u16, attrs: [u8; 3]) -> Vec<u8> {
        let mut data = Vec::with_capacity(16);
        data.extend_from_slice(&row.to_le_bytes());
        data.extend_from_slice(&col.to_le_bytes());
        data.extend_from_slice(&attrs);
        data
    }

    fn label(&mut self, row: u16, col: u16, attrs: [u8; 3], text: &str) {
        let mut data = Self::cell_prefix(row, col, attrs);
        Self::short_string(&mut data, text);
        self.record(LABEL, &data);
    }

    fn number(&mut self, row: u16, col: u16, attrs: [u8; 3], value: f64) {
        let mut data = Self::cell_prefix(row, col, attrs);
        data.extend_from_slice(&value.to_le_bytes());
        self.record(NUMBER, &data);
    }

    fn boolean(&mut self, row: u16, col: u16, attrs: [u8; 3], value: bool) {
        let mut data = Self::cell_prefix(row, col, attrs);
        data.push(u8::from(value));
        data.push(0x00);
        self.record(BOOLERR, &data);
    }

    fn cell(&mut self, row: u16, col: u16, attrs: [u8; 3], cell: &Cell) {
        match cell {
            Cell::Empty => {}
            Cell::Text(text) => self.label(row, col, attrs, text),
            Cell::Number { value, .. } => self.number(row, col, attrs, *value),
            Cell::Bool(b) => self.boolean(row, col, attrs, *b),
            Cell::Formula { text, .. } => self.label(row, col, attrs, text),
        }
    }
}

/// Format table index of each column. Index 0 is `General`; patterns past
/// the table capacity fall back to it.
fn format_indexes(table: &Table) -> (Vec<String>, Vec<u8>) {
    let mut patterns: Vec<String> = vec!["General".to_string()];
    let mut known: BTreeMap<String, u8> = BTreeMap::new();
    let mut indexes = Vec::with_capacity(table.width());

    for format in &table.formats {
        let index = match format.num_format() {
            Some(pattern) => match known.get(pattern) {
                Some(index) => *index,
                None if patterns.len() < MAX_FORMATS => {
                    let index = patterns.len() as u8;
                    patterns.push(pattern.to_string());
                    known.insert(pattern.to_string(), index);
                    index
                }
                None => 0,
            },
            None => 0,
        };
        indexes.push(index);
    }
    (patterns, indexes)
}

/// Serialize `table` as a BIFF2 worksheet. The first column holds the
/// 1-based row number.
pub fn write_xls(table: &Table) -> Result<Vec<u8>> {
    let header_rows = usize::from(table.header.is_some());
    let total_rows = table.rows.len() + header_rows;
    if total_rows > MAX_ROWS {
        return Err(AdminError::Configuration(format!(
            "Legacy spreadsheets hold at most {} rows, got {}",
            MAX_ROWS, total_rows
        )));
    }
    let columns = table.width() + 1;
    if columns > MAX_COLUMNS {
        return Err(AdminError::Configuration(format!(
            "Legacy spreadsheets hold at most {} columns, got {}",
            MAX_COLUMNS, columns
        )));
    }

    let (patterns, indexes) = format_indexes(table);
    let mut w = BiffWriter::new();

    w.record(BOF, &[0x02, 0x00, 0x10, 0x00]);
    w.record(CODEPAGE, &WINDOWS_1252.to_le_bytes());
    w.font(false);
    w.font(true);
    for pattern in &patterns {
        w.format(pattern);
    }
    if columns > 1 {
        let mut data = vec![1u8, (columns - 1) as u8];
        data.extend_from_slice(&COLUMN_WIDTH.to_le_bytes());
        w.record(COLWIDTH, &data);
    }

    let mut dims = Vec::with_capacity(8);
    dims.extend_from_slice(&0u16.to_le_bytes());
    dims.extend_from_slice(&(total_rows as u16).to_le_bytes());
    dims.extend_from_slice(&0u16.to_le_bytes());
    dims.extend_from_slice(&(columns as u16).to_le_bytes());
    w.record(DIMENSIONS, &dims);

    let plain = attributes(0, REGULAR_FONT, 0);
    let mut row: u16 = 0;
    if let Some(header) = &table.header {
        let heading = attributes(0, BOLD_FONT, ALIGN_CENTRE);
        w.label(row, 0, heading, "#");
        for (i, label) in header.iter().enumerate() {
            w.label(row, (i + 1) as u16, heading, label);
        }
        row += 1;
    }

    for (index, cells) in table.rows.iter().enumerate() {
        w.number(row, 0, plain, (index + 1) as f64);
        for (i, (cell, format_index)) in cells.iter().zip(&indexes).enumerate() {
            w.cell(row, (i + 1) as u16, attributes(*format_index, REGULAR_FONT, 0), cell);
        }
        row += 1;
    }

    w.record(EOF, &[]);
    Ok(w.buf)
}
