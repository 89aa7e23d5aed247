use std::io::Write;

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::display;
use crate::error::{AdminError, Result};
use crate::export::cell::{Cell, Table, format_cell};
use crate::export::delimited::write_csv;
use crate::export::options::{CellFormat, ExportOptions};
use crate::export::xls::write_xls;
use crate::export::xlsx::write_xlsx;
use crate::record::Record;
use crate::schema::{ResolvedField, Schema};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Xls,
    Xlsx,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Xls => "xls",
            OutputFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "text/csv",
            OutputFormat::Xls => "application/vnd.ms-excel",
            OutputFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    /// Whether rows carry a leading `#` column with the row number.
    pub fn has_index_column(&self) -> bool {
        !matches!(self, OutputFormat::Csv)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Header {
    #[default]
    None,
    /// Each column's verbose field name.
    FieldLabels,
    /// One label per exported field, in order.
    Explicit(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub format: OutputFormat,
    /// Field selectors, dotted paths allowed. `None` exports every field.
    pub fields: Option<Vec<String>>,
    pub header: Header,
    pub options: ExportOptions,
    pub filename: Option<String>,
}

impl ExportRequest {
    pub fn new(format: OutputFormat) -> Self {
        ExportRequest {
            format,
            fields: None,
            header: Header::None,
            options: ExportOptions::default(),
            filename: None,
        }
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn header(mut self, header: Header) -> Self {
        self.header = header;
        self
    }

    pub fn options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn filename(mut self, filename: &str) -> Self {
        self.filename = Some(filename.to_string());
        self
    }
}

/// A complete document for the caller to hand out as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Attachment {
    /// `Content-Disposition` value, with non-ASCII filename characters
    /// replaced by `?`.
    pub fn content_disposition(&self) -> String {
        let filename: String = self
            .filename
            .chars()
            .map(|c| if c.is_ascii() { c } else { '?' })
            .collect();
        format!("attachment;filename=\"{}\"", filename)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutput {
    /// The document went to the caller's stream.
    Written { bytes: usize },
    Attachment(Attachment),
}

struct Column {
    path: String,
    resolved: ResolvedField,
    format: CellFormat,
}

/// `"<verbose plural>.<ext>"`, lower-cased with spaces as underscores.
pub fn default_filename(schema: &Schema, format: OutputFormat) -> String {
    format!(
        "{}.{}",
        schema.verbose_name_plural.to_lowercase().replace(' ', "_"),
        format.extension()
    )
}

fn resolve_columns<S: Store + ?Sized>(
    store: &S,
    schema: &Schema,
    request: &ExportRequest,
) -> Result<Vec<Column>> {
    let paths = match &request.fields {
        Some(fields) => fields.clone(),
        None => schema.field_names(),
    };
    paths
        .into_iter()
        .map(|path| {
            let resolved = store.schemas().resolve_field(&schema.name, &path)?;
            let format = request.options.format_for(&resolved.field);
            Ok(Column {
                path,
                resolved,
                format,
            })
        })
        .collect()
}

fn header_labels(header: &Header, columns: &[Column]) -> Result<Option<Vec<String>>> {
    match header {
        Header::None => Ok(None),
        Header::FieldLabels => Ok(Some(
            columns
                .iter()
                .map(|c| c.resolved.field.verbose_name.clone())
                .collect(),
        )),
        Header::Explicit(labels) if labels.len() == columns.len() => Ok(Some(labels.clone())),
        Header::Explicit(labels) => Err(AdminError::Configuration(format!(
            "Header has {} labels for {} fields",
            labels.len(),
            columns.len()
        ))),
    }
}

fn render_cell<S: Store + ?Sized>(
    store: &S,
    record: &Record,
    column: &Column,
    options: &ExportOptions,
    settings: &Settings,
) -> Result<Cell> {
    let rendered = display::resolved_value(store, record, &column.resolved, options.use_display)
        .and_then(|value| format_cell(value, &column.format, options, settings));
    match rendered {
        Ok(cell) => Ok(cell),
        Err(e) if e.is_cell_error() => {
            warn!(
                schema = %record.schema,
                pk = record.pk,
                field = %column.path,
                error = %e,
                "cell could not be formatted, writing error text"
            );
            Ok(Cell::Text(e.to_string()))
        }
        Err(e) => Err(e),
    }
}

/// Build the formatted table for `records` without serializing it.
pub fn build_table<S: Store + ?Sized>(
    store: &S,
    schema: &str,
    records: &[Record],
    request: &ExportRequest,
    settings: &Settings,
) -> Result<Table> {
    let schema = store.schemas().schema(schema)?;
    let columns = resolve_columns(store, schema, request)?;
    let header = header_labels(&request.header, &columns)?;

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        if record.schema != schema.name {
            return Err(AdminError::Configuration(format!(
                "Cannot export {} record in a {} export",
                record.schema, schema.name
            )));
        }
        let row = columns
            .iter()
            .map(|column| render_cell(store, record, column, &request.options, settings))
            .collect::<Result<Vec<Cell>>>()?;
        rows.push(row);
    }

    Ok(Table {
        header,
        formats: columns.into_iter().map(|c| c.format).collect(),
        rows,
    })
}

/// Export `records` of `schema` in the requested format.
///
/// With `out` the document is written to it; otherwise it is returned as an
/// [`Attachment`] named after the request's filename or the schema's
/// verbose plural. Unknown fields and bad options fail the whole export;
/// a value that cannot be rendered puts the error text in its cell.
pub fn export<S: Store + ?Sized>(
    store: &S,
    schema: &str,
    records: &[Record],
    request: &ExportRequest,
    settings: &Settings,
    out: Option<&mut dyn Write>,
) -> Result<ExportOutput> {
    request.options.validate()?;
    let table = build_table(store, schema, records, request, settings)?;
    debug!(
        schema,
        format = request.format.extension(),
        rows = table.rows.len(),
        columns = table.width(),
        "table built"
    );

    let body = match request.format {
        OutputFormat::Csv => write_csv(&table, &request.options)?,
        OutputFormat::Xls => write_xls(&table)?,
        OutputFormat::Xlsx => write_xlsx(&table, &request.options)?,
    };

    info!(
        schema,
        format = request.format.extension(),
        rows = table.rows.len(),
        bytes = body.len(),
        "export complete"
    );

    match out {
        Some(out) => {
            out.write_all(&body)?;
            out.flush()?;
            Ok(ExportOutput::Written { bytes: body.len() })
        }
        None => {
            let filename = match &request.filename {
                Some(filename) => filename.clone(),
                None => default_filename(store.schemas().schema(schema)?, request.format),
            };
            Ok(ExportOutput::Attachment(Attachment {
                filename,
                content_type: request.format.content_type(),
                body,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::fixtures::{contacts_store, person, xlsx_part};
    use crate::schema::SchemaDescriptor;
    use crate::value::Value;
    use chrono::NaiveDate;

    fn seeded(store: &SqliteStore) -> Vec<Record> {
        let days = [(2024, 1, 5), (2024, 2, 10), (2024, 12, 25)];
        ["Ada", "Grace", "Linus"]
            .iter()
            .zip(days)
            .map(|(name, (y, m, d))| {
                let created = NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap();
                store
                    .create(
                        "person",
                        &[
                            ("name", Value::from(*name)),
                            ("created", Value::NaiveDateTime(created)),
                        ],
                    )
                    .unwrap()
            })
            .collect()
    }

    fn csv_text(output: ExportOutput) -> String {
        match output {
            ExportOutput::Attachment(attachment) => String::from_utf8(attachment.body).unwrap(),
            other => panic!("Expected attachment, got {:?}", other),
        }
    }

    #[test]
    fn test_csv_with_field_labels() {
        let store = contacts_store();
        let records = seeded(&store);
        let request = ExportRequest::new(OutputFormat::Csv)
            .fields(["name", "created"])
            .header(Header::FieldLabels);

        let output = export(&store, "person", &records, &request, &Settings::default(), None).unwrap();
        let text = csv_text(output);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "\"Name\";\"Created\"",
                "\"Ada\";\"Jan. 5, 2024, 9 a.m.\"",
                "\"Grace\";\"Feb. 10, 2024, 9 a.m.\"",
                "\"Linus\";\"Dec. 25, 2024, 9 a.m.\"",
            ]
        );
    }

    #[test]
    fn test_datetime_pattern_option() {
        let store = contacts_store();
        let records = seeded(&store);
        let options = ExportOptions {
            datetime_format: "Y-m-d H:i".to_string(),
            ..ExportOptions::default()
        };
        let request = ExportRequest::new(OutputFormat::Csv)
            .fields(["created"])
            .options(options);

        let text = csv_text(export(&store, "person", &records, &request, &Settings::default(), None).unwrap());
        assert_eq!(text.lines().next(), Some("\"2024-01-05 09:00\""));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_explicit_header_length() {
        let store = contacts_store();
        let records = seeded(&store);

        let request = ExportRequest::new(OutputFormat::Csv)
            .fields(["name", "created"])
            .header(Header::Explicit(vec!["Who".to_string(), "When".to_string()]));
        let text = csv_text(export(&store, "person", &records, &request, &Settings::default(), None).unwrap());
        assert_eq!(text.lines().next(), Some("\"Who\";\"When\""));

        let request = request.header(Header::Explicit(vec!["Who".to_string()]));
        let result = export(&store, "person", &records, &request, &Settings::default(), None);
        assert!(matches!(result, Err(AdminError::Configuration(_))));
    }

    #[test]
    fn test_default_fields_and_filename() {
        let store = contacts_store();
        let records = seeded(&store);
        let request = ExportRequest::new(OutputFormat::Csv).header(Header::FieldLabels);

        let output = export(&store, "person", &records, &request, &Settings::default(), None).unwrap();
        let ExportOutput::Attachment(attachment) = output else {
            panic!("Expected attachment");
        };
        assert_eq!(attachment.filename, "people.csv");
        assert_eq!(attachment.content_type, "text/csv");
        assert_eq!(
            attachment.content_disposition(),
            "attachment;filename=\"people.csv\""
        );

        let text = String::from_utf8(attachment.body).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("\"ID\";\"Name\";\"Email\""));
        assert_eq!(
            header.split(';').count(),
            store.registry().schema("person").unwrap().fields.len()
        );
    }

    #[test]
    fn test_content_disposition_is_ascii() {
        let attachment = Attachment {
            filename: "città.csv".to_string(),
            content_type: "text/csv",
            body: Vec::new(),
        };
        assert_eq!(
            attachment.content_disposition(),
            "attachment;filename=\"citt?.csv\""
        );
    }

    #[test]
    fn test_unknown_field_fails_export() {
        let store = contacts_store();
        let records = seeded(&store);
        let request = ExportRequest::new(OutputFormat::Csv).fields(["name", "nickname"]);
        let result = export(&store, "person", &records, &request, &Settings::default(), None);
        assert!(matches!(result, Err(AdminError::FieldNotFound { .. })));
    }

    #[test]
    fn test_cell_error_does_not_abort() {
        let store = contacts_store();
        let italy = store
            .create("country", &[("name", Value::from("Italy"))])
            .unwrap();
        let ada = person(&store, "Ada").with("country", 404i64);
        let grace = person(&store, "Grace").with("country", italy.pk);

        let request = ExportRequest::new(OutputFormat::Csv).fields(["name", "country.name"]);
        let text = csv_text(
            export(&store, "person", &[ada, grace], &request, &Settings::default(), None).unwrap(),
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("\"Ada\";\""));
        assert!(lines[0].contains("no related object"));
        assert_eq!(lines[1], "\"Grace\";\"Italy\"");
    }

    #[test]
    fn test_bad_date_pattern_only_hits_its_cells() {
        let store = contacts_store();
        let birth = NaiveDate::from_ymd_opt(1815, 12, 10).unwrap();
        let ada = person(&store, "Ada").with("birth_date", birth);
        let options = ExportOptions {
            date_format: "d/m/Y H:i".to_string(),
            ..ExportOptions::default()
        };
        let request = ExportRequest::new(OutputFormat::Csv)
            .fields(["birth_date", "name"])
            .options(options);

        let text = csv_text(export(&store, "person", &[ada], &request, &Settings::default(), None).unwrap());
        assert!(text.contains("time-related format specifiers"));
        assert!(text.trim_end().ends_with(";\"Ada\""));
    }

    #[test]
    fn test_use_display() {
        let store = contacts_store();
        let ada = person(&store, "Ada").with("status", "a");
        let options = ExportOptions {
            use_display: true,
            ..ExportOptions::default()
        };
        let request = ExportRequest::new(OutputFormat::Csv)
            .fields(["status"])
            .options(options);
        let text = csv_text(export(&store, "person", &[ada], &request, &Settings::default(), None).unwrap());
        assert_eq!(text, "\"Active\"\n");
    }

    #[test]
    fn test_link_formatter_is_plain_in_csv() {
        let store = contacts_store();
        let ada = person(&store, "Ada").with("email", "ada@example.com");
        let request = ExportRequest::new(OutputFormat::Csv).fields(["email"]);
        let text = csv_text(export(&store, "person", &[ada], &request, &Settings::default(), None).unwrap());
        assert_eq!(text, "\"ada@example.com\"\n");
    }

    #[test]
    fn test_booleans_and_nulls_in_csv() {
        let store = contacts_store();
        let ada = person(&store, "Ada").with("active", true);
        let request = ExportRequest::new(OutputFormat::Csv).fields(["active", "score"]);
        let text = csv_text(export(&store, "person", &[ada], &request, &Settings::default(), None).unwrap());
        assert_eq!(text, "\"True\";\"\"\n");
    }

    #[test]
    fn test_writes_to_stream() {
        let store = contacts_store();
        let records = seeded(&store);
        let request = ExportRequest::new(OutputFormat::Xlsx)
            .fields(["name"])
            .header(Header::FieldLabels);

        let mut file = tempfile::tempfile().unwrap();
        let output = export(
            &store,
            "person",
            &records,
            &request,
            &Settings::default(),
            Some(&mut file),
        )
        .unwrap();
        let ExportOutput::Written { bytes } = output else {
            panic!("Expected written output");
        };
        assert_eq!(file.metadata().unwrap().len() as usize, bytes);
    }

    #[test]
    fn test_spreadsheet_attachments() {
        let store = contacts_store();
        let records = seeded(&store);

        let request = ExportRequest::new(OutputFormat::Xls)
            .fields(["name", "created"])
            .header(Header::FieldLabels);
        let ExportOutput::Attachment(xls) =
            export(&store, "person", &records, &request, &Settings::default(), None).unwrap()
        else {
            panic!("Expected attachment");
        };
        assert_eq!(xls.filename, "people.xls");
        assert_eq!(xls.content_type, "application/vnd.ms-excel");
        assert_eq!(&xls.body[..4], &[0x09, 0x00, 0x04, 0x00]);

        let request = ExportRequest::new(OutputFormat::Xlsx)
            .fields(["name", "created"])
            .filename("team.xlsx");
        let ExportOutput::Attachment(xlsx) =
            export(&store, "person", &records, &request, &Settings::default(), None).unwrap()
        else {
            panic!("Expected attachment");
        };
        assert_eq!(xlsx.filename, "team.xlsx");
        assert!(xlsx.body.starts_with(b"PK"));
    }

    #[test]
    fn test_xlsx_links_and_index_column() {
        let store = contacts_store();
        let records = vec![
            person(&store, "Ada")
                .with("email", "ada@example.com")
                .with("website", "https://ada.dev"),
            person(&store, "Grace").with("email", "grace@example.com"),
            person(&store, "Linus"),
        ];
        let request = ExportRequest::new(OutputFormat::Xlsx)
            .fields(["name", "email", "website"])
            .header(Header::FieldLabels);
        let ExportOutput::Attachment(xlsx) =
            export(&store, "person", &records, &request, &Settings::default(), None).unwrap()
        else {
            panic!("Expected attachment");
        };

        let sheet = xlsx_part(&xlsx.body, "xl/worksheets/sheet1.xml");
        assert_eq!(sheet.matches("<row ").count(), records.len() + 1);
        for (row, index) in [(2, 1), (3, 2), (4, 3)] {
            let cell = format!(r#"<c r="A{}"><v>{}</v></c>"#, row, index);
            assert!(sheet.contains(&cell), "missing {} in {}", cell, sheet);
        }
        assert_eq!(sheet.matches("<f>HYPERLINK(").count(), 3);
        assert!(sheet.contains("mailto:grace@example.com"));
        assert!(sheet.contains("https://ada.dev"));

        let strings = xlsx_part(&xlsx.body, "xl/sharedStrings.xml");
        for label in ["#", "Name", "Email", "Website"] {
            assert!(strings.contains(&format!("<t>{}</t>", label)), "missing {}", label);
        }
    }

    #[test]
    fn test_table_shape() {
        let store = contacts_store();
        let records = seeded(&store);
        let request = ExportRequest::new(OutputFormat::Xls)
            .fields(["name", "created", "email"])
            .header(Header::FieldLabels);

        let table = build_table(&store, "person", &records, &request, &Settings::default()).unwrap();
        assert_eq!(table.header.as_ref().map(Vec::len), Some(3));
        assert_eq!(table.rows.len(), records.len());
        assert!(table.rows.iter().all(|row| row.len() == 3));
        assert_eq!(table.rows[0][2], Cell::Empty);
    }

    #[test]
    fn test_mixed_schema_records() {
        let store = contacts_store();
        let tag = store.create("tag", &[("label", Value::from("vip"))]).unwrap();
        let request = ExportRequest::new(OutputFormat::Csv).fields(["name"]);
        let result = export(&store, "person", &[tag], &request, &Settings::default(), None);
        assert!(matches!(result, Err(AdminError::Configuration(_))));
    }

    #[test]
    fn test_invalid_options_fail_early() {
        let store = contacts_store();
        let options = ExportOptions {
            delimiter: '#',
            ..ExportOptions::default()
        };
        let request = ExportRequest::new(OutputFormat::Csv).options(options);
        let result = export(&store, "person", &[], &request, &Settings::default(), None);
        assert!(matches!(result, Err(AdminError::Configuration(_))));
    }
}
