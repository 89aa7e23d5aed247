pub mod cell;
pub mod dateformat;
pub mod delimited;
pub mod exporter;
pub mod options;
pub mod xls;
pub mod xlsx;

pub use cell::{Cell, Table};
pub use exporter::{
    Attachment, ExportOutput, ExportRequest, Header, OutputFormat, build_table, default_filename,
    export,
};
pub use options::{CellFormat, ExportOptions, NamedFormatter, Quoting};
