//! Output sinks: Markdown files and a spreadsheet.

pub mod file;
pub mod sheets;

pub use file::FileSink;
pub use sheets::{GoogleSheetsClient, SheetSink};
