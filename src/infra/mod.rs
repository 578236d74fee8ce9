// Adapters behind the application ports, plus terminal rendering

pub mod cleaning_output_adapter;
pub mod csv_source_adapter;
pub mod table_printer;

pub use cleaning_output_adapter::CsvCleaningOutputAdapter;
pub use csv_source_adapter::{CleanedCsvSourceAdapter, CsvRecordSourceAdapter};
