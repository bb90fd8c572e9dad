pub mod toml_loader;

pub use toml_loader::{parse_records, RecordSource, ValidationReport, REQUIRED_FIELDS};
