//! File I/O for the stride pipeline: CSV tables in, CSV and JSON results out.

mod domain;
mod error;
mod reader;
mod writer;

pub use domain::ExperimentName;
pub use error::IoError;
pub use reader::TimeSeriesReader;
pub use writer::ResultWriter;
