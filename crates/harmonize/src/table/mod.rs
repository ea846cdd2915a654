//! The observation table all pipeline stages operate on.

mod observation;

pub use observation::{ObservationTable, Row, RowKey, SanitizeReport};
