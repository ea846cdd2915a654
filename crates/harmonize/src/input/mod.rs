//! Source adapters: reading delimited extracts into raw records.

mod fetch;
mod layout;
mod parser;
mod source;

pub use fetch::ensure_file;
pub use layout::{
    Layout, ReadStats, RegionColumn, SourceProfile, SourceReader, SourceVariant, YearCodes,
    YearColumn,
};
pub use parser::{Parser, ParserConfig};
pub use source::{DataTable, RawRecord, SourceMetadata};
