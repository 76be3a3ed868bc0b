//! Column mapping: canonical taxonomy, fuzzy similarity and cell parsing.

mod mapper;
mod numbers;
mod similarity;
mod taxonomy;

pub use mapper::{ColumnMapper, ColumnMapping};
pub use numbers::{clean_number, clean_year};
pub use similarity::{normalize, partial_ratio, ratio};
pub use taxonomy::{CanonicalField, ColumnMap, ColumnMatch, FIELD_COUNT};
