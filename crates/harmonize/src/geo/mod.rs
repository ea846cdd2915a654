//! Region harmonization: composite regions from leaf regions.
//!
//! Each leaf region contributes its rows, with a sign, to every composite
//! region its [`ContainmentRules`] name. Contributions are accumulated rather
//! than subtracted from a known superset, so nested and remainder regions
//! come out of the same signed sum.

mod aggregator;
mod delineation;
mod rules;

pub use aggregator::{aggregate, GeoAggregator, GeoStats};
pub use delineation::{Delineation, Delineations};
pub use rules::{Contribution, ContainmentRules, NestedRules, RemainderRules, Sign, TableRules};
