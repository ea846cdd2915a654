//! Derived fertility metrics from the harmonized female cohort counts.
//!
//! - CRR (crude reproduction rate): daughters per mother-equivalent times
//!   six, an approximation of the net reproduction rate.
//! - ACE (annual cohort exchange): the yearly difference between the
//!   youngest cohort and the cohort 45 years older.

mod calculator;
mod metrics;
mod writer;

pub use calculator::{RateCalculator, RateStats};
pub use metrics::{MetricPair, MetricRow, MetricTable};
pub use writer::{write_metrics, MetricsWriter};
