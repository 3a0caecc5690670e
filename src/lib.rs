//! Client-side analytics for the case dashboards: monthly series with an
//! urgency split, year-over-year variance, cascading filter options and
//! top-N rankings with percentage shares.
pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod loader;
pub mod output;
pub mod ranking;
pub mod types;
pub mod util;

pub use dashboard::{Dashboard, DashboardView};
pub use error::{Error, Result};
pub use types::{
    Bucket, ClientSale, Comparison, Dataset, Facet, FilterSet, LabelValue, Metric, MonthTile,
    Period, PeriodBucket, PeriodOrder, PeriodRange, RankedEntry, Record, Variance,
};
