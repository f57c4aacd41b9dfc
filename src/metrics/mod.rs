// Metric engine: context baselines, season aggregation, rolling windows.

pub mod baseline;
pub mod metric;
pub mod rolling;
pub mod scale;
pub mod season;
