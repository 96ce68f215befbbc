pub mod data_service;
pub mod reconciler;

pub use data_service::{DataService, RunSummary, Target};
pub use reconciler::{upsert_instrument, upsert_series, SeriesOutcome, UpsertOutcome};
