//! Data layer of the Trackman shot pipeline.
//!
//! Discovers and flattens provider report files, normalises raw shots
//! against the growing schema, keeps the deduplicated combined dataset,
//! aggregates per-club statistics and renders the analysis report.

pub mod aggregator;
pub mod analysis;
pub mod normalizer;
pub mod reader;
pub mod report;
pub mod store;

pub use trackman_core as core;
