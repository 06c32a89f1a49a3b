//! Core types for the Trackman shot pipeline.
//!
//! Holds the shot and cell model, the growing column schema, error types,
//! report formatting helpers and CLI settings shared by the data and binary
//! crates.

pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod schema;
pub mod settings;

pub use error::{RecordIssue, Result, TrackmanError};
