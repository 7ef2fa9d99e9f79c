//! Run report generation.
//!
//! Renders the outcome of a processing run as Markdown or JSON.

pub mod generator;

pub use generator::{generate_json_report, generate_markdown_report};
