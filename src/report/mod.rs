//! Report generation module.
//!
//! Renders research results as Markdown, JSON or CSV.

pub mod generator;

pub use generator::{render_report, write_report};
