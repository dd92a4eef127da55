//! Research modules.
//!
//! Target selection, keyword aggregation and the per-seed pipeline that
//! ties them to the API clients.

pub mod aggregator;
pub mod pipeline;
pub mod selector;

pub use pipeline::{ResearchConfig, Researcher};
pub use selector::{Selection, MAX_TARGET_WEBSITES};
