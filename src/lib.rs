pub mod aggregate;
pub mod archive;
pub mod builder;
pub mod calendar;
pub mod config;
pub mod consolidate;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod markdown;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod stats;

pub use error::{GtfsError, Result};
pub use model::TransitModel;
pub use pipeline::PipelineContext;
