//! Raw report aggregation, deterministic normalization, and rendering.

pub mod builder;
pub mod normalizer;
pub mod render;

pub use builder::ReportBuilder;
pub use normalizer::normalize;
