pub mod aggregate;
pub mod clean;
pub mod config;
pub mod features;
pub mod scoring;
pub mod transformer;

pub use aggregate::{BatchAggregator, UserAggregator, UserStats};
pub use config::TransformConfig;
pub use transformer::DataTransformer;
