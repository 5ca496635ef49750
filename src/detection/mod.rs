pub mod aggregator;
pub mod extractor;
pub mod policy;

pub use aggregator::WindowAggregator;
pub use extractor::EventExtractor;
pub use policy::{AlertPolicy, PassDecision};
