pub mod aggregator;
pub mod context;
pub mod orchestrator;
pub mod stages;

pub use context::*;
pub use orchestrator::*;
pub use stages::*;
