pub mod backend;
pub mod pipeline;
pub mod state;

pub use pipeline::AnalysisPipeline;
