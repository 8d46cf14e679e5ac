pub mod pipeline;

pub use pipeline::{
    DataSummary, FeedDiagnostic, MarketData, Mode, Pipeline, PipelineError, PipelineOptions,
};
