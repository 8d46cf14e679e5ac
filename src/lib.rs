pub mod api;
pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod session;

pub use config::Config;
pub use datasource::{
    DemoFeedSource, FeedKind, FeedSource, FileFeedSource, LoadError, LoadOptions,
    StaticFeedSource,
};
pub use domain::{
    Amount, Basket, CurrencyCode, Feed, Granularity, PriceSeries, RateSeries, SeriesPoint, Side,
    TimePoint, WeightTable,
};
pub use error::AppError;
pub use orchestration::{MarketData, Pipeline, PipelineOptions};
pub use session::SessionStore;
