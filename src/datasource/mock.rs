//! In-memory feed source for tests and fixtures.

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::{FeedKind, FeedSource, LoadError};

/// Feed source that serves predefined bytes, or a predefined failure.
#[derive(Debug, Clone, Default)]
pub struct StaticFeedSource {
    feeds: BTreeMap<FeedKind, Result<Vec<u8>, LoadError>>,
}

impl StaticFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, feed: FeedKind, bytes: impl Into<Vec<u8>>) -> Self {
        self.feeds.insert(feed, Ok(bytes.into()));
        self
    }

    /// Make fetching `feed` fail with `error`.
    pub fn with_failure(mut self, feed: FeedKind, error: LoadError) -> Self {
        self.feeds.insert(feed, Err(error));
        self
    }
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    async fn fetch(&self, feed: FeedKind) -> Result<Option<Vec<u8>>, LoadError> {
        match self.feeds.get(&feed) {
            Some(Ok(bytes)) => Ok(Some(bytes.clone())),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_configured_feeds() {
        let source = StaticFeedSource::new().with_feed(FeedKind::Daily, "date,price\n");
        assert_eq!(
            source.fetch(FeedKind::Daily).await.unwrap(),
            Some(b"date,price\n".to_vec())
        );
        assert_eq!(source.fetch(FeedKind::Weights).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_serves_configured_failure() {
        let error = LoadError::Csv {
            feed: FeedKind::Tick,
            message: "boom".to_string(),
        };
        let source = StaticFeedSource::new().with_failure(FeedKind::Tick, error.clone());
        assert_eq!(source.fetch(FeedKind::Tick).await.unwrap_err(), error);
    }
}
