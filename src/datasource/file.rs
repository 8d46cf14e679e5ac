//! Feed source backed by CSV files on local disk.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{FeedKind, FeedSource, LoadError};

#[derive(Debug, Clone, Default)]
pub struct FileFeedSource {
    paths: BTreeMap<FeedKind, PathBuf>,
}

impl FileFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, feed: FeedKind, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(feed, path.into());
        self
    }

    /// Like [`with_path`](Self::with_path), skipping `None`.
    pub fn with_optional_path(self, feed: FeedKind, path: Option<impl Into<PathBuf>>) -> Self {
        match path {
            Some(p) => self.with_path(feed, p),
            None => self,
        }
    }

    pub fn path(&self, feed: FeedKind) -> Option<&PathBuf> {
        self.paths.get(&feed)
    }
}

#[async_trait]
impl FeedSource for FileFeedSource {
    async fn fetch(&self, feed: FeedKind) -> Result<Option<Vec<u8>>, LoadError> {
        let Some(path) = self.paths.get(&feed) else {
            return Ok(None);
        };
        tokio::fs::read(path)
            .await
            .map(Some)
            .map_err(|e| LoadError::Io {
                feed,
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_configured_feed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,price\n2024-01-01,1.0").unwrap();

        let source = FileFeedSource::new().with_path(FeedKind::Daily, file.path());
        let bytes = source.fetch(FeedKind::Daily).await.unwrap().unwrap();
        assert!(bytes.starts_with(b"date,price"));
        assert_eq!(source.fetch(FeedKind::Tick).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let source =
            FileFeedSource::new().with_optional_path(FeedKind::Minute, Some("/nonexistent/minute.csv"));
        let err = source.fetch(FeedKind::Minute).await.unwrap_err();
        assert!(matches!(err, LoadError::Io { feed: FeedKind::Minute, .. }));
    }
}
