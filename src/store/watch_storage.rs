use std::{future::Future, io::ErrorKind, ops::Deref, path::PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::fs::operations::{read_shared, write_new, LockedFile};

use super::{
    entities::{DailyTotal, DayBucket, LatestCounts},
    watch_log::{AppendOutcome, WatchLog},
    xml, ProjectLayout, StoreError,
};

/// Interface for abstracting storage of the watch log.
pub trait WatchStorage {
    /// Counts of the most recent day, `(0, 0)` when nothing was recorded yet.
    fn latest(&self) -> impl Future<Output = Result<LatestCounts, StoreError>>;

    fn find_bucket(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<DayBucket>, StoreError>>;

    fn history(&self) -> impl Future<Output = Result<Vec<DailyTotal>, StoreError>>;

    /// Stores `total` unless it equals the last count of the day. A log that can't be read
    /// results in [AppendOutcome::Corrupt] and is left as is.
    fn append(
        &self,
        total: u64,
        timestamp: NaiveDateTime,
    ) -> impl Future<Output = Result<AppendOutcome, StoreError>>;
}

impl<T: Deref> WatchStorage for T
where
    T::Target: WatchStorage,
{
    fn latest(&self) -> impl Future<Output = Result<LatestCounts, StoreError>> {
        self.deref().latest()
    }

    fn find_bucket(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<DayBucket>, StoreError>> {
        self.deref().find_bucket(date)
    }

    fn history(&self) -> impl Future<Output = Result<Vec<DailyTotal>, StoreError>> {
        self.deref().history()
    }

    fn append(
        &self,
        total: u64,
        timestamp: NaiveDateTime,
    ) -> impl Future<Output = Result<AppendOutcome, StoreError>> {
        self.deref().append(total, timestamp)
    }
}

/// The main realization of [WatchStorage], backed by `watch.xml`.
pub struct XmlWatchStorage {
    path: PathBuf,
}

impl XmlWatchStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn for_layout(layout: &ProjectLayout) -> Self {
        Self::new(layout.watch_file())
    }

    /// Writes a fresh log. Fails if the file already exists.
    pub async fn create(&self) -> Result<(), StoreError> {
        let bytes = xml::to_bytes(&WatchLog::new().to_document())?;
        write_new(&self.path, &bytes).await?;
        debug!("Created watch log {:?}", self.path);
        Ok(())
    }

    pub async fn load(&self) -> Result<WatchLog, StoreError> {
        let contents = read_shared(&self.path).await?;
        decode(&contents)
    }

    async fn append_locked(
        &self,
        file: &mut LockedFile,
        total: u64,
        timestamp: NaiveDateTime,
    ) -> Result<AppendOutcome, StoreError> {
        let contents = file.read_all().await?;
        let mut log = match decode(&contents) {
            Ok(log) => log,
            Err(e) => {
                warn!("Refusing to append to {:?}: {e}", self.path);
                return Ok(AppendOutcome::Corrupt);
            }
        };

        let outcome = log.append(total, timestamp);
        if outcome == AppendOutcome::Recorded {
            let bytes = xml::to_bytes(&log.to_document())?;
            file.replace(&bytes).await?;
            info!("Recorded count {total} at {timestamp}");
        } else {
            debug!("Count {total} didn't change, skipping");
        }
        Ok(outcome)
    }
}

impl WatchStorage for XmlWatchStorage {
    async fn latest(&self) -> Result<LatestCounts, StoreError> {
        Ok(self.load().await?.latest())
    }

    async fn find_bucket(&self, date: NaiveDate) -> Result<Option<DayBucket>, StoreError> {
        Ok(self.load().await?.find_bucket(date).cloned())
    }

    async fn history(&self) -> Result<Vec<DailyTotal>, StoreError> {
        Ok(self.load().await?.history())
    }

    async fn append(
        &self,
        total: u64,
        timestamp: NaiveDateTime,
    ) -> Result<AppendOutcome, StoreError> {
        let mut file = match LockedFile::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Watch log {:?} is missing", self.path);
                return Ok(AppendOutcome::Corrupt);
            }
            Err(e) => return Err(e.into()),
        };
        // Lock is released even when the cycle failed
        let result = self.append_locked(&mut file, total, timestamp).await;
        file.release().await?;
        result
    }
}

/// Anything that prevents locating the log root is reported as corruption.
fn decode(contents: &str) -> Result<WatchLog, StoreError> {
    let root = xml::parse(contents).map_err(|e| StoreError::LogCorrupt(e.to_string()))?;
    WatchLog::from_document(&root)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use tempfile::tempdir;

    use crate::{
        store::{watch_log::HEADER_COMMENT, StoreError},
        utils::logging::TEST_LOGGING,
    };

    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2025, 12, day).unwrap(),
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
        )
    }

    async fn fresh_storage(dir: &std::path::Path) -> Result<XmlWatchStorage> {
        let storage = XmlWatchStorage::new(dir.join("watch.xml"));
        storage.create().await?;
        Ok(storage)
    }

    #[tokio::test]
    async fn fresh_log_reports_zero() -> Result<()> {
        let dir = tempdir()?;
        let storage = fresh_storage(dir.path()).await?;
        assert_eq!(storage.latest().await?, LatestCounts::default());
        assert!(storage.history().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn counts_across_two_days() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let storage = fresh_storage(dir.path()).await?;

        assert_eq!(storage.append(100, at(1, 9, 0)).await?, AppendOutcome::Recorded);
        assert_eq!(storage.append(100, at(1, 9, 30)).await?, AppendOutcome::Unchanged);
        assert_eq!(storage.append(250, at(1, 17, 0)).await?, AppendOutcome::Recorded);
        assert_eq!(storage.append(400, at(2, 10, 0)).await?, AppendOutcome::Recorded);

        let first = storage.find_bucket(at(1, 0, 0).date()).await?.unwrap();
        let values = first.snapshots().map(|s| s.value).collect::<Vec<_>>();
        assert_eq!(values, vec![100, 250]);
        assert_eq!(first.prev_count, 0);

        let second = storage.find_bucket(at(2, 0, 0).date()).await?.unwrap();
        assert_eq!(second.snapshots().count(), 1);
        assert_eq!(second.prev_count, 250);

        assert_eq!(storage.history().await?.len(), 2);
        assert_eq!(
            storage.latest().await?,
            LatestCounts {
                prev_count: 250,
                count: 400
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn unchanged_count_leaves_file_untouched() -> Result<()> {
        let dir = tempdir()?;
        let storage = fresh_storage(dir.path()).await?;
        storage.append(100, at(1, 9, 0)).await?;
        let before = tokio::fs::read_to_string(dir.path().join("watch.xml")).await?;

        storage.append(100, at(1, 10, 0)).await?;

        let after = tokio::fs::read_to_string(dir.path().join("watch.xml")).await?;
        assert_eq!(before, after);
        Ok(())
    }

    #[tokio::test]
    async fn header_comment_survives_appends() -> Result<()> {
        let dir = tempdir()?;
        let storage = fresh_storage(dir.path()).await?;
        storage.append(100, at(1, 9, 0)).await?;
        storage.append(200, at(2, 9, 0)).await?;

        let contents = tokio::fs::read_to_string(dir.path().join("watch.xml")).await?;
        assert!(contents.starts_with("<?xml"));
        assert!(contents.contains(&format!("<!--{HEADER_COMMENT}-->")));
        assert!(contents.contains(r#"<watches prev_count="100" date="02/12/2025">"#));
        Ok(())
    }

    const LEGACY_LOG: &str = "<?xml version='1.0' encoding='utf-8'?>
<squirrel>
  <!--This is file generation by squirrel. Modify it at your own risk.-->
  <watches prev_count=\"0\" date=\"01/12/2025\">
    <watch datetime=\"2025-12-01 09:00:00.250031\">100</watch>
    <watch datetime=\"2025-12-01 11:30:12.000418\">180</watch>
  </watches>
</squirrel>
";

    #[tokio::test]
    async fn appends_to_a_legacy_log() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("watch.xml");
        tokio::fs::write(&path, LEGACY_LOG).await?;
        let storage = XmlWatchStorage::new(path.clone());

        assert_eq!(storage.append(180, at(1, 12, 0)).await?, AppendOutcome::Unchanged);
        assert_eq!(tokio::fs::read_to_string(&path).await?, LEGACY_LOG);

        assert_eq!(storage.append(200, at(1, 13, 0)).await?, AppendOutcome::Recorded);
        assert_eq!(storage.append(260, at(2, 9, 0)).await?, AppendOutcome::Recorded);

        let first = storage.find_bucket(at(1, 0, 0).date()).await?.unwrap();
        let values = first.snapshots().map(|s| s.value).collect::<Vec<_>>();
        assert_eq!(values, vec![100, 180, 200]);
        assert_eq!(storage.find_bucket(at(2, 0, 0).date()).await?.unwrap().prev_count, 200);

        let contents = tokio::fs::read_to_string(&path).await?;
        assert!(contents.contains(&format!("<!--{HEADER_COMMENT}-->")));
        assert!(contents.contains(r#"<watch datetime="2025-12-01 09:00:00.250031">100</watch>"#));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_snapshots_do_not_split_the_day() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("watch.xml");
        tokio::fs::write(
            &path,
            r#"<?xml version="1.0" encoding="utf-8"?>
<squirrel>
  <watches prev_count="0" date="01/12/2025">
    <watch datetime="2025-12-01T09:00:00">100</watch>
    <!--edited by hand-->
    <watch datetime="2025-12-01 10:00:00"></watch>
    <watch>120</watch>
  </watches>
</squirrel>
"#,
        )
        .await?;
        let storage = XmlWatchStorage::new(path.clone());

        assert_eq!(storage.latest().await?.count, 120);
        assert_eq!(storage.append(120, at(1, 11, 0)).await?, AppendOutcome::Unchanged);
        assert_eq!(storage.append(150, at(1, 12, 0)).await?, AppendOutcome::Recorded);

        let history = storage.history().await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].count, 150);

        let contents = tokio::fs::read_to_string(&path).await?;
        assert_eq!(contents.matches("<watches ").count(), 1);
        assert!(contents.contains(r#"<watch datetime="2025-12-01T09:00:00">100</watch>"#));
        assert!(contents.contains("<!--edited by hand-->"));
        assert!(contents.contains("<watch>120</watch>"));
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_log_is_not_written() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("watch.xml");
        tokio::fs::write(&path, "<squirrel><watches>").await?;
        let storage = XmlWatchStorage::new(path.clone());

        assert_eq!(storage.append(100, at(1, 9, 0)).await?, AppendOutcome::Corrupt);
        assert_eq!(tokio::fs::read_to_string(&path).await?, "<squirrel><watches>");
        assert!(matches!(
            storage.latest().await,
            Err(StoreError::LogCorrupt(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn missing_log_is_corrupt() -> Result<()> {
        let dir = tempdir()?;
        let storage = XmlWatchStorage::new(dir.path().join("watch.xml"));
        assert_eq!(storage.append(100, at(1, 9, 0)).await?, AppendOutcome::Corrupt);
        assert!(!dir.path().join("watch.xml").exists());
        Ok(())
    }
}
