//! One "watch" of a project: count the tracked files with the counter picked by the project type
//! and store the count in the watch log.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDateTime;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::{
    counting::CounterRegistry,
    store::{
        entities::LatestCounts,
        project::{ProjectFields, ProjectStore},
        watch_log::AppendOutcome,
        watch_storage::WatchStorage,
    },
    utils::{
        clock::Clock,
        percentage::{goal_percentage, Percentage},
        time::{days_until, parse_day},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchReport {
    pub count: u64,
    pub timestamp: NaiveDateTime,
    /// Either [AppendOutcome::Recorded] or [AppendOutcome::Unchanged], a corrupted log is an
    /// error.
    pub outcome: AppendOutcome,
}

#[derive(Debug, Clone)]
pub struct Progress {
    pub fields: ProjectFields,
    pub latest: LatestCounts,
    /// `None` when the stored goal isn't a number.
    pub goal: Option<u64>,
    pub percentage: Option<Percentage>,
    /// `None` when the stored due date can't be read.
    pub days_left: Option<i64>,
}

pub struct Tracker<W: WatchStorage> {
    projects: ProjectStore,
    watches: W,
    registry: CounterRegistry,
    clock: Box<dyn Clock>,
}

impl<W: WatchStorage> Tracker<W> {
    pub fn new(
        projects: ProjectStore,
        watches: W,
        registry: CounterRegistry,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            projects,
            watches,
            registry,
            clock,
        }
    }

    pub fn projects(&self) -> &ProjectStore {
        &self.projects
    }

    pub fn watches(&self) -> &W {
        &self.watches
    }

    pub fn registry(&self) -> &CounterRegistry {
        &self.registry
    }

    pub async fn watch(&self) -> Result<WatchReport> {
        let fields = self.projects.read().await?;

        // Resolving the whole chain makes sure every dependency is registered
        let chain = self.registry.resolve(&fields.project_type)?;
        let counter = chain
            .last()
            .ok_or_else(|| anyhow!("No counter for project type {}", fields.project_type))?;

        let source = PathBuf::from(&fields.path);
        let files = tokio::task::spawn_blocking(move || collect_files(&source)).await??;
        debug!(
            "Counting {} files of {:?} with {}",
            files.len(),
            fields.path,
            counter.name()
        );
        let count = counter.count(&files).await?;

        let timestamp = self.clock.now().naive_local();
        let outcome = self.watches.append(count, timestamp).await?;
        if outcome == AppendOutcome::Corrupt {
            bail!(
                "Watch log of {} is corrupted, count {count} was not recorded",
                fields.name
            );
        }

        info!("Watched {}: {count} ({outcome:?})", fields.name);
        Ok(WatchReport {
            count,
            timestamp,
            outcome,
        })
    }

    pub async fn progress(&self) -> Result<Progress> {
        let fields = self.projects.read().await?;
        let latest = self.watches.latest().await?;

        let goal = fields.goal.trim().parse::<u64>().ok();
        let percentage = goal.and_then(|goal| goal_percentage(latest.count, goal));
        let today = self.clock.now().date_naive();
        let days_left = parse_day(&fields.due_date)
            .ok()
            .map(|due| days_until(today, due));

        Ok(Progress {
            fields,
            latest,
            goal,
            percentage,
            days_left,
        })
    }
}

/// Regular files below `source`, sorted by path. Hidden files and directories are skipped, which
/// also keeps squirrel's own directory out of the count.
pub fn collect_files(source: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
    use tempfile::tempdir;

    use crate::{
        counting::{Counter, MockCounter},
        store::{
            project::ProjectRecord, watch_storage::XmlWatchStorage, ProjectLayout,
            DIRECTORY_NAME,
        },
        utils::logging::TEST_LOGGING,
    };

    use super::*;

    #[derive(Clone)]
    struct TestClock {
        now: Arc<Mutex<NaiveDateTime>>,
    }

    impl TestClock {
        fn at(moment: NaiveDateTime) -> Self {
            Self {
                now: Arc::new(Mutex::new(moment)),
            }
        }

        fn set(&self, moment: NaiveDateTime) {
            *self.now.lock().unwrap() = moment;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Local> {
            let naive = *self.now.lock().unwrap();
            Local.from_local_datetime(&naive).single().unwrap()
        }
    }

    fn noon(day: u32, minute: u32) -> NaiveDateTime {
        NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2025, 12, day).unwrap(),
            NaiveTime::from_hms_opt(12, minute, 0).unwrap(),
        )
    }

    fn counter_returning(values: Vec<u64>) -> Box<dyn Counter> {
        let mut counter = MockCounter::new();
        counter.expect_name().return_const("text");
        counter.expect_description().return_const("mock");
        counter.expect_requires().return_const(&[] as &'static [&'static str]);
        let mut values = values.into_iter();
        counter
            .expect_count()
            .withf(|files| files.len() == 1)
            .returning(move |_| Ok(values.next().unwrap()));
        Box::new(counter)
    }

    async fn tracker(
        base: &Path,
        counter: Box<dyn Counter>,
        clock: TestClock,
    ) -> Result<Tracker<XmlWatchStorage>> {
        let source = base.join("manuscript");
        std::fs::create_dir_all(&source)?;
        std::fs::write(source.join("chapter1.md"), "words")?;

        let layout = ProjectLayout::for_project(base);
        let projects = ProjectStore::create(
            &ProjectRecord {
                name: "Novel".into(),
                path: source,
                description: String::new(),
                due_date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
                goal: 1000,
                project_type: None,
            },
            layout.clone(),
        )
        .await?;

        let mut registry = CounterRegistry::new();
        registry.register(counter);
        Ok(Tracker::new(
            projects,
            XmlWatchStorage::for_layout(&layout),
            registry,
            Box::new(clock),
        ))
    }

    #[tokio::test]
    async fn watching_over_two_days() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = TestClock::at(noon(1, 0));
        let tracker = tracker(
            dir.path(),
            counter_returning(vec![100, 100, 250, 400]),
            clock.clone(),
        )
        .await?;

        assert_eq!(tracker.watch().await?.outcome, AppendOutcome::Recorded);
        clock.set(noon(1, 10));
        assert_eq!(tracker.watch().await?.outcome, AppendOutcome::Unchanged);
        clock.set(noon(1, 20));
        assert_eq!(tracker.watch().await?.outcome, AppendOutcome::Recorded);
        clock.set(noon(2, 0));
        let report = tracker.watch().await?;
        assert_eq!(report.count, 400);
        assert_eq!(report.timestamp, noon(2, 0));

        let history = tracker.watches().history().await?;
        assert_eq!(history.len(), 2);
        let first = tracker
            .watches()
            .find_bucket(noon(1, 0).date())
            .await?
            .unwrap();
        assert_eq!(first.snapshots().count(), 2);

        let progress = tracker.progress().await?;
        assert_eq!(
            progress.latest,
            LatestCounts {
                prev_count: 250,
                count: 400
            }
        );
        assert_eq!(progress.goal, Some(1000));
        assert_eq!(*progress.percentage.unwrap(), 40.);
        assert_eq!(progress.days_left, Some(29));
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_log_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let tracker = tracker(
            dir.path(),
            counter_returning(vec![100]),
            TestClock::at(noon(1, 0)),
        )
        .await?;
        std::fs::write(dir.path().join(DIRECTORY_NAME).join("watch.xml"), "not xml")?;

        assert!(tracker.watch().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_project_type_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let mut counter = MockCounter::new();
        counter.expect_name().return_const("lines");
        counter.expect_requires().return_const(&[] as &'static [&'static str]);
        counter.expect_count().never();
        let tracker = tracker(dir.path(), Box::new(counter), TestClock::at(noon(1, 0))).await?;

        assert!(tracker.watch().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn missing_source_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let tracker = tracker(
            dir.path(),
            counter_returning(vec![100]),
            TestClock::at(noon(1, 0)),
        )
        .await?;
        std::fs::remove_dir_all(dir.path().join("manuscript"))?;

        assert!(tracker.watch().await.is_err());
        assert!(tracker.watches().history().await?.is_empty());
        Ok(())
    }

    #[test]
    fn hidden_entries_are_not_collected() -> Result<()> {
        let dir = tempdir()?;
        std::fs::create_dir_all(dir.path().join(DIRECTORY_NAME))?;
        std::fs::create_dir_all(dir.path().join("part2"))?;
        std::fs::write(dir.path().join(DIRECTORY_NAME).join("watch.xml"), "")?;
        std::fs::write(dir.path().join(".notes"), "")?;
        std::fs::write(dir.path().join("b.md"), "")?;
        std::fs::write(dir.path().join("a.md"), "")?;
        std::fs::write(dir.path().join("part2").join("c.md"), "")?;

        let files = collect_files(dir.path())?;
        let relative = files
            .iter()
            .map(|file| file.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect::<Vec<_>>();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("a.md"),
                PathBuf::from("b.md"),
                PathBuf::from("part2").join("c.md"),
            ]
        );
        Ok(())
    }
}
