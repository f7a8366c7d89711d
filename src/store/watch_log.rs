use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::utils::time::{format_day, format_timestamp, parse_day, parse_timestamp};

use super::{
    entities::{BucketEntry, DailyTotal, DayBucket, LatestCounts, Snapshot},
    xml::{Element, Node},
    StoreError, ROOT_ELEMENT,
};

pub const HEADER_COMMENT: &str = "This is file generation by squirrel. Modify it at your own risk.";

const BUCKET_ELEMENT: &str = "watches";
const SNAPSHOT_ELEMENT: &str = "watch";

/// Result of trying to add a count to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A snapshot was added, either to the bucket of the day or to a new bucket.
    Recorded,
    /// The count equals the last one of the day. Nothing was written.
    Unchanged,
    /// The stored log couldn't be read. Nothing was written.
    Corrupt,
}

/// One child of the log root, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Bucket(DayBucket),
    Comment(String),
    /// Element that isn't a readable bucket. It's written back untouched and otherwise ignored.
    Unreadable(Element),
}

/// Append-only history of counts, grouped by day. This is a plain value, reading and writing
/// it is done by [super::watch_storage::WatchStorage].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchLog {
    entries: Vec<LogEntry>,
}

impl Default for WatchLog {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchLog {
    /// A fresh log containing only the header comment.
    pub fn new() -> Self {
        Self {
            entries: vec![LogEntry::Comment(HEADER_COMMENT.into())],
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Readable buckets in creation order.
    pub fn buckets(&self) -> impl DoubleEndedIterator<Item = &DayBucket> {
        self.entries.iter().filter_map(|entry| match entry {
            LogEntry::Bucket(bucket) => Some(bucket),
            _ => None,
        })
    }

    /// Counts of the most recently created bucket, `(0, 0)` for an empty log.
    pub fn latest(&self) -> LatestCounts {
        self.buckets()
            .next_back()
            .map(|bucket| bucket.totals().into())
            .unwrap_or_default()
    }

    /// Linear scan for the bucket of `date`.
    pub fn find_bucket(&self, date: NaiveDate) -> Option<&DayBucket> {
        self.buckets().find(|bucket| bucket.date == date)
    }

    fn find_bucket_mut(&mut self, date: NaiveDate) -> Option<&mut DayBucket> {
        self.entries.iter_mut().find_map(|entry| match entry {
            LogEntry::Bucket(bucket) if bucket.date == date => Some(bucket),
            _ => None,
        })
    }

    pub fn history(&self) -> Vec<DailyTotal> {
        self.buckets().map(DayBucket::totals).collect()
    }

    /// Adds `total` observed at `timestamp` to the bucket of that day, creating the bucket when
    /// it's the first count of the day. A count equal to the last one of the day is dropped.
    pub fn append(&mut self, total: u64, timestamp: NaiveDateTime) -> AppendOutcome {
        let snapshot = Snapshot {
            timestamp,
            value: total,
        };

        if let Some(bucket) = self.find_bucket_mut(timestamp.date()) {
            if bucket.last_value() == Some(total) {
                return AppendOutcome::Unchanged;
            }
            bucket.push(snapshot);
            return AppendOutcome::Recorded;
        }

        let prev_count = self.latest().count;
        let mut bucket = DayBucket::new(timestamp.date(), prev_count);
        bucket.push(snapshot);
        debug!(
            "Starting bucket {} with previous count {prev_count}",
            format_day(bucket.date)
        );
        self.entries.push(LogEntry::Bucket(bucket));
        AppendOutcome::Recorded
    }

    pub fn from_document(root: &Element) -> Result<Self, StoreError> {
        if root.name != ROOT_ELEMENT {
            return Err(StoreError::LogCorrupt(format!(
                "expected root element {ROOT_ELEMENT}, found {}",
                root.name
            )));
        }

        let mut entries = Vec::with_capacity(root.children.len());
        for child in &root.children {
            match child {
                Node::Comment(comment) => entries.push(LogEntry::Comment(comment.clone())),
                Node::Element(element) => match read_bucket(element) {
                    Some(bucket) => entries.push(LogEntry::Bucket(bucket)),
                    None => {
                        debug!("Keeping unreadable element {:?} as is", element.name);
                        entries.push(LogEntry::Unreadable(element.clone()))
                    }
                },
                Node::Text(_) => {}
            }
        }
        Ok(Self { entries })
    }

    pub fn to_document(&self) -> Element {
        let mut root = Element::new(ROOT_ELEMENT);
        for entry in &self.entries {
            root.children.push(match entry {
                LogEntry::Bucket(bucket) => Node::Element(bucket_element(bucket)),
                LogEntry::Comment(comment) => Node::Comment(comment.clone()),
                LogEntry::Unreadable(element) => Node::Element(element.clone()),
            });
        }
        root
    }
}

/// A bucket is readable when its `date` and `prev_count` are. Children that aren't readable
/// snapshots are kept in place.
fn read_bucket(element: &Element) -> Option<DayBucket> {
    if element.name != BUCKET_ELEMENT {
        return None;
    }
    let date = parse_day(element.attribute("date")?).ok()?;
    let prev_count = element.attribute("prev_count")?.trim().parse().ok()?;

    let mut bucket = DayBucket::new(date, prev_count);
    for child in &element.children {
        match child {
            Node::Text(text) if text.trim().is_empty() => {}
            Node::Element(watch) if watch.name == SNAPSHOT_ELEMENT => match read_snapshot(watch) {
                Some(snapshot) => bucket.push(snapshot),
                None => {
                    debug!("Keeping unreadable snapshot of {} as is", format_day(date));
                    bucket.entries.push(BucketEntry::Unreadable {
                        node: child.clone(),
                        value: snapshot_value(watch),
                    });
                }
            },
            _ => bucket.entries.push(BucketEntry::Unreadable {
                node: child.clone(),
                value: None,
            }),
        }
    }
    Some(bucket)
}

fn read_snapshot(watch: &Element) -> Option<Snapshot> {
    Some(Snapshot {
        timestamp: parse_timestamp(watch.attribute("datetime")?).ok()?,
        value: snapshot_value(watch)?,
    })
}

fn snapshot_value(watch: &Element) -> Option<u64> {
    watch.text()?.trim().parse().ok()
}

fn bucket_element(bucket: &DayBucket) -> Element {
    let mut element = Element::new(BUCKET_ELEMENT)
        .with_attribute("prev_count", bucket.prev_count.to_string())
        .with_attribute("date", format_day(bucket.date));
    for entry in &bucket.entries {
        element.children.push(match entry {
            BucketEntry::Snapshot(snapshot) => Node::Element(
                Element::new(SNAPSHOT_ELEMENT)
                    .with_attribute("datetime", format_timestamp(snapshot.timestamp))
                    .with_text(snapshot.value.to_string()),
            ),
            BucketEntry::Unreadable { node, .. } => node.clone(),
        });
    }
    element
}
