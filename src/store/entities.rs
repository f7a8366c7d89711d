use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::xml::Node;

/// A single count observation.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct Snapshot {
    pub timestamp: NaiveDateTime,
    pub value: u64,
}

/// One child of a bucket, in file order.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum BucketEntry {
    Snapshot(Snapshot),
    /// Child that isn't a readable snapshot. It's written back untouched. `value` is its count
    /// when the text still reads as one.
    Unreadable { node: Node, value: Option<u64> },
}

impl BucketEntry {
    pub fn value(&self) -> Option<u64> {
        match self {
            BucketEntry::Snapshot(snapshot) => Some(snapshot.value),
            BucketEntry::Unreadable { value, .. } => *value,
        }
    }
}

/// All snapshots taken during one calendar day. `prev_count` is the count the previous bucket
/// ended with when this one was created, which makes it the baseline for the day.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub prev_count: u64,
    pub entries: Vec<BucketEntry>,
}

impl DayBucket {
    pub fn new(date: NaiveDate, prev_count: u64) -> Self {
        Self {
            date,
            prev_count,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.entries.push(BucketEntry::Snapshot(snapshot));
    }

    pub fn snapshots(&self) -> impl DoubleEndedIterator<Item = &Snapshot> {
        self.entries.iter().filter_map(|entry| match entry {
            BucketEntry::Snapshot(snapshot) => Some(snapshot),
            _ => None,
        })
    }

    /// Last value that can be read, unreadable snapshots included.
    pub fn last_value(&self) -> Option<u64> {
        self.entries.iter().rev().find_map(BucketEntry::value)
    }

    /// A bucket without a readable value counts as 0.
    pub fn last_count(&self) -> u64 {
        self.last_value().unwrap_or(0)
    }

    pub fn totals(&self) -> DailyTotal {
        DailyTotal {
            date: self.date,
            prev_count: self.prev_count,
            count: self.last_count(),
        }
    }
}

/// `prev_count` and last count of the most recent bucket.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Copy, Default)]
pub struct LatestCounts {
    pub prev_count: u64,
    pub count: u64,
}

/// Summary of one bucket.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Copy)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub prev_count: u64,
    pub count: u64,
}

impl DailyTotal {
    /// Progress made during the day. Negative when text got removed.
    pub fn written(&self) -> i64 {
        difference(self.count, self.prev_count)
    }
}

impl From<DailyTotal> for LatestCounts {
    fn from(DailyTotal { prev_count, count, .. }: DailyTotal) -> Self {
        LatestCounts { prev_count, count }
    }
}

impl LatestCounts {
    pub fn written(&self) -> i64 {
        difference(self.count, self.prev_count)
    }
}

/// `count - prev_count`, saturating at the bounds of `i64`.
fn difference(count: u64, prev_count: u64) -> i64 {
    if count >= prev_count {
        i64::try_from(count - prev_count).unwrap_or(i64::MAX)
    } else {
        i64::try_from(prev_count - count).map_or(i64::MIN, |removed| -removed)
    }
}
