//! Storage is organized around one project directory (usually `<project>/.squirrel`).
//! The basic idea is:
//!  - [project::ProjectStore] keeps the metadata of the project in `project.xml`.
//!  - [watch_storage::XmlWatchStorage] keeps the history of counts in `watch.xml`.
//!  - History is grouped into day buckets, see [watch_log::WatchLog]. Each bucket remembers the
//!    count the previous day ended with, so that daily progress can be computed.
//!
//! Both files are rewritten as a whole on every change.

pub mod entities;
pub mod project;
pub mod watch_log;
pub mod watch_storage;
pub mod xml;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Name of the directory created inside a tracked project.
pub const DIRECTORY_NAME: &str = ".squirrel";
pub const PROJECT_FILENAME: &str = "project.xml";
pub const WATCH_FILENAME: &str = "watch.xml";

/// Root element of both files.
pub const ROOT_ELEMENT: &str = "squirrel";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML escape error: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Project directory {0:?} already exists")]
    AlreadyExists(PathBuf),

    #[error("{0} element was not found in the project file, try initializing the project again")]
    MissingElement(&'static str),

    #[error("Watch log is corrupted: {0}")]
    LogCorrupt(String),
}

/// Locations of the files of one project. Passed around explicitly instead of being resolved
/// from the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    dir: PathBuf,
}

impl ProjectLayout {
    /// Layout rooted at the squirrel directory itself.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Layout of a project whose tracked sources live in `base`.
    pub fn for_project(base: &Path) -> Self {
        Self::new(base.join(DIRECTORY_NAME))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn project_file(&self) -> PathBuf {
        self.dir.join(PROJECT_FILENAME)
    }

    pub fn watch_file(&self) -> PathBuf {
        self.dir.join(WATCH_FILENAME)
    }
}
