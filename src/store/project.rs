use std::{io::ErrorKind, path::PathBuf};

use ansi_term::{Colour, Style};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    fs::operations::{read_shared, write_new, LockedFile},
    utils::time::format_day,
};

use super::{
    watch_storage::XmlWatchStorage,
    xml::{self, Element},
    ProjectLayout, StoreError, ROOT_ELEMENT,
};

pub const DEFAULT_PROJECT_TYPE: &str = "text";

const PATH_ELEMENT: &str = "path";
const DESCRIPTION_ELEMENT: &str = "description";
const DUE_DATE_ELEMENT: &str = "due-date";
const GOAL_ELEMENT: &str = "goal";
const PROJECT_TYPE_ELEMENT: &str = "project-type";

/// Everything needed to start tracking a project.
#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub name: String,
    /// Location of the tracked sources.
    pub path: PathBuf,
    pub description: String,
    pub due_date: NaiveDate,
    pub goal: u64,
    /// Name of the counter used for the project, `text` when not set.
    pub project_type: Option<String>,
}

/// Project metadata exactly as stored. Goal and due date are not interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFields {
    pub name: String,
    pub path: String,
    pub description: String,
    pub goal: String,
    pub due_date: String,
    pub project_type: String,
}

/// Partial update of the project. `None` fields are left as they are.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub goal: Option<u64>,
    /// Written verbatim.
    pub due: Option<String>,
    pub project_type: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Fields whose element is missing from the project file.
    pub skipped: Vec<&'static str>,
}

pub struct ProjectStore {
    layout: ProjectLayout,
}

impl ProjectStore {
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Creates the project directory with an empty watch log and the project file. The
    /// directory must not exist yet.
    pub async fn create(record: &ProjectRecord, layout: ProjectLayout) -> Result<Self, StoreError> {
        match tokio::fs::create_dir(layout.dir()).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(layout.dir().to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        }

        XmlWatchStorage::for_layout(&layout).create().await?;

        let bytes = xml::to_bytes(&project_document(record))?;
        write_new(&layout.project_file(), &bytes).await?;

        info!("Created project {:?} in {:?}", record.name, layout.dir());
        Ok(Self::new(layout))
    }

    /// Applies `update` to the stored project. A field whose element is missing is skipped and
    /// reported, the remaining fields are still written.
    pub async fn update(&self, update: &ProjectUpdate) -> Result<UpdateReport, StoreError> {
        let mut file = LockedFile::open(&self.layout.project_file()).await?;
        let result = Self::update_locked(&mut file, update).await;
        file.release().await?;
        result
    }

    async fn update_locked(
        file: &mut LockedFile,
        update: &ProjectUpdate,
    ) -> Result<UpdateReport, StoreError> {
        let mut root = project_root(&file.read_all().await?)?;
        let report = apply_update(&mut root, update);
        file.replace(&xml::to_bytes(&root)?).await?;
        Ok(report)
    }

    pub async fn read(&self) -> Result<ProjectFields, StoreError> {
        let root = project_root(&read_shared(&self.layout.project_file()).await?)?;

        let text_of = |name: &'static str| -> Result<String, StoreError> {
            let element = root.find(name).ok_or(StoreError::MissingElement(name))?;
            Ok(element.text().unwrap_or_default().to_string())
        };

        Ok(ProjectFields {
            name: root
                .attribute("name")
                .ok_or(StoreError::MissingElement("name"))?
                .to_string(),
            path: root
                .find(PATH_ELEMENT)
                .and_then(|path| path.attribute("src"))
                .ok_or(StoreError::MissingElement(PATH_ELEMENT))?
                .to_string(),
            description: text_of(DESCRIPTION_ELEMENT)?,
            goal: text_of(GOAL_ELEMENT)?,
            due_date: text_of(DUE_DATE_ELEMENT)?,
            project_type: text_of(PROJECT_TYPE_ELEMENT)?,
        })
    }
}

fn project_root(contents: &str) -> Result<Element, StoreError> {
    let root = xml::parse(contents)?;
    if root.name != ROOT_ELEMENT {
        return Err(StoreError::Malformed(format!(
            "expected root element {ROOT_ELEMENT}, found {}",
            root.name
        )));
    }
    Ok(root)
}

fn project_document(record: &ProjectRecord) -> Element {
    Element::new(ROOT_ELEMENT)
        .with_attribute("name", record.name.as_str())
        .with_child(Element::new(PATH_ELEMENT).with_attribute("src", record.path.to_string_lossy()))
        .with_child(Element::new(DESCRIPTION_ELEMENT).with_text(record.description.as_str()))
        .with_child(Element::new(DUE_DATE_ELEMENT).with_text(format_day(record.due_date)))
        .with_child(Element::new(GOAL_ELEMENT).with_text(record.goal.to_string()))
        .with_child(
            Element::new(PROJECT_TYPE_ELEMENT).with_text(
                record
                    .project_type
                    .as_deref()
                    .unwrap_or(DEFAULT_PROJECT_TYPE),
            ),
        )
}

fn apply_update(root: &mut Element, update: &ProjectUpdate) -> UpdateReport {
    let mut report = UpdateReport::default();

    if let Some(name) = &update.name {
        root.set_attribute("name", name.as_str());
    }

    let fields = [
        (DESCRIPTION_ELEMENT, update.description.clone()),
        (GOAL_ELEMENT, update.goal.map(|goal| goal.to_string())),
        (DUE_DATE_ELEMENT, update.due.clone()),
        (PROJECT_TYPE_ELEMENT, update.project_type.clone()),
    ];

    for (field, value) in fields {
        let Some(value) = value else {
            continue;
        };
        match root.find_mut(field) {
            Some(element) => element.set_text(value),
            None => {
                report_missing(field);
                report.skipped.push(field);
            }
        }
    }

    report
}

/// Logs a missing element. Description and project type are emphasized, the user usually sets
/// those by hand.
fn report_missing(field: &'static str) {
    let message = StoreError::MissingElement(field).to_string();
    match field {
        DESCRIPTION_ELEMENT | PROJECT_TYPE_ELEMENT => {
            let emphasized = Style::new()
                .bold()
                .blink()
                .fg(Colour::Red)
                .paint(field)
                .to_string();
            error!("{}", message.replacen(field, &emphasized, 1));
        }
        _ => error!("{message}"),
    }
}
