use std::{fmt::Display, path::Path};

use anyhow::Result;
use chrono::{Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    counting::CounterRegistry,
    store::{
        project::{ProjectRecord, ProjectStore, ProjectUpdate, DEFAULT_PROJECT_TYPE},
        ProjectLayout,
    },
    utils::time::format_day,
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct InitCommand {
    #[arg(long, short, help = "Name of the project")]
    name: String,
    #[arg(long, short, default_value = "", help = "Short description of the project")]
    description: String,
    #[arg(long, short, help = "Target count")]
    goal: u64,
    #[arg(
        long,
        help = "Due date. Examples are \"31/12/2025\", \"next friday\", \"tomorrow\""
    )]
    due: String,
    #[arg(long = "type", default_value = DEFAULT_PROJECT_TYPE, help = "Counter used for the project, see `squirrel counters`")]
    project_type: String,
    #[arg(long, help = "Tracked file or directory. Defaults to the project directory")]
    source: Option<std::path::PathBuf>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

#[derive(Debug, Parser)]
pub struct SetCommand {
    #[arg(long, short)]
    name: Option<String>,
    #[arg(long, short)]
    description: Option<String>,
    #[arg(long, short)]
    goal: Option<u64>,
    #[arg(
        long,
        help = "Due date. Examples are \"31/12/2025\", \"next friday\", \"tomorrow\""
    )]
    due: Option<String>,
    #[arg(long = "type", help = "Counter used for the project, see `squirrel counters`")]
    project_type: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

pub async fn process_init_command(
    InitCommand {
        name,
        description,
        goal,
        due,
        project_type,
        source,
        date_style,
    }: InitCommand,
    base: &Path,
) -> Result<()> {
    CounterRegistry::with_defaults().resolve(&project_type)?;
    let due_date = parse_due(&due, date_style)?;
    let source = tokio::fs::canonicalize(source.as_deref().unwrap_or(base)).await?;

    let record = ProjectRecord {
        name,
        path: source,
        description,
        due_date,
        goal,
        project_type: Some(project_type),
    };
    let store = ProjectStore::create(&record, ProjectLayout::for_project(base)).await?;

    println!(
        "Tracking {} ({:?}), {} by {}",
        record.name,
        record.path,
        record.goal,
        format_day(record.due_date)
    );
    println!("Project files are in {:?}", store.layout().dir());
    Ok(())
}

pub async fn process_set_command(
    SetCommand {
        name,
        description,
        goal,
        due,
        project_type,
        date_style,
    }: SetCommand,
    store: &ProjectStore,
    registry: &CounterRegistry,
) -> Result<()> {
    if let Some(project_type) = &project_type {
        registry.resolve(project_type)?;
    }
    let due = due
        .map(|due| parse_due(&due, date_style).map(format_day))
        .transpose()?;

    let update = ProjectUpdate {
        name,
        description,
        goal,
        due,
        project_type,
    };
    if update.name.is_none()
        && update.description.is_none()
        && update.goal.is_none()
        && update.due.is_none()
        && update.project_type.is_none()
    {
        println!("Nothing to update");
        return Ok(());
    }

    let report = store.update(&update).await?;
    for field in report.skipped {
        eprintln!("{field} was not updated, try initializing the project again");
    }
    Ok(())
}

pub async fn process_info_command(store: &ProjectStore, json: bool) -> Result<()> {
    let fields = store.read().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
        return Ok(());
    }
    println!("name\t{}", fields.name);
    println!("path\t{}", fields.path);
    println!("description\t{}", fields.description);
    println!("goal\t{}", fields.goal);
    println!("due-date\t{}", fields.due_date);
    println!("project-type\t{}", fields.project_type);
    Ok(())
}

fn parse_due(value: &str, date_style: DateStyle) -> Result<NaiveDate> {
    match parse_date_string(value, Local::now(), date_style.into()) {
        Ok(due) => Ok(due.date_naive()),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate due date {e}"),
            )
            .into()),
    }
}
