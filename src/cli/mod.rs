pub mod project;
pub mod watch;

use std::{env, path::PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use project::{
    process_info_command, process_init_command, process_set_command, InitCommand, SetCommand,
};
use tracing::level_filters::LevelFilter;
use watch::{
    process_counters_command, process_history_command, process_status_command,
    process_watch_command,
};

use crate::{
    counting::CounterRegistry,
    store::{project::ProjectStore, watch_storage::XmlWatchStorage, ProjectLayout},
    tracker::Tracker,
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Squirrel", version, long_about = None)]
#[command(about = "Track the progress of writing projects", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        env = "SQUIRREL_DIR",
        help = "Directory of the tracked project. Defaults to the current directory"
    )]
    dir: Option<PathBuf>,
    #[arg(long, help = "Print logs to stderr")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Start tracking a project")]
    Init {
        #[command(flatten)]
        command: InitCommand,
    },
    #[command(about = "Count the project and record the count if it changed")]
    Watch,
    #[command(about = "Show progress towards the goal")]
    Status,
    #[command(about = "Show counts of every tracked day")]
    History {
        #[arg(long, help = "Print as json")]
        json: bool,
    },
    #[command(about = "Change project information")]
    Set {
        #[command(flatten)]
        command: SetCommand,
    },
    #[command(about = "Show project information as stored")]
    Info {
        #[arg(long, help = "Print as json")]
        json: bool,
    },
    #[command(about = "List available counters")]
    Counters,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::DEBUG)
    } else {
        None
    };
    enable_logging(
        CLI_PREFIX,
        &create_application_default_path()?,
        logging_level,
        args.log,
    )?;

    let base = match args.dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };
    let layout = ProjectLayout::for_project(&base);

    match args.commands {
        Commands::Init { command } => process_init_command(command, &base).await,
        Commands::Counters => {
            process_counters_command(&CounterRegistry::with_defaults());
            Ok(())
        }
        Commands::Watch => process_watch_command(&initialized_tracker(layout)?).await,
        Commands::Status => process_status_command(&initialized_tracker(layout)?).await,
        Commands::History { json } => {
            process_history_command(&initialized_tracker(layout)?, json).await
        }
        Commands::Set { command } => {
            let tracker = initialized_tracker(layout)?;
            process_set_command(command, tracker.projects(), tracker.registry()).await
        }
        Commands::Info { json } => {
            process_info_command(initialized_tracker(layout)?.projects(), json).await
        }
    }
}

fn initialized_tracker(layout: ProjectLayout) -> Result<Tracker<XmlWatchStorage>> {
    if !layout.project_file().exists() {
        bail!(
            "No project in {:?}. Run `squirrel init` first.",
            layout.dir()
        );
    }
    Ok(Tracker::new(
        ProjectStore::new(layout.clone()),
        XmlWatchStorage::for_layout(&layout),
        CounterRegistry::with_defaults(),
        Box::new(DefaultClock),
    ))
}
