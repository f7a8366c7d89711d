use anyhow::Result;

use crate::{
    counting::CounterRegistry,
    store::{watch_log::AppendOutcome, watch_storage::WatchStorage},
    tracker::Tracker,
    utils::time::format_day,
};

pub async fn process_watch_command(tracker: &Tracker<impl WatchStorage>) -> Result<()> {
    let report = tracker.watch().await?;
    match report.outcome {
        AppendOutcome::Recorded => println!("Recorded {}", report.count),
        _ => println!("No change since last watch ({})", report.count),
    }
    Ok(())
}

pub async fn process_status_command(tracker: &Tracker<impl WatchStorage>) -> Result<()> {
    let progress = tracker.progress().await?;
    let latest = progress.latest;

    match (progress.goal, progress.percentage) {
        (Some(goal), Some(percentage)) => println!(
            "{}: {} / {goal} ({percentage})",
            progress.fields.name, latest.count
        ),
        _ => println!(
            "{}: {} (goal {})",
            progress.fields.name, latest.count, progress.fields.goal
        ),
    }
    println!("Last day: {:+} (started at {})", latest.written(), latest.prev_count);

    match progress.days_left {
        Some(days) if days >= 0 => {
            println!("Due {}, {days} days left", progress.fields.due_date)
        }
        Some(days) => println!("Due {}, {} days overdue", progress.fields.due_date, -days),
        None => println!("Due {}", progress.fields.due_date),
    }
    Ok(())
}

pub async fn process_history_command(
    tracker: &Tracker<impl WatchStorage>,
    json: bool,
) -> Result<()> {
    let history = tracker.watches().history().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }
    for day in history {
        println!("{}\t{}\t{:+}", format_day(day.date), day.count, day.written());
    }
    Ok(())
}

pub fn process_counters_command(registry: &CounterRegistry) {
    for counter in registry.iter() {
        let requires = counter.requires();
        if requires.is_empty() {
            println!("{}\t{}", counter.name(), counter.description());
        } else {
            println!(
                "{}\t{} (requires {})",
                counter.name(),
                counter.description(),
                requires.join(", ")
            );
        }
    }
}
