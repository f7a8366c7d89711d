use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{CountError, Counter};

/// Counts through the `wc` utility. `wc` prints a `total` line for several files, the first
/// number of the last line is the overall count either way.
pub struct WcCounter {
    name: &'static str,
    description: &'static str,
    flag: &'static str,
}

impl WcCounter {
    pub fn words() -> Self {
        Self {
            name: "text",
            description: "Counting words using the `wc` command",
            flag: "-w",
        }
    }

    pub fn lines() -> Self {
        Self {
            name: "lines",
            description: "Counting lines using the `wc` command",
            flag: "-l",
        }
    }
}

#[async_trait]
impl Counter for WcCounter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    async fn count(&self, files: &[PathBuf]) -> Result<u64, CountError> {
        // wc would wait on stdin otherwise
        if files.is_empty() {
            return Ok(0);
        }

        debug!("Running wc {} over {} files", self.flag, files.len());
        let output = Command::new("wc")
            .arg(self.flag)
            .arg("--")
            .args(files)
            .output()
            .await?;

        if !output.status.success() {
            return Err(CountError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_total(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_total(output: &str) -> Result<u64, CountError> {
    output
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.split_whitespace().next())
        .and_then(|count| count.parse().ok())
        .ok_or_else(|| CountError::UnparsableOutput(output.to_string()))
}
